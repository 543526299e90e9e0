use crate::clients::ClientRegistry;
use crate::models::{ClientId, ServerDefinition};
use std::collections::BTreeMap;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    /// Only affects downstream persistence, never the import itself.
    pub dry_run: bool,
    /// Filter out definitions whose args indicate an OAuth-gated remote
    /// transport. Advisory heuristic, not protocol-verified.
    pub skip_oauth: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ImportOutcome {
    pub servers: Vec<ServerDefinition>,
    pub errors: Vec<String>,
}

/// Reads server definitions out of each selected client's configuration.
/// Best-effort across clients: a parse failure is recorded as an error string
/// and the remaining clients continue. All-or-nothing within one client.
pub fn import_from(
    registry: &ClientRegistry,
    clients: &[ClientId],
    options: &ImportOptions,
) -> ImportOutcome {
    let mut outcome = ImportOutcome::default();

    for client in clients {
        match registry.read_servers(*client) {
            Ok(servers) => {
                debug!(
                    client = client.as_str(),
                    count = servers.len(),
                    "imported server definitions"
                );
                for mut definition in servers {
                    definition.source_client = Some(*client);
                    outcome.servers.push(definition);
                }
            }
            Err(error) => {
                warn!(client = client.as_str(), %error, "import failed for client");
                outcome
                    .errors
                    .push(format!("Error importing from {client}: {error}"));
            }
        }
    }

    flag_potential_duplicates(&mut outcome.servers);

    if options.skip_oauth {
        outcome.servers.retain(|definition| {
            let gated = is_oauth_gated(definition);
            if gated {
                debug!(name = %definition.name, "skipping OAuth-gated remote server");
            }
            !gated
        });
    }

    outcome
}

/// Groups definitions by `(command, trimmed args)`; any group spanning more
/// than one source client has every member flagged. Symmetric and advisory,
/// never auto-merged.
fn flag_potential_duplicates(servers: &mut [ServerDefinition]) {
    let mut groups: BTreeMap<(String, Vec<String>), Vec<usize>> = BTreeMap::new();
    for (index, definition) in servers.iter().enumerate() {
        let args = definition
            .args
            .iter()
            .map(|arg| arg.trim().to_string())
            .collect::<Vec<_>>();
        groups
            .entry((definition.command.clone(), args))
            .or_default()
            .push(index);
    }

    for indices in groups.values() {
        let mut sources = indices
            .iter()
            .filter_map(|index| servers[*index].source_client)
            .collect::<Vec<_>>();
        sources.sort();
        sources.dedup();
        if sources.len() < 2 {
            continue;
        }

        for index in indices {
            let own_source = servers[*index].source_client;
            let others = sources
                .iter()
                .filter(|source| Some(**source) != own_source)
                .map(|source| source.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            servers[*index].potential_duplicate = true;
            servers[*index].duplicate_reason =
                Some(format!("same command also found in {others}"));
        }
    }
}

fn is_oauth_gated(definition: &ServerDefinition) -> bool {
    definition.args.iter().any(|arg| {
        arg == "mcp-remote" || arg.starts_with("http://") || arg.starts_with("https://")
    })
}
