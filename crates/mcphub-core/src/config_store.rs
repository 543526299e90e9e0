use crate::error::HubError;
use crate::models::{ServerDefinition, UnifiedConfig};
use crate::paths::{write_atomic, HubPaths};
use std::path::{Path, PathBuf};
use tracing::info;

/// Sole owner of the unified configuration file. All writes go through the
/// atomic-replace path so a crash mid-write never leaves a truncated file.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    paths: HubPaths,
}

impl ConfigStore {
    pub fn new(paths: HubPaths) -> Self {
        Self { paths }
    }

    pub fn config_path(&self) -> &Path {
        &self.paths.config_path
    }

    /// Fails with `NotFound` when no config exists yet; first-run is the
    /// caller's call, not a crash.
    pub fn load(&self) -> Result<UnifiedConfig, HubError> {
        let raw = match std::fs::read(&self.paths.config_path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Err(HubError::NotFound {
                    path: self.paths.config_path.clone(),
                });
            }
            Err(error) => return Err(HubError::io(&self.paths.config_path, error)),
        };
        Ok(serde_json::from_slice(&raw)?)
    }

    /// Merge-by-name: an incoming definition replaces the existing entry with
    /// the same name, other entries are left untouched. An explicitly empty
    /// incoming set means "remove all". Gateway settings survive every save.
    pub fn save(
        &self,
        servers: &[ServerDefinition],
        dry_run: bool,
    ) -> Result<PathBuf, HubError> {
        let mut config = match self.load() {
            Ok(config) => config,
            Err(HubError::NotFound { .. }) => UnifiedConfig::empty(),
            Err(error) => return Err(error),
        };

        if servers.is_empty() {
            config.mcp_servers.clear();
        } else {
            for incoming in servers {
                let stripped = incoming.stripped();
                match config
                    .mcp_servers
                    .iter_mut()
                    .find(|existing| existing.name == stripped.name)
                {
                    Some(existing) => *existing = stripped,
                    None => config.mcp_servers.push(stripped),
                }
            }
        }

        let mut rendered = serde_json::to_vec_pretty(&config)?;
        rendered.push(b'\n');

        if dry_run {
            info!(path = %self.paths.config_path.display(), "dry run, unified config not written");
            return Ok(self.paths.config_path.clone());
        }

        self.paths
            .ensure_runtime_dir()
            .map_err(|error| HubError::write(&self.paths.runtime_directory, error))?;
        write_atomic(&self.paths.config_path, &rendered)?;
        info!(
            path = %self.paths.config_path.display(),
            servers = config.mcp_servers.len(),
            "unified config saved"
        );
        Ok(self.paths.config_path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::ConfigStore;
    use crate::error::HubError;
    use crate::models::{ClientId, ServerDefinition};
    use crate::paths::HubPaths;
    use tempfile::TempDir;

    fn store_in(temp: &TempDir) -> ConfigStore {
        ConfigStore::new(HubPaths::from_runtime(temp.path().join("runtime")))
    }

    fn named(name: &str, command: &str) -> ServerDefinition {
        ServerDefinition::new(name, command)
    }

    #[test]
    fn load_reports_not_found_on_first_run() {
        let temp = TempDir::new().expect("tempdir");
        let store = store_in(&temp);
        let error = store.load().expect_err("must be missing");
        assert!(matches!(error, HubError::NotFound { .. }));
    }

    #[test]
    fn save_then_load_round_trips_and_strips_provenance() {
        let temp = TempDir::new().expect("tempdir");
        let store = store_in(&temp);

        let mut definition = named("fs", "npx");
        definition.source_client = Some(ClientId::Cursor);
        definition.potential_duplicate = true;
        definition.duplicate_reason = Some(String::from("same command also found in windsurf"));

        store.save(&[definition], false).expect("save");
        let config = store.load().expect("load");
        assert_eq!(config.mcp_servers.len(), 1);
        assert_eq!(config.mcp_servers[0].name, "fs");
        assert_eq!(config.mcp_servers[0].source_client, None);
        assert!(!config.mcp_servers[0].potential_duplicate);
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn save_twice_is_byte_identical() {
        let temp = TempDir::new().expect("tempdir");
        let store = store_in(&temp);
        let servers = vec![named("fs", "npx"), named("echo", "uvx")];

        let path = store.save(&servers, false).expect("first save");
        let first = std::fs::read(&path).expect("read first");
        store.save(&servers, false).expect("second save");
        let second = std::fs::read(&path).expect("read second");
        assert_eq!(first, second);
    }

    #[test]
    fn save_replaces_by_name_and_keeps_the_rest() {
        let temp = TempDir::new().expect("tempdir");
        let store = store_in(&temp);
        store
            .save(&[named("fs", "npx"), named("echo", "uvx")], false)
            .expect("seed");

        let mut updated = named("fs", "node");
        updated.args = vec![String::from("server.js")];
        store.save(&[updated], false).expect("update");

        let config = store.load().expect("load");
        assert_eq!(config.mcp_servers.len(), 2);
        let fs = config
            .mcp_servers
            .iter()
            .find(|item| item.name == "fs")
            .expect("fs");
        assert_eq!(fs.command, "node");
        assert!(config.mcp_servers.iter().any(|item| item.name == "echo"));
    }

    #[test]
    fn empty_incoming_set_removes_all_servers() {
        let temp = TempDir::new().expect("tempdir");
        let store = store_in(&temp);
        store.save(&[named("fs", "npx")], false).expect("seed");
        store.save(&[], false).expect("clear");
        assert!(store.load().expect("load").mcp_servers.is_empty());
    }

    #[test]
    fn dry_run_returns_target_path_without_touching_disk() {
        let temp = TempDir::new().expect("tempdir");
        let store = store_in(&temp);
        let path = store.save(&[named("fs", "npx")], true).expect("dry run");
        assert_eq!(path, store.config_path());
        assert!(!path.exists());
    }
}
