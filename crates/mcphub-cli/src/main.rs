mod server;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use mcphub_core::wizard::{ImportRequest, ReplaceRequest, RestoreRequest, SaveRequest, VerifyRequest};
use mcphub_core::{detect_available, ClientId, ClientRegistry, HubPaths, WizardService};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mcphub")]
#[command(about = "Unified MCP server hub: import, verify and take over client configs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List MCP clients with a config present on this machine
    Clients {
        #[arg(long)]
        json: bool,
    },
    /// Import server definitions from client configs
    Import {
        #[arg(long = "client")]
        clients: Vec<String>,
        /// Import from every detected client
        #[arg(long)]
        all: bool,
        #[arg(long = "skip-oauth")]
        skip_oauth: bool,
        /// Persist the imported servers into the unified config
        #[arg(long)]
        save: bool,
        #[arg(long = "dry-run")]
        dry_run: bool,
        #[arg(long)]
        json: bool,
    },
    /// Launch the saved servers and report which complete the handshake
    Verify {
        /// Seconds to wait per server; waits indefinitely when omitted
        #[arg(long)]
        timeout: Option<u64>,
        /// Restrict verification to these server names
        #[arg(long = "server")]
        servers: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    /// Rewrite client configs to delegate to the unified gateway
    Replace {
        #[arg(long = "client")]
        clients: Vec<String>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long = "api-key")]
        api_key: Option<String>,
        #[arg(long = "server-name")]
        server_name: Option<String>,
        /// Server names to move behind the gateway
        #[arg(long = "server")]
        servers: Vec<String>,
        #[arg(long = "dry-run")]
        dry_run: bool,
        #[arg(long)]
        force: bool,
        #[arg(long = "create-if-missing")]
        create_if_missing: bool,
    },
    /// Show the most recent backup per client
    Backups {
        #[arg(long)]
        json: bool,
    },
    /// Restore client configs from their latest backup
    Restore {
        #[arg(long = "client")]
        clients: Vec<String>,
        #[arg(long = "dry-run")]
        dry_run: bool,
    },
    /// Run the wizard HTTP service
    Serve {
        #[arg(long, default_value = "localhost")]
        host: String,
        #[arg(long, default_value_t = 3002)]
        port: u16,
    },
    /// Print resolved paths and per-client detection state
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_env("MCPHUB_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let service = WizardService::current();

    match cli.command {
        Commands::Clients { json } => {
            let response = service.detect_clients();
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                for client in &response.clients {
                    println!("{client}");
                }
                eprintln!("{}", response.message);
            }
        }
        Commands::Import {
            clients,
            all,
            skip_oauth,
            save,
            dry_run,
            json,
        } => {
            let clients = if all {
                service
                    .detect_clients()
                    .clients
                    .iter()
                    .map(|client| client.as_str().to_string())
                    .collect()
            } else if clients.is_empty() {
                return Err(anyhow!("pass --client at least once, or --all"));
            } else {
                clients
            };

            let response = service.import(&ImportRequest {
                clients,
                dry_run,
                skip_oauth,
            });
            for error in &response.errors {
                eprintln!("{error}");
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                for definition in &response.servers {
                    println!(
                        "{}\t{}\t{} {}{}",
                        definition.result_key(),
                        if definition.enabled { "enabled" } else { "disabled" },
                        definition.command,
                        definition.args.join(" "),
                        if definition.potential_duplicate {
                            "\t[duplicate?]"
                        } else {
                            ""
                        }
                    );
                }
                eprintln!("{}", response.message);
            }

            if save {
                let saved = service.save(&SaveRequest {
                    servers: response.servers,
                    dry_run,
                });
                if !saved.success {
                    return Err(anyhow!(saved.message));
                }
                eprintln!("{}", saved.message);
            }
        }
        Commands::Verify {
            timeout,
            servers,
            json,
        } => {
            let config = service.config();
            let Some(config) = config.config else {
                return Err(anyhow!(config
                    .message
                    .unwrap_or_else(|| String::from("no unified config saved yet"))));
            };
            let selected: Vec<_> = config
                .mcp_servers
                .into_iter()
                .filter(|definition| {
                    servers.is_empty() || servers.contains(&definition.name)
                })
                .collect();
            if selected.is_empty() {
                return Err(anyhow!("no saved servers match the requested names"));
            }

            let response = service
                .verify(&VerifyRequest {
                    servers: selected,
                    timeout_seconds: timeout,
                })
                .await;
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                for (key, status) in &response.results {
                    println!("{key}\t{}", status.as_str());
                }
                eprintln!("{}", response.message);
            }
        }
        Commands::Replace {
            clients,
            url,
            api_key,
            server_name,
            servers,
            dry_run,
            force,
            create_if_missing,
        } => {
            if clients.is_empty() {
                return Err(anyhow!("pass --client at least once"));
            }
            let response = service.replace(&ReplaceRequest {
                clients,
                url,
                api_key,
                server_name,
                selected_servers: servers,
                dry_run,
                force,
                create_if_missing,
            });
            for (client, outcome) in &response.results {
                match (&outcome.error, &outcome.backup_path) {
                    (Some(error), _) => println!("{client}\tfailed\t{error}"),
                    (None, Some(backup)) => println!("{client}\tok\tbackup={}", backup.display()),
                    (None, None) => println!("{client}\tok"),
                }
            }
            eprintln!("{}", response.message);
            if !response.success {
                return Err(anyhow!("replace failed for at least one client"));
            }
        }
        Commands::Backups { json } => {
            let response = service.backups();
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                for (client, status) in &response.backups {
                    match &status.created_at {
                        Some(created_at) => println!("{client}\t{created_at}"),
                        None => println!("{client}\t-"),
                    }
                }
            }
        }
        Commands::Restore { clients, dry_run } => {
            if clients.is_empty() {
                return Err(anyhow!("pass --client at least once"));
            }
            let response = service.restore(&RestoreRequest {
                clients,
                server_name: None,
                dry_run,
            });
            for (client, outcome) in &response.results {
                match (&outcome.error, &outcome.restored_path) {
                    (Some(error), _) => println!("{client}\tfailed\t{error}"),
                    (None, Some(path)) => println!("{client}\trestored\t{}", path.display()),
                    (None, None) => println!("{client}\trestored"),
                }
            }
            eprintln!("{}", response.message);
            if !response.success {
                return Err(anyhow!("restore failed for at least one client"));
            }
        }
        Commands::Serve { host, port } => {
            server::serve(service, &host, port).await?;
        }
        Commands::Doctor => {
            let paths = HubPaths::detect();
            println!("runtime={}", paths.runtime_directory.display());
            println!("config={}", paths.config_path.display());
            println!("backups={}", paths.backups_directory.display());

            let registry = ClientRegistry::detect();
            println!("home={}", registry.home_directory().display());
            let available = detect_available(&registry);
            for client in ClientId::ALL {
                let state = if available.contains(&client) {
                    "present"
                } else {
                    "absent"
                };
                println!(
                    "{}\t{}\t{}",
                    client,
                    state,
                    registry.config_write_path(client).display()
                );
            }
        }
    }

    Ok(())
}
