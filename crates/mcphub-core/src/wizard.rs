use crate::backup::BackupManager;
use crate::clients::ClientRegistry;
use crate::config_store::ConfigStore;
use crate::detector::detect_available;
use crate::importer::{import_from, ImportOptions};
use crate::models::{ClientId, ServerDefinition, UnifiedConfig, VerificationStatus};
use crate::paths::HubPaths;
use crate::replace::{ReplaceEngine, ReplaceOptions, ReplaceOutcome, UnifiedEndpoint};
use crate::verifier;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tracing::info;

/// The guided flow's named steps, in walk order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    Welcome,
    DetectClients,
    Importing,
    SelectServers,
    Verifying,
    SaveConfig,
    ReplaceOrRestore,
}

impl WizardStep {
    pub const ALL: [WizardStep; 7] = [
        Self::Welcome,
        Self::DetectClients,
        Self::Importing,
        Self::SelectServers,
        Self::Verifying,
        Self::SaveConfig,
        Self::ReplaceOrRestore,
    ];

    fn index(self) -> usize {
        Self::ALL
            .iter()
            .position(|step| *step == self)
            .unwrap_or(0)
    }
}

/// Tracks which steps have been visited. A transition is permitted only to
/// the immediately following step or back to an already-visited one; no
/// skipping ahead.
#[derive(Debug, Clone)]
pub struct WizardFlow {
    current: WizardStep,
    visited: BTreeSet<WizardStep>,
}

impl Default for WizardFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl WizardFlow {
    pub fn new() -> Self {
        let mut visited = BTreeSet::new();
        visited.insert(WizardStep::Welcome);
        Self {
            current: WizardStep::Welcome,
            visited,
        }
    }

    pub fn current(&self) -> WizardStep {
        self.current
    }

    pub fn visited(&self, step: WizardStep) -> bool {
        self.visited.contains(&step)
    }

    pub fn can_go_to(&self, step: WizardStep) -> bool {
        self.visited.contains(&step) || step.index() == self.current.index() + 1
    }

    /// Moves to `step` when permitted; returns whether the move happened.
    pub fn go_to(&mut self, step: WizardStep) -> bool {
        if !self.can_go_to(step) {
            return false;
        }
        self.current = step;
        self.visited.insert(step);
        true
    }
}

/// In-memory state of one wizard run. Never persisted; only the derived
/// save set leaves this structure. Entries are keyed by
/// `ServerDefinition::result_key`.
#[derive(Debug, Clone, Default)]
pub struct ImportSession {
    pub selected_clients: BTreeSet<ClientId>,
    imported_servers: BTreeMap<String, ServerDefinition>,
    inclusion_flags: BTreeMap<String, bool>,
    verification_results: BTreeMap<String, VerificationStatus>,
    user_overrides: BTreeSet<String>,
}

impl ImportSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records imported definitions; a re-import of the same key overwrites
    /// and resets inclusion to the default.
    pub fn record_import(&mut self, servers: &[ServerDefinition]) {
        for definition in servers {
            let key = definition.result_key();
            self.imported_servers.insert(key.clone(), definition.clone());
            self.verification_results
                .insert(key.clone(), VerificationStatus::Pending);
            self.user_overrides.remove(&key);
            self.inclusion_flags.insert(key, true);
        }
    }

    pub fn servers(&self) -> Vec<ServerDefinition> {
        self.imported_servers.values().cloned().collect()
    }

    pub fn verification_result(&self, key: &str) -> VerificationStatus {
        self.verification_results
            .get(key)
            .copied()
            .unwrap_or(VerificationStatus::Pending)
    }

    pub fn included(&self, key: &str) -> bool {
        self.inclusion_flags.get(key).copied().unwrap_or(false)
    }

    /// Explicit user choice; wins over any later verification outcome.
    pub fn set_included(&mut self, key: &str, included: bool) {
        if self.imported_servers.contains_key(key) {
            self.user_overrides.insert(key.to_string());
            self.inclusion_flags.insert(key.to_string(), included);
        }
    }

    /// Stores a verification outcome. The inclusion default follows the
    /// status, but a user override is never clobbered.
    pub fn record_verification(&mut self, key: &str, status: VerificationStatus) {
        if !self.imported_servers.contains_key(key) {
            return;
        }
        self.verification_results.insert(key.to_string(), status);
        if !self.user_overrides.contains(key) {
            self.inclusion_flags
                .insert(key.to_string(), status == VerificationStatus::Success);
        }
    }

    /// The definitions that will actually be saved.
    pub fn save_set(&self) -> Vec<ServerDefinition> {
        self.imported_servers
            .iter()
            .filter(|(key, _)| self.included(key))
            .map(|(_, definition)| definition.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DetectResponse {
    pub success: bool,
    pub clients: Vec<ClientId>,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImportRequest {
    pub clients: Vec<String>,
    #[serde(rename = "dry_run", default)]
    pub dry_run: bool,
    #[serde(rename = "skip_oauth", default)]
    pub skip_oauth: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportResponse {
    pub success: bool,
    pub servers: Vec<ServerDefinition>,
    pub errors: Vec<String>,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyRequest {
    pub servers: Vec<ServerDefinition>,
    #[serde(rename = "timeout_seconds", default)]
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyResponse {
    pub success: bool,
    pub results: BTreeMap<String, VerificationStatus>,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaveRequest {
    pub servers: Vec<ServerDefinition>,
    #[serde(rename = "dry_run", default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveResponse {
    pub success: bool,
    pub message: String,
    #[serde(rename = "config_path", skip_serializing_if = "Option::is_none")]
    pub config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplaceRequest {
    pub clients: Vec<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(rename = "api_key", default)]
    pub api_key: Option<String>,
    #[serde(rename = "server_name", default)]
    pub server_name: Option<String>,
    #[serde(rename = "selected_servers", default)]
    pub selected_servers: Vec<String>,
    #[serde(rename = "dry_run", default)]
    pub dry_run: bool,
    #[serde(default)]
    pub force: bool,
    #[serde(rename = "create_if_missing", default)]
    pub create_if_missing: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplaceResponse {
    pub success: bool,
    pub results: BTreeMap<String, ReplaceOutcome>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackupStatus {
    #[serde(rename = "has_backup")]
    pub has_backup: bool,
    #[serde(rename = "created_at", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackupsResponse {
    pub success: bool,
    pub backups: BTreeMap<String, BackupStatus>,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RestoreRequest {
    pub clients: Vec<String>,
    #[serde(rename = "server_name", default)]
    pub server_name: Option<String>,
    #[serde(rename = "dry_run", default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RestoreOutcome {
    pub success: bool,
    #[serde(rename = "restored_path", skip_serializing_if = "Option::is_none")]
    pub restored_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RestoreResponse {
    pub success: bool,
    pub results: BTreeMap<String, RestoreOutcome>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<UnifiedConfig>,
    #[serde(rename = "config_path", skip_serializing_if = "Option::is_none")]
    pub config_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
}

/// Typed request/response layer the wizard UI consumes. Every method
/// resolves to a payload with `success` and `message`; recoverable
/// failures come back as `success: false`, never as `Err`.
#[derive(Debug, Clone)]
pub struct WizardService {
    registry: ClientRegistry,
    store: ConfigStore,
    backups: BackupManager,
    engine: ReplaceEngine,
}

impl WizardService {
    pub fn current() -> Self {
        Self::with_parts(HubPaths::detect(), ClientRegistry::detect())
    }

    pub fn with_parts(paths: HubPaths, registry: ClientRegistry) -> Self {
        let store = ConfigStore::new(paths.clone());
        let backups = BackupManager::new(registry.clone(), &paths);
        let engine = ReplaceEngine::new(registry.clone(), backups.clone());
        Self {
            registry,
            store,
            backups,
            engine,
        }
    }

    pub fn health(&self) -> HealthResponse {
        HealthResponse {
            status: "healthy",
            service: "mcphub-wizard",
        }
    }

    pub fn detect_clients(&self) -> DetectResponse {
        let clients = detect_available(&self.registry);
        let message = format!("Found {} MCP clients", clients.len());
        DetectResponse {
            success: true,
            clients,
            message,
        }
    }

    pub fn import(&self, request: &ImportRequest) -> ImportResponse {
        let (clients, mut errors) = parse_clients(&request.clients);
        let options = ImportOptions {
            dry_run: request.dry_run,
            skip_oauth: request.skip_oauth,
        };
        let outcome = import_from(&self.registry, &clients, &options);
        errors.extend(outcome.errors);

        let message = format!(
            "Imported {} servers from {} clients",
            outcome.servers.len(),
            clients.len()
        );
        ImportResponse {
            success: true,
            servers: outcome.servers,
            errors,
            message,
        }
    }

    pub async fn verify(&self, request: &VerifyRequest) -> VerifyResponse {
        let results = verifier::verify(&request.servers, request.timeout_seconds).await;
        let succeeded = results
            .values()
            .filter(|status| **status == VerificationStatus::Success)
            .count();
        let message = format!(
            "Verified {}/{} servers successfully",
            succeeded,
            results.len()
        );
        VerifyResponse {
            success: true,
            results,
            message,
        }
    }

    pub fn save(&self, request: &SaveRequest) -> SaveResponse {
        match self.store.save(&request.servers, request.dry_run) {
            Ok(config_path) => SaveResponse {
                success: true,
                message: format!("Saved {} servers to configuration", request.servers.len()),
                config_path: Some(config_path),
            },
            Err(error) => SaveResponse {
                success: false,
                message: error.to_string(),
                config_path: None,
            },
        }
    }

    pub fn replace(&self, request: &ReplaceRequest) -> ReplaceResponse {
        let (clients, errors) = parse_clients(&request.clients);
        if let Some(message) = errors.into_iter().next() {
            return ReplaceResponse {
                success: false,
                results: BTreeMap::new(),
                message,
            };
        }

        let mut endpoint = UnifiedEndpoint::default();
        if let Some(url) = &request.url {
            endpoint.url = url.clone();
        }
        if let Some(api_key) = &request.api_key {
            endpoint.api_key = api_key.clone();
        }
        if let Some(server_name) = &request.server_name {
            endpoint.server_name = server_name.clone();
        }
        let selected: BTreeSet<String> = request.selected_servers.iter().cloned().collect();
        let options = ReplaceOptions {
            dry_run: request.dry_run,
            force: request.force,
            create_if_missing: request.create_if_missing,
        };

        let raw = self.engine.replace(&clients, &endpoint, &selected, &options);
        let total = raw.len();
        let succeeded = raw.values().filter(|outcome| outcome.success).count();
        let results = raw
            .into_iter()
            .map(|(client, outcome)| (client.as_str().to_string(), outcome))
            .collect();
        ReplaceResponse {
            success: succeeded == total,
            results,
            message: format!("Replaced {succeeded}/{total} client configs successfully"),
        }
    }

    pub fn backups(&self) -> BackupsResponse {
        let mut backups = BTreeMap::new();
        let mut recorded = 0;
        for (client, record) in self.backups.list_backups() {
            let status = match record {
                Some(record) if record.has_backup => {
                    recorded += 1;
                    BackupStatus {
                        has_backup: true,
                        created_at: Some(record.created_at),
                    }
                }
                _ => BackupStatus {
                    has_backup: false,
                    created_at: None,
                },
            };
            backups.insert(client.as_str().to_string(), status);
        }
        BackupsResponse {
            success: true,
            backups,
            message: format!("Found {recorded} client backups"),
        }
    }

    pub fn restore(&self, request: &RestoreRequest) -> RestoreResponse {
        let (clients, errors) = parse_clients(&request.clients);
        if let Some(message) = errors.into_iter().next() {
            return RestoreResponse {
                success: false,
                results: BTreeMap::new(),
                message,
            };
        }

        let mut results = BTreeMap::new();
        let mut restored = 0;
        for client in clients {
            let outcome = match self.backups.restore(client, request.dry_run) {
                Ok(path) => {
                    restored += 1;
                    RestoreOutcome {
                        success: true,
                        restored_path: Some(path),
                        error: None,
                    }
                }
                Err(error) => RestoreOutcome {
                    success: false,
                    restored_path: None,
                    error: Some(error.to_string()),
                },
            };
            results.insert(client.as_str().to_string(), outcome);
        }
        info!(restored, "restore pass finished");
        RestoreResponse {
            success: results.values().all(|outcome| outcome.success),
            results,
            message: format!("Restore completed for {restored} clients"),
        }
    }

    pub fn config(&self) -> ConfigResponse {
        match self.store.load() {
            Ok(config) => ConfigResponse {
                success: true,
                config: Some(config),
                config_path: Some(self.store.config_path().to_path_buf()),
                message: None,
            },
            Err(error) => ConfigResponse {
                success: false,
                config: None,
                config_path: None,
                message: Some(error.to_string()),
            },
        }
    }
}

fn parse_clients(names: &[String]) -> (Vec<ClientId>, Vec<String>) {
    let mut clients = Vec::new();
    let mut errors = Vec::new();
    for name in names {
        match name.parse::<ClientId>() {
            Ok(client) => clients.push(client),
            Err(_) => errors.push(format!("Unknown client: {name}")),
        }
    }
    (clients, errors)
}
