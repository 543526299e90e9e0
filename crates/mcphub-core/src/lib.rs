pub mod backup;
pub mod clients;
pub mod config_store;
pub mod detector;
pub mod error;
pub mod importer;
pub mod models;
pub mod paths;
pub mod replace;
pub mod verifier;
pub mod wizard;

pub use backup::BackupManager;
pub use clients::ClientRegistry;
pub use config_store::ConfigStore;
pub use detector::detect_available;
pub use error::HubError;
pub use importer::{import_from, ImportOptions, ImportOutcome};
pub use models::{
    BackupRecord, ClientId, GatewaySettings, ServerDefinition, UnifiedConfig, VerificationStatus,
};
pub use paths::HubPaths;
pub use replace::{ReplaceEngine, ReplaceOptions, ReplaceOutcome, UnifiedEndpoint};
pub use verifier::verify;
pub use wizard::{ImportSession, WizardFlow, WizardService, WizardStep};
