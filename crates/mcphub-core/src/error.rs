use crate::models::ClientId;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Write failed at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse {client} config: {reason}")]
    Parse { client: ClientId, reason: String },

    #[error("Configuration not found at {path}")]
    NotFound { path: PathBuf },

    #[error("Failed to spawn '{name}': {reason}")]
    Spawn { name: String, reason: String },

    #[error("Handshake failed for '{name}': {reason}")]
    Handshake { name: String, reason: String },

    #[error("No backup recorded for {client}")]
    NoBackup { client: ClientId },
}

impl HubError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    pub fn parse(client: ClientId, reason: impl Into<String>) -> Self {
        Self::Parse {
            client,
            reason: reason.into(),
        }
    }
}
