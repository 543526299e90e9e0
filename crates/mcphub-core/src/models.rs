use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClientId {
    Cursor,
    Windsurf,
    Cline,
    ClaudeDesktop,
    ClaudeCode,
    Vscode,
    Codex,
}

impl ClientId {
    pub const ALL: [ClientId; 7] = [
        Self::Cursor,
        Self::Windsurf,
        Self::Cline,
        Self::ClaudeDesktop,
        Self::ClaudeCode,
        Self::Vscode,
        Self::Codex,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cursor => "cursor",
            Self::Windsurf => "windsurf",
            Self::Cline => "cline",
            Self::ClaudeDesktop => "claude-desktop",
            Self::ClaudeCode => "claude-code",
            Self::Vscode => "vscode",
            Self::Codex => "codex",
        }
    }
}

impl std::str::FromStr for ClientId {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cursor" => Ok(Self::Cursor),
            "windsurf" => Ok(Self::Windsurf),
            "cline" => Ok(Self::Cline),
            "claude-desktop" | "claude_desktop" => Ok(Self::ClaudeDesktop),
            "claude-code" | "claude_code" => Ok(Self::ClaudeCode),
            "vscode" | "code" => Ok(Self::Vscode),
            "codex" => Ok(Self::Codex),
            other => Err(format!("unsupported client: {other}")),
        }
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, launchable MCP server. Identity is `(source_client, name)`;
/// the duplicate flag is a softer cross-client relation and only advisory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDefinition {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roots: Option<Vec<String>>,
    #[serde(
        rename = "source_client",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub source_client: Option<ClientId>,
    #[serde(
        rename = "potential_duplicate",
        default,
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub potential_duplicate: bool,
    #[serde(
        rename = "duplicate_reason",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub duplicate_reason: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl ServerDefinition {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            enabled: true,
            roots: None,
            source_client: None,
            potential_duplicate: false,
            duplicate_reason: None,
        }
    }

    /// Key used in verification result maps: `<client>:<name>`, or the bare
    /// name for synthetic entries with no source client.
    pub fn result_key(&self) -> String {
        match self.source_client {
            Some(client) => format!("{}:{}", client.as_str(), self.name),
            None => self.name.clone(),
        }
    }

    /// Copy with import provenance cleared, the shape persisted into the
    /// unified configuration.
    pub fn stripped(&self) -> Self {
        let mut stripped = self.clone();
        stripped.source_client = None;
        stripped.potential_duplicate = false;
        stripped.duplicate_reason = None;
        stripped
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    Success,
    Failed,
    Timeout,
}

impl VerificationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Timeout => "timeout",
        }
    }
}

/// The `server` section of the unified configuration: where the gateway
/// process listens and the key clients authenticate with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewaySettings {
    pub host: String,
    pub port: u16,
    #[serde(rename = "api_key")]
    pub api_key: String,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            host: String::from("localhost"),
            port: 3000,
            api_key: String::from("dev-api-key-change-me"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnifiedConfig {
    pub server: GatewaySettings,
    #[serde(rename = "mcp_servers", default)]
    pub mcp_servers: Vec<ServerDefinition>,
}

impl UnifiedConfig {
    pub fn empty() -> Self {
        Self {
            server: GatewaySettings::default(),
            mcp_servers: Vec::new(),
        }
    }
}

/// Snapshot of one client's live config taken before a replace rewrote it.
/// A newer backup supersedes an older one; restore always uses the latest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub client: ClientId,
    #[serde(rename = "backup_path")]
    pub backup_path: PathBuf,
    #[serde(rename = "created_at")]
    pub created_at: String,
    #[serde(rename = "has_backup")]
    pub has_backup: bool,
}
