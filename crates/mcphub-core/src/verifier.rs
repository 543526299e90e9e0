use crate::error::HubError;
use crate::models::{ServerDefinition, VerificationStatus};
use serde_json::{json, Value as JsonValue};
use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::debug;

const PROTOCOL_VERSION: &str = "2024-11-05";

/// Owns one spawned MCP server child and drives the line-oriented JSON-RPC
/// startup handshake over its stdio. The probing stays behind this seam so
/// the heuristic is swappable without touching verification scheduling.
pub struct ServerProcess {
    name: String,
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
}

impl ServerProcess {
    pub fn spawn(definition: &ServerDefinition) -> Result<Self, HubError> {
        let mut command = Command::new(&definition.command);
        command
            .args(&definition.args)
            .envs(&definition.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|error| HubError::Spawn {
            name: definition.name.clone(),
            reason: error.to_string(),
        })?;
        let stdin = child.stdin.take().ok_or_else(|| HubError::Spawn {
            name: definition.name.clone(),
            reason: String::from("child stdin unavailable"),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| HubError::Spawn {
            name: definition.name.clone(),
            reason: String::from("child stdout unavailable"),
        })?;

        Ok(Self {
            name: definition.name.clone(),
            child,
            stdin,
            reader: BufReader::new(stdout),
        })
    }

    /// initialize -> initialized notification -> tools/list. All three
    /// completing classifies the definition as working.
    pub async fn handshake(&mut self) -> Result<(), HubError> {
        let initialize = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {
                    "roots": { "listChanged": true }
                },
                "clientInfo": {
                    "name": "mcphub",
                    "version": env!("CARGO_PKG_VERSION")
                }
            }
        });
        self.send(&initialize).await?;
        self.read_response(1).await?;

        let initialized = json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized"
        });
        self.send(&initialized).await?;

        let list_tools = json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "tools/list",
            "params": {}
        });
        self.send(&list_tools).await?;
        self.read_response(2).await?;

        Ok(())
    }

    /// Kills and reaps the child. Safe to call after any handshake outcome;
    /// a verified server is never left running.
    pub async fn shutdown(mut self) {
        let _ = self.child.start_kill();
        let _ = self.child.wait().await;
    }

    async fn send(&mut self, frame: &JsonValue) -> Result<(), HubError> {
        let mut line = frame.to_string();
        line.push('\n');
        self.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|error| self.handshake_error(error.to_string()))?;
        self.stdin
            .flush()
            .await
            .map_err(|error| self.handshake_error(error.to_string()))
    }

    async fn read_response(&mut self, id: u64) -> Result<JsonValue, HubError> {
        let mut line = String::new();
        loop {
            line.clear();
            let read = self
                .reader
                .read_line(&mut line)
                .await
                .map_err(|error| self.handshake_error(error.to_string()))?;
            if read == 0 {
                return Err(
                    self.handshake_error("server closed stdout before completing the handshake")
                );
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            // Log noise and notifications are skipped until our response id
            // shows up.
            let Ok(frame) = serde_json::from_str::<JsonValue>(trimmed) else {
                continue;
            };
            if frame.get("id").and_then(JsonValue::as_u64) != Some(id) {
                continue;
            }
            if let Some(error) = frame.get("error") {
                return Err(self.handshake_error(error.to_string()));
            }
            return Ok(frame.get("result").cloned().unwrap_or(JsonValue::Null));
        }
    }

    fn handshake_error(&self, reason: impl Into<String>) -> HubError {
        HubError::Handshake {
            name: self.name.clone(),
            reason: reason.into(),
        }
    }
}

/// Verifies every definition concurrently, one task and one short-lived
/// subprocess each. Returns exactly one terminal status per input key.
/// `timeout_seconds = None` waits indefinitely for handshake completion or
/// process exit. Statuses are only reported, never applied to inclusion
/// flags; the caller decides what a failure means.
pub async fn verify(
    servers: &[ServerDefinition],
    timeout_seconds: Option<u64>,
) -> BTreeMap<String, VerificationStatus> {
    let mut handles = Vec::with_capacity(servers.len());
    for definition in servers {
        let definition = definition.clone();
        handles.push((
            definition.result_key(),
            tokio::spawn(async move { verify_one(&definition, timeout_seconds).await }),
        ));
    }

    let mut results = BTreeMap::new();
    for (key, handle) in handles {
        let status = handle.await.unwrap_or(VerificationStatus::Failed);
        debug!(server = %key, status = status.as_str(), "verification resolved");
        results.insert(key, status);
    }
    results
}

async fn verify_one(
    definition: &ServerDefinition,
    timeout_seconds: Option<u64>,
) -> VerificationStatus {
    let mut process = match ServerProcess::spawn(definition) {
        Ok(process) => process,
        Err(error) => {
            debug!(server = %definition.result_key(), %error, "spawn failed");
            return VerificationStatus::Failed;
        }
    };

    let status = match timeout_seconds {
        Some(seconds) => {
            let deadline = Duration::from_secs(seconds);
            match tokio::time::timeout(deadline, process.handshake()).await {
                Ok(Ok(())) => VerificationStatus::Success,
                Ok(Err(error)) => {
                    debug!(server = %definition.result_key(), %error, "handshake failed");
                    VerificationStatus::Failed
                }
                Err(_) => VerificationStatus::Timeout,
            }
        }
        None => match process.handshake().await {
            Ok(()) => VerificationStatus::Success,
            Err(error) => {
                debug!(server = %definition.result_key(), %error, "handshake failed");
                VerificationStatus::Failed
            }
        },
    };

    process.shutdown().await;
    status
}
