use crate::clients::ClientRegistry;
use crate::error::HubError;
use crate::models::{BackupRecord, ClientId};
use crate::paths::{write_atomic, HubPaths};
use chrono::{DateTime, NaiveDateTime, Utc};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

const BACKUP_STAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Snapshots a client's live config before it gets rewritten and restores
/// from the most recent snapshot. Backups are never auto-deleted; a newer
/// one supersedes, it does not merge.
#[derive(Debug, Clone)]
pub struct BackupManager {
    registry: ClientRegistry,
    backups_directory: PathBuf,
}

impl BackupManager {
    pub fn new(registry: ClientRegistry, paths: &HubPaths) -> Self {
        Self {
            registry,
            backups_directory: paths.backups_directory.clone(),
        }
    }

    /// Stores a timestamped copy of the client's current config bytes.
    /// Returns `Ok(None)` when the client has no config to snapshot.
    /// A snapshot whose content digest equals the latest one is not
    /// duplicated.
    pub fn backup(&self, client: ClientId) -> Result<Option<BackupRecord>, HubError> {
        let Some(live_path) = self.registry.locate_config_path(client) else {
            return Ok(None);
        };
        let bytes = fs::read(&live_path).map_err(|error| HubError::io(&live_path, error))?;

        if let Some(latest) = self.latest_snapshot(client) {
            let existing = fs::read(&latest).map_err(|error| HubError::io(&latest, error))?;
            if content_digest(&existing) == content_digest(&bytes) {
                debug!(client = client.as_str(), "config unchanged since latest backup");
                return Ok(Some(self.record_for(client, latest)));
            }
        }

        let file_name = live_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("config");
        let stamp = Utc::now().format(BACKUP_STAMP_FORMAT);
        let directory = self.client_directory(client);
        // Two different snapshots within one second must not share a name;
        // an older backup is never overwritten.
        let mut backup_path = directory.join(format!("{file_name}.bak-{stamp}"));
        let mut attempt = 1;
        while backup_path.exists() {
            attempt += 1;
            backup_path = directory.join(format!("{file_name}.bak-{stamp}-{attempt}"));
        }
        write_atomic(&backup_path, &bytes)?;
        info!(
            client = client.as_str(),
            path = %backup_path.display(),
            "backed up client config"
        );
        Ok(Some(self.record_for(client, backup_path)))
    }

    /// Most recent backup per client; absent entries mean no backup exists.
    pub fn list_backups(&self) -> Vec<(ClientId, Option<BackupRecord>)> {
        ClientId::ALL
            .iter()
            .map(|client| {
                let record = self
                    .latest_snapshot(*client)
                    .map(|path| self.record_for(*client, path));
                (*client, record)
            })
            .collect()
    }

    /// Writes the most recent snapshot's bytes back over the live config.
    /// Returns the restored path.
    pub fn restore(&self, client: ClientId, dry_run: bool) -> Result<PathBuf, HubError> {
        let Some(snapshot) = self.latest_snapshot(client) else {
            return Err(HubError::NoBackup { client });
        };
        let target = self.registry.config_write_path(client);
        if dry_run {
            info!(
                client = client.as_str(),
                target = %target.display(),
                "dry run, restore not applied"
            );
            return Ok(target);
        }
        let bytes = fs::read(&snapshot).map_err(|error| HubError::io(&snapshot, error))?;
        write_atomic(&target, &bytes)?;
        info!(
            client = client.as_str(),
            from = %snapshot.display(),
            to = %target.display(),
            "restored client config from backup"
        );
        Ok(target)
    }

    fn client_directory(&self, client: ClientId) -> PathBuf {
        self.backups_directory.join(client.as_str())
    }

    fn latest_snapshot(&self, client: ClientId) -> Option<PathBuf> {
        let directory = self.client_directory(client);
        let entries = fs::read_dir(&directory).ok()?;
        // Stamp suffixes sort lexicographically by creation time.
        entries
            .filter_map(Result::ok)
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.contains(".bak-"))
            })
            .max_by_key(|entry| entry.file_name())
            .map(|entry| entry.path())
    }

    fn record_for(&self, client: ClientId, backup_path: PathBuf) -> BackupRecord {
        let has_backup = fs::metadata(&backup_path)
            .map(|meta| meta.is_file() && meta.len() > 0)
            .unwrap_or(false);
        BackupRecord {
            client,
            created_at: created_at_for(&backup_path),
            backup_path,
            has_backup,
        }
    }
}

fn created_at_for(backup_path: &std::path::Path) -> String {
    // The stamp is the first 15 chars of the suffix; a `-N` collision
    // counter may follow it.
    let stamp = backup_path
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.rsplit(".bak-").next())
        .map(|suffix| suffix.get(..15).unwrap_or(suffix))
        .and_then(|stamp| NaiveDateTime::parse_from_str(stamp, BACKUP_STAMP_FORMAT).ok());
    if let Some(stamp) = stamp {
        return stamp.and_utc().to_rfc3339();
    }
    fs::metadata(backup_path)
        .and_then(|meta| meta.modified())
        .map(|modified| DateTime::<Utc>::from(modified).to_rfc3339())
        .unwrap_or_default()
}

fn content_digest(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::BackupManager;
    use crate::clients::ClientRegistry;
    use crate::error::HubError;
    use crate::models::ClientId;
    use crate::paths::HubPaths;
    use tempfile::TempDir;

    fn manager_in(temp: &TempDir) -> BackupManager {
        let registry = ClientRegistry::new(temp.path().join("home"));
        let paths = HubPaths::from_runtime(temp.path().join("runtime"));
        BackupManager::new(registry.clone(), &paths)
    }

    fn seed_cursor(temp: &TempDir, raw: &str) -> std::path::PathBuf {
        let registry = ClientRegistry::new(temp.path().join("home"));
        let path = registry.config_write_path(ClientId::Cursor);
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(&path, raw).expect("seed");
        path
    }

    #[test]
    fn backup_then_mutate_then_restore_round_trips_bytes() {
        let temp = TempDir::new().expect("tempdir");
        let manager = manager_in(&temp);
        let original = r#"{"mcpServers": {"fs": {"command": "npx"}}}"#;
        let live_path = seed_cursor(&temp, original);

        let record = manager
            .backup(ClientId::Cursor)
            .expect("backup")
            .expect("record");
        assert!(record.has_backup);

        std::fs::write(&live_path, "{\"mcpServers\": {}}").expect("mutate");
        manager.restore(ClientId::Cursor, false).expect("restore");
        assert_eq!(
            std::fs::read_to_string(&live_path).expect("read"),
            original
        );
    }

    #[test]
    fn restore_without_backup_is_a_user_facing_error() {
        let temp = TempDir::new().expect("tempdir");
        let manager = manager_in(&temp);
        let error = manager
            .restore(ClientId::Windsurf, false)
            .expect_err("must fail");
        assert!(matches!(
            error,
            HubError::NoBackup {
                client: ClientId::Windsurf
            }
        ));
    }

    #[test]
    fn identical_content_does_not_duplicate_the_latest_snapshot() {
        let temp = TempDir::new().expect("tempdir");
        let manager = manager_in(&temp);
        seed_cursor(&temp, "{}");

        let first = manager
            .backup(ClientId::Cursor)
            .expect("backup")
            .expect("record");
        let second = manager
            .backup(ClientId::Cursor)
            .expect("backup")
            .expect("record");
        assert_eq!(first.backup_path, second.backup_path);
    }

    #[test]
    fn rapid_backups_of_different_content_keep_both_snapshots() {
        let temp = TempDir::new().expect("tempdir");
        let manager = manager_in(&temp);
        let live_path = seed_cursor(&temp, "original");

        let first = manager
            .backup(ClientId::Cursor)
            .expect("backup")
            .expect("record");
        std::fs::write(&live_path, "mutated").expect("mutate");
        let second = manager
            .backup(ClientId::Cursor)
            .expect("backup")
            .expect("record");

        assert_ne!(
            first.backup_path, second.backup_path,
            "a newer snapshot must never overwrite an older one"
        );
        assert_eq!(
            std::fs::read_to_string(&first.backup_path).expect("first"),
            "original"
        );
        assert_eq!(
            std::fs::read_to_string(&second.backup_path).expect("second"),
            "mutated"
        );
        // The newest snapshot still wins restore.
        manager.restore(ClientId::Cursor, false).expect("restore");
        assert_eq!(
            std::fs::read_to_string(&live_path).expect("live"),
            "mutated"
        );
    }

    #[test]
    fn backup_of_absent_config_is_none_not_an_error() {
        let temp = TempDir::new().expect("tempdir");
        let manager = manager_in(&temp);
        assert!(manager.backup(ClientId::Codex).expect("backup").is_none());
    }

    #[test]
    fn list_backups_reports_the_most_recent_per_client() {
        let temp = TempDir::new().expect("tempdir");
        let manager = manager_in(&temp);
        seed_cursor(&temp, "{}");
        manager.backup(ClientId::Cursor).expect("backup");

        let listed = manager.list_backups();
        let cursor = listed
            .iter()
            .find(|(client, _)| *client == ClientId::Cursor)
            .and_then(|(_, record)| record.as_ref())
            .expect("cursor record");
        assert!(cursor.has_backup);
        assert!(!cursor.created_at.is_empty());
        assert!(listed
            .iter()
            .filter(|(client, _)| *client != ClientId::Cursor)
            .all(|(_, record)| record.is_none()));
    }

    #[test]
    fn dry_run_restore_does_not_touch_the_live_config() {
        let temp = TempDir::new().expect("tempdir");
        let manager = manager_in(&temp);
        let live_path = seed_cursor(&temp, "original");
        manager.backup(ClientId::Cursor).expect("backup");
        std::fs::write(&live_path, "mutated").expect("mutate");

        manager.restore(ClientId::Cursor, true).expect("dry run");
        assert_eq!(std::fs::read_to_string(&live_path).expect("read"), "mutated");
    }
}
