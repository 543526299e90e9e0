use crate::error::HubError;
use directories::ProjectDirs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

/// Application-private runtime directory layout: the unified `config.json`
/// plus one `backups/<client>/` subdirectory per backed-up client.
#[derive(Debug, Clone)]
pub struct HubPaths {
    pub runtime_directory: PathBuf,
    pub config_path: PathBuf,
    pub backups_directory: PathBuf,
}

impl HubPaths {
    pub fn detect() -> Self {
        if let Ok(override_dir) = std::env::var("MCPHUB_RUNTIME_DIR") {
            if !override_dir.trim().is_empty() {
                let runtime = PathBuf::from(override_dir);
                return Self::from_runtime(runtime);
            }
        }

        #[cfg(target_os = "macos")]
        {
            if let Some(home) = home_dir() {
                let runtime = home
                    .join("Library")
                    .join("Application Support")
                    .join("McpHub");
                return Self::from_runtime(runtime);
            }
        }

        if let Some(project_dirs) = ProjectDirs::from("dev", "mcphub", "McpHub") {
            return Self::from_runtime(project_dirs.data_dir().to_path_buf());
        }

        if let Some(home) = home_dir() {
            return Self::from_runtime(home.join(".mcphub"));
        }

        Self::from_runtime(PathBuf::from(".mcphub"))
    }

    pub fn from_runtime(runtime_directory: PathBuf) -> Self {
        let config_path = runtime_directory.join("config.json");
        let backups_directory = runtime_directory.join("backups");
        Self {
            runtime_directory,
            config_path,
            backups_directory,
        }
    }

    pub fn ensure_runtime_dir(&self) -> Result<(), std::io::Error> {
        std::fs::create_dir_all(&self.runtime_directory)
    }
}

pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()))
}

/// Temp-file-then-rename in the destination directory, so readers never
/// observe a half-written file.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), HubError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(|error| HubError::write(&parent, error))?;
    let mut staged =
        tempfile::NamedTempFile::new_in(&parent).map_err(|error| HubError::write(path, error))?;
    staged
        .write_all(bytes)
        .map_err(|error| HubError::write(path, error))?;
    staged
        .persist(path)
        .map_err(|error| HubError::write(path, error.error))?;
    Ok(())
}
