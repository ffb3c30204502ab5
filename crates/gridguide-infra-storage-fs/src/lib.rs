use gridguide_ports::storage::{Settings, StorageError, StoragePort};
use std::path::{Path, PathBuf};
use std::{fs, io};
use tracing::debug;

const APP_DIR: &str = "gridguide";
const SETTINGS_FILE: &str = "settings.json";

fn io_error(err: io::Error) -> StorageError {
    StorageError::Io(err.to_string())
}

fn serde_error(err: serde_json::Error) -> StorageError {
    StorageError::Serde(err.to_string())
}

/// Settings kept as one pretty printed JSON file.
pub struct FsStorage {
    settings_path: PathBuf,
}

impl FsStorage {
    /// `settings.json` inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::from_file(dir.as_ref().join(SETTINGS_FILE))
    }

    /// Exactly `path`, as passed with `--config`.
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            settings_path: path.into(),
        }
    }

    /// `<config dir>/gridguide/settings.json`.
    pub fn user_config() -> Result<Self, StorageError> {
        let config_dir = dirs_next::config_dir()
            .ok_or_else(|| StorageError::Io("no config directory on this platform".to_string()))?;
        Ok(Self::in_dir(config_dir.join(APP_DIR)))
    }

    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }
}

impl StoragePort for FsStorage {
    fn load_settings(&self) -> Result<Settings, StorageError> {
        match fs::read(&self.settings_path) {
            Ok(data) => serde_json::from_slice(&data).map_err(serde_error),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.settings_path.display(), "no settings file, using defaults");
                Ok(Settings::default())
            }
            Err(err) => Err(io_error(err)),
        }
    }

    fn save_settings(&self, settings: &Settings) -> Result<(), StorageError> {
        if let Some(dir) = self.settings_path.parent() {
            fs::create_dir_all(dir).map_err(io_error)?;
        }
        let mut data = serde_json::to_vec_pretty(settings).map_err(serde_error)?;
        data.push(b'\n');
        fs::write(&self.settings_path, data).map_err(io_error)
    }
}
