//! Optional TOML configuration for the terminal app.
//!
//! ```toml
//! log_level = "debug"
//! catalog = "lessons.json"
//!
//! [session]
//! starting_hearts = 3
//! default_passing_score = 80
//! ```

use std::path::{Path, PathBuf};

use lesson_core::model::{LessonSettings, LessonSettingsDraft, SettingsError};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid [session] settings: {0}")]
    Settings(#[from] SettingsError),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub log_level: Option<String>,
    pub catalog: Option<PathBuf>,
    pub session: LessonSettingsDraft,
}

impl AppConfig {
    /// Load the config at `path`. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_toml(&raw),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed TOML or unknown keys.
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// # Errors
    ///
    /// Returns `ConfigError::Settings` if a session value is out of range.
    pub fn lesson_settings(&self) -> Result<LessonSettings, ConfigError> {
        Ok(self.session.clone().validate()?)
    }
}
