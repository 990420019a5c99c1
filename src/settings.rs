use std::error::Error;
use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::db::DEFAULT_STORE_LIMIT_BYTES;
use crate::domain::memo::DEFAULT_FOLDER_NAME;
use crate::storage::DEFAULT_CHUNK_CEILING_BYTES;

/// Engine limits, read from an optional TOML file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub chunk_ceiling_bytes: usize,
    pub store_limit_bytes: usize,
    pub default_folder: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chunk_ceiling_bytes: DEFAULT_CHUNK_CEILING_BYTES,
            store_limit_bytes: DEFAULT_STORE_LIMIT_BYTES,
            default_folder: DEFAULT_FOLDER_NAME.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSettings {
    chunk_ceiling_bytes: Option<usize>,
    store_limit_bytes: Option<usize>,
    default_folder: Option<String>,
}

#[derive(Debug)]
pub enum SettingsError {
    Io(std::io::Error),
    Toml(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::Io(err) => write!(f, "unable to read settings: {}", err),
            SettingsError::Toml(err) => write!(f, "invalid settings TOML: {}", err),
            SettingsError::Invalid(message) => write!(f, "invalid settings: {}", message),
        }
    }
}

impl Error for SettingsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SettingsError::Io(err) => Some(err),
            SettingsError::Toml(err) => Some(err),
            SettingsError::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for SettingsError {
    fn from(value: std::io::Error) -> Self {
        SettingsError::Io(value)
    }
}

impl From<toml::de::Error> for SettingsError {
    fn from(value: toml::de::Error) -> Self {
        SettingsError::Toml(value)
    }
}

impl Settings {
    /// A missing file means defaults; a present but malformed one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let Some(path) = path else {
            return Ok(Settings::default());
        };
        match std::fs::read_to_string(path) {
            Ok(raw) => Settings::from_toml(&raw),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "settings file not found; using defaults");
                Ok(Settings::default())
            }
            Err(err) => Err(err.into()),
        }
    }

    pub(crate) fn from_toml(raw: &str) -> Result<Self, SettingsError> {
        let file: RawSettings = toml::from_str(raw)?;
        let defaults = Settings::default();
        let settings = Settings {
            chunk_ceiling_bytes: file
                .chunk_ceiling_bytes
                .unwrap_or(defaults.chunk_ceiling_bytes),
            store_limit_bytes: file.store_limit_bytes.unwrap_or(defaults.store_limit_bytes),
            default_folder: file
                .default_folder
                .map(|name| name.trim().to_string())
                .unwrap_or(defaults.default_folder),
        };

        if settings.default_folder.is_empty() {
            return Err(SettingsError::Invalid(
                "default_folder must not be empty".to_string(),
            ));
        }
        if settings.chunk_ceiling_bytes == 0 {
            return Err(SettingsError::Invalid(
                "chunk_ceiling_bytes must be positive".to_string(),
            ));
        }
        if settings.chunk_ceiling_bytes > settings.store_limit_bytes {
            return Err(SettingsError::Invalid(format!(
                "chunk_ceiling_bytes ({}) exceeds store_limit_bytes ({})",
                settings.chunk_ceiling_bytes, settings.store_limit_bytes
            )));
        }
        Ok(settings)
    }
}
