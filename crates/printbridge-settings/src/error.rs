//! Settings errors
//!
//! File errors carry the path they refer to.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    /// Reading the config file failed
    #[error("Cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Writing the config file, or creating its directory, failed
    #[error("Cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A value fails validation
    #[error("Invalid setting '{key}': {reason}")]
    InvalidSetting { key: String, reason: String },

    /// The platform has no per-user configuration directory
    #[error("No configuration directory on this platform")]
    NoConfigDir,

    /// Only `.toml` and `.json` are understood
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    #[error("Bad JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Bad TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Cannot encode TOML config: {0}")]
    TomlEncode(#[from] toml::ser::Error),
}

impl SettingsError {
    pub(crate) fn invalid(key: &str, reason: impl Into<String>) -> Self {
        SettingsError::InvalidSetting {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

pub type SettingsResult<T> = Result<T, SettingsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_file_and_key() {
        let err = SettingsError::Read {
            path: PathBuf::from("/etc/printbridge.toml"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.to_string(), "Cannot read /etc/printbridge.toml: denied");

        let err = SettingsError::invalid("serial.bauds", "must not be empty");
        assert_eq!(
            err.to_string(),
            "Invalid setting 'serial.bauds': must not be empty"
        );
    }
}
