//! printbridge Settings Crate
//!
//! Handles the bridge configuration file: sections, defaults, validation
//! and TOML/JSON persistence.

pub mod config;
pub mod error;

pub use config::{
    Config, LoggingSettings, PrinterSettings, SerialSettings, StorageSettings, TelnetSettings,
};
pub use error::{SettingsError, SettingsResult};
