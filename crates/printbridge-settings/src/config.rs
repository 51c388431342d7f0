//! Configuration for printbridge
//!
//! Provides configuration file handling, defaults and validation.
//! Supports JSON and TOML file formats; every section and field may be
//! omitted, in which case the default applies.
//!
//! Configuration is organized into logical sections:
//! - Serial link (port, baud sweep, flow control, keepalive)
//! - Printer behaviour (queue size, print headroom, polling, shutdown)
//! - G-code file storage
//! - Telnet console
//! - Logging

use crate::error::{SettingsError, SettingsResult};
use printbridge_communication::firmware::marlin::commands::DEFAULT_SHUTDOWN_SEQUENCE;
use printbridge_communication::{
    TransportConfig, DEFAULT_BAUD_RATES, DEFAULT_IDENTIFY_RETRIES, DEFAULT_KEEPALIVE_MS,
    DEFAULT_QUEUE_CAPACITY,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Serial link settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    /// Device path (e.g. "/dev/ttyUSB0", "COM3")
    pub port: String,
    /// Baud rates probed in order during detection
    pub bauds: Vec<u32>,
    /// Extra identify probes per baud rate after the first
    pub identify_retries: u32,
    /// Printer receive buffer estimate in bytes; 0 sends one command at a time
    pub rx_buffer_size: usize,
    /// Milliseconds without a response before an in-flight command is dropped
    pub keepalive_ms: u64,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: if cfg!(windows) {
                "COM3".to_string()
            } else {
                "/dev/ttyUSB0".to_string()
            },
            bauds: DEFAULT_BAUD_RATES.to_vec(),
            identify_retries: DEFAULT_IDENTIFY_RETRIES,
            rx_buffer_size: 0,
            keepalive_ms: DEFAULT_KEEPALIVE_MS,
        }
    }
}

/// Printer behaviour settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrinterSettings {
    /// Command queue slots, one of which is always kept free
    pub queue_capacity: usize,
    /// Free slots the print driver leaves for user and status commands
    pub print_headroom: usize,
    /// Seconds between `M105` polls when auto-reporting is off
    pub temperature_interval_secs: u64,
    /// Commands queued after a print is cancelled
    pub shutdown_sequence: Vec<String>,
}

impl Default for PrinterSettings {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            print_headroom: 4,
            temperature_interval_secs: 2,
            shutdown_sequence: DEFAULT_SHUTDOWN_SEQUENCE
                .iter()
                .map(|command| command.to_string())
                .collect(),
        }
    }
}

/// G-code file storage settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory holding uploaded files
    pub root: PathBuf,
    /// File inside `root` remembering the selected file across restarts
    pub marker_file: String,
    /// Entries returned per listing page
    pub max_files_per_list: usize,
    /// Longest accepted file name; longer uploads are renamed
    pub max_path_length: usize,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            root: dirs::data_dir()
                .map(|dir| dir.join("printbridge").join("gcodes"))
                .unwrap_or_else(|| PathBuf::from("gcodes")),
            marker_file: "uploaded.txt".to_string(),
            max_files_per_list: 10,
            max_path_length: 31,
        }
    }
}

/// Telnet console settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelnetSettings {
    pub enabled: bool,
    /// Listen address
    pub bind: String,
}

impl Default for TelnetSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: "0.0.0.0:23".to_string(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter used when `RUST_LOG` is not set
    pub level: String,
    /// Also append logs to this file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Complete bridge configuration
///
/// Aggregates all settings sections and provides file I/O operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub serial: SerialSettings,
    pub printer: PrinterSettings,
    pub storage: StorageSettings,
    pub telnet: TelnetSettings,
    pub logging: LoggingSettings,
}

enum Format {
    Json,
    Toml,
}

fn format_of(path: &Path) -> SettingsResult<Format> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(Format::Json),
        Some("toml") => Ok(Format::Toml),
        other => Err(SettingsError::UnsupportedFormat(
            other.unwrap_or("none").to_string(),
        )),
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Platform config location, e.g. `~/.config/printbridge/config.toml`
    pub fn default_path() -> SettingsResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("printbridge").join("config.toml"))
            .ok_or(SettingsError::NoConfigDir)
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = format_of(path)?;
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = match format {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load config from file, or use defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> SettingsResult<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match format_of(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        let write_error = |source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_error)?;
        }
        std::fs::write(path, content).map_err(write_error)?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> SettingsResult<()> {
        if self.serial.port.is_empty() {
            return Err(SettingsError::invalid("serial.port", "must not be empty"));
        }

        if self.serial.bauds.is_empty() {
            return Err(SettingsError::invalid("serial.bauds", "must not be empty"));
        }

        if self.serial.bauds.contains(&0) {
            return Err(SettingsError::invalid("serial.bauds", "baud rates must be > 0"));
        }

        if self.serial.keepalive_ms == 0 {
            return Err(SettingsError::invalid("serial.keepalive_ms", "must be > 0"));
        }

        if self.printer.queue_capacity < 2 {
            return Err(SettingsError::invalid("printer.queue_capacity", "must be >= 2"));
        }

        if self.printer.print_headroom >= self.printer.queue_capacity - 1 {
            return Err(SettingsError::invalid(
                "printer.print_headroom",
                format!(
                    "must be below the usable queue size ({})",
                    self.printer.queue_capacity - 1
                ),
            ));
        }

        if self.printer.temperature_interval_secs == 0 {
            return Err(SettingsError::invalid(
                "printer.temperature_interval_secs",
                "must be > 0",
            ));
        }

        if self.printer.shutdown_sequence.iter().any(|c| c.trim().is_empty()) {
            return Err(SettingsError::invalid(
                "printer.shutdown_sequence",
                "commands must not be empty",
            ));
        }

        // Pushed into an empty queue after a cancel
        let usable_slots = self.printer.queue_capacity - 1;
        if self.printer.shutdown_sequence.len() > usable_slots {
            return Err(SettingsError::invalid(
                "printer.shutdown_sequence",
                format!(
                    "{} commands do not fit the usable queue size ({})",
                    self.printer.shutdown_sequence.len(),
                    usable_slots
                ),
            ));
        }

        if self.storage.marker_file.is_empty() {
            return Err(SettingsError::invalid("storage.marker_file", "must not be empty"));
        }

        if self.storage.max_files_per_list == 0 {
            return Err(SettingsError::invalid("storage.max_files_per_list", "must be > 0"));
        }

        if self.storage.max_path_length == 0 {
            return Err(SettingsError::invalid("storage.max_path_length", "must be > 0"));
        }

        Ok(())
    }

    /// Transport tuning derived from the serial section
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            rx_buffer_size: self.serial.rx_buffer_size,
            keepalive_ms: self.serial.keepalive_ms,
        }
    }
}
