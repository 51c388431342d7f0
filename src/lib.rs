//! # printbridge
//!
//! A network-to-serial bridge for Marlin-like 3D printers. G-code arriving
//! from a network front-end or the telnet console is queued, paced against
//! the printer's `ok` acknowledgments and written to the serial port, while
//! a print driver streams the selected file through the same queue.
//!
//! ## Architecture
//!
//! printbridge is organized as a workspace with multiple crates:
//!
//! 1. **printbridge-core** - Errors, session state, status snapshot, events
//! 2. **printbridge-communication** - Command queue, serial transport, firmware detection, Marlin parsing
//! 3. **printbridge-settings** - Configuration file handling
//! 4. **printbridge-job** - Print driver, G-code file store, job commands
//! 5. **printbridge** - The core loop, front-end handle, telnet console and binary

pub mod bridge;
pub mod handle;
pub mod telnet;

pub use bridge::Bridge;
pub use handle::{spawn, BridgeHandle, Request, LOOP_PERIOD};

pub use printbridge_communication::{
    list_ports, JogDirection, RealSerialPort, ScriptedPrinter, SerialLink, SerialPortInfo,
};
pub use printbridge_core::{
    BridgeEvent, ConnectionState, Error, EventDispatcher, JobError, JobFile, QueueError, Result,
    StatusSnapshot, StorageError,
};
pub use printbridge_job::{FileEntry, FileListing, JobCommand, PauseAction, Upload};
pub use printbridge_settings::{Config, LoggingSettings};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Target triple the binary was built for
pub const BUILD_TARGET: &str = env!("BUILD_TARGET");

/// Initialize logging
///
/// Sets up structured logging with:
/// - Console output
/// - RUST_LOG environment variable support, falling back to the configured level
/// - An optional log file without ANSI colours
pub fn init_logging(settings: &LoggingSettings) -> anyhow::Result<()> {
    use anyhow::Context;
    use std::fs::OpenOptions;
    use std::sync::Mutex;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .with_context(|| format!("invalid log filter '{}'", settings.level))?;

    let console_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_level(true)
        .with_line_number(true);

    let file_layer = match &settings.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(true)
                    .with_thread_ids(true),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    Ok(())
}
