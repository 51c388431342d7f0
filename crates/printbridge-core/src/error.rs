//! Error handling for printbridge
//!
//! Provides error types for all layers of the bridge:
//! - Queue errors (back-pressure from the command queue)
//! - Connection errors (serial link)
//! - Job errors (print job commands and file selection)
//! - Storage errors (G-code file store)
//!
//! Printer timeouts, printer-reported errors and malformed responses are not
//! errors here: the transport driver reports them as events and response
//! classifications, and the core loop keeps running.

use thiserror::Error;

/// Command queue error type
///
/// Returned by `CommandQueue::push` when a command cannot be stored.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// Empty commands are never queued
    #[error("Empty command rejected")]
    EmptyCommand,

    /// Every usable slot is occupied by a queued or in-flight command
    #[error("Command queue full ({capacity} slots)")]
    Full {
        /// Total slot count of the ring, one of which is always kept free.
        capacity: usize,
    },
}

/// Connection error type
///
/// Represents errors related to the serial link to the printer.
#[derive(Error, Debug, Clone)]
pub enum ConnectionError {
    /// Failed to open port
    #[error("Failed to open port {port}: {reason}")]
    FailedToOpen {
        /// The name of the port that failed to open.
        port: String,
        /// The reason the port failed to open.
        reason: String,
    },

    /// The link has not been opened at any baud rate yet
    #[error("Serial port {port} is not open")]
    NotOpen {
        /// The name of the port.
        port: String,
    },

    /// Serial port error
    #[error("Serial port error: {reason}")]
    SerialError {
        /// The reason for the serial port error.
        reason: String,
    },

    /// Baud rate not supported
    #[error("Baud rate {baud} not supported")]
    UnsupportedBaudRate {
        /// The unsupported baud rate.
        baud: u32,
    },
}

/// Print job error type
///
/// Represents rejected job commands and failures to start a print.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// The command is not valid in the current printer state (HTTP 409)
    #[error("Job command '{command}' conflicts with current state: {reason}")]
    Conflict {
        /// The rejected command.
        command: String,
        /// Why it was rejected.
        reason: String,
    },

    /// No file is selected for printing
    #[error("No file selected")]
    NoFileSelected,

    /// The selected file could not be opened
    #[error("Can't open {path}: {reason}")]
    FileOpen {
        /// Logical path of the file.
        path: String,
        /// The reason the file could not be opened.
        reason: String,
    },

    /// Unknown job command name
    #[error("Unknown job command: {0}")]
    UnknownCommand(String),
}

impl JobError {
    /// Build a conflict error for a job command
    pub fn conflict(command: impl Into<String>, reason: impl Into<String>) -> Self {
        JobError::Conflict {
            command: command.into(),
            reason: reason.into(),
        }
    }
}

/// Storage error type
#[derive(Error, Debug)]
pub enum StorageError {
    /// No file with that name or id
    #[error("File not found: {0}")]
    NotFound(String),

    /// The name cannot be used as a logical path
    #[error("Invalid file name: {0}")]
    InvalidName(String),

    /// Underlying filesystem failure
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Main error type for printbridge
///
/// A unified error type that can represent any error from all layers.
#[derive(Error, Debug)]
pub enum Error {
    /// Queue error
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Job error
    #[error(transparent)]
    Job(#[from] JobError),

    /// Storage error
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is queue back-pressure
    pub fn is_queue_full(&self) -> bool {
        matches!(self, Error::Queue(QueueError::Full { .. }))
    }

    /// Check if this is a job conflict (maps to HTTP 409 in front-ends)
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Job(JobError::Conflict { .. }))
    }

    /// Check if this is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
