//! # printbridge Core
//!
//! Core types shared by every printbridge crate: the error hierarchy, the
//! process-wide session record the core loop mutates, the read-only status
//! snapshot handed to network front-ends, and the event dispatcher used to
//! mirror serial traffic to observers.

pub mod data;
pub mod error;
pub mod event;

pub use data::{
    file_id, ConnectionState, FirmwareInfo, JobFile, PrintJobState, PrintPhase, SessionState,
    PrintingTime, StatusSnapshot, Temperature, TemperatureSnapshot, Temperatures,
    UploadedFileSnapshot, MAX_SUPPORTED_EXTRUDERS,
};

pub use error::{ConnectionError, Error, JobError, QueueError, Result, StorageError};

pub use event::{BridgeEvent, EventDispatcher, ResponseKind};
