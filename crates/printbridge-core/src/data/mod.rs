//! Session data model
//!
//! The core loop owns exactly one [`SessionState`]. Everything outside the
//! loop sees it only through [`StatusSnapshot`] copies.

mod file;
mod firmware;
mod session;
mod snapshot;
mod temperature;

pub use file::{file_id, JobFile};
pub use firmware::FirmwareInfo;
pub use session::{ConnectionState, PrintJobState, PrintPhase, SessionState};
pub use snapshot::{PrintingTime, StatusSnapshot, TemperatureSnapshot, UploadedFileSnapshot};
pub use temperature::{Temperature, Temperatures, MAX_SUPPORTED_EXTRUDERS};
