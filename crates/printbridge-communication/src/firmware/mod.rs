//! Firmware support
//!
//! Marlin-compatible response parsing and command builders, plus the
//! detection state machine that finds the printer on the serial link.

pub mod detector;
pub mod marlin;

pub use detector::{
    DetectionState, FirmwareDetector, DEFAULT_BAUD_RATES, DEFAULT_IDENTIFY_RETRIES,
};
