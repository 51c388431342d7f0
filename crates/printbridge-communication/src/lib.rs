//! # printbridge Communication
//!
//! The serial side of the bridge: a bounded command queue with separate
//! send and acknowledge cursors, the transport driver that paces commands
//! against printer acknowledgments, Marlin response parsing, and the
//! firmware detection state machine.

pub mod communication;
pub mod firmware;

pub use communication::{
    list_ports, CommandQueue, RealSerialPort, ResponseLine, ScriptedPrinter, SerialLink,
    SerialPortInfo, TransportConfig, TransportDriver, DEFAULT_KEEPALIVE_MS,
    DEFAULT_QUEUE_CAPACITY,
};

pub use firmware::{
    marlin::JogDirection, DetectionState, FirmwareDetector, DEFAULT_BAUD_RATES,
    DEFAULT_IDENTIFY_RETRIES,
};
