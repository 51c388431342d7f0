//! Printer link: command queue, serial port and transport driver

pub mod driver;
pub mod mock;
pub mod queue;
pub mod serial;

pub use driver::{ResponseLine, TransportConfig, TransportDriver, DEFAULT_KEEPALIVE_MS};
pub use mock::ScriptedPrinter;
pub use queue::{CommandQueue, DEFAULT_QUEUE_CAPACITY};
pub use serial::{list_ports, RealSerialPort, SerialLink, SerialPortInfo};
