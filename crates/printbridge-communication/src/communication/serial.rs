//! Serial link to the printer
//!
//! The transport driver only needs a line writer and a non-blocking byte
//! reader that can be reopened at a different baud rate. [`SerialLink`] is
//! that seam; [`RealSerialPort`] implements it on top of the `serialport`
//! crate and tests implement it with a scripted printer.

use printbridge_core::ConnectionError;
use std::io::{self, Read, Write};
use std::time::Duration;

/// Byte-level access to the printer UART
pub trait SerialLink: Send {
    /// (Re)open the link at the given baud rate, closing any previous session
    fn open(&mut self, baud_rate: u32) -> Result<(), ConnectionError>;

    /// Write one command followed by a newline
    fn write_line(&mut self, line: &str) -> Result<(), ConnectionError>;

    /// Append every byte that is already available to `buf` without blocking
    ///
    /// Returns the number of bytes appended.
    fn read_available(&mut self, buf: &mut Vec<u8>) -> Result<usize, ConnectionError>;

    /// Baud rate of the open session, if any
    fn baud_rate(&self) -> Option<u32>;

    /// Device name used in log messages
    fn name(&self) -> &str;
}

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct SerialPortInfo {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    pub port_name: String,

    /// Port description (e.g., "USB Serial Port")
    pub description: String,
}

/// List serial ports a printer could be attached to
pub fn list_ports() -> Result<Vec<SerialPortInfo>, ConnectionError> {
    let ports = serialport::available_ports().map_err(|e| {
        tracing::error!("Failed to enumerate serial ports: {}", e);
        ConnectionError::SerialError {
            reason: format!("Failed to enumerate ports: {}", e),
        }
    })?;

    Ok(ports
        .iter()
        .map(|port| SerialPortInfo {
            port_name: port.port_name.clone(),
            description: get_port_description(port),
        })
        .collect())
}

/// Get a user-friendly description for a port
fn get_port_description(port: &serialport::SerialPortInfo) -> String {
    match &port.port_type {
        serialport::SerialPortType::UsbPort(usb_info) => {
            format!(
                "USB {} {}",
                usb_info.manufacturer.as_deref().unwrap_or("Device"),
                usb_info.product.as_deref().unwrap_or("Serial Port")
            )
        }
        serialport::SerialPortType::BluetoothPort => "Bluetooth Serial".to_string(),
        serialport::SerialPortType::PciPort => "PCI Serial".to_string(),
        _ => "Serial Port".to_string(),
    }
}

/// Real serial port implementation using serialport crate
pub struct RealSerialPort {
    port_name: String,
    baud_rate: Option<u32>,
    port: Option<Box<dyn serialport::SerialPort>>,
}

impl RealSerialPort {
    /// Create a closed link for the given device path
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate: None,
            port: None,
        }
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn serialport::SerialPort>, ConnectionError> {
        let name = &self.port_name;
        self.port.as_mut().ok_or_else(|| ConnectionError::NotOpen { port: name.clone() })
    }
}

impl SerialLink for RealSerialPort {
    fn open(&mut self, baud_rate: u32) -> Result<(), ConnectionError> {
        if baud_rate == 0 {
            return Err(ConnectionError::UnsupportedBaudRate { baud: baud_rate });
        }

        // Release the device before reopening it at the new rate
        self.port = None;
        self.baud_rate = None;

        let port = serialport::new(&self.port_name, baud_rate)
            .timeout(Duration::from_millis(10)) // Short timeout for non-blocking reads
            .open()
            .map_err(|e| {
                tracing::warn!("Failed to open serial port {}: {}", self.port_name, e);
                ConnectionError::FailedToOpen {
                    port: self.port_name.clone(),
                    reason: e.to_string(),
                }
            })?;

        self.port = Some(port);
        self.baud_rate = Some(baud_rate);
        Ok(())
    }

    fn write_line(&mut self, line: &str) -> Result<(), ConnectionError> {
        let port = self.port_mut()?;
        let mut frame = Vec::with_capacity(line.len() + 1);
        frame.extend_from_slice(line.as_bytes());
        frame.push(b'\n');

        port.write_all(&frame)
            .and_then(|_| port.flush())
            .map_err(|e| ConnectionError::SerialError {
                reason: e.to_string(),
            })
    }

    fn read_available(&mut self, buf: &mut Vec<u8>) -> Result<usize, ConnectionError> {
        let port = self.port_mut()?;
        let pending = port.bytes_to_read().map_err(|e| ConnectionError::SerialError {
            reason: e.to_string(),
        })? as usize;
        if pending == 0 {
            return Ok(0);
        }

        let mut chunk = vec![0u8; pending];
        match port.read(&mut chunk) {
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                Ok(n)
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(ConnectionError::SerialError {
                reason: e.to_string(),
            }),
        }
    }

    fn baud_rate(&self) -> Option<u32> {
        self.baud_rate
    }

    fn name(&self) -> &str {
        &self.port_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unopened_port_rejects_io() {
        let mut port = RealSerialPort::new("/dev/does-not-exist");
        assert_eq!(port.baud_rate(), None);
        assert!(matches!(
            port.write_line("M105"),
            Err(ConnectionError::NotOpen { .. })
        ));
        let mut buf = Vec::new();
        assert!(port.read_available(&mut buf).is_err());
    }

    #[test]
    fn test_zero_baud_rejected() {
        let mut port = RealSerialPort::new("/dev/does-not-exist");
        assert!(matches!(
            port.open(0),
            Err(ConnectionError::UnsupportedBaudRate { baud: 0 })
        ));
    }
}
