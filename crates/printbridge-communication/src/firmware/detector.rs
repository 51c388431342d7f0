//! Firmware detection
//!
//! Sweeps the configured baud rates, sending `M115` at each one until the
//! answer carries a `MACHINE_TYPE`. Each baud gets `identify_retries + 1`
//! probes. After the last baud the sweep starts over; detection never gives
//! up.

use crate::communication::TransportDriver;
use crate::firmware::marlin::commands::{lcd, AUTOREPORT_ENABLE, BEEP, IDENTIFY};
use crate::firmware::marlin::response_parser::parse_firmware_info;
use printbridge_core::{BridgeEvent, FirmwareInfo, SessionState};

/// Baud rates tried in order
pub const DEFAULT_BAUD_RATES: [u32; 5] = [115200, 57600, 250000, 500000, 921600];

/// Extra `M115` probes per baud rate after the first
pub const DEFAULT_IDENTIFY_RETRIES: u32 = 4;

/// Wait after a failed open before trying the next baud rate
const REOPEN_DELAY_MS: u64 = 1000;

/// Detection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionState {
    /// Sweep not started; the next step selects the first baud rate
    Idle,
    /// Open the link if this is the first probe at this baud, then probe
    Connecting,
    /// Wait for the probe to be sent and acknowledged
    AwaitingResponse,
    /// A printer identified itself
    Connected,
}

/// Baud-sweeping `M115` prober
#[derive(Debug, Clone)]
pub struct FirmwareDetector {
    state: DetectionState,
    bauds: Vec<u32>,
    identify_retries: u32,
    baud_index: usize,
    /// Failed probes at the current baud rate
    attempts: u32,
    /// Loop clock before which `Connecting` does nothing
    resume_at_ms: u64,
}

impl Default for FirmwareDetector {
    fn default() -> Self {
        Self::new(DEFAULT_BAUD_RATES.to_vec(), DEFAULT_IDENTIFY_RETRIES)
    }
}

impl FirmwareDetector {
    /// Create a detector; an empty baud list falls back to the defaults
    pub fn new(bauds: Vec<u32>, identify_retries: u32) -> Self {
        let bauds = if bauds.is_empty() {
            DEFAULT_BAUD_RATES.to_vec()
        } else {
            bauds
        };

        Self {
            state: DetectionState::Idle,
            bauds,
            identify_retries,
            baud_index: 0,
            attempts: 0,
            resume_at_ms: 0,
        }
    }

    pub fn state(&self) -> DetectionState {
        self.state
    }

    /// Baud rate currently being probed
    pub fn current_baud(&self) -> u32 {
        self.bauds[self.baud_index.min(self.bauds.len() - 1)]
    }

    pub fn is_connected(&self) -> bool {
        self.state == DetectionState::Connected
    }

    /// Advance the state machine by one step
    ///
    /// Returns the capability record on the step that detects a printer.
    /// On success the session is marked connected and the greeting, beep and
    /// temperature reporting setup are queued.
    pub fn step(
        &mut self,
        driver: &mut TransportDriver,
        session: &mut SessionState,
        now_ms: u64,
    ) -> Option<FirmwareInfo> {
        match self.state {
            DetectionState::Idle => {
                tracing::info!("Starting printer detection on {}", driver.port_name());
                driver.events().notice("Starting printer detection...");
                self.baud_index = 0;
                self.attempts = 0;
                self.state = DetectionState::Connecting;
                None
            }
            DetectionState::Connecting => {
                self.connect(driver, session, now_ms);
                None
            }
            DetectionState::AwaitingResponse => self.check_response(driver, session, now_ms),
            DetectionState::Connected => None,
        }
    }

    fn connect(&mut self, driver: &mut TransportDriver, session: &mut SessionState, now_ms: u64) {
        if now_ms < self.resume_at_ms {
            return;
        }

        if self.attempts == 0 {
            let baud = self.current_baud();
            tracing::info!("Connecting at {}", baud);
            driver.events().notice(format!("Connecting at {}", baud));

            if let Err(e) = driver.reopen(baud) {
                tracing::warn!("Cannot open {} at {}: {}", driver.port_name(), baud, e);
                session.baud_rate = None;
                self.resume_at_ms = now_ms + REOPEN_DELAY_MS;
                self.next_baud();
                return;
            }
            session.baud_rate = Some(baud);
        }

        if driver.push(IDENTIFY).is_ok() {
            self.state = DetectionState::AwaitingResponse;
        }
    }

    fn check_response(
        &mut self,
        driver: &mut TransportDriver,
        session: &mut SessionState,
        now_ms: u64,
    ) -> Option<FirmwareInfo> {
        if !driver.queue().is_empty() {
            return None;
        }

        let Some(info) = parse_firmware_info(&session.last_received_response) else {
            tracing::debug!(
                "No MACHINE_TYPE at {} (attempt {})",
                self.current_baud(),
                self.attempts + 1
            );
            if self.attempts >= self.identify_retries {
                self.next_baud();
            } else {
                self.attempts += 1;
                self.state = DetectionState::Connecting;
            }
            return None;
        };

        tracing::info!(
            "Connected to {} at {} ({} extruder(s), autoreport={}, progress={}, build_percent={})",
            info.machine_type,
            self.current_baud(),
            info.extruders,
            info.autoreport_temp,
            info.progress,
            info.build_percent
        );
        driver.events().notice("Connected");
        driver.events().publish(BridgeEvent::Connected(info.clone()));

        session.firmware = info.clone();
        session.printer_connected = true;
        self.state = DetectionState::Connected;

        let _ = driver.push(lcd(&info.machine_type));
        let _ = driver.push(BEEP);
        if info.autoreport_temp {
            let _ = driver.push(AUTOREPORT_ENABLE);
        } else {
            session.temperature_deadline_ms = now_ms;
        }

        Some(info)
    }

    /// Move to the next baud rate, restarting the sweep after the last one
    fn next_baud(&mut self) {
        self.attempts = 0;
        self.baud_index += 1;
        self.state = if self.baud_index < self.bauds.len() {
            DetectionState::Connecting
        } else {
            DetectionState::Idle
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_baud_list_uses_defaults() {
        let detector = FirmwareDetector::new(Vec::new(), 4);
        assert_eq!(detector.current_baud(), 115200);
        assert_eq!(detector.state(), DetectionState::Idle);
    }

    #[test]
    fn test_next_baud_wraps_to_idle() {
        let mut detector = FirmwareDetector::new(vec![115200, 250000], 0);
        detector.next_baud();
        assert_eq!(detector.state(), DetectionState::Connecting);
        assert_eq!(detector.current_baud(), 250000);
        detector.next_baud();
        assert_eq!(detector.state(), DetectionState::Idle);
    }
}
