use super::{FirmwareInfo, JobFile, Temperatures};
use serde::{Deserialize, Serialize};

/// Printer state as reported to front-ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No printer has answered the identify probe yet
    Discovering,
    /// A cancel request is pending
    Cancelling,
    Paused,
    Printing,
    /// Connected and idle
    Operational,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Discovering => write!(f, "Discovering printer"),
            Self::Cancelling => write!(f, "Cancelling"),
            Self::Paused => write!(f, "Paused"),
            Self::Printing => write!(f, "Printing"),
            Self::Operational => write!(f, "Operational"),
        }
    }
}

/// Print driver phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PrintPhase {
    #[default]
    Idle,
    Printing,
    Paused,
}

/// Progress and request flags of the print job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrintJobState {
    /// File selected for printing, if any
    pub file: Option<JobFile>,
    pub phase: PrintPhase,
    pub start_requested: bool,
    pub restart_requested: bool,
    pub cancel_requested: bool,
    /// Bytes of the file consumed so far, clamped to the file size
    pub file_pos: u64,
    /// Lines read from the file so far
    pub lines_read: u64,
    /// Percentage of the file consumed
    pub completion: f32,
    /// Loop clock value when the print started
    pub started_at_ms: u64,
    /// Seconds elapsed since the print started
    pub print_time_secs: u64,
}

impl PrintJobState {
    pub fn is_printing(&self) -> bool {
        self.phase != PrintPhase::Idle
    }

    pub fn is_paused(&self) -> bool {
        self.phase == PrintPhase::Paused
    }

    /// Pause or resume; ignored while idle
    pub fn set_paused(&mut self, paused: bool) {
        self.phase = match (self.phase, paused) {
            (PrintPhase::Idle, _) => PrintPhase::Idle,
            (_, true) => PrintPhase::Paused,
            (_, false) => PrintPhase::Printing,
        };
    }

    pub fn toggle_pause(&mut self) {
        let paused = self.is_paused();
        self.set_paused(!paused);
    }

    /// Display name of the selected file
    pub fn file_name(&self) -> &str {
        self.file.as_ref().map_or("Unknown", |f| f.name.as_str())
    }

    /// Linear estimate of the remaining print time in seconds
    pub fn remaining_secs(&self) -> u64 {
        if self.completion > 0.0 {
            (self.print_time_secs as f64 / self.completion as f64
                * (100.0 - self.completion as f64)) as u64
        } else {
            0
        }
    }
}

/// Process-wide state of one printer session
///
/// Mutated only by the core loop.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// Set once firmware detection succeeds
    pub printer_connected: bool,
    pub firmware: FirmwareInfo,
    /// Printer confirmed `M155 S<n>` with n != 0
    pub autoreport_enabled: bool,
    pub temperatures: Temperatures,
    pub last_command_sent: String,
    /// Last complete response, including multi-line continuations
    pub last_received_response: String,
    /// Baud rate the serial link is currently open at
    pub baud_rate: Option<u32>,
    /// Loop clock value at which the next `M105` poll is due
    pub temperature_deadline_ms: u64,
    pub job: PrintJobState,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Front-end visible state, in priority order
    pub fn connection_state(&self) -> ConnectionState {
        if !self.printer_connected {
            ConnectionState::Discovering
        } else if self.job.cancel_requested {
            ConnectionState::Cancelling
        } else if self.job.is_paused() {
            ConnectionState::Paused
        } else if self.job.is_printing() {
            ConnectionState::Printing
        } else {
            ConnectionState::Operational
        }
    }
}
