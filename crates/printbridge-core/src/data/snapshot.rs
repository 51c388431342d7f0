use super::{ConnectionState, FirmwareInfo, SessionState, Temperature};
use serde::{Deserialize, Serialize};

/// Heater reading in degrees
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TemperatureSnapshot {
    pub actual: f64,
    pub target: f64,
}

impl From<Temperature> for TemperatureSnapshot {
    fn from(t: Temperature) -> Self {
        Self {
            actual: t.actual_degrees(),
            target: t.target_degrees(),
        }
    }
}

/// Selected file as exposed to front-ends
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadedFileSnapshot {
    pub name: String,
    pub size: u64,
    pub date: i64,
    pub id: Option<String>,
}

/// Elapsed and linearly estimated remaining print time, in seconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PrintingTime {
    pub elapsed: u64,
    pub remaining: u64,
}

/// Read-only copy of the session published after every loop pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub name: String,
    pub state: ConnectionState,
    pub state_text: String,
    pub operational: bool,
    pub printing: bool,
    pub paused: bool,
    pub cancelling: bool,
    pub last_command: String,
    pub last_response: String,
    pub uploaded_file: UploadedFileSnapshot,
    pub print_completion: f32,
    pub file_pos: u64,
    pub printing_time: PrintingTime,
    pub bed_temperature: TemperatureSnapshot,
    /// One entry per extruder reported by the firmware
    pub tool_temperature: Vec<TemperatureSnapshot>,
    pub firmware: FirmwareInfo,
    pub autoreport_enabled: bool,
    pub baud_rate: Option<u32>,
    /// Loop clock in milliseconds
    pub ms: u64,
    /// Local time, `%Y%m%d_%H%M%S`
    pub datetime: String,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self::capture(&SessionState::default(), 0)
    }
}

impl StatusSnapshot {
    /// Project the session into a snapshot
    pub fn capture(session: &SessionState, now_ms: u64) -> Self {
        let state = session.connection_state();
        let job = &session.job;
        let extruders = (session.firmware.extruders as usize).min(session.temperatures.tools.len());

        Self {
            name: session.firmware.machine_type.clone(),
            state,
            state_text: state.to_string(),
            operational: session.printer_connected,
            printing: job.is_printing(),
            paused: job.is_paused(),
            cancelling: job.cancel_requested,
            last_command: session.last_command_sent.clone(),
            last_response: session.last_received_response.clone(),
            uploaded_file: UploadedFileSnapshot {
                name: job.file_name().to_string(),
                size: job.file.as_ref().map_or(0, |f| f.size),
                date: job.file.as_ref().map_or(0, |f| f.created),
                id: job.file.as_ref().map(|f| f.id()),
            },
            print_completion: job.completion,
            file_pos: job.file_pos,
            printing_time: PrintingTime {
                elapsed: job.print_time_secs,
                remaining: job.remaining_secs(),
            },
            bed_temperature: session.temperatures.bed.into(),
            tool_temperature: session.temperatures.tools[..extruders]
                .iter()
                .map(|t| (*t).into())
                .collect(),
            firmware: session.firmware.clone(),
            autoreport_enabled: session.autoreport_enabled,
            baud_rate: session.baud_rate,
            ms: now_ms,
            datetime: chrono::Local::now().format("%Y%m%d_%H%M%S").to_string(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{JobFile, PrintPhase};

    #[test]
    fn test_capture_projects_session() {
        let mut session = SessionState::new();
        session.printer_connected = true;
        session.firmware.extruders = 2;
        session.temperatures.tools[1] = Temperature::new(20000, 21000);
        session.temperatures.bed = Temperature::new(6000, 6000);
        session.job.phase = PrintPhase::Printing;
        session.job.completion = 50.0;
        session.job.print_time_secs = 60;
        session.job.file = Some(JobFile::new("cube.gcode", 1000, 1_700_000_000));

        let snapshot = StatusSnapshot::capture(&session, 1234);
        assert_eq!(snapshot.state, ConnectionState::Printing);
        assert_eq!(snapshot.state_text, "Printing");
        assert_eq!(snapshot.tool_temperature.len(), 2);
        assert_eq!(snapshot.tool_temperature[1].target, 210.0);
        assert_eq!(snapshot.bed_temperature.actual, 60.0);
        assert_eq!(snapshot.printing_time.remaining, 60);
        assert_eq!(snapshot.uploaded_file.name, "cube.gcode");
        assert_eq!(snapshot.ms, 1234);
    }

    #[test]
    fn test_snapshot_serializes() {
        let json = StatusSnapshot::default().to_json().unwrap();
        assert!(json.contains("\"state\":\"Discovering\""));
        assert!(json.contains("\"name\":\"Unknown\""));
    }
}
