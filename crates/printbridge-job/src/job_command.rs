//! Job command vocabulary
//!
//! The requests a front-end may make against the print job. Deserializes
//! from the OctoPrint job API body, e.g. `{"command": "pause", "action": "resume"}`.

use printbridge_core::{JobError, SessionState};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What a `pause` request does
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PauseAction {
    Pause,
    Resume,
    #[default]
    Toggle,
}

impl FromStr for PauseAction {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pause" => Ok(Self::Pause),
            "resume" => Ok(Self::Resume),
            "toggle" => Ok(Self::Toggle),
            other => Err(JobError::UnknownCommand(format!("pause {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum JobCommand {
    /// Print the selected file
    Start,
    /// Abort the print and run the shutdown sequence
    Cancel,
    /// Start the selected file over; only while paused
    Restart,
    Pause {
        #[serde(default)]
        action: PauseAction,
    },
}

impl fmt::Display for JobCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Cancel => write!(f, "cancel"),
            Self::Restart => write!(f, "restart"),
            Self::Pause { .. } => write!(f, "pause"),
        }
    }
}

impl FromStr for JobCommand {
    type Err = JobError;

    /// Parses `start`, `cancel`, `restart`, `pause` and `pause <action>`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let command = match (words.next(), words.next()) {
            (Some("start"), None) => Self::Start,
            (Some("cancel"), None) => Self::Cancel,
            (Some("restart"), None) => Self::Restart,
            (Some("pause"), action) => Self::Pause {
                action: action.map(str::parse::<PauseAction>).transpose()?.unwrap_or_default(),
            },
            _ => return Err(JobError::UnknownCommand(s.to_string())),
        };

        if words.next().is_some() {
            return Err(JobError::UnknownCommand(s.to_string()));
        }
        Ok(command)
    }
}

impl JobCommand {
    /// Raise the matching request flag, or refuse if the job state forbids it
    pub fn apply(self, session: &mut SessionState) -> Result<(), JobError> {
        let connected = session.printer_connected;
        let job = &mut session.job;
        let refuse = |reason: &str| -> Result<(), JobError> {
            Err(JobError::conflict(self.to_string(), reason))
        };

        match self {
            Self::Cancel => {
                if !job.is_printing() {
                    return refuse("not printing");
                }
                job.cancel_requested = true;
            }
            Self::Start => {
                if job.is_printing() {
                    return refuse("already printing");
                }
                if !connected {
                    return refuse("printer not connected");
                }
                if job.file.is_none() {
                    return refuse("no file selected");
                }
                job.start_requested = true;
            }
            Self::Restart => {
                if !job.is_paused() {
                    return refuse("not paused");
                }
                job.restart_requested = true;
            }
            Self::Pause { action } => {
                if !job.is_printing() {
                    return refuse("not printing");
                }
                match action {
                    PauseAction::Pause => job.set_paused(true),
                    PauseAction::Resume => job.set_paused(false),
                    PauseAction::Toggle => job.toggle_pause(),
                }
            }
        }

        tracing::info!("Job command '{}' accepted", self);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use printbridge_core::{JobFile, PrintPhase};

    fn printing_session() -> SessionState {
        let mut session = SessionState::new();
        session.printer_connected = true;
        session.job.file = Some(JobFile::new("cube.gcode", 1000, 0));
        session.job.phase = PrintPhase::Printing;
        session
    }

    #[test]
    fn test_parse() {
        assert_eq!("start".parse::<JobCommand>().unwrap(), JobCommand::Start);
        assert_eq!(
            "pause".parse::<JobCommand>().unwrap(),
            JobCommand::Pause { action: PauseAction::Toggle }
        );
        assert_eq!(
            "pause resume".parse::<JobCommand>().unwrap(),
            JobCommand::Pause { action: PauseAction::Resume }
        );
        assert!(matches!(
            "pause later".parse::<JobCommand>(),
            Err(JobError::UnknownCommand(_))
        ));
        assert!("stop".parse::<JobCommand>().is_err());
        assert!("start now".parse::<JobCommand>().is_err());
    }

    #[test]
    fn test_start_requires_connection_and_file() {
        let mut session = SessionState::new();
        session.job.file = Some(JobFile::new("cube.gcode", 1000, 0));
        assert!(matches!(
            JobCommand::Start.apply(&mut session),
            Err(JobError::Conflict { ref reason, .. }) if reason == "printer not connected"
        ));

        session.printer_connected = true;
        session.job.file = None;
        assert!(JobCommand::Start.apply(&mut session).is_err());

        session.job.file = Some(JobFile::new("cube.gcode", 1000, 0));
        JobCommand::Start.apply(&mut session).unwrap();
        assert!(session.job.start_requested);
    }

    #[test]
    fn test_start_refused_while_printing() {
        let mut session = printing_session();
        assert!(JobCommand::Start.apply(&mut session).is_err());
        assert!(!session.job.start_requested);
    }

    #[test]
    fn test_cancel_only_while_printing() {
        let mut session = SessionState::new();
        assert!(JobCommand::Cancel.apply(&mut session).is_err());

        let mut session = printing_session();
        JobCommand::Cancel.apply(&mut session).unwrap();
        assert!(session.job.cancel_requested);
    }

    #[test]
    fn test_pause_actions() {
        let mut session = printing_session();
        let pause = |action| JobCommand::Pause { action };

        pause(PauseAction::Pause).apply(&mut session).unwrap();
        assert!(session.job.is_paused());
        pause(PauseAction::Pause).apply(&mut session).unwrap();
        assert!(session.job.is_paused());
        pause(PauseAction::Toggle).apply(&mut session).unwrap();
        assert_eq!(session.job.phase, PrintPhase::Printing);
        pause(PauseAction::Toggle).apply(&mut session).unwrap();
        pause(PauseAction::Resume).apply(&mut session).unwrap();
        assert_eq!(session.job.phase, PrintPhase::Printing);

        assert!(pause(PauseAction::Toggle).apply(&mut SessionState::new()).is_err());
    }

    #[test]
    fn test_restart_only_while_paused() {
        let mut session = printing_session();
        assert!(JobCommand::Restart.apply(&mut session).is_err());

        session.job.set_paused(true);
        JobCommand::Restart.apply(&mut session).unwrap();
        assert!(session.job.restart_requested);
    }

    #[test]
    fn test_deserialize_api_body() {
        let command: JobCommand =
            serde_json::from_str(r#"{"command":"pause","action":"resume"}"#).unwrap();
        assert_eq!(command, JobCommand::Pause { action: PauseAction::Resume });

        let command: JobCommand = serde_json::from_str(r#"{"command":"pause"}"#).unwrap();
        assert_eq!(command, JobCommand::Pause { action: PauseAction::Toggle });

        let command: JobCommand = serde_json::from_str(r#"{"command":"cancel"}"#).unwrap();
        assert_eq!(command, JobCommand::Cancel);
    }
}
