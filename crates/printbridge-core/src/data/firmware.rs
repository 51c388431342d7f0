use serde::{Deserialize, Serialize};

/// Capabilities a printer reports in its `M115` self-identification
///
/// Derived once when detection succeeds and held for the whole session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareInfo {
    /// `MACHINE_TYPE` field
    pub machine_type: String,
    /// `EXTRUDER_COUNT`, capped at [`crate::MAX_SUPPORTED_EXTRUDERS`]
    pub extruders: u8,
    /// `Cap:AUTOREPORT_TEMP`
    pub autoreport_temp: bool,
    /// `Cap:PROGRESS` (M530/M531/M532)
    pub progress: bool,
    /// `Cap:BUILD_PERCENT` (M73)
    pub build_percent: bool,
}

impl Default for FirmwareInfo {
    fn default() -> Self {
        Self {
            machine_type: "Unknown".to_string(),
            extruders: 1,
            autoreport_temp: false,
            progress: false,
            build_percent: false,
        }
    }
}
