//! Marlin command builders
//!
//! Every G-code the bridge itself generates, as opposed to lines streamed
//! from a file or typed by a user.

/// Temperature report request
pub const TEMPERATURE_QUERY: &str = "M105";
/// Prefix of the auto-report interval command; the digit after it is the interval
pub const AUTOREPORT_PREFIX: &str = "M155 S";
/// Enable temperature auto-reporting every two seconds
pub const AUTOREPORT_ENABLE: &str = "M155 S2";
/// Firmware self-identification
pub const IDENTIFY: &str = "M115";
/// Short notification beep
pub const BEEP: &str = "M300 S500 P50";
/// Leave relative positioning after a jog
pub const ABSOLUTE_POSITIONING: &str = "G90";
/// Enter relative positioning before a jog
pub const RELATIVE_POSITIONING: &str = "G91";

/// Quickstop, heaters off, park nozzle, disable steppers
pub const DEFAULT_SHUTDOWN_SEQUENCE: [&str; 5] = ["M410", "M104 S0", "M140 S0", "G27 P0", "M18"];

/// Show a message on the printer display
pub fn lcd(text: &str) -> String {
    format!("M117 {}", text)
}

/// Whether a sent command sets the auto-report interval
pub fn is_autoreport_command(command: &str) -> bool {
    command.starts_with(AUTOREPORT_PREFIX)
}

/// Whether the auto-report command enables reporting (interval not `0`)
pub fn autoreport_enables(command: &str) -> bool {
    command
        .strip_prefix(AUTOREPORT_PREFIX)
        .and_then(|interval| interval.chars().next())
        .is_some_and(|c| c != '0')
}

/// `Cap:PROGRESS` print start preamble
pub fn progress_start(file_name: &str) -> [String; 2] {
    ["M530 S1 L0".to_string(), format!("M531 {}", file_name)]
}

/// `Cap:PROGRESS` completion report, truncated to one decimal
pub fn progress_percent(completion: f32) -> String {
    let truncated = (completion * 10.0).trunc() / 10.0;
    format!("M532 X{:.2}", truncated)
}

/// `Cap:PROGRESS` print end
pub const PROGRESS_END: &str = "M530 S0";

/// `Cap:BUILD_PERCENT` completion report
pub fn build_percent(completion: f32) -> String {
    format!("M73 P{}", completion as i32)
}

/// Jog and homing directions, numbered like a phone keypad
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JogDirection {
    /// `G28 XY` (5)
    HomeXY,
    /// +Y (8)
    Back,
    /// -Y (2)
    Front,
    /// -X (4)
    Left,
    /// +X (6)
    Right,
    /// `G28 Z` (0)
    HomeZ,
    /// +Z (9)
    Up,
    /// -Z (3)
    Down,
}

impl JogDirection {
    /// Map the keypad code used by the web front-end
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            5 => Some(Self::HomeXY),
            8 => Some(Self::Back),
            2 => Some(Self::Front),
            4 => Some(Self::Left),
            6 => Some(Self::Right),
            0 => Some(Self::HomeZ),
            9 => Some(Self::Up),
            3 => Some(Self::Down),
            _ => None,
        }
    }

    /// Relative move (`G91` then `G0 <axis><distance>`) or homing command
    ///
    /// Homing needs no positioning mode change and yields a single command.
    pub fn commands(self, distance: u32) -> Vec<String> {
        let relative = |axis: &str| {
            vec![
                RELATIVE_POSITIONING.to_string(),
                format!("G0 {}{}", axis, distance),
            ]
        };

        match self {
            Self::HomeXY => vec!["G28 XY".to_string()],
            Self::HomeZ => vec!["G28 Z".to_string()],
            Self::Back => relative("Y"),
            Self::Front => relative("Y-"),
            Self::Left => relative("X-"),
            Self::Right => relative("X"),
            Self::Up => relative("Z"),
            Self::Down => relative("Z-"),
        }
    }
}
