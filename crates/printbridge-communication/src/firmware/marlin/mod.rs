//! Marlin firmware support
//!
//! Response parsing and the commands the bridge sends on its own behalf.

pub mod commands;
pub mod response_parser;

pub use commands::JogDirection;
pub use response_parser::{
    classify, extract_bool, extract_field, is_acknowledgment, is_position_report,
    parse_firmware_info, parse_heating_temperature, parse_temperature, parse_temperatures,
};
