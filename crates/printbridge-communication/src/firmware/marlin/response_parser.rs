//! Marlin response parsing
//!
//! Stateless text extraction over raw printer responses. The input is the
//! response buffer as accumulated by the transport driver: carriage returns
//! removed, newline kept, possibly several lines of a multi-line answer.
//!
//! Temperatures come in two shapes:
//! - `ok T:32.8 /0.0 B:31.8 /0.0 T0:32.8 /0.0 @:0 B@:0` (actual and target)
//! - `T:32.8 E:0 B:31.8` (sent by Prusa firmware while heating, actual only)

use printbridge_core::{FirmwareInfo, ResponseKind, Temperature, Temperatures, MAX_SUPPORTED_EXTRUDERS};

/// Whether a response acknowledges the oldest in-flight command
pub fn is_acknowledgment(response: &str) -> bool {
    response.starts_with("ok") || response.ends_with("ok\n")
}

/// Lenient numeric check: only digits, `.`, `-` and spaces
fn is_lenient_number(value: &str) -> bool {
    value
        .chars()
        .all(|c| c == ' ' || c == '.' || c == '-' || c.is_ascii_digit())
}

/// Convert a lenient number to hundredths, truncating toward zero
///
/// Only the leading `[-]digits[.digits]` part counts; a token with no
/// usable prefix, such as `-` or an empty value, reads as zero.
fn to_hundredths(value: &str) -> Option<i32> {
    if !is_lenient_number(value) {
        return None;
    }

    let value = value.trim_start();
    let bytes = value.as_bytes();
    let mut end = usize::from(bytes.first() == Some(&b'-'));
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    if bytes.get(end) == Some(&b'.') {
        end += 1;
        while bytes.get(end).is_some_and(u8::is_ascii_digit) {
            end += 1;
        }
    }

    let number = value[..end].parse::<f32>().unwrap_or(0.0);
    Some((number * 100.0) as i32)
}

/// Parse `<label>:<actual> /<target> ` into a reading
pub fn parse_temperature(response: &str, label: &str) -> Option<Temperature> {
    let key = format!("{}:", label);
    let label_pos = response.find(&key)?;
    let slash_pos = label_pos + response[label_pos..].find(" /")?;
    let space_pos = slash_pos + 1 + response[slash_pos + 1..].find(' ')?;

    let actual = response.get(label_pos + key.len()..slash_pos)?;
    let target = response.get(slash_pos + 2..space_pos)?;

    Some(Temperature::new(to_hundredths(actual)?, to_hundredths(target)?))
}

/// Parse the single-value `<label>:<actual>` form, in hundredths
///
/// The value ends at the next space, newline or the end of the response.
pub fn parse_heating_temperature(response: &str, label: &str) -> Option<i32> {
    let key = format!("{}:", label);
    let start = response.find(&key)? + key.len();
    let rest = &response[start..];
    let end = rest.find(|c: char| c == ' ' || c == '\n').unwrap_or(rest.len());

    to_hundredths(&rest[..end])
}

/// Index of the extruder currently heating, from the `E:` field
fn heating_extruder(response: &str) -> Option<usize> {
    let e = parse_heating_temperature(response, "E")? / 100;
    usize::try_from(e)
        .ok()
        .filter(|index| *index < MAX_SUPPORTED_EXTRUDERS)
}

/// Update every reading found in `response`
///
/// Single-extruder printers report `T`, others `T0`..`Tn`. The bed (`B`) is
/// always tried. When neither matched, the heating form is tried for the
/// extruder named by `E` and for the bed. Returns whether anything matched.
pub fn parse_temperatures(response: &str, extruders: u8, temperatures: &mut Temperatures) -> bool {
    let mut matched = false;

    if extruders <= 1 {
        if let Some(t) = parse_temperature(response, "T") {
            temperatures.tools[0] = t;
            matched = true;
        }
    } else {
        let count = (extruders as usize).min(MAX_SUPPORTED_EXTRUDERS);
        for (index, tool) in temperatures.tools.iter_mut().enumerate().take(count) {
            if let Some(t) = parse_temperature(response, &format!("T{}", index)) {
                *tool = t;
                matched = true;
            }
        }
    }

    if let Some(t) = parse_temperature(response, "B") {
        temperatures.bed = t;
        matched = true;
    }

    if !matched {
        if let Some(index) = heating_extruder(response) {
            if let Some(actual) = parse_heating_temperature(response, "T") {
                temperatures.tools[index].actual = actual;
                matched = true;
            }
        }
        if let Some(actual) = parse_heating_temperature(response, "B") {
            temperatures.bed.actual = actual;
            matched = true;
        }
    }

    matched
}

/// `M114` style report: `X:-33.00 Y:-10.00 Z:5.00 E:37.95 Count X:-3300 ...`
pub fn is_position_report(response: &str) -> bool {
    ["X:", "Y:", "Z:", "E:"]
        .iter()
        .all(|axis| response.contains(axis))
}

/// Classify an unsolicited (non-`ok`) line from a connected printer
///
/// Temperature reports update `temperatures` as a side effect. Anything
/// unrecognised is [`ResponseKind::Incomplete`].
pub fn classify(response: &str, extruders: u8, temperatures: &mut Temperatures) -> ResponseKind {
    if parse_temperatures(response, extruders, temperatures) {
        ResponseKind::AutoTemperature
    } else if is_position_report(response) {
        ResponseKind::Position
    } else if response.starts_with("echo:busy") {
        ResponseKind::Busy
    } else if response.starts_with("echo: cold extrusion prevented") {
        ResponseKind::ColdExtrusion
    } else if response.starts_with("Error:") {
        ResponseKind::Error
    } else {
        ResponseKind::Incomplete
    }
}

/// Value of an `M115` field such as `MACHINE_TYPE` or `Cap:PROGRESS`
///
/// Values never contain `:`, so when another colon follows the value ends at
/// the last space or newline before it. Otherwise it runs to the end of the
/// line. Returns `None` when the field is missing or empty.
pub fn extract_field<'a>(response: &'a str, field: &str) -> Option<&'a str> {
    let key = format!("{}:", field);
    let start = response.find(&key)? + key.len();
    let rest = &response[start..];

    let value = match rest.find(':') {
        Some(colon) => {
            let before = &rest[..colon];
            before
                .rfind(|c: char| c == ' ' || c == '\n')
                .map_or("", |end| &before[..end])
        }
        None => rest.split('\n').next().unwrap_or_default(),
    };

    let value = value.trim_end_matches('\r');
    (!value.is_empty()).then_some(value)
}

/// Boolean `M115` field: `1` is true, any other value false, absent `default`
pub fn extract_bool(response: &str, field: &str, default: bool) -> bool {
    extract_field(response, field).map_or(default, |value| value == "1")
}

/// Build the capability record from an `M115` answer
///
/// Returns `None` unless a `MACHINE_TYPE` is present. The extruder count
/// defaults to 1 and is kept within `1..=MAX_SUPPORTED_EXTRUDERS`.
pub fn parse_firmware_info(response: &str) -> Option<FirmwareInfo> {
    let machine_type = extract_field(response, "MACHINE_TYPE")?;
    let extruders = extract_field(response, "EXTRUDER_COUNT")
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(1)
        .clamp(1, MAX_SUPPORTED_EXTRUDERS);

    Some(FirmwareInfo {
        machine_type: machine_type.to_string(),
        extruders: extruders as u8,
        autoreport_temp: extract_bool(response, "AUTOREPORT_TEMP", false),
        progress: extract_bool(response, "Cap:PROGRESS", false),
        build_percent: extract_bool(response, "Cap:BUILD_PERCENT", false),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lenient_number() {
        assert!(is_lenient_number("-12.5"));
        assert!(is_lenient_number(" 32.8"));
        assert!(!is_lenient_number("32.8\n"));
        assert_eq!(to_hundredths(""), Some(0));
        assert_eq!(to_hundredths("abc"), None);
        assert_eq!(to_hundredths("-1.5"), Some(-150));
    }

    #[test]
    fn test_malformed_lenient_numbers_read_their_prefix() {
        assert_eq!(to_hundredths("-"), Some(0));
        assert_eq!(to_hundredths("."), Some(0));
        assert_eq!(to_hundredths("1.2.3"), Some(120));
        assert_eq!(to_hundredths(" 21.5"), Some(2150));
        assert_eq!(to_hundredths("21 5"), Some(2100));
        assert_eq!(
            parse_temperature("ok T:- /0.0 B:20.0 /60.0 @:0\n", "T"),
            Some(Temperature::new(0, 0))
        );
    }

    #[test]
    fn test_acknowledgment_forms() {
        assert!(is_acknowledgment("ok\n"));
        assert!(is_acknowledgment("ok T:20.0 /0.0 B:20.0 /0.0 @:0\n"));
        assert!(is_acknowledgment("FIRMWARE_NAME:Marlin\nCap:EEPROM:1\nok\n"));
        assert!(!is_acknowledgment("echo:busy: processing\n"));
    }

    #[test]
    fn test_heating_value_stops_at_newline() {
        assert_eq!(parse_heating_temperature("T:32.8 E:0 B:31.8\n", "B"), Some(3180));
        assert_eq!(parse_heating_temperature("T:32.8 E:0 B:31.8", "B"), Some(3180));
        assert_eq!(parse_heating_temperature("T:32.8", "B"), None);
    }
}
