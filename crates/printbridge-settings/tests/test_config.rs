use printbridge_settings::{Config, SettingsError};
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_partial_toml_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("printbridge.toml");
    std::fs::write(
        &path,
        r#"
[serial]
port = "/dev/ttyACM0"
bauds = [250000, 115200]
rx_buffer_size = 128

[storage]
root = "/srv/gcodes"
"#,
    )
    .unwrap();

    let config = Config::load_from_file(&path).unwrap();
    assert_eq!(config.serial.port, "/dev/ttyACM0");
    assert_eq!(config.serial.bauds, vec![250000, 115200]);
    assert_eq!(config.serial.identify_retries, 4);
    assert_eq!(config.transport().rx_buffer_size, 128);
    assert_eq!(config.storage.root, PathBuf::from("/srv/gcodes"));
    assert_eq!(config.storage.marker_file, "uploaded.txt");
    assert_eq!(config.printer.queue_capacity, 10);
    assert!(config.telnet.enabled);
}

#[test]
fn test_save_then_load_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("printbridge.json");

    let mut config = Config::default();
    config.telnet.bind = "127.0.0.1:2323".to_string();
    config.logging.file = Some(dir.path().join("bridge.log"));
    config.printer.shutdown_sequence = vec!["M104 S0".to_string(), "M84".to_string()];
    config.save_to_file(&path).unwrap();

    let loaded = Config::load_from_file(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_save_toml_without_log_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("printbridge.toml");

    Config::default().save_to_file(&path).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("[serial]"));
    assert!(text.contains("shutdown_sequence"));
    assert_eq!(Config::load_from_file(&path).unwrap(), Config::default());
}

#[test]
fn test_invalid_file_rejected_on_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("printbridge.toml");
    std::fs::write(&path, "[printer]\nqueue_capacity = 1\n").unwrap();

    let err = Config::load_from_file(&path).unwrap_err();
    assert!(matches!(err, SettingsError::InvalidSetting { .. }));
}

#[test]
fn test_malformed_toml() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("printbridge.toml");
    std::fs::write(&path, "[serial\nport = ").unwrap();

    assert!(matches!(
        Config::load_from_file(&path),
        Err(SettingsError::Toml(_))
    ));
}

#[test]
fn test_missing_file_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let config = Config::load_or_default(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_shutdown_sequence_must_fit_the_queue() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("printbridge.toml");
    let commands: Vec<String> = (0..12).map(|i| format!("\"M117 step {}\"", i)).collect();
    std::fs::write(
        &path,
        format!("[printer]\nshutdown_sequence = [{}]\n", commands.join(", ")),
    )
    .unwrap();

    let err = Config::load_from_file(&path).unwrap_err();
    assert!(matches!(
        err,
        SettingsError::InvalidSetting { ref key, .. } if key == "printer.shutdown_sequence"
    ));

    // Nine commands fill the usable slots of the default ten-slot queue exactly
    let mut config = Config::default();
    config.printer.shutdown_sequence = (0..9).map(|i| format!("M117 step {}", i)).collect();
    assert!(config.validate().is_ok());
    config.printer.queue_capacity = 9;
    assert!(config.validate().is_err());
}
