use super::*;
use serde_json::json;
use serial_test::serial;
use std::fs;
use tempfile::tempdir;

fn write_settings(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join(SETTINGS_FILE_NAME);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_missing_file_yields_defaults() {
    let temp_dir = tempdir().unwrap();
    let settings = Settings::load(&temp_dir.path().join("absent.json"));
    assert_eq!(settings, Settings::default());
    assert!(settings.auto_connect_on_startup);
    assert!(settings.last_device().is_none());
}

#[test]
fn test_malformed_json_yields_defaults() {
    let temp_dir = tempdir().unwrap();
    let path = write_settings(temp_dir.path(), "{ not json");
    assert_eq!(Settings::load(&path), Settings::default());
}

#[test]
fn test_type_mismatch_defaults_only_that_key() {
    let temp_dir = tempdir().unwrap();
    let path = write_settings(
        temp_dir.path(),
        r#"{
            "start_with_windows": "yes",
            "last_device_address": "AA:BB:CC:DD:EE:FF",
            "last_device_name": 42,
            "auto_connect_on_startup": false
        }"#,
    );

    let settings = Settings::load(&path);
    assert!(!settings.start_with_windows);
    assert_eq!(settings.last_device_address.as_deref(), Some("AA:BB:CC:DD:EE:FF"));
    assert_eq!(settings.last_device_name, None);
    assert!(!settings.auto_connect_on_startup);
}

#[test]
fn test_unknown_keys_ignored_on_read() {
    let temp_dir = tempdir().unwrap();
    let path = write_settings(
        temp_dir.path(),
        r#"{"window_geometry": [1, 2], "last_device_name": "LEDDMX-03"}"#,
    );
    let settings = Settings::load(&path);
    assert_eq!(settings.last_device_name.as_deref(), Some("LEDDMX-03"));
}

#[test]
fn test_set_value_rejects_unknown_key() {
    let mut settings = Settings::default();
    let err = settings.set_value("theme", json!("dark")).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownKey(ref key) if key == "theme"));
    assert_eq!(settings, Settings::default());
}

#[test]
fn test_set_value_rejects_wrong_type() {
    let mut settings = Settings::default();
    let err = settings
        .set_value("auto_connect_on_startup", json!("false"))
        .unwrap_err();
    assert!(matches!(err, ConfigError::TypeMismatch { expected: "a boolean", .. }));

    settings
        .set_value("last_device_address", json!(null))
        .unwrap();
    assert!(settings.last_device_address.is_none());
}

#[test]
fn test_save_writes_only_known_keys_with_four_space_indent() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("nested").join(SETTINGS_FILE_NAME);

    let mut settings = Settings::default();
    settings.remember_device(&DeviceIdentity::new("LEDDMX-03", "BE:16:F8:1D:4E:02"));
    settings.save(&path).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("\n    \"last_device_name\": \"LEDDMX-03\""));

    let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
    let keys: Vec<&String> = parsed.as_object().unwrap().keys().collect();
    assert_eq!(keys.len(), Settings::KEYS.len());

    assert_eq!(Settings::load(&path), settings);
}

#[test]
fn test_remember_and_forget_device() {
    let mut settings = Settings::default();
    let device = DeviceIdentity::new("LEDDMX-03", "be:16:f8:1d:4e:02");
    settings.remember_device(&device);
    assert_eq!(settings.startup_target(), Some(device.clone()));

    settings.auto_connect_on_startup = false;
    assert_eq!(settings.startup_target(), None);
    assert_eq!(settings.last_device(), Some(device));

    settings.forget_device();
    assert!(settings.last_device().is_none());
}

#[test]
#[serial]
fn test_resolve_uses_xdg_config_home() {
    let temp_dir = tempdir().unwrap();

    let original = std::env::var("XDG_CONFIG_HOME").ok();
    unsafe {
        std::env::set_var("XDG_CONFIG_HOME", temp_dir.path());
    }

    let paths = ConfigPaths::resolve(None);

    unsafe {
        match original {
            Some(val) => std::env::set_var("XDG_CONFIG_HOME", val),
            None => std::env::remove_var("XDG_CONFIG_HOME"),
        }
    }

    let paths = paths.unwrap();
    if cfg!(target_os = "linux") {
        assert_eq!(paths.dir(), temp_dir.path().join("luxlink"));
    }
    assert!(paths.settings_path().ends_with(SETTINGS_FILE_NAME));
    assert!(paths.schedule_path().ends_with(SCHEDULE_FILE_NAME));
}

#[test]
fn test_resolve_prefers_custom_dir() {
    let paths = ConfigPaths::resolve(Some("/tmp/luxlink-custom")).unwrap();
    assert_eq!(paths.dir(), Path::new("/tmp/luxlink-custom"));
}
