//! Settings loading, type-checked updates, and atomic JSON writes.

use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::Path;

use super::{ConfigError, Settings};

impl Settings {
    /// Load settings from `path`, substituting defaults for anything unusable.
    pub fn load(path: &Path) -> Settings {
        match fs::read_to_string(path) {
            Ok(text) => Settings::from_json_str(&text, path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Settings::default(),
            Err(e) => {
                log_warning!("Could not read {}: {e}", path.display());
                log_indented!("Using default settings");
                Settings::default()
            }
        }
    }

    /// Parse settings leniently. `origin` is only used in warnings.
    pub fn from_json_str(text: &str, origin: &Path) -> Settings {
        let mut settings = Settings::default();

        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                log_warning!("Malformed settings file {}: {e}", origin.display());
                log_indented!("Using default settings");
                return settings;
            }
        };

        let Some(object) = value.as_object() else {
            log_warning!(
                "Settings file {} is not a JSON object, using defaults",
                origin.display()
            );
            return settings;
        };

        for key in Settings::KEYS {
            let Some(raw) = object.get(key) else {
                continue;
            };
            if let Err(e) = settings.set_value(key, raw.clone()) {
                log_warning!("{e} in {}, using default", origin.display());
            }
        }

        settings
    }

    /// Update one key in memory. Unknown keys and wrong types are rejected.
    pub fn set_value(&mut self, key: &str, value: Value) -> Result<(), ConfigError> {
        match key {
            "start_with_windows" => self.start_with_windows = expect_bool(key, &value)?,
            "auto_connect_on_startup" => self.auto_connect_on_startup = expect_bool(key, &value)?,
            "last_device_address" => self.last_device_address = expect_optional_string(key, value)?,
            "last_device_name" => self.last_device_name = expect_optional_string(key, value)?,
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        }
        Ok(())
    }

    /// Write the recognized keys to `path`.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        write_json_atomic(path, self)
    }
}

fn json_type_name(value: &Value) -> String {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
    .to_string()
}

fn expect_bool(key: &str, value: &Value) -> Result<bool, ConfigError> {
    value.as_bool().ok_or_else(|| ConfigError::TypeMismatch {
        key: key.to_string(),
        expected: "a boolean",
        found: json_type_name(value),
    })
}

fn expect_optional_string(key: &str, value: Value) -> Result<Option<String>, ConfigError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        other => Err(ConfigError::TypeMismatch {
            key: key.to_string(),
            expected: "a string or null",
            found: json_type_name(&other),
        }),
    }
}

/// Serialize `value` with four-space indentation and replace `path` atomically.
///
/// The document is written to a temporary file in the destination directory
/// and renamed over the target, so readers never observe a partial file.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ConfigError> {
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    buffer.push(b'\n');

    let io_error = |source: std::io::Error| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(io_error)?;

    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(io_error)?;
    temp.write_all(&buffer).map_err(io_error)?;
    temp.as_file().sync_all().map_err(io_error)?;
    temp.persist(path).map_err(|e| io_error(e.error))?;
    Ok(())
}
