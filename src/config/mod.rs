//! Configuration files and their locations.
//!
//! luxlink keeps two small JSON files in its configuration directory:
//!
//! - `led_settings.json`: flat key/value settings ([`Settings`])
//! - `led_schedule.json`: the weekly schedule (see [`crate::schedule::store`])
//!
//! The directory is `$XDG_CONFIG_HOME/luxlink/` (via `dirs::config_dir()`),
//! or whatever `--config <dir>` points at. It is resolved once at startup
//! into a [`ConfigPaths`] value that is handed to whoever needs it.
//!
//! ## Settings keys
//!
//! ```json
//! {
//!     "start_with_windows": false,
//!     "last_device_address": "BE:16:F8:1D:4E:02",
//!     "last_device_name": "LEDDMX-03",
//!     "auto_connect_on_startup": true
//! }
//! ```
//!
//! Reading is forgiving: a missing file, malformed JSON, or a value of the
//! wrong type falls back to the default for what was affected and logs a
//! warning. Writing is strict: unknown keys and wrong types are rejected.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::constants::{SCHEDULE_FILE_NAME, SETTINGS_FILE_NAME};
use crate::transport::DeviceIdentity;

pub mod loading;

pub use loading::write_json_atomic;

#[cfg(test)]
mod tests;

/// Errors raised while reading or writing configuration files.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown setting '{0}'")]
    UnknownKey(String),

    #[error("setting '{key}' expects {expected}, got {found}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: String,
    },

    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Locations of luxlink's configuration files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    dir: PathBuf,
}

impl ConfigPaths {
    /// Use `custom_dir` when given, otherwise the platform config directory.
    pub fn resolve(custom_dir: Option<&str>) -> Result<Self> {
        let dir = match custom_dir {
            Some(dir) => PathBuf::from(dir),
            None => dirs::config_dir()
                .context("Could not determine config directory")?
                .join("luxlink"),
        };
        Ok(Self { dir })
    }

    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn settings_path(&self) -> PathBuf {
        self.dir.join(SETTINGS_FILE_NAME)
    }

    pub fn schedule_path(&self) -> PathBuf {
        self.dir.join(SCHEDULE_FILE_NAME)
    }
}

/// Flat application settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    /// Carried for file compatibility; the daemon does not act on it.
    pub start_with_windows: bool,
    pub last_device_address: Option<String>,
    pub last_device_name: Option<String>,
    pub auto_connect_on_startup: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            start_with_windows: false,
            last_device_address: None,
            last_device_name: None,
            auto_connect_on_startup: true,
        }
    }
}

impl Settings {
    /// Recognized keys, in file order.
    pub const KEYS: [&'static str; 4] = [
        "start_with_windows",
        "last_device_address",
        "last_device_name",
        "auto_connect_on_startup",
    ];

    /// The remembered device, if both its name and address are known.
    ///
    /// A remembered address without a name still yields an identity with an
    /// empty name: the link can be re-established, only rescans by name are
    /// impossible.
    pub fn last_device(&self) -> Option<DeviceIdentity> {
        self.last_device_address.as_ref().map(|address| {
            DeviceIdentity::new(self.last_device_name.clone().unwrap_or_default(), address)
        })
    }

    /// Remember `device` as the last connected device.
    pub fn remember_device(&mut self, device: &DeviceIdentity) {
        self.last_device_address = Some(device.address.clone());
        self.last_device_name = Some(device.name.clone());
    }

    /// Clear the remembered device.
    pub fn forget_device(&mut self) {
        self.last_device_address = None;
        self.last_device_name = None;
    }

    /// The device to target at startup, honoring `auto_connect_on_startup`.
    pub fn startup_target(&self) -> Option<DeviceIdentity> {
        if self.auto_connect_on_startup {
            self.last_device()
        } else {
            None
        }
    }
}
