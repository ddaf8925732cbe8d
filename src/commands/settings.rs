//! `settings set <key> <value>`.

use anyhow::{Context, Result};
use serde_json::Value;

use crate::config::{ConfigPaths, Settings};
use crate::constants::LOCK_FILE_NAME;
use crate::io::lock::running_pid;
use crate::io::{runtime_file, signals};

pub fn handle_settings_set_command(paths: &ConfigPaths, key: &str, value: &str) -> Result<()> {
    log_version!();

    let path = paths.settings_path();
    let mut settings = Settings::load(&path);
    settings
        .set_value(key, parse_value(value))
        .context("Setting not changed")?;
    settings
        .save(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    log_block_start!("Updated {key} = {value}");

    if let Some(pid) = running_pid(&runtime_file(LOCK_FILE_NAME)) {
        signals::send_reload(pid).context("Failed to notify the running daemon")?;
        log_decorated!("Running daemon notified");
    }

    log_end!();
    Ok(())
}

/// Interpret a command-line value as JSON when it is JSON (`true`, `null`),
/// and as a plain string otherwise, so addresses need no quoting.
pub(crate) fn parse_value(input: &str) -> Value {
    serde_json::from_str(input).unwrap_or_else(|_| Value::String(input.to_string()))
}
