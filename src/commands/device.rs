//! Device commands: scan, connect, disconnect, and the color and power
//! commands.

use anyhow::{Context, Result};

use crate::config::{ConfigPaths, Settings};
use crate::constants::USER_SCAN_TIMEOUT;
use crate::controller::UserCommand;
use crate::ipc::Request;
use crate::schedule::palette;
use crate::supervisor::Event;
use crate::transport::{BtleTransport, Transport};

/// Scan through the daemon, or with a local adapter when none is running.
pub async fn handle_scan_command() -> Result<()> {
    log_version!();
    log_block_start!("Scanning for {}s...", USER_SCAN_TIMEOUT.as_secs());

    let forwarded = super::forward(&Request::Scan).await?;
    if forwarded.is_none() {
        // Without a daemon nothing else holds the adapter.
        let mut transport = BtleTransport::new()
            .await
            .context("Bluetooth is not available")?;
        let devices = transport.scan(USER_SCAN_TIMEOUT).await?;
        super::report_event(&Event::ScanResults { devices });
    }

    log_end!();
    Ok(())
}

pub async fn handle_connect_command(target: &str) -> Result<()> {
    log_version!();
    log_block_start!("Connecting to '{target}'...");

    let request = Request::Connect {
        target: target.to_string(),
    };
    if super::forward(&request).await?.is_none() {
        super::report_not_running();
    }

    log_end!();
    Ok(())
}

/// Drop the link and forget the device. Without a daemon only the
/// remembered device is forgotten.
pub async fn handle_disconnect_command(paths: &ConfigPaths) -> Result<()> {
    log_version!();

    match super::forward(&Request::Disconnect).await? {
        Some(true) => log_block_start!("Disconnected"),
        Some(false) => {}
        None => {
            let path = paths.settings_path();
            let mut settings = Settings::load(&path);
            match settings.last_device() {
                Some(device) => {
                    settings.forget_device();
                    settings
                        .save(&path)
                        .with_context(|| format!("Failed to update {}", path.display()))?;
                    log_block_start!("Forgot {device}");
                }
                None => log_block_start!("No device remembered"),
            }
        }
    }

    log_end!();
    Ok(())
}

/// `color <name>`, `on`, and `off`.
pub async fn handle_light_command(command: UserCommand) -> Result<()> {
    log_version!();

    let request = match &command {
        UserCommand::SetColor(name) => {
            let Some(entry) = palette::find_by_name_loose(name) else {
                log_pipe!();
                log_error!("Unknown color '{name}'");
                log_indented!("Run 'luxlink colors' to list the palette");
                log_end!();
                return Ok(());
            };
            log_block_start!("Switching to {}", entry.name);
            Request::SetColor {
                color: entry.name.to_string(),
            }
        }
        UserCommand::PowerOn => {
            log_block_start!("Switching on");
            Request::PowerOn
        }
        UserCommand::PowerOff => {
            log_block_start!("Switching off");
            Request::PowerOff
        }
    };

    match super::forward(&request).await? {
        Some(true) => log_decorated!("Done"),
        Some(false) => {}
        None => super::report_not_running(),
    }

    log_end!();
    Ok(())
}
