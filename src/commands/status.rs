//! Status and watch commands.
//!
//! `status` asks the daemon for a snapshot; without a daemon it shows the
//! remembered device instead. `watch` streams daemon events until the daemon
//! exits or the user interrupts.

use anyhow::Result;

use crate::config::{ConfigPaths, Settings};
use crate::ipc::{Request, Response};
use crate::supervisor::Status;

pub async fn handle_status_command(paths: &ConfigPaths) -> Result<()> {
    log_version!();

    match super::forward(&Request::Status).await? {
        Some(_) => {}
        None => {
            log_block_start!("luxlink is not running");
            let settings = Settings::load(&paths.settings_path());
            match settings.last_device() {
                Some(device) => log_indented!("Remembered device: {device}"),
                None => log_indented!("No device remembered"),
            }
            log_indented!(
                "Auto-connect on startup: {}",
                if settings.auto_connect_on_startup { "yes" } else { "no" }
            );
        }
    }

    log_end!();
    Ok(())
}

pub async fn handle_watch_command() -> Result<()> {
    log_version!();

    let Some(mut client) = super::daemon_client().await? else {
        super::report_not_running();
        log_end!();
        return Ok(());
    };

    client.send(&Request::Watch).await?;
    log_block_start!("Watching luxlink (Ctrl+C to stop)");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            response = client.next() => match response? {
                Some(response @ (Response::Event { .. } | Response::Status { .. })) => {
                    super::report(&response);
                }
                Some(Response::Done { .. }) => {}
                None => {
                    log_decorated!("luxlink exited");
                    break;
                }
            },
        }
    }

    log_end!();
    Ok(())
}

pub(crate) fn print_status(status: &Status) {
    log_block_start!("State: {}", status.state);
    match &status.device {
        Some(device) => log_indented!("Device: {device}"),
        None => log_indented!("Device: none"),
    }
    let color = status.led.color_name().unwrap_or("unknown color");
    if status.led.is_on {
        log_indented!("LED: on, {color}");
    } else {
        log_indented!("LED: off (last color {color})");
    }
}
