//! Command-line command handlers.
//!
//! Commands that act on the device go through the running daemon's control
//! socket. Where it makes sense they fall back to working on the files
//! directly when no daemon is running.

pub mod colors;
pub mod device;
pub mod help;
pub mod reload;
pub mod schedule;
pub mod settings;
pub mod status;
pub mod sun;

use anyhow::Result;

use crate::ipc::{self, ControlClient, Response};
use crate::supervisor::Event;

/// Connect to the running daemon, if there is one.
pub(crate) async fn daemon_client() -> Result<Option<ControlClient>> {
    ControlClient::connect(&ipc::socket_path()).await
}

/// Print one response line the way every command shows daemon output.
pub(crate) fn report(response: &Response) {
    match response {
        Response::Event { event } => report_event(event),
        Response::Status { status } => status::print_status(status),
        Response::Done { ok: true, .. } => {}
        Response::Done {
            ok: false,
            message,
        } => {
            log_error!("{}", message.as_deref().unwrap_or("Request failed"));
        }
    }
}

pub(crate) fn report_event(event: &Event) {
    match event {
        Event::ConnectionStateChanged { state, device } => match device {
            Some(device) => log_decorated!("{state}: {device}"),
            None => log_decorated!("{state}"),
        },
        Event::ScanResults { devices } => {
            if devices.is_empty() {
                log_decorated!("No devices found");
            } else {
                log_decorated!("Found {} device(s):", devices.len());
                for device in devices {
                    log_indented!("{device}");
                }
            }
        }
        Event::ScanError { message } => log_warning!("Scan failed: {message}"),
        Event::ConnectResult { device } => log_decorated!("Connected to {device}"),
        Event::ConnectError { message } => log_warning!("Connect failed: {message}"),
        Event::CommandError { message } => log_warning!("Command failed: {message}"),
    }
}

/// Print the standard "no daemon" notice.
pub(crate) fn report_not_running() {
    log_pipe!();
    log_warning!("luxlink is not running");
    log_indented!("Start it with 'luxlink run'");
}

/// Send `request` to the daemon and report everything it answers.
///
/// Returns `Ok(None)` when no daemon is running, otherwise whether the
/// request succeeded.
pub(crate) async fn forward(request: &ipc::Request) -> Result<Option<bool>> {
    let Some(mut client) = daemon_client().await? else {
        return Ok(None);
    };
    let (ok, _) = client.call(request, report).await?;
    Ok(Some(ok))
}
