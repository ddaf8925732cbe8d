//! `reload`: ask the running daemon to re-read its files.

use anyhow::Result;

use crate::constants::LOCK_FILE_NAME;
use crate::io::lock::running_pid;
use crate::io::{runtime_file, signals};

pub fn handle_reload_command() -> Result<()> {
    log_version!();

    match running_pid(&runtime_file(LOCK_FILE_NAME)) {
        Some(pid) => {
            signals::send_reload(pid)?;
            log_block_start!("Sent reload signal to luxlink (PID: {pid})");
            log_indented!("Settings and schedule will be re-read");
        }
        None => super::report_not_running(),
    }

    log_end!();
    Ok(())
}
