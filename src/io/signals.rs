//! Unix signal handling.
//!
//! - `SIGINT`, `SIGTERM`: stop the daemon
//! - `SIGHUP`, `SIGUSR2`: reload settings and schedule from disk
//!
//! Signals are collected on a dedicated thread by `signal-hook` and turned
//! into a cancelled stop token or a reload request on a channel.

use anyhow::{Context, Result};
use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM, SIGUSR2};
use signal_hook::iterator::{Handle, Signals};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Owns the signal thread. Dropping it stops listening.
pub struct SignalListener {
    handle: Handle,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl Drop for SignalListener {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Start translating signals into `stop` cancellation and reload requests.
pub fn listen(
    stop: CancellationToken,
    reload: mpsc::UnboundedSender<()>,
    debug_enabled: bool,
) -> Result<SignalListener> {
    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP, SIGUSR2])
        .context("failed to register signal handlers")?;
    let handle = signals.handle();

    let thread = std::thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            for sig in signals.forever() {
                if debug_enabled {
                    log_debug!("Received signal {sig}");
                }
                match sig {
                    SIGINT | SIGTERM => {
                        log_block_start!("Shutting down");
                        stop.cancel();
                    }
                    SIGHUP | SIGUSR2 => {
                        let _ = reload.send(());
                    }
                    _ => {}
                }
            }
        })
        .context("failed to spawn signal thread")?;

    Ok(SignalListener {
        handle,
        thread: Some(thread),
    })
}

/// Ask the daemon with `pid` to reload its files.
pub fn send_reload(pid: u32) -> Result<()> {
    let raw = i32::try_from(pid).context("invalid PID")?;
    nix::sys::signal::kill(
        nix::unistd::Pid::from_raw(raw),
        nix::sys::signal::Signal::SIGUSR2,
    )
    .with_context(|| format!("Failed to signal process {pid}"))?;
    Ok(())
}
