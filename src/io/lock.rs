//! Single-instance lock.
//!
//! The daemon holds an exclusive `flock` on its lock file for its whole
//! lifetime and writes its PID into it. Other invocations read that PID to
//! find the daemon (for `reload`) and to recognize stale locks left behind by
//! a process that no longer exists.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// An acquired lock. Dropping it releases the lock and removes the file.
#[derive(Debug)]
pub struct InstanceLock {
    file: File,
    path: PathBuf,
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        let _ = std::fs::remove_file(&self.path);
    }
}

#[derive(Debug)]
pub enum Acquired {
    Locked(InstanceLock),
    /// Another live process holds the lock.
    HeldBy(u32),
}

/// Try to become the single running instance.
pub fn acquire(path: &Path) -> Result<Acquired> {
    if let Some(lock) = try_lock(path)? {
        return Ok(Acquired::Locked(lock));
    }

    match read_pid(path) {
        Some(pid) if is_process_running(pid) => return Ok(Acquired::HeldBy(pid)),
        Some(pid) => log_warning!("Removing stale lock file (process {pid} no longer running)"),
        None => log_warning!("Lock file is unreadable, removing it"),
    }
    let _ = std::fs::remove_file(path);

    match try_lock(path)? {
        Some(lock) => Ok(Acquired::Locked(lock)),
        None => match read_pid(path) {
            Some(pid) => Ok(Acquired::HeldBy(pid)),
            None => anyhow::bail!("Failed to acquire lock {} after cleanup", path.display()),
        },
    }
}

fn try_lock(path: &Path) -> Result<Option<InstanceLock>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create lock directory {}", parent.display()))?;
    }

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .with_context(|| format!("Failed to open lock file {}", path.display()))?;

    if file.try_lock_exclusive().is_err() {
        return Ok(None);
    }

    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    writeln!(file, "{}", std::process::id())?;
    file.flush()?;

    Ok(Some(InstanceLock {
        file,
        path: path.to_path_buf(),
    }))
}

fn read_pid(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path)
        .ok()?
        .lines()
        .next()?
        .trim()
        .parse()
        .ok()
}

/// PID of the live process holding the lock at `path`, if any.
pub fn running_pid(path: &Path) -> Option<u32> {
    let pid = read_pid(path)?;
    if pid != std::process::id() && !is_process_running(pid) {
        return None;
    }
    // A dead holder leaves the file unlocked.
    let file = File::open(path).ok()?;
    match file.try_lock_shared() {
        Ok(()) => {
            let _ = file.unlock();
            None
        }
        Err(_) => Some(pid),
    }
}

pub fn is_process_running(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    // Signal 0 only checks that the process exists and may be signalled.
    match nix::sys::signal::kill(nix::unistd::Pid::from_raw(raw), None) {
        Ok(()) => true,
        Err(nix::errno::Errno::EPERM) => true,
        Err(_) => false,
    }
}
