//! Process-level I/O: runtime files, the instance lock, and signals.

use std::path::PathBuf;

pub mod lock;
pub mod signals;

/// Path of a per-user runtime file such as the lock or the control socket.
///
/// Uses `$XDG_RUNTIME_DIR/<file_name>`. Without a runtime directory the file
/// goes to `/tmp` with the user id folded into its name, so that two users
/// never share one.
pub fn runtime_file(file_name: &str) -> PathBuf {
    match std::env::var_os("XDG_RUNTIME_DIR").filter(|dir| !dir.is_empty()) {
        Some(dir) => PathBuf::from(dir).join(file_name),
        None => {
            let uid = nix::unistd::getuid();
            let name = match file_name.rsplit_once('.') {
                Some((stem, ext)) => format!("{stem}-{uid}.{ext}"),
                None => format!("{file_name}-{uid}"),
            };
            PathBuf::from("/tmp").join(name)
        }
    }
}
