//! Structured console logging with box-drawing decoration.
//!
//! Every line luxlink prints goes through this module so that daemon output,
//! one-shot CLI commands, and help screens share one visual grammar:
//!
//! ```text
//! ┏ luxlink v0.4.0 ━━╸
//! ┃
//! ┣ Connecting to LEDDMX-03 (BE:16:F8:1D:4E:02)
//! ┃   attempt 1 of 3
//! ┣[WARNING] Connect failed: timed out after 15s
//! ╹
//! ```
//!
//! Output can be muted at runtime with [`Log::set_enabled`] (tests and quiet
//! CLI paths) and prefixed with wall-clock timestamps with
//! [`Log::set_timestamps`] (the long-running daemon).

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

static LOGGING_ENABLED: AtomicBool = AtomicBool::new(true);
static TIMESTAMPS_ENABLED: AtomicBool = AtomicBool::new(false);

/// Main logging interface.
///
/// ## Conventions
///
/// - **`log_block_start!`** opens a new conceptual block (a state change, a
///   phase, a command header). It prints a spacer pipe and then `┣ message`.
/// - **`log_decorated!`** continues the current block with `┣ message`.
/// - **`log_indented!`** prints details that belong to the previous line:
///   `┃   message`.
/// - **`log_pipe!`** inserts a bare `┃` spacer, typically before a semantic
///   level macro that starts its own block.
/// - **`log_version!`** / **`log_end!`** frame a whole run.
/// - **`log_info!`, `log_warning!`, `log_error!`, `log_debug!`,
///   `log_critical!`** carry a `[LEVEL]` tag for messages whose severity
///   matters more than their place in the block structure.
pub struct Log;

impl Log {
    /// Enable or disable all output.
    pub fn set_enabled(enabled: bool) {
        LOGGING_ENABLED.store(enabled, Ordering::SeqCst);
    }

    /// Check if logging is currently enabled.
    pub fn is_enabled() -> bool {
        LOGGING_ENABLED.load(Ordering::SeqCst)
    }

    /// Prefix each line with the local wall-clock time.
    pub fn set_timestamps(enabled: bool) {
        TIMESTAMPS_ENABLED.store(enabled, Ordering::SeqCst);
    }

    fn timestamp_prefix() -> String {
        if TIMESTAMPS_ENABLED.load(Ordering::SeqCst) {
            format!("[{}] ", chrono::Local::now().format("%H:%M:%S"))
        } else {
            String::new()
        }
    }
}

/// Visual form of a single log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Decorated,
    Indented,
    Pipe,
    BlockStart,
    Version,
    End,
    Warning,
    Error,
    ErrorExit,
    Info,
    Debug,
    Critical,
}

impl LineStyle {
    /// Render `message` in this style, applying `prefix` to every physical line.
    pub fn render(self, prefix: &str, message: &str) -> String {
        match self {
            LineStyle::Decorated => format!("{prefix}┣ {message}\n"),
            LineStyle::Indented => format!("{prefix}┃   {message}\n"),
            LineStyle::Pipe => format!("{prefix}┃\n"),
            LineStyle::BlockStart => format!("{prefix}┃\n{prefix}┣ {message}\n"),
            LineStyle::Version => format!("{prefix}┏ {message} ━━╸\n"),
            LineStyle::End => format!("{prefix}╹\n"),
            LineStyle::Warning => format!("{prefix}┣[\x1b[33mWARNING\x1b[0m] {message}\n"),
            LineStyle::Error => format!("{prefix}┣[\x1b[31mERROR\x1b[0m] {message}\n"),
            LineStyle::ErrorExit => {
                format!("{prefix}┃\n{prefix}┗[\x1b[31mERROR\x1b[0m] {message}\n")
            }
            LineStyle::Info => format!("{prefix}┣[\x1b[32mINFO\x1b[0m] {message}\n"),
            LineStyle::Debug => format!("{prefix}┣[\x1b[36mDEBUG\x1b[0m] {message}\n"),
            LineStyle::Critical => format!("{prefix}┣[\x1b[31mCRITICAL\x1b[0m] {message}\n"),
        }
    }
}

/// Render and print one line if logging is enabled. Used by the macros.
pub fn emit(style: LineStyle, message: &str) {
    if !Log::is_enabled() {
        return;
    }
    let prefix = Log::timestamp_prefix();
    let mut stdout = std::io::stdout().lock();
    let _ = stdout.write_all(style.render(&prefix, message).as_bytes());
    let _ = stdout.flush();
}

// # Logging Macros
//
// Each macro accepts either a format string literal with arguments or any
// expression implementing Display.

#[doc(hidden)]
#[macro_export]
macro_rules! __log_with_style {
    ($style:ident, $fmt:literal $($arg:tt)*) => {
        $crate::logger::emit($crate::logger::LineStyle::$style, &format!($fmt $($arg)*))
    };
    ($style:ident, $expr:expr) => {
        $crate::logger::emit($crate::logger::LineStyle::$style, &($expr).to_string())
    };
}

/// Log a message that continues the current block.
#[macro_export]
macro_rules! log_decorated {
    ($($t:tt)*) => { $crate::__log_with_style!(Decorated, $($t)*) };
}

/// Log a detail line belonging to the previous message.
#[macro_export]
macro_rules! log_indented {
    ($($t:tt)*) => { $crate::__log_with_style!(Indented, $($t)*) };
}

/// Log a bare pipe for vertical spacing.
#[macro_export]
macro_rules! log_pipe {
    () => {
        $crate::logger::emit($crate::logger::LineStyle::Pipe, "")
    };
}

/// Log the first line of a new block.
#[macro_export]
macro_rules! log_block_start {
    ($($t:tt)*) => { $crate::__log_with_style!(BlockStart, $($t)*) };
}

/// Log the application header.
#[macro_export]
macro_rules! log_version {
    () => {
        $crate::logger::emit(
            $crate::logger::LineStyle::Version,
            &format!("luxlink v{}", env!("CARGO_PKG_VERSION")),
        )
    };
}

/// Log the final termination marker.
#[macro_export]
macro_rules! log_end {
    () => {
        $crate::logger::emit($crate::logger::LineStyle::End, "")
    };
}

/// Log a warning in yellow.
#[macro_export]
macro_rules! log_warning {
    ($($t:tt)*) => { $crate::__log_with_style!(Warning, $($t)*) };
}

/// Log an error in red.
#[macro_export]
macro_rules! log_error {
    ($($t:tt)*) => { $crate::__log_with_style!(Error, $($t)*) };
}

/// Log an error that terminates the current flow, closing the block.
#[macro_export]
macro_rules! log_error_exit {
    ($($t:tt)*) => { $crate::__log_with_style!(ErrorExit, $($t)*) };
}

/// Log an informational message.
#[macro_export]
macro_rules! log_info {
    ($($t:tt)*) => { $crate::__log_with_style!(Info, $($t)*) };
}

/// Log a debug message. Callers gate these on their `debug_enabled` flag.
#[macro_export]
macro_rules! log_debug {
    ($($t:tt)*) => { $crate::__log_with_style!(Debug, $($t)*) };
}

/// Log a critical message.
#[macro_export]
macro_rules! log_critical {
    ($($t:tt)*) => { $crate::__log_with_style!(Critical, $($t)*) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_start_renders_spacer_and_branch() {
        let rendered = LineStyle::BlockStart.render("", "Scanning");
        assert_eq!(rendered, "┃\n┣ Scanning\n");
    }

    #[test]
    fn test_prefix_applies_to_every_physical_line() {
        let rendered = LineStyle::ErrorExit.render("[12:00:00] ", "boom");
        assert!(rendered.starts_with("[12:00:00] ┃\n[12:00:00] ┗"));
        assert!(rendered.ends_with("boom\n"));
    }

    #[test]
    fn test_indented_and_version_shapes() {
        assert_eq!(LineStyle::Indented.render("", "x"), "┃   x\n");
        assert_eq!(LineStyle::Version.render("", "luxlink v1"), "┏ luxlink v1 ━━╸\n");
        assert_eq!(LineStyle::End.render("", ""), "╹\n");
    }
}
