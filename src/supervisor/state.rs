//! Observable supervisor state and the guards that drive its transitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::time::Instant;

use crate::constants::{
    INACTIVITY_PING_THRESHOLD, MAX_CONNECT_ATTEMPTS, PING_INTERVAL, SCHEDULE_CHECK_INTERVAL,
};
use crate::schedule::palette;
use crate::transport::DeviceIdentity;

/// Link state. Only the supervisor changes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
        };
        f.write_str(name)
    }
}

/// What luxlink believes the LED is showing.
///
/// Updated only after a command was written successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedState {
    pub is_on: bool,
    pub last_color_hex: String,
}

impl LedState {
    pub fn on(command_hex: &str) -> Self {
        Self {
            is_on: true,
            last_color_hex: command_hex.to_string(),
        }
    }

    /// Off, remembering `command_hex` for the next power-on.
    pub fn off(command_hex: &str) -> Self {
        Self {
            is_on: false,
            last_color_hex: command_hex.to_string(),
        }
    }

    /// Whether showing `command_hex` would change nothing.
    pub fn shows(&self, command_hex: &str) -> bool {
        self.is_on && self.last_color_hex.eq_ignore_ascii_case(command_hex)
    }

    /// Palette name of the remembered color, if it is a palette color.
    pub fn color_name(&self) -> Option<&'static str> {
        palette::find_by_command(&self.last_color_hex).map(|entry| entry.name)
    }
}

impl Default for LedState {
    /// Assumed on in the first palette color, so that a device connected while
    /// no rule is active gets switched off by the first schedule check.
    fn default() -> Self {
        Self::on(palette::default_color().command_hex)
    }
}

/// Snapshot published after every supervisor state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub state: ConnectionState,
    pub device: Option<DeviceIdentity>,
    pub led: LedState,
}

impl Status {
    pub fn new(device: Option<DeviceIdentity>, led: LedState) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            device,
            led,
        }
    }
}

// # Transition guards

/// Whether the failed attempts so far call for a rescan before connecting again.
pub fn rescan_due(attempts: u32) -> bool {
    attempts >= MAX_CONNECT_ATTEMPTS
}

/// Whether the schedule should be evaluated again. A fresh link has no last
/// check and is evaluated at once.
pub fn schedule_check_due(last_check: Option<Instant>, now: Instant) -> bool {
    last_check.is_none_or(|last| now.duration_since(last) >= SCHEDULE_CHECK_INTERVAL)
}

/// A ping is due when the keep-alive interval has passed, or when the link
/// has been idle and the last ping is at least as old as the inactivity
/// threshold.
pub fn ping_due(last_ping: Option<Instant>, last_input: Option<Instant>, now: Instant) -> bool {
    let Some(last_ping) = last_ping else {
        return true;
    };
    let since_ping = now.duration_since(last_ping);
    let idle =
        last_input.is_none_or(|input| now.duration_since(input) >= INACTIVITY_PING_THRESHOLD);
    since_ping >= PING_INTERVAL || (idle && since_ping >= INACTIVITY_PING_THRESHOLD)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_rescan_due_only_at_max_attempts() {
        assert!(!rescan_due(0));
        assert!(!rescan_due(MAX_CONNECT_ATTEMPTS - 1));
        assert!(rescan_due(MAX_CONNECT_ATTEMPTS));
    }

    #[test]
    fn test_schedule_check_due() {
        let start = Instant::now();
        assert!(schedule_check_due(None, start));
        assert!(!schedule_check_due(Some(start), start + secs(4)));
        assert!(schedule_check_due(Some(start), start + SCHEDULE_CHECK_INTERVAL));
    }

    #[test]
    fn test_ping_due_on_fresh_link() {
        assert!(ping_due(None, None, Instant::now()));
    }

    #[test]
    fn test_ping_due_when_idle_past_threshold() {
        let start = Instant::now();
        assert!(!ping_due(Some(start), None, start + secs(4)));
        assert!(ping_due(Some(start), None, start + INACTIVITY_PING_THRESHOLD));
    }

    #[test]
    fn test_recent_input_defers_ping_until_interval() {
        let start = Instant::now();
        let now = start + secs(10);
        let input = Some(now - secs(1));
        assert!(!ping_due(Some(start), input, now));
        assert!(ping_due(Some(start), input, start + PING_INTERVAL));
    }
}
