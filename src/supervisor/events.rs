//! Typed notifications from the supervisor and the command worker.
//!
//! This is the only way state changes and failures travel outward. Events are
//! fanned out over a broadcast channel; a subscriber that falls behind loses
//! the oldest events rather than slowing down the sender.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::state::ConnectionState;
use crate::transport::DeviceIdentity;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum Event {
    /// The link changed state.
    ///
    /// `device` is the device being targeted. A `Disconnected` event without a
    /// device means the user dropped the target altogether.
    ConnectionStateChanged {
        state: ConnectionState,
        device: Option<DeviceIdentity>,
    },

    ScanResults {
        devices: Vec<DeviceIdentity>,
    },

    ScanError {
        message: String,
    },

    /// A user-requested connect succeeded.
    ConnectResult {
        device: DeviceIdentity,
    },

    /// A user-requested connect failed.
    ConnectError {
        message: String,
    },

    /// A user command could not be delivered.
    CommandError {
        message: String,
    },
}

/// Cloneable sender side of the event channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    /// Publish `event`. Having no subscribers is not an error.
    pub fn emit(&self, event: Event) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}
