//! The link to the LED device.
//!
//! [`Transport`] is the narrow contract the rest of luxlink drives: discover
//! named devices, hold at most one link, write opaque command payloads to it.
//! [`btle::BtleTransport`] implements it over the host's Bluetooth stack.
//! Tests substitute the generated `MockTransport` or the scripted fake in
//! [`fake`].
//!
//! A transport is never shared directly. Callers wrap it in a [`SharedLink`]
//! and hold the lock for the duration of every call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub mod btle;
#[cfg(any(test, feature = "testing-support"))]
pub mod fake;

pub use btle::BtleTransport;

/// A device as seen during discovery.
///
/// Addresses compare case-insensitively; the name is informational for
/// equality but is what rescans match on.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub name: String,
    pub address: String,
}

impl DeviceIdentity {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }

    /// Whether `query` names this device by name or by address.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim();
        self.name == query || self.address.eq_ignore_ascii_case(query)
    }
}

impl PartialEq for DeviceIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.address.eq_ignore_ascii_case(&other.address)
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.address)
        } else {
            write!(f, "{} ({})", self.name, self.address)
        }
    }
}

/// Failures reported by a transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("no Bluetooth adapter available")]
    NoAdapter,

    #[error("operation timed out")]
    Timeout,

    #[error("device {0} not found")]
    NotFound(String),

    #[error("Cannot send command: Not connected to device")]
    NotConnected,

    #[error("command characteristic {0} not found on device")]
    CharacteristicNotFound(uuid::Uuid),

    #[error("invalid command payload '{0}'")]
    InvalidPayload(String),

    #[error("Bluetooth error: {0}")]
    Radio(#[source] btleplug::Error),

    #[error("link error: {0}")]
    Link(String),
}

impl From<btleplug::Error> for TransportError {
    /// A dropped peripheral surfaces as `NotConnected`, so callers treat it
    /// like any other lost link.
    fn from(error: btleplug::Error) -> Self {
        match error {
            btleplug::Error::NotConnected => TransportError::NotConnected,
            other => TransportError::Radio(other),
        }
    }
}

/// Scan, connect, and write primitives for a single device link.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Discover named devices for `timeout`, de-duplicated by address.
    async fn scan(&mut self, timeout: Duration) -> Result<Vec<DeviceIdentity>, TransportError>;

    /// Link to `address`. Any existing link to another address is torn down
    /// first; an existing link to the same address is kept.
    async fn connect(&mut self, address: &str, timeout: Duration) -> Result<(), TransportError>;

    /// Drop the current link, if any.
    async fn disconnect(&mut self) -> Result<(), TransportError>;

    /// Write a hex-encoded payload to the command characteristic, without
    /// waiting for an acknowledgement.
    async fn write_command(&mut self, hex_payload: &str) -> Result<(), TransportError>;

    async fn is_connected(&self) -> bool;
}

/// The transport behind the link lock. Every call must hold the lock.
pub type SharedLink<T> = Arc<tokio::sync::Mutex<T>>;

pub fn share<T: Transport>(transport: T) -> SharedLink<T> {
    Arc::new(tokio::sync::Mutex::new(transport))
}
