//! In-memory transport driven by a script, for tests.
//!
//! Clones share one script and one call log, so a test can keep a clone
//! while the original sits behind the link lock.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

use super::{DeviceIdentity, Transport, TransportError};

/// One observed transport call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Scan,
    Connect(String),
    Disconnect,
    Write(String),
}

#[derive(Debug, Default)]
struct Script {
    connect_failures: VecDeque<TransportError>,
    scan_results: VecDeque<Vec<DeviceIdentity>>,
    scan_failures: VecDeque<TransportError>,
    write_failures: VecDeque<TransportError>,
    linked: Option<String>,
    calls: Vec<(Instant, Call)>,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        // A panicking test thread must not hide the log from the others.
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fail the next `count` connect attempts with a timeout.
    pub fn fail_connects(&self, count: usize) -> &Self {
        let mut script = self.script();
        for _ in 0..count {
            script.connect_failures.push_back(TransportError::Timeout);
        }
        self
    }

    /// Queue the result of the next scan. Unscripted scans find nothing.
    pub fn push_scan(&self, devices: Vec<DeviceIdentity>) -> &Self {
        self.script().scan_results.push_back(devices);
        self
    }

    /// Fail the next scan at once with a radio error.
    pub fn fail_next_scan(&self) -> &Self {
        self.script()
            .scan_failures
            .push_back(TransportError::Link("adapter busy".to_string()));
        self
    }

    /// Fail the next write with a link error.
    pub fn fail_next_write(&self) -> &Self {
        self.script()
            .write_failures
            .push_back(TransportError::Link("write rejected".to_string()));
        self
    }

    /// Simulate the device silently dropping the link.
    pub fn drop_link(&self) {
        self.script().linked = None;
    }

    pub fn linked_address(&self) -> Option<String> {
        self.script().linked.clone()
    }

    /// Every call so far, with the (tokio) instant it was made.
    pub fn calls(&self) -> Vec<(Instant, Call)> {
        self.script().calls.clone()
    }

    /// Payloads written so far, in order.
    pub fn writes(&self) -> Vec<String> {
        self.script()
            .calls
            .iter()
            .filter_map(|(_, call)| match call {
                Call::Write(payload) => Some(payload.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.script().calls.push((Instant::now(), call));
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn scan(&mut self, timeout: Duration) -> Result<Vec<DeviceIdentity>, TransportError> {
        self.record(Call::Scan);
        if let Some(error) = self.script().scan_failures.pop_front() {
            return Err(error);
        }
        tokio::time::sleep(timeout).await;
        Ok(self.script().scan_results.pop_front().unwrap_or_default())
    }

    async fn connect(&mut self, address: &str, _timeout: Duration) -> Result<(), TransportError> {
        self.record(Call::Connect(address.to_string()));
        let mut script = self.script();
        if let Some(error) = script.connect_failures.pop_front() {
            script.linked = None;
            return Err(error);
        }
        script.linked = Some(address.to_string());
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.record(Call::Disconnect);
        self.script().linked = None;
        Ok(())
    }

    async fn write_command(&mut self, hex_payload: &str) -> Result<(), TransportError> {
        self.record(Call::Write(hex_payload.to_string()));
        let mut script = self.script();
        if script.linked.is_none() {
            return Err(TransportError::NotConnected);
        }
        match script.write_failures.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn is_connected(&self) -> bool {
        self.script().linked.is_some()
    }
}
