//! [`Transport`] over the host Bluetooth stack via `btleplug`.

use async_trait::async_trait;
use btleplug::api::{
    Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use uuid::Uuid;

use super::{DeviceIdentity, Transport, TransportError};
use crate::constants::COMMAND_CHARACTERISTIC_UUID;

/// How often `connect` re-checks discovered peripherals for its target.
const DISCOVERY_POLL: Duration = Duration::from_millis(500);

type StopFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Stops discovery when finished or dropped, so a cancelled or failed caller
/// never leaves the adapter scanning.
struct ScanGuard {
    stop: Option<StopFuture>,
}

impl ScanGuard {
    fn new(stop: impl Future<Output = ()> + Send + 'static) -> Self {
        Self {
            stop: Some(Box::pin(stop)),
        }
    }

    async fn start(adapter: &Adapter) -> Result<Self, TransportError> {
        adapter.start_scan(ScanFilter::default()).await?;
        let adapter = adapter.clone();
        Ok(Self::new(async move {
            let _ = adapter.stop_scan().await;
        }))
    }

    async fn finish(mut self) {
        if let Some(stop) = self.stop.take() {
            stop.await;
        }
    }
}

impl Drop for ScanGuard {
    fn drop(&mut self) {
        let Some(stop) = self.stop.take() else {
            return;
        };
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(stop);
        }
    }
}

pub struct BtleTransport {
    // Dropping the manager tears down the platform session.
    _manager: Manager,
    adapter: Adapter,
    command_uuid: Uuid,
    peripheral: Option<Peripheral>,
    characteristic: Option<Characteristic>,
}

impl BtleTransport {
    /// Open the first Bluetooth adapter.
    pub async fn new() -> Result<Self, TransportError> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(TransportError::NoAdapter)?;
        let command_uuid = Uuid::parse_str(COMMAND_CHARACTERISTIC_UUID)
            .map_err(|e| TransportError::Link(format!("bad characteristic uuid: {e}")))?;

        Ok(Self {
            _manager: manager,
            adapter,
            command_uuid,
            peripheral: None,
            characteristic: None,
        })
    }

    async fn named_devices(&self) -> Result<Vec<DeviceIdentity>, TransportError> {
        let mut seen = HashSet::new();
        let mut devices = Vec::new();
        for peripheral in self.adapter.peripherals().await? {
            let Some(properties) = peripheral.properties().await? else {
                continue;
            };
            let Some(name) = properties.local_name.filter(|n| !n.trim().is_empty()) else {
                continue;
            };
            let address = peripheral.address().to_string();
            if seen.insert(address.to_ascii_uppercase()) {
                devices.push(DeviceIdentity::new(name, address));
            }
        }
        Ok(devices)
    }

    async fn find_peripheral(&self, address: &str) -> Result<Option<Peripheral>, TransportError> {
        for peripheral in self.adapter.peripherals().await? {
            if peripheral.address().to_string().eq_ignore_ascii_case(address) {
                return Ok(Some(peripheral));
            }
        }
        Ok(None)
    }

    /// Find the peripheral, scanning until it shows up, then link and locate
    /// the command characteristic.
    async fn establish(&mut self, address: &str) -> Result<(), TransportError> {
        let peripheral = match self.find_peripheral(address).await? {
            Some(peripheral) => peripheral,
            None => {
                let scan = ScanGuard::start(&self.adapter).await?;
                let found = loop {
                    if let Some(peripheral) = self.find_peripheral(address).await? {
                        break peripheral;
                    }
                    tokio::time::sleep(DISCOVERY_POLL).await;
                };
                scan.finish().await;
                found
            }
        };

        if !peripheral.is_connected().await? {
            peripheral.connect().await?;
        }
        peripheral.discover_services().await?;

        let characteristic = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == self.command_uuid)
            .ok_or(TransportError::CharacteristicNotFound(self.command_uuid))?;

        self.peripheral = Some(peripheral);
        self.characteristic = Some(characteristic);
        Ok(())
    }

    async fn release(&mut self) -> Result<(), TransportError> {
        self.characteristic = None;
        match self.peripheral.take() {
            Some(peripheral) if peripheral.is_connected().await.unwrap_or(false) => {
                peripheral.disconnect().await?;
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Transport for BtleTransport {
    async fn scan(&mut self, timeout: Duration) -> Result<Vec<DeviceIdentity>, TransportError> {
        let scan = ScanGuard::start(&self.adapter).await?;
        tokio::time::sleep(timeout).await;
        let devices = self.named_devices().await;
        scan.finish().await;
        devices
    }

    async fn connect(&mut self, address: &str, timeout: Duration) -> Result<(), TransportError> {
        if let Some(current) = &self.peripheral {
            let same = current.address().to_string().eq_ignore_ascii_case(address);
            if same && self.characteristic.is_some() && current.is_connected().await.unwrap_or(false)
            {
                return Ok(());
            }
        }

        // A handle is never reused after a failed or foreign link.
        let _ = self.release().await;

        match tokio::time::timeout(timeout, self.establish(address)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                let _ = self.release().await;
                Err(e)
            }
            Err(_) => {
                let _ = self.release().await;
                Err(TransportError::Timeout)
            }
        }
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.release().await
    }

    async fn write_command(&mut self, hex_payload: &str) -> Result<(), TransportError> {
        let (Some(peripheral), Some(characteristic)) = (&self.peripheral, &self.characteristic)
        else {
            return Err(TransportError::NotConnected);
        };
        let payload = hex::decode(hex_payload)
            .map_err(|_| TransportError::InvalidPayload(hex_payload.to_string()))?;
        peripheral
            .write(characteristic, &payload, WriteType::WithoutResponse)
            .await?;
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        match (&self.peripheral, &self.characteristic) {
            (Some(peripheral), Some(_)) => peripheral.is_connected().await.unwrap_or(false),
            _ => false,
        }
    }
}
