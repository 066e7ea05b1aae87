//! BlueZ D-Bus backend via the `bluer` crate.
//!
//! Maps the [`ObjectBus`] contract onto BlueZ's managed objects:
//! adapters come from the session's adapter list, device lookup reads
//! the adapter's known-device set, and pair/connect go through the
//! `org.bluez.Device1` methods. Requires a running `bluetoothd`.
//!
//! bluer stops discovery by dropping the handle returned from
//! `discover_devices`; the handle is held here so the trait's explicit
//! `stop_discovery` has real drop-to-stop semantics.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use tokio::sync::Mutex;
use tracing::debug;

use crate::bus::{AdapterId, DeviceRef, ObjectBus, PairOutcome};
use crate::config::is_valid_mac_address;
use crate::error::{Error, Result};
use crate::rfcomm::{deliver_over_stream, parse_address};

impl From<bluer::Error> for Error {
    fn from(err: bluer::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

type DiscoveryHandle = Pin<Box<dyn Stream<Item = bluer::AdapterEvent> + Send>>;

/// [`ObjectBus`] over the BlueZ daemon.
pub struct BluezBus {
    session: bluer::Session,
    channel: u8,
    discovery: Mutex<Option<DiscoveryHandle>>,
}

impl BluezBus {
    /// Connect to the BlueZ daemon. `channel` is the RFCOMM channel
    /// used for notification delivery.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] when the D-Bus session cannot be
    /// established.
    pub async fn new(channel: u8) -> Result<Self> {
        let session = bluer::Session::new().await?;
        Ok(Self {
            session,
            channel,
            discovery: Mutex::new(None),
        })
    }

    fn adapter(&self, id: &str) -> Result<bluer::Adapter> {
        self.session.adapter(id).map_err(Into::into)
    }

    fn device(&self, device: &DeviceRef) -> Result<bluer::Device> {
        let adapter = self.adapter(&device.adapter)?;
        let address = parse_address(&device.address)?;
        adapter.device(address).map_err(Into::into)
    }
}

#[async_trait]
impl ObjectBus for BluezBus {
    async fn adapters(&self, pattern: Option<&str>) -> Result<Vec<AdapterId>> {
        let names = self.session.adapter_names().await?;
        let Some(pattern) = pattern else {
            return Ok(names);
        };

        let mut matched = Vec::new();
        for name in names {
            if name.contains(pattern) {
                matched.push(name);
            } else if is_valid_mac_address(pattern) {
                let address = self.adapter(&name)?.address().await?;
                if address.to_string().eq_ignore_ascii_case(pattern) {
                    matched.push(name);
                }
            }
        }
        Ok(matched)
    }

    async fn power_on(&self, adapter: &AdapterId) -> Result<()> {
        let adapter = self.adapter(adapter)?;
        if !adapter.is_powered().await? {
            adapter.set_powered(true).await?;
        }
        Ok(())
    }

    async fn start_discovery(&self, adapter: &AdapterId) -> Result<()> {
        let mut guard = self.discovery.lock().await;
        if guard.is_some() {
            return Ok(());
        }
        let adapter = self.adapter(adapter)?;
        let events = adapter.discover_devices().await?;
        *guard = Some(Box::pin(events));
        Ok(())
    }

    async fn stop_discovery(&self, adapter: &AdapterId) -> Result<()> {
        if self.discovery.lock().await.take().is_some() {
            debug!(adapter = %adapter, "discovery stopped");
        }
        Ok(())
    }

    async fn find_device(&self, adapter: &AdapterId, address: &str) -> Result<Option<DeviceRef>> {
        let target = parse_address(address)?;
        let known = self.adapter(adapter)?.device_addresses().await?;
        Ok(known.contains(&target).then(|| DeviceRef {
            adapter: adapter.clone(),
            address: target.to_string(),
        }))
    }

    async fn is_paired(&self, device: &DeviceRef) -> Result<bool> {
        self.device(device)?.is_paired().await.map_err(Into::into)
    }

    async fn pair(&self, device: &DeviceRef) -> PairOutcome {
        let proxy = match self.device(device) {
            Ok(proxy) => proxy,
            Err(err) => return PairOutcome::Failed(err.to_string()),
        };
        match proxy.pair().await {
            Ok(()) => PairOutcome::Paired,
            Err(err) if matches!(err.kind, bluer::ErrorKind::AlreadyExists) => {
                PairOutcome::AlreadyPaired
            }
            Err(err) => PairOutcome::Failed(err.message),
        }
    }

    async fn connect(&self, device: &DeviceRef) -> Result<()> {
        match self.device(device)?.connect().await {
            Ok(()) => Ok(()),
            Err(err) if matches!(err.kind, bluer::ErrorKind::AlreadyConnected) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// BlueZ exposes no generic text delivery on `Device1`; the message
    /// goes out over an RFCOMM stream to the configured channel.
    async fn send_message(&self, device: &DeviceRef, text: &str) -> Result<()> {
        deliver_over_stream(&device.address, self.channel, text).await
    }

    async fn disconnect(&self, device: &DeviceRef) -> Result<()> {
        self.device(device)?.disconnect().await.map_err(Into::into)
    }
}
