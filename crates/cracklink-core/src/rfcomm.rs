//! Raw RFCOMM socket backend.
//!
//! The simplest of the transports: no adapter management, no discovery,
//! no pairing. The peer is assumed reachable; delivery opens an RFCOMM
//! stream to `(peer, channel)` and writes the message bytes. Discovery
//! and pairing trait calls succeed vacuously so the session state
//! machine runs unchanged over this backend.

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::bus::{AdapterId, DeviceRef, ObjectBus, PairOutcome};
use crate::error::{Error, Result};

/// Parse a canonical MAC string into a transport address.
pub(crate) fn parse_address(address: &str) -> Result<bluer::Address> {
    address
        .parse()
        .map_err(|_| Error::InvalidTargetAddress {
            address: address.to_owned(),
        })
}

/// Open an RFCOMM stream to `(address, channel)`, write `text`, and
/// close. Used by both socket-backed delivery paths.
pub(crate) async fn deliver_over_stream(address: &str, channel: u8, text: &str) -> Result<()> {
    let target = parse_address(address)?;
    let socket_addr = bluer::rfcomm::SocketAddr::new(target, channel);

    let mut stream = bluer::rfcomm::Stream::connect(socket_addr)
        .await
        .map_err(|err| Error::SendFailed(format!("connect to channel {channel}: {err}")))?;
    stream
        .write_all(text.as_bytes())
        .await
        .map_err(|err| Error::SendFailed(err.to_string()))?;
    if let Err(err) = stream.shutdown().await {
        debug!(%err, "rfcomm stream shutdown failed");
    }
    Ok(())
}

/// [`ObjectBus`] over a raw RFCOMM socket.
#[derive(Debug, Clone, Copy)]
pub struct RfcommBus {
    channel: u8,
}

impl RfcommBus {
    /// Backend delivering to the given RFCOMM channel.
    #[must_use]
    pub const fn new(channel: u8) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl ObjectBus for RfcommBus {
    /// One implicit local adapter; the socket API exposes no adapter
    /// objects, so any configured pattern is ignored.
    async fn adapters(&self, _pattern: Option<&str>) -> Result<Vec<AdapterId>> {
        Ok(vec!["rfcomm".into()])
    }

    async fn power_on(&self, _adapter: &AdapterId) -> Result<()> {
        Ok(())
    }

    async fn start_discovery(&self, _adapter: &AdapterId) -> Result<()> {
        Ok(())
    }

    async fn stop_discovery(&self, _adapter: &AdapterId) -> Result<()> {
        Ok(())
    }

    /// The peer is assumed reachable; the address is taken at face
    /// value after validation.
    async fn find_device(&self, adapter: &AdapterId, address: &str) -> Result<Option<DeviceRef>> {
        let target = parse_address(address)?;
        Ok(Some(DeviceRef {
            adapter: adapter.clone(),
            address: target.to_string(),
        }))
    }

    /// The socket transport has no bonding step.
    async fn is_paired(&self, _device: &DeviceRef) -> Result<bool> {
        Ok(true)
    }

    async fn pair(&self, _device: &DeviceRef) -> PairOutcome {
        PairOutcome::AlreadyPaired
    }

    /// The stream is opened per delivery; there is no standing link.
    async fn connect(&self, _device: &DeviceRef) -> Result<()> {
        Ok(())
    }

    async fn send_message(&self, device: &DeviceRef, text: &str) -> Result<()> {
        deliver_over_stream(&device.address, self.channel, text).await
    }

    async fn disconnect(&self, _device: &DeviceRef) -> Result<()> {
        Ok(())
    }
}
