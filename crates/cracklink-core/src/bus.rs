//! Object-bus abstraction over the platform Bluetooth stack.
//!
//! The session state machine never talks to BlueZ directly; it drives a
//! [`ObjectBus`], a minimal view of the stack's managed-object set:
//! adapters that can be powered and told to discover, and device objects
//! that appear under an adapter once discovered and can be paired,
//! connected, and written to.
//!
//! Backends:
//! - [`crate::bluez::BluezBus`] — BlueZ over D-Bus via `bluer`
//!   (the default),
//! - [`crate::rfcomm::RfcommBus`] — raw RFCOMM socket, no discovery or
//!   pairing,
//! - [`crate::mock::MockBus`] — scripted in-memory bus for tests.
//!
//! The bus handle is constructed once and passed into the session at
//! construction; there is no ambient global state.

use async_trait::async_trait;

use crate::error::Result;

/// Identifier of an adapter object on the bus, e.g. `hci0`.
pub type AdapterId = String;

/// Handle to a device object in the bus's managed-object set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRef {
    /// Adapter the device object lives under.
    pub adapter: AdapterId,
    /// Device hardware address, canonical uppercase form.
    pub address: String,
}

/// Outcome of a pair request.
///
/// Repeated pair attempts against an already-bonded peer are a normal
/// occurrence across scan ticks, so "already paired" is surfaced as its
/// own success value instead of being decoded from an error code at the
/// call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairOutcome {
    /// A new bond was established.
    Paired,
    /// The peer was already bonded; treated as success.
    AlreadyPaired,
    /// The pair request failed. Recoverable.
    Failed(String),
}

impl PairOutcome {
    /// Returns `true` for both [`Self::Paired`] and [`Self::AlreadyPaired`].
    #[inline]
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Paired | Self::AlreadyPaired)
    }
}

/// Minimal managed-object view of a Bluetooth stack.
///
/// All methods take `&self`; backends keep whatever interior state they
/// need (e.g. a held discovery handle) behind their own synchronization.
#[async_trait]
pub trait ObjectBus: Send + Sync {
    /// Adapters currently present on the bus, optionally filtered by a
    /// name or address pattern. An empty result is not an error here;
    /// the session turns it into one.
    async fn adapters(&self, pattern: Option<&str>) -> Result<Vec<AdapterId>>;

    /// Power the adapter on. Idempotent.
    async fn power_on(&self, adapter: &AdapterId) -> Result<()>;

    /// Begin device discovery on the adapter.
    async fn start_discovery(&self, adapter: &AdapterId) -> Result<()>;

    /// Stop device discovery on the adapter. Called unconditionally as
    /// cleanup, including when discovery was never started.
    async fn stop_discovery(&self, adapter: &AdapterId) -> Result<()>;

    /// Look up the device object with `address` under the adapter.
    /// Returns `Ok(None)` when the device has not been discovered yet;
    /// absence is not an error.
    async fn find_device(&self, adapter: &AdapterId, address: &str) -> Result<Option<DeviceRef>>;

    /// Whether the device is bonded. Transport errors propagate.
    async fn is_paired(&self, device: &DeviceRef) -> Result<bool>;

    /// Issue a pair request. Never fails at the transport level; every
    /// outcome is folded into [`PairOutcome`].
    async fn pair(&self, device: &DeviceRef) -> PairOutcome;

    /// Establish a connection to the device.
    async fn connect(&self, device: &DeviceRef) -> Result<()>;

    /// Deliver a short text message to the device.
    async fn send_message(&self, device: &DeviceRef, text: &str) -> Result<()>;

    /// Tear down the connection. Errors are for logging only; callers
    /// never propagate them.
    async fn disconnect(&self, device: &DeviceRef) -> Result<()>;
}
