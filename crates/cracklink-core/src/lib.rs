//! # cracklink-core
//!
//! Core logic for cracklink: watch the wpa-sec cracked-credentials
//! potfile, match it against access points observed by the host agent
//! during channel scanning, and notify a paired Bluetooth peer when a
//! cracked network is in range.
//!
//! ## Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`potfile`] - credential-file parsing into an O(1) match index
//! - [`bus`] - object-bus abstraction over the platform Bluetooth stack
//! - [`bluez`] - BlueZ D-Bus backend via `bluer` (feature `bluetooth`)
//! - [`rfcomm`] - raw RFCOMM socket backend (feature `bluetooth`)
//! - [`mock`] - scripted bus for tests (feature `mock-bus`)
//! - [`session`] - Bluetooth session state machine
//! - [`notifier`] - per-tick match-and-notify orchestration
//! - [`config`] - plugin configuration and validation
//! - [`error`] - unified error types

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

#[cfg(feature = "bluetooth")]
pub mod bluez;
pub mod bus;
pub mod config;
pub mod error;
#[cfg(any(test, feature = "mock-bus"))]
pub mod mock;
pub mod notifier;
pub mod potfile;
#[cfg(feature = "bluetooth")]
pub mod rfcomm;
pub mod session;

// Re-export primary types for convenience
#[cfg(feature = "bluetooth")]
pub use bluez::BluezBus;
pub use bus::{AdapterId, DeviceRef, ObjectBus, PairOutcome};
pub use config::{is_valid_mac_address, normalize_mac, PluginConfig, TransportKind};
pub use error::{Error, Result};
#[cfg(any(test, feature = "mock-bus"))]
pub use mock::{MockBus, MockCall};
pub use notifier::MatchNotifier;
pub use potfile::{CredentialIndex, ObservedAp};
#[cfg(feature = "bluetooth")]
pub use rfcomm::RfcommBus;
pub use session::{BluetoothSession, SessionState};
