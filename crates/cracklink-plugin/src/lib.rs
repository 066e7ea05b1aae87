//! # cracklink-plugin
//!
//! Host-facing surface of cracklink. The host framework drives the
//! plugin through four lifecycle callbacks, invoked strictly
//! sequentially on one logical thread of control:
//!
//! - [`Plugin::on_config_changed`] - extract and validate the plugin's
//!   configuration namespace
//! - [`Plugin::on_ready`] - build the Bluetooth backend and load the
//!   credential index
//! - [`Plugin::on_channel_switch`] - one scan tick against the host's
//!   currently observed access points
//! - [`Plugin::on_unload`] - tear everything down; never fails
//!
//! No callback ever panics or propagates an error to the host: failures
//! are logged and the plugin degrades to doing nothing until the
//! situation improves.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

pub mod logging;
pub mod systemd;

use std::sync::Arc;

use tracing::{debug, error, info};

use cracklink_core::{MatchNotifier, ObjectBus, ObservedAp, PluginConfig};

use crate::systemd::SystemdUnit;

/// The systemd unit backing the platform Bluetooth stack.
const BLUETOOTH_UNIT: &str = "bluetooth";

/// View of the host agent a scan tick consumes: the currently observed
/// access points, in the host's order.
pub trait HostAgent {
    /// Access points visible on the channel the host just switched to.
    fn access_points(&self) -> Vec<ObservedAp>;
}

/// One cracklink plugin instance.
pub struct Plugin {
    config: Option<PluginConfig>,
    notifier: Option<MatchNotifier>,
    bus_override: Option<Arc<dyn ObjectBus>>,
    bluetooth_unit: SystemdUnit,
}

impl Plugin {
    /// A plugin that builds its Bluetooth backend from configuration at
    /// ready time.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: None,
            notifier: None,
            bus_override: None,
            bluetooth_unit: SystemdUnit::new(BLUETOOTH_UNIT),
        }
    }

    /// A plugin bound to a caller-supplied bus backend instead of the
    /// configured one. Used by tests and embedders with their own
    /// transport.
    #[must_use]
    pub fn with_bus(bus: Arc<dyn ObjectBus>) -> Self {
        Self {
            bus_override: Some(bus),
            ..Self::new()
        }
    }

    /// Whether the plugin loaded its credential index and is matching.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.notifier.as_ref().is_some_and(MatchNotifier::is_ready)
    }

    /// Re-read the plugin's namespace from the host's configuration
    /// tree. A missing or invalid `target_mac_address` is logged once
    /// and leaves the plugin inert until reconfigured.
    pub fn on_config_changed(&mut self, config: &toml::Value) {
        match PluginConfig::from_namespace(config) {
            Ok(config) => {
                info!(target = %config.target_address(), "notifying peer on match");
                self.config = Some(config);
            }
            Err(err) => {
                error!(%err, "plugin disabled");
                self.config = None;
            }
        }
    }

    /// Enter the ready state: ensure the Bluetooth service is up
    /// (best-effort), build the backend selected by configuration, and
    /// load the credential index.
    pub async fn on_ready(&mut self) {
        let Some(config) = self.config.clone() else {
            debug!("no valid configuration; staying inert");
            return;
        };

        let bus = match &self.bus_override {
            Some(bus) => Arc::clone(bus),
            None => {
                if let Err(err) = self.bluetooth_unit.ensure_active().await {
                    // Not fatal: the adapter probe reports the real state.
                    debug!(%err, "could not supervise the bluetooth service");
                }
                match backend_for(&config).await {
                    Ok(bus) => bus,
                    Err(err) => {
                        error!(%err, "Bluetooth backend unavailable");
                        return;
                    }
                }
            }
        };

        let mut notifier = MatchNotifier::new(config, bus);
        notifier.on_ready().await;
        self.notifier = Some(notifier);
    }

    /// One scan tick: match the host's observed access points against
    /// the credential index and notify the peer on the first hit.
    pub async fn on_channel_switch(&mut self, agent: &impl HostAgent, channel: u8) {
        debug!(channel, "channel switch");
        if let Some(notifier) = &mut self.notifier {
            notifier.on_scan_tick(&agent.access_points()).await;
        }
    }

    /// Tear the session down and leave the ready state. Guaranteed to
    /// run cleanly on host shutdown; disconnect errors are logged, not
    /// propagated.
    pub async fn on_unload(&mut self) {
        if let Some(notifier) = &mut self.notifier {
            notifier.on_unload().await;
        }
        self.notifier = None;
        info!("plugin unloaded");
    }
}

impl Default for Plugin {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the bus backend selected by `config.transport`.
#[cfg(feature = "bluetooth")]
async fn backend_for(config: &PluginConfig) -> cracklink_core::Result<Arc<dyn ObjectBus>> {
    use cracklink_core::{BluezBus, RfcommBus, TransportKind};

    match config.transport {
        TransportKind::Bluez => Ok(Arc::new(BluezBus::new(config.bluetooth_port).await?)),
        TransportKind::Rfcomm => Ok(Arc::new(RfcommBus::new(config.bluetooth_port))),
    }
}

#[cfg(not(feature = "bluetooth"))]
async fn backend_for(_config: &PluginConfig) -> cracklink_core::Result<Arc<dyn ObjectBus>> {
    Err(cracklink_core::Error::Transport(
        "built without the bluetooth feature; supply a bus via Plugin::with_bus".into(),
    ))
}
