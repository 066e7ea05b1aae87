//! Match-and-notify orchestration.
//!
//! [`MatchNotifier`] ties the pieces together: it owns the credential
//! index and the one Bluetooth session, consults the index on every
//! scan tick against the host-supplied access points, and on the first
//! match drives the session through discovery, pairing, connection, and
//! delivery. At most one notification attempt is made per tick, and no
//! failure ever escapes the tick handler — the worst case is "no
//! notification, try again next tick".

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::bus::{ObjectBus, PairOutcome};
use crate::config::PluginConfig;
use crate::error::{Error, Result};
use crate::potfile::{CredentialIndex, ObservedAp};
use crate::session::BluetoothSession;

/// Orchestrates credential matching and peer notification.
pub struct MatchNotifier {
    config: PluginConfig,
    session: BluetoothSession,
    index: Option<CredentialIndex>,
    ready: bool,
}

impl MatchNotifier {
    /// Build a notifier over the given bus backend.
    #[must_use]
    pub fn new(config: PluginConfig, bus: Arc<dyn ObjectBus>) -> Self {
        let session = BluetoothSession::new(
            bus,
            config.target_address(),
            config.adapter.clone(),
            config.discovery_timeout,
        );
        Self {
            config,
            session,
            index: None,
            ready: false,
        }
    }

    /// Whether the credential index was loaded.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.ready
    }

    /// Override the session's discovery poll interval.
    pub fn set_poll_interval(&mut self, interval: Duration) {
        self.session.set_poll_interval(interval);
    }

    /// Enter the ready state: (re)build the credential index and probe
    /// adapter availability once.
    ///
    /// A missing potfile is an operational error, not a programming
    /// error: it is logged and the notifier simply stays not-ready until
    /// the next ready cycle. The adapter probe likewise only logs —
    /// scan ticks retry adapter acquisition on their own.
    pub async fn on_ready(&mut self) {
        match CredentialIndex::build(&self.config.potfile_path) {
            Ok(index) => {
                info!(
                    networks = index.len(),
                    path = %self.config.potfile_path.display(),
                    "cracked-network index loaded"
                );
                self.index = Some(index);
                self.ready = true;
            }
            Err(err) => {
                error!(%err, "plugin not ready");
                self.index = None;
                self.ready = false;
                return;
            }
        }

        if let Err(err) = self.session.power_on().await {
            error!(%err, "Bluetooth adapter unavailable");
        }
    }

    /// Handle one scan tick with the host's currently observed access
    /// points. First match wins; ticks without a match (or before
    /// readiness) have no side effects.
    pub async fn on_scan_tick(&mut self, aps: &[ObservedAp]) {
        if !self.ready {
            return;
        }
        let Some(index) = &self.index else {
            return;
        };
        let Some(ap) = aps.iter().find(|ap| index.matches(ap)) else {
            return;
        };

        let ssid = ap.hostname.trim().to_owned();
        let bssid = ap.mac.to_ascii_lowercase();
        info!(%ssid, %bssid, "matching network in range");

        if let Err(err) = self.notify(&ssid, &bssid).await {
            if err.is_expected() {
                debug!(%err, "no notification this tick");
            } else {
                warn!(%err, "notification failed this tick");
            }
        }
    }

    async fn notify(&mut self, ssid: &str, bssid: &str) -> Result<()> {
        self.session.power_on().await?;

        if self.session.wait_for_device().await?.is_none() {
            return Err(Error::DiscoveryTimeout {
                ticks: self.config.discovery_timeout,
            });
        }

        if !self.session.is_paired().await? {
            if let PairOutcome::Failed(reason) = self.session.pair().await {
                if self.config.require_pairing {
                    return Err(Error::PairingFailed {
                        address: self.session.peer().to_owned(),
                        reason,
                    });
                }
                // Policy default: proceed unbonded; some transports
                // accept delivery without pairing.
            }
        }

        self.session.connect().await?;

        let message = format!("Matching network found! SSID: {ssid}, BSSID: {bssid}");
        self.session.send_message(&message).await
    }

    /// Tear the session down and leave the ready state. Never fails;
    /// disconnect errors are logged inside the session.
    pub async fn on_unload(&mut self) {
        self.session.teardown().await;
        self.ready = false;
        info!("notifier unloaded");
    }
}
