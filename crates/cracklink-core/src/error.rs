//! Unified error types for the cracklink core library.
//!
//! A single [`Error`] enum covers every failure mode of the plugin. The
//! important split is operational severity, not module of origin:
//!
//! - **Configuration errors** leave the plugin inert until reconfigured.
//! - **Readiness errors** (missing potfile) are retried only via a new
//!   ready cycle.
//! - **Transport errors** abort the current scan tick and are retried on
//!   the next one.
//! - **Expected conditions** (discovery timeout) are logged at debug.
//!
//! Nothing above the Bluetooth session boundary is allowed to panic or
//! escape uncaught: the worst outcome of any single tick is "no
//! notification delivered, try again next tick".

use std::path::PathBuf;
use thiserror::Error;

/// The unified error type for all cracklink operations.
#[derive(Debug, Error)]
pub enum Error {
    // =========================================================================
    // CONFIGURATION ERRORS
    // =========================================================================
    /// No target MAC address was configured. The plugin stays inert
    /// until it is reconfigured.
    #[error("no target_mac_address configured; plugin stays disabled")]
    MissingTargetAddress,

    /// The configured target MAC address is not a valid Bluetooth address.
    #[error("invalid target_mac_address '{address}'; expected colon-separated hex octets")]
    InvalidTargetAddress {
        /// The rejected address string.
        address: String,
    },

    /// The plugin's configuration namespace exists but could not be parsed.
    #[error("failed to parse plugin configuration: {0}")]
    ConfigParse(String),

    // =========================================================================
    // READINESS ERRORS
    // =========================================================================
    /// The cracked-credentials file does not exist.
    #[error("cracked-credentials file not found at: {}", .0.display())]
    PotfileNotFound(PathBuf),

    // =========================================================================
    // BLUETOOTH ERRORS
    // =========================================================================
    /// The object bus listed zero adapters (matching the configured
    /// pattern, if any).
    #[error("no Bluetooth adapter found on the bus")]
    AdapterNotFound,

    /// The peer device did not appear in the managed-object set within
    /// the discovery countdown. Expected whenever the peer is not
    /// advertising; retried on the next scan tick.
    #[error("peer did not appear within {ticks} discovery polls")]
    DiscoveryTimeout {
        /// Countdown the poll loop started from.
        ticks: u32,
    },

    /// Pairing with the peer failed. Recoverable; depending on policy
    /// the flow may still proceed to connect and send.
    #[error("pairing with {address} failed: {reason}")]
    PairingFailed {
        /// Peer address the pair request targeted.
        address: String,
        /// Failure reason reported by the transport.
        reason: String,
    },

    /// Delivering the notification failed. The tick is aborted; there
    /// is no automatic retry within the same tick.
    #[error("failed to send notification: {0}")]
    SendFailed(String),

    /// Any other transport-level bus failure.
    #[error("Bluetooth transport error: {0}")]
    Transport(String),

    // =========================================================================
    // I/O ERRORS
    // =========================================================================
    /// A low-level I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized [`Result`] type for cracklink operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns `true` if this error leaves the plugin inert until it is
    /// reconfigured.
    #[inline]
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::MissingTargetAddress | Self::InvalidTargetAddress { .. } | Self::ConfigParse(_)
        )
    }

    /// Returns `true` if this error is an expected operational condition
    /// rather than a failure, and should be logged at debug level.
    #[inline]
    #[must_use]
    pub const fn is_expected(&self) -> bool {
        matches!(self, Self::DiscoveryTimeout { .. })
    }

    /// Returns `true` if the next scan tick may succeed without any
    /// operator intervention.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::AdapterNotFound
                | Self::DiscoveryTimeout { .. }
                | Self::PairingFailed { .. }
                | Self::SendFailed(_)
                | Self::Transport(_)
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_are_classified() {
        assert!(Error::MissingTargetAddress.is_config_error());
        assert!(Error::InvalidTargetAddress {
            address: "nope".into()
        }
        .is_config_error());
        assert!(Error::ConfigParse("bad toml".into()).is_config_error());

        assert!(!Error::AdapterNotFound.is_config_error());
        assert!(!Error::PotfileNotFound(PathBuf::from("/x")).is_config_error());
    }

    #[test]
    fn discovery_timeout_is_expected_and_recoverable() {
        let err = Error::DiscoveryTimeout { ticks: 15 };
        assert!(err.is_expected());
        assert!(err.is_recoverable());
    }

    #[test]
    fn transport_errors_are_recoverable_but_not_expected() {
        for err in [
            Error::AdapterNotFound,
            Error::PairingFailed {
                address: "AA:BB:CC:DD:EE:FF".into(),
                reason: "refused".into(),
            },
            Error::SendFailed("stream closed".into()),
            Error::Transport("bus unreachable".into()),
        ] {
            assert!(err.is_recoverable(), "{err} should be recoverable");
            assert!(!err.is_expected(), "{err} should not be expected");
        }
    }

    #[test]
    fn readiness_errors_are_not_recoverable_within_a_tick() {
        let err = Error::PotfileNotFound(PathBuf::from("/root/handshakes/missing"));
        assert!(!err.is_recoverable());
        assert!(!err.is_config_error());
    }

    #[test]
    fn display_messages_carry_context() {
        let err = Error::PairingFailed {
            address: "AA:BB:CC:DD:EE:FF".into(),
            reason: "authentication canceled".into(),
        };
        let text = err.to_string();
        assert!(text.contains("AA:BB:CC:DD:EE:FF"));
        assert!(text.contains("authentication canceled"));

        let err = Error::PotfileNotFound(PathBuf::from("/root/handshakes/wpa-sec.cracked.potfile"));
        assert!(err.to_string().contains("wpa-sec.cracked.potfile"));
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
