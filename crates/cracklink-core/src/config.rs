//! Plugin configuration.
//!
//! cracklink is configured through the host agent's TOML tree, under the
//! `main.plugins.cracklink` namespace:
//!
//! ```toml
//! [main.plugins.cracklink]
//! target_mac_address = "AA:BB:CC:DD:EE:FF"   # required
//! potfile_path = "/root/handshakes/wpa-sec.cracked.potfile"
//! adapter = "hci0"
//! transport = "bluez"                        # or "rfcomm"
//! bluetooth_port = 1
//! require_pairing = false
//! discovery_timeout = 15
//! ```
//!
//! Only `target_mac_address` is required; without it the plugin stays
//! inert. Everything else has a default.

use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Default location of the wpa-sec cracked-credentials file.
pub const DEFAULT_POTFILE_PATH: &str = "/root/handshakes/wpa-sec.cracked.potfile";

/// Default RFCOMM channel for notification delivery.
pub const DEFAULT_BLUETOOTH_PORT: u8 = 1;

/// Default discovery countdown, in polls.
pub const DEFAULT_DISCOVERY_TIMEOUT: u32 = 15;

/// Which Bluetooth backend drives the notification link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// BlueZ managed objects over D-Bus (discovery, pairing, connect),
    /// delivery over an RFCOMM stream.
    #[default]
    Bluez,
    /// Raw RFCOMM socket: no discovery or pairing, just connect and write.
    Rfcomm,
}

/// Configuration for one cracklink plugin instance.
#[derive(Debug, Clone, Deserialize)]
pub struct PluginConfig {
    /// Bluetooth MAC address of the peer to notify. Required.
    pub target_mac_address: String,

    /// Path to the cracked-credentials file.
    #[serde(default = "default_potfile_path")]
    pub potfile_path: PathBuf,

    /// Optional adapter name or address pattern, e.g. `hci0`. When unset
    /// every adapter on the bus is eligible.
    #[serde(default)]
    pub adapter: Option<String>,

    /// Bluetooth backend selection.
    #[serde(default)]
    pub transport: TransportKind,

    /// RFCOMM channel used for notification delivery.
    #[serde(default = "default_bluetooth_port")]
    pub bluetooth_port: u8,

    /// When true, a failed pair attempt aborts the tick before
    /// connect/send. When false (default, the observed behavior), the
    /// flow proceeds and relies on the transport accepting delivery
    /// without bonding.
    #[serde(default)]
    pub require_pairing: bool,

    /// Discovery countdown in polls; the poll loop runs `timeout + 1`
    /// lookups, one per tick.
    #[serde(default = "default_discovery_timeout")]
    pub discovery_timeout: u32,
}

fn default_potfile_path() -> PathBuf {
    PathBuf::from(DEFAULT_POTFILE_PATH)
}

const fn default_bluetooth_port() -> u8 {
    DEFAULT_BLUETOOTH_PORT
}

const fn default_discovery_timeout() -> u32 {
    DEFAULT_DISCOVERY_TIMEOUT
}

impl PluginConfig {
    /// Extract and validate the plugin's namespace from the host's full
    /// configuration tree.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingTargetAddress`] when the namespace or the
    /// `target_mac_address` key is absent, [`Error::InvalidTargetAddress`]
    /// when the address does not look like a MAC, and
    /// [`Error::ConfigParse`] when the namespace cannot be deserialized.
    pub fn from_namespace(root: &toml::Value) -> Result<Self> {
        let namespace = root
            .get("main")
            .and_then(|v| v.get("plugins"))
            .and_then(|v| v.get("cracklink"))
            .ok_or(Error::MissingTargetAddress)?;

        if namespace.get("target_mac_address").is_none() {
            return Err(Error::MissingTargetAddress);
        }

        let config: Self = namespace
            .clone()
            .try_into()
            .map_err(|err: toml::de::Error| Error::ConfigParse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate field contents beyond what deserialization enforces.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTargetAddress`] when the target MAC does
    /// not parse.
    pub fn validate(&self) -> Result<()> {
        if !is_valid_mac_address(&self.target_mac_address) {
            return Err(Error::InvalidTargetAddress {
                address: self.target_mac_address.clone(),
            });
        }
        Ok(())
    }

    /// The target address in the canonical uppercase form used by the
    /// bus layer.
    #[must_use]
    pub fn target_address(&self) -> String {
        normalize_mac(&self.target_mac_address)
    }
}

static MAC_ADDRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9A-Fa-f]{2}(:[0-9A-Fa-f]{2}){5}$").expect("MAC regex is valid")
});

/// Returns `true` if `address` is six colon-separated hex octets.
#[must_use]
pub fn is_valid_mac_address(address: &str) -> bool {
    MAC_ADDRESS_RE.is_match(address)
}

/// Canonical uppercase form of a MAC address.
#[must_use]
pub fn normalize_mac(address: &str) -> String {
    address.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host_tree(plugin_table: &str) -> toml::Value {
        let doc = format!("[main.plugins.cracklink]\n{plugin_table}");
        doc.parse().expect("test TOML parses")
    }

    #[test]
    fn minimal_namespace_uses_defaults() {
        let root = host_tree(r#"target_mac_address = "AA:BB:CC:DD:EE:FF""#);
        let config = PluginConfig::from_namespace(&root).unwrap();

        assert_eq!(config.target_mac_address, "AA:BB:CC:DD:EE:FF");
        assert_eq!(config.potfile_path, PathBuf::from(DEFAULT_POTFILE_PATH));
        assert_eq!(config.adapter, None);
        assert_eq!(config.transport, TransportKind::Bluez);
        assert_eq!(config.bluetooth_port, DEFAULT_BLUETOOTH_PORT);
        assert!(!config.require_pairing);
        assert_eq!(config.discovery_timeout, DEFAULT_DISCOVERY_TIMEOUT);
    }

    #[test]
    fn full_namespace_overrides_defaults() {
        let root = host_tree(
            r#"
            target_mac_address = "aa:bb:cc:dd:ee:ff"
            potfile_path = "/tmp/cracked.potfile"
            adapter = "hci1"
            transport = "rfcomm"
            bluetooth_port = 3
            require_pairing = true
            discovery_timeout = 0
            "#,
        );
        let config = PluginConfig::from_namespace(&root).unwrap();

        assert_eq!(config.potfile_path, PathBuf::from("/tmp/cracked.potfile"));
        assert_eq!(config.adapter.as_deref(), Some("hci1"));
        assert_eq!(config.transport, TransportKind::Rfcomm);
        assert_eq!(config.bluetooth_port, 3);
        assert!(config.require_pairing);
        assert_eq!(config.discovery_timeout, 0);
    }

    #[test]
    fn missing_namespace_is_missing_target() {
        let root: toml::Value = "[main.plugins.other]\nx = 1".parse().unwrap();
        let err = PluginConfig::from_namespace(&root).unwrap_err();
        assert!(matches!(err, Error::MissingTargetAddress));
    }

    #[test]
    fn missing_target_key_is_missing_target() {
        let root = host_tree(r#"bluetooth_port = 2"#);
        let err = PluginConfig::from_namespace(&root).unwrap_err();
        assert!(matches!(err, Error::MissingTargetAddress));
    }

    #[test]
    fn malformed_target_is_invalid() {
        let root = host_tree(r#"target_mac_address = "not-a-mac""#);
        let err = PluginConfig::from_namespace(&root).unwrap_err();
        assert!(matches!(err, Error::InvalidTargetAddress { .. }));
    }

    #[test]
    fn unparseable_namespace_is_config_parse() {
        let root = host_tree(
            r#"
            target_mac_address = "AA:BB:CC:DD:EE:FF"
            bluetooth_port = "one"
            "#,
        );
        let err = PluginConfig::from_namespace(&root).unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }

    #[test]
    fn mac_validation() {
        assert!(is_valid_mac_address("AA:BB:CC:DD:EE:FF"));
        assert!(is_valid_mac_address("aa:bb:cc:dd:ee:ff"));
        assert!(is_valid_mac_address("00:11:22:33:44:55"));

        assert!(!is_valid_mac_address(""));
        assert!(!is_valid_mac_address("AA:BB:CC:DD:EE"));
        assert!(!is_valid_mac_address("AA:BB:CC:DD:EE:FF:00"));
        assert!(!is_valid_mac_address("AA-BB-CC-DD-EE-FF"));
        assert!(!is_valid_mac_address("GG:BB:CC:DD:EE:FF"));
    }

    #[test]
    fn target_address_is_normalized_uppercase() {
        let root = host_tree(r#"target_mac_address = "aa:bb:cc:dd:ee:ff""#);
        let config = PluginConfig::from_namespace(&root).unwrap();
        assert_eq!(config.target_address(), "AA:BB:CC:DD:EE:FF");
    }
}
