//! Cracked-credentials index.
//!
//! wpa-sec publishes cracked handshakes as a "potfile": one record per
//! line, colon-delimited `hash:bssid:ssid:password`. Only the BSSID and
//! SSID matter here; they are folded into two membership sets so that a
//! scan tick can test every observed access point in O(1).

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};

/// An access point observed by the host agent during a scan tick.
///
/// Read-only input: the host owns the scan results, this crate only
/// matches against them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedAp {
    /// Hardware address of the access point.
    pub mac: String,
    /// Advertised network name.
    pub hostname: String,
}

impl ObservedAp {
    /// Convenience constructor.
    pub fn new(mac: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            mac: mac.into(),
            hostname: hostname.into(),
        }
    }
}

/// Membership index over the cracked-credentials file.
///
/// Built once per ready cycle and immutable afterwards; a changed
/// potfile is only picked up by the next ready cycle.
#[derive(Debug, Default)]
pub struct CredentialIndex {
    bssids: HashSet<String>,
    ssids: HashSet<String>,
}

impl CredentialIndex {
    /// Parse the potfile at `path` into a new index.
    ///
    /// Lines with fewer than three colon-delimited fields are skipped;
    /// partial or malformed content never aborts the build. BSSIDs are
    /// lowercased and SSIDs trimmed on the way in.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PotfileNotFound`] when the file does not exist.
    pub fn build(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::PotfileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let mut index = Self::default();
        for line in content.lines() {
            let Some((bssid, ssid)) = parse_line(line) else {
                if !line.is_empty() {
                    debug!(line, "skipping malformed potfile line");
                }
                continue;
            };
            index.bssids.insert(bssid.to_ascii_lowercase());
            index.ssids.insert(ssid.trim().to_owned());
        }
        Ok(index)
    }

    /// Returns `true` if the access point's BSSID or SSID appears in the
    /// index. Case-insensitive on the MAC, whitespace-insensitive on the
    /// SSID.
    #[must_use]
    pub fn matches(&self, ap: &ObservedAp) -> bool {
        self.bssids.contains(&ap.mac.to_ascii_lowercase()) || self.ssids.contains(ap.hostname.trim())
    }

    /// Number of distinct cracked BSSIDs indexed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bssids.len()
    }

    /// Returns `true` if the potfile held no well-formed record.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bssids.is_empty() && self.ssids.is_empty()
    }
}

/// Split one potfile line into `(bssid, ssid)`.
///
/// A record needs at least three fields. Some producers write the BSSID
/// in colon notation, which spreads it over six split fields; that shape
/// is re-joined so `hash:AA:BB:CC:DD:EE:FF:ssid:pw` indexes the whole
/// hardware address, not its first octet.
fn parse_line(line: &str) -> Option<(String, &str)> {
    let fields: Vec<&str> = line.split(':').collect();
    if fields.len() < 3 {
        return None;
    }
    if fields.len() >= 8 && fields[1..7].iter().all(|f| is_hex_octet(f)) {
        Some((fields[1..7].join(":"), fields[7]))
    } else {
        Some((fields[1].to_owned(), fields[2]))
    }
}

fn is_hex_octet(field: &str) -> bool {
    field.len() == 2 && field.bytes().all(|b| b.is_ascii_hexdigit())
}
