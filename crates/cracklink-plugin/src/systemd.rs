//! Supervision of the platform Bluetooth service.
//!
//! The BlueZ backend needs `bluetoothd` running; on the reference
//! deployment that is the `bluetooth` systemd unit. [`SystemdUnit`]
//! wraps the few `systemctl` invocations the plugin needs. All use is
//! best-effort: a host without systemd just logs a warning and the
//! adapter probe surfaces the real state.

use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tracing::{debug, info};

/// Handle to one systemd unit, addressed by name.
#[derive(Debug, Clone)]
pub struct SystemdUnit {
    name: String,
}

impl SystemdUnit {
    /// Wrapper for the named unit, e.g. `bluetooth`.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Unit name this wrapper addresses.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the unit is currently active.
    ///
    /// # Errors
    ///
    /// Fails when `systemctl` cannot be spawned at all; a cleanly
    /// inactive unit is `Ok(false)`.
    pub async fn is_active(&self) -> Result<bool> {
        let status = Command::new("systemctl")
            .arg("is-active")
            .arg("--quiet")
            .arg(&self.name)
            .status()
            .await
            .context("failed to run systemctl is-active")?;
        Ok(status.success())
    }

    /// Start the unit.
    ///
    /// # Errors
    ///
    /// Fails when `systemctl` cannot be spawned or reports a non-zero
    /// exit, with stderr folded into the error message.
    pub async fn start(&self) -> Result<()> {
        let output = Command::new("systemctl")
            .arg("start")
            .arg(&self.name)
            .output()
            .await
            .context("failed to run systemctl start")?;
        if !output.status.success() {
            bail!(
                "systemctl start {} failed: {}",
                self.name,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }

    /// Start the unit unless it is already active.
    ///
    /// # Errors
    ///
    /// Propagates failures from [`Self::is_active`] and [`Self::start`].
    pub async fn ensure_active(&self) -> Result<()> {
        if self.is_active().await? {
            debug!(unit = %self.name, "service already active");
        } else {
            info!(unit = %self.name, "starting service");
            self.start().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_keeps_its_name() {
        let unit = SystemdUnit::new("bluetooth");
        assert_eq!(unit.name(), "bluetooth");
    }
}
