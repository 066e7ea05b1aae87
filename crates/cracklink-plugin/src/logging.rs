//! Logging bootstrap for hosts embedding the plugin.
//!
//! The plugin itself only emits `tracing` events; installing a
//! subscriber is the embedder's call. This module offers the two
//! setups used on the reference deployment:
//!
//! - **Production**: JSON logs to daily-rolling files under
//!   `/var/log/cracklink` plus compact non-ANSI stdout for the journal.
//! - **Development**: pretty stdout only.
//!
//! The filter honors `RUST_LOG`, falling back to `CRACKLINK_LOG_LEVEL`
//! and then to `info`.

use std::path::Path;
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Directory production log files roll under.
const LOG_DIR: &str = "/var/log/cracklink";

// Non-blocking writers stop flushing once their guard drops; the guards
// live here for the life of the process.
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();
static STDOUT_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global subscriber.
///
/// # Errors
///
/// Returns an error when the level filter cannot be parsed or a
/// subscriber is already installed.
pub fn init(production: bool) -> anyhow::Result<()> {
    let fallback = std::env::var("CRACKLINK_LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&fallback))?;

    if production {
        init_production(filter)
    } else {
        init_development(filter)
    }
}

fn init_production(filter: EnvFilter) -> anyhow::Result<()> {
    let log_dir = Path::new(LOG_DIR);
    if !log_dir.exists() {
        std::fs::create_dir_all(log_dir).ok();
    }

    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "cracklink");
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);
    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());

    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(file_writer)
        .with_target(true);

    let stdout_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(stdout_writer)
        .with_target(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stdout_layer)
        .try_init()?;

    let _ = FILE_GUARD.set(file_guard);
    let _ = STDOUT_GUARD.set(stdout_guard);

    Ok(())
}

fn init_development(filter: EnvFilter) -> anyhow::Result<()> {
    let stdout_layer = tracing_subscriber::fmt::layer()
        .pretty()
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .try_init()?;

    Ok(())
}
