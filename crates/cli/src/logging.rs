//! Log setup: human-readable events on stderr, optionally mirrored without
//! colours into a per-run file.
//!
//! `RUST_LOG` overrides the default `info` filter.

use anyhow::Context;
use chrono::Local;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Default run log: `injection_{dryrun|real}_{YYYYmmdd_HHMMSS}.txt` in `dir`.
pub fn default_log_path(dir: &Path, simulate: bool) -> PathBuf {
    let mode = if simulate { "dryrun" } else { "real" };
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    dir.join(format!("injection_{mode}_{stamp}.txt"))
}

/// Installs the global subscriber. With `log_file`, every event is also
/// written to that file.
///
/// # Errors
/// Fails when the log file cannot be created.
pub fn init(log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let terminal = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    let file = match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create run log {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(terminal)
        .with(file)
        .try_init()?;
    Ok(())
}
