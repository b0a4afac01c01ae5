use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

/// Route tracing output to `log_path`; the terminal belongs to the TUI.
///
/// `RUST_LOG` wins over `default_level` when set.
pub fn init(log_path: &Path, default_level: &str) -> std::io::Result<()> {
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::Registry::default().with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(Mutex::new(file))
            .with_ansi(false),
    );

    tracing::subscriber::set_global_default(subscriber).map_err(std::io::Error::other)?;
    tracing::info!(path = %log_path.display(), "logging initialised");
    Ok(())
}
