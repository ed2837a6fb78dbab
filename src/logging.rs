use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Installs the global subscriber. `level` wins over `RUST_LOG`, which wins over `default_level`.
pub fn init_logging(level: Option<&str>, default_level: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = match level {
        Some(l) => EnvFilter::try_new(l).with_context(|| format!("invalid log level: {l}"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
    };

    match log_file {
        Some(path) => {
            let file = Arc::new(
                std::fs::File::create(path)
                    .with_context(|| format!("create log file: {}", path.display()))?,
            );
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true)
                .with_writer(file)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        None => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    info!("logging initialized");
    Ok(())
}
