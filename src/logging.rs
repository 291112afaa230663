use std::fs::OpenOptions;
use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::AppPaths;
use crate::errors::Result;

pub const LOG_ENV: &str = "POSTCAL_LOG";

/// Installs the global subscriber: stderr plus an appended log file in the data dir.
pub fn init(paths: &AppPaths) -> Result<()> {
    std::fs::create_dir_all(&paths.base_dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.log_file)?;

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = fmt::layer()
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .with_target(true);

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init();

    tracing::debug!(log_file = %paths.log_file.display(), "logging initialized");
    Ok(())
}
