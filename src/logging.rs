use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "pixelprompt=info,pixelprompt_core=info";

/// Route tracing output to a log file; the terminal belongs to the UI.
///
/// `RUST_LOG` overrides the default filter. Returns the log file path.
pub fn init() -> Result<PathBuf> {
    let log_dir = dirs::cache_dir()
        .ok_or_else(|| anyhow!("Could not determine cache directory"))?
        .join("pixelprompt");
    fs::create_dir_all(&log_dir)?;

    let log_path = log_dir.join("pixelprompt.log");
    let file = OpenOptions::new().create(true).append(true).open(&log_path)?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false),
        )
        .try_init()?;

    Ok(log_path)
}
