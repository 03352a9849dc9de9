//! Log setup. The interactive UI owns the terminal, so it logs to a file;
//! headless runs log to stderr.

use anyhow::{Context, Result};
use std::{fs::OpenOptions, path::PathBuf, sync::Mutex};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub enum LogSink {
    File(PathBuf),
    Stderr,
}

/// `RUST_LOG` wins over `default_level` when set.
pub fn init(sink: LogSink, default_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .context("invalid log filter")?;

    let registry = tracing_subscriber::registry().with(filter);
    match sink {
        LogSink::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            registry
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .try_init()
                .context("installing log subscriber")?;
        }
        LogSink::Stderr => {
            registry
                .with(fmt::layer().with_writer(std::io::stderr))
                .try_init()
                .context("installing log subscriber")?;
        }
    }
    Ok(())
}
