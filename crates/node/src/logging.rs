use std::path::Path;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::NodeError;

/// Installs the global subscriber: console output, plus a daily rolling
/// `custodian.log` under `log_dir` when one is given. `RUST_LOG` overrides
/// the default `info` filter.
pub fn init_logging(log_dir: Option<&Path>) -> Result<(), NodeError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    let console_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .with_target(false);

    if let Some(log_dir) = log_dir {
        if !log_dir.exists() {
            std::fs::create_dir_all(log_dir)?;
        }

        let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "custodian.log");
        let file_layer = fmt::layer()
            .with_writer(file_appender)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true);

        registry
            .with(file_layer)
            .with(console_layer)
            .try_init()
            .map_err(|e| NodeError::Error(format!("Failed to initialize logging: {e}")))?;
        tracing::info!("Logging initialized with file output: {}", log_dir.display());
    } else {
        registry
            .with(console_layer)
            .try_init()
            .map_err(|e| NodeError::Error(format!("Failed to initialize logging: {e}")))?;
        tracing::info!("Logging initialized with console output only");
    }

    Ok(())
}
