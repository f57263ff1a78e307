//! Tracing subscriber setup
//!
//! Embedding applications call [`init_logging`] once at startup. `RUST_LOG`
//! wins over the configured filter.

use crate::config::LoggingSettings;
use crate::error::{FlowError, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log file name prefix inside `log_dir`
pub const LOG_FILE_PREFIX: &str = "operator-flow.log";

/// Build the filter from `RUST_LOG`, falling back to `settings.filter`.
pub fn build_filter(settings: &LoggingSettings) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&settings.filter)
            .map_err(|e| FlowError::Logging(format!("Invalid filter '{}': {}", settings.filter, e))),
    }
}

/// Install the global subscriber.
///
/// When `log_dir` is set, a daily-rolling file layer is added and the
/// returned guard must be kept alive to flush it.
pub fn init_logging(settings: &LoggingSettings) -> Result<Option<WorkerGuard>> {
    let filter = build_filter(settings)?;

    match &settings.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);

            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .try_init()
                .map_err(|e| FlowError::Logging(e.to_string()))?;

            tracing::info!("Logging to {}", dir.display());
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .try_init()
                .map_err(|e| FlowError::Logging(e.to_string()))?;
            Ok(None)
        }
    }
}
