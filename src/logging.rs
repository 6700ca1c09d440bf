/*!
 * Logging and tracing initialization
 */

use std::fs::File;
use std::path::Path;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::LoggingConfig;
use crate::error::{BrowserError, Result};

/// Initialize structured logging based on configuration
///
/// `RUST_LOG` wins over the configured level when set.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let log_level = if config.verbose {
        Level::DEBUG
    } else {
        config.level.to_tracing_level()
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("s3nav={}", log_level)))
        .map_err(|e| BrowserError::Config(format!("Failed to create log filter: {}", e)))?;

    if let Some(ref log_path) = config.file {
        init_file_logging(log_path, env_filter)?;
    } else {
        init_stderr_logging(env_filter);
    }

    Ok(())
}

/// Log to stderr so listings on stdout stay clean
fn init_stderr_logging(env_filter: EnvFilter) {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_span_events(FmtSpan::NONE)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

/// JSON lines to a file
fn init_file_logging(log_path: &Path, env_filter: EnvFilter) -> Result<()> {
    let file = File::create(log_path)
        .map_err(|e| BrowserError::Config(format!("Failed to create log file: {}", e)))?;

    let fmt_layer = fmt::layer()
        .with_writer(file)
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(false)
        .json();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    Ok(())
}

/// Initialize logging for tests; safe to call from every test
pub fn init_test_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("s3nav=debug"));

        let fmt_layer = fmt::layer().with_test_writer().with_target(false).compact();

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .ok();
    });
}
