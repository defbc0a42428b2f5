//! Logging configuration with file-based output and size-based rotation.
//!
//! Writes logs to `albrt.log` beside the executable with 10 MB size-based
//! rotation. Set `DEBUG_LOGGING=1` to enable debug output for albrt crates;
//! an explicit level (from `--log-level`) overrides both.

use std::path::Path;

use rolling_file::{BasicRollingFileAppender, RollingConditionBasic};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub const LOG_FILE_NAME: &str = "albrt.log";

const DEBUG_DIRECTIVE: &str = "info,albrt=debug,albrt_core=debug,albrt_overlay=debug";

/// Pick the filter directive: explicit level, then `DEBUG_LOGGING`, then info
pub fn filter_directive(level: Option<&str>, debug_logging: bool) -> String {
    match level {
        Some(level) => level.to_string(),
        None if debug_logging => DEBUG_DIRECTIVE.to_string(),
        None => "info".to_string(),
    }
}

/// Initialize logging with dual-output (file + stdout).
///
/// Returns a `WorkerGuard` that MUST be held for the application lifetime
/// to ensure all buffered logs are flushed on shutdown.
///
/// # Fallback
/// If the log file cannot be created, returns `None` and falls back to
/// stdout-only logging.
pub fn init(log_dir: &Path, level: Option<&str>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let debug_logging = std::env::var("DEBUG_LOGGING").is_ok();
    let directive = filter_directive(level, debug_logging);

    if let Err(e) = std::fs::create_dir_all(log_dir) {
        // Can't use tracing yet since subscriber not initialized
        eprintln!("Failed to create log directory {log_dir:?}: {e}, using stdout only");
        init_stdout_only(&directive);
        return None;
    }

    // Size-based rolling file appender (10 MB, keep 1 rotated file)
    let log_path = log_dir.join(LOG_FILE_NAME);
    let file_appender = match BasicRollingFileAppender::new(
        &log_path,
        RollingConditionBasic::new().max_size(10 * 1024 * 1024),
        1,
    ) {
        Ok(appender) => appender,
        Err(e) => {
            eprintln!("Failed to create log file at {log_path:?}: {e}");
            init_stdout_only(&directive);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_span_events(FmtSpan::NONE);

    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_span_events(FmtSpan::NONE);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stdout_layer)
        .with(EnvFilter::new(&directive))
        .init();

    tracing::info!(log_file = ?log_path, debug_logging, "ALBRT logging initialized");

    Some(guard)
}

/// Fallback: Initialize stdout-only logging when file logging fails.
pub fn init_stdout_only(directive: &str) {
    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_span_events(FmtSpan::NONE);

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(EnvFilter::new(directive))
        .init();

    tracing::info!(directive, "ALBRT logging initialized (stdout only)");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_level_wins() {
        assert_eq!(filter_directive(Some("warn"), true), "warn");
    }

    #[test]
    fn debug_env_enables_crate_debug() {
        let directive = filter_directive(None, true);
        assert!(directive.contains("albrt_core=debug"));
        assert_eq!(filter_directive(None, false), "info");
    }
}
