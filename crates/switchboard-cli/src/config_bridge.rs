//! Bridge from the `[logging]` config section to telemetry settings.

use anyhow::Result;
use switchboard_orchestrator::LoggingConfig;
use switchboard_telemetry::{FileRotation, LogConfig, LogFormat};

/// Convert `[logging]` to a [`LogConfig`], applying `--verbose` and
/// `--log-format`.
///
/// # Errors
///
/// Returns an error if the format is not recognised.
pub(crate) fn to_log_config(
    logging: &LoggingConfig,
    verbose: bool,
    format_override: Option<&str>,
) -> Result<LogConfig> {
    let format: LogFormat = format_override.unwrap_or(&logging.format).parse()?;
    let level = if verbose { "debug" } else { logging.level.as_str() };

    let mut log_config = LogConfig::new(level).with_format(format);

    if let Some(directory) = &logging.directory {
        log_config = log_config.with_file_logging(directory, FileRotation::Daily);
    }

    for directive in &logging.directives {
        log_config = log_config.with_directive(directive);
    }

    Ok(log_config)
}
