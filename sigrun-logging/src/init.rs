use anyhow::Result;
use sigrun_config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Level used by workers when neither the pool nor `RUST_LOG` sets one
const WORKER_DEFAULT_LEVEL: &str = "warn";

/// Filter from an explicit directive, then `RUST_LOG`, then `fallback`
pub fn build_env_filter(directive: Option<&str>, fallback: &str) -> EnvFilter {
    if let Some(filter) = directive.and_then(|d| EnvFilter::try_new(d).ok()) {
        return filter;
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Initialize logging from configuration. Logs go to stderr so stdout
/// stays free for command output.
pub fn init_logging_from_config(config: &LoggingConfig) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(build_env_filter(Some(config.level.as_str()), "info"))
        .with_writer(std::io::stderr)
        .with_target(config.include_target)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    let result = match config.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    // Use try_init to avoid panic if global subscriber already set
    if result.is_err() {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}

/// Initialize simple tracing for basic console output
pub fn init_simple_tracing(log_level: &str) -> Result<()> {
    let env_filter = build_env_filter(Some(log_level), "info");

    if tracing_subscriber::fmt().with_env_filter(env_filter).try_init().is_err() {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}

/// Initialize tracing for a worker process. Stdout carries the IPC stream, so
/// everything goes to stderr without colour codes.
pub fn init_worker_tracing(log_level: Option<&str>) -> Result<()> {
    let env_filter = build_env_filter(log_level, WORKER_DEFAULT_LEVEL);

    if tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}
