//! Log setup: one ordered stream to the console and to the configured log file.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use engine::LogConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// The file is appended to, never rotated. `RUST_LOG` overrides the configured
/// level. Keep the returned guard alive until the run ends so buffered lines
/// reach the file.
pub fn init_logging(config: &LogConfig) -> Result<WorkerGuard> {
    let directory = config
        .file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = config
        .file
        .file_name()
        .ok_or_else(|| anyhow!("log.file has no file name: {}", config.file.display()))?;

    fs::create_dir_all(directory)
        .with_context(|| format!("Failed to create log directory {}", directory.display()))?;

    let appender = tracing_appender::rolling::never(directory, file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_directive(&config.level)));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(false)
        .with_file(true)
        .with_line_number(true);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to install log subscriber")?;

    Ok(guard)
}

/// Map the configured level to a filter directive; unknown values mean "info".
fn level_directive(level: &str) -> &'static str {
    match level.trim().to_lowercase().as_str() {
        "error" => "error",
        "warn" | "warning" => "warn",
        "debug" => "debug",
        "trace" => "trace",
        _ => "info",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_directive() {
        assert_eq!(level_directive("ERROR"), "error");
        assert_eq!(level_directive("warning"), "warn");
        assert_eq!(level_directive(" debug "), "debug");
        assert_eq!(level_directive("trace"), "trace");
        assert_eq!(level_directive("verbose"), "info");
    }
}
