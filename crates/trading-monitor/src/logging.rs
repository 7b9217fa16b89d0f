//! Logging setup.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer, Registry};

/// Console log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line, human oriented
    Pretty,
    /// One line per event, colored by severity
    #[default]
    Compact,
    /// Newline-delimited JSON
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" | "text" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Invalid log format: {}", s)),
        }
    }
}

impl Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LogFormat::Pretty => "pretty",
            LogFormat::Compact => "compact",
            LogFormat::Json => "json",
        };
        write!(f, "{}", s)
    }
}

/// `RUST_LOG` wins over the configured level.
fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install the global subscriber.
///
/// Console output uses `format`. When `file` is given, events are also
/// written without ANSI codes to a daily rolling file next to it; the
/// returned guard flushes that writer and must live as long as the process.
pub fn setup_logging(level: &str, format: LogFormat, file: Option<&Path>) -> Option<WorkerGuard> {
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    let console = match format {
        LogFormat::Pretty => fmt::layer().pretty().with_filter(filter(level)).boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(false)
            .with_filter(filter(level))
            .boxed(),
        LogFormat::Json => fmt::layer().json().with_filter(filter(level)).boxed(),
    };
    layers.push(console);

    let guard = file.map(|path| {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let prefix = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "intraday-trader.log".to_string());

        let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, prefix));
        layers.push(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(filter(level))
                .boxed(),
        );
        guard
    });

    if tracing_subscriber::registry().with(layers).try_init().is_err() {
        tracing::debug!("Global subscriber already installed");
    }
    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::from_str("JSON").unwrap(), LogFormat::Json);
        assert_eq!(LogFormat::from_str("text").unwrap(), LogFormat::Compact);
        assert!(LogFormat::from_str("xml").is_err());
        assert_eq!(LogFormat::default().to_string(), "compact");
    }

    #[test]
    fn test_setup_logging_with_file_returns_guard() {
        let path = std::env::temp_dir().join("intraday-trader-test.log");
        let guard = setup_logging("debug", LogFormat::Compact, Some(&path));
        assert!(guard.is_some());

        // A second install is tolerated.
        assert!(setup_logging("info", LogFormat::Json, None).is_none());
    }
}
