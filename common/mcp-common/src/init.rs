//! Tracing initialization
//!
//! MCP servers speak the protocol on stdout, so every log line is written to
//! stderr. Filtering comes from `RUST_LOG` with a default directive for the
//! server crate, and the output format is either human-readable text or JSON.

use std::str::FromStr;

use serde::Deserialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Plain text without ANSI colors
    #[default]
    Text,
    /// One JSON object per line, for log aggregation
    Json,
}

impl LogFormat {
    /// Resolve the format, letting `LOG_FORMAT` override the configured value
    pub fn from_env_or(configured: LogFormat) -> LogFormat {
        std::env::var("LOG_FORMAT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(configured)
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("json") {
            Ok(LogFormat::Json)
        } else if s.eq_ignore_ascii_case("text") {
            Ok(LogFormat::Text)
        } else {
            Err(format!("unknown log format '{}' (expected 'text' or 'json')", s))
        }
    }
}

/// Map a `-v` count to the default level for the server crate
pub fn level_for_verbosity(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Initialize tracing for an MCP server
///
/// # Arguments
///
/// * `crate_name` - Target name of the server crate (e.g., "postgres_mcp")
/// * `verbose` - Number of `-v` flags; raises the crate's default level
/// * `format` - Output format; `LOG_FORMAT` takes precedence when set
///
/// Fails if the `RUST_LOG`-independent directive cannot be parsed or a global
/// subscriber is already installed.
pub fn init_tracing(crate_name: &str, verbose: u8, format: LogFormat) -> anyhow::Result<()> {
    let directive = format!("{}={}", crate_name, level_for_verbosity(verbose));
    let filter = EnvFilter::from_default_env().add_directive(directive.parse()?);

    let registry = tracing_subscriber::registry().with(filter);

    match LogFormat::from_env_or(format) {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()?,
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .try_init()?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_format() {
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("text".parse::<LogFormat>(), Ok(LogFormat::Text));
        assert!("yaml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_level_for_verbosity() {
        assert_eq!(level_for_verbosity(0), "info");
        assert_eq!(level_for_verbosity(1), "debug");
        assert_eq!(level_for_verbosity(2), "trace");
        assert_eq!(level_for_verbosity(9), "trace");
    }

    #[test]
    fn test_deserialize_log_format() {
        #[derive(Deserialize)]
        struct Section {
            format: LogFormat,
        }

        let section: Section = serde_json::from_str(r#"{"format":"json"}"#).unwrap();
        assert_eq!(section.format, LogFormat::Json);
    }
}
