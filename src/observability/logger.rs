//! Structured logger setup
//!
//! One log line = one event. JSON by default so that log shippers see
//! the `event` field as a first-class key; plain text for terminals.

use std::fmt;
use std::str::FromStr;

use tracing_subscriber::EnvFilter;

use super::{ObservabilityError, ObservabilityResult};

/// Default filter when `RUST_LOG` is not set
pub const DEFAULT_FILTER: &str = "info";

/// Output format of the log subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Human readable single line
    Text,
}

impl LogFormat {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Json => "json",
            LogFormat::Text => "text",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LogFormat {
    type Err = ObservabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(LogFormat::Json),
            "text" => Ok(LogFormat::Text),
            other => Err(ObservabilityError::new(format!(
                "unknown log format '{}', expected 'json' or 'text'",
                other
            ))),
        }
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides `default_filter`. Fails if a subscriber is
/// already installed.
pub fn init_logging(format: LogFormat, default_filter: &str) -> ObservabilityResult<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let result = match format {
        LogFormat::Json => builder.json().flatten_event(true).try_init(),
        LogFormat::Text => builder.with_ansi(false).try_init(),
    };

    result.map_err(|e| ObservabilityError::new(format!("failed to install subscriber: {}", e)))
}
