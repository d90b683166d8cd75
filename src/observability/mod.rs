//! Observability subsystem for provsync
//!
//! - Structured logging through `tracing`
//! - A closed set of typed lifecycle events
//!
//! Observability failure must never stop the daemon: every background
//! loop reports through logs and retries on its next tick.
//!
//! # Usage
//!
//! ```ignore
//! use provsync::observability::{init_logging, Event, LogFormat};
//!
//! init_logging(LogFormat::Json, "info")?;
//! tracing::info!(event = %Event::SyncComplete, inserted = 3, "sync pass applied");
//! ```

mod events;
mod logger;

pub use events::Event;
pub use logger::{init_logging, LogFormat, DEFAULT_FILTER};

use std::fmt;

/// Observability error code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservabilityErrorCode {
    /// Observability operation failed
    ProvObservabilityFailed,
}

impl ObservabilityErrorCode {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ObservabilityErrorCode::ProvObservabilityFailed => "PROV_OBSERVABILITY_FAILED",
        }
    }
}

impl fmt::Display for ObservabilityErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Observability error
#[derive(Debug)]
pub struct ObservabilityError {
    code: ObservabilityErrorCode,
    message: String,
}

impl ObservabilityError {
    /// Create a new observability error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: ObservabilityErrorCode::ProvObservabilityFailed,
            message: message.into(),
        }
    }

    /// Get the error code
    pub fn code(&self) -> ObservabilityErrorCode {
        self.code
    }

    /// Get the message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ObservabilityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[ERROR] {}: {}", self.code, self.message)
    }
}

impl std::error::Error for ObservabilityError {}

/// Result type for observability operations
pub type ObservabilityResult<T> = Result<T, ObservabilityError>;

/// Log a lifecycle event with no extra fields.
///
/// Failure events go out at WARN, everything else at INFO.
pub fn log_event(event: Event) {
    if event.is_failure() {
        tracing::warn!(event = %event);
    } else {
        tracing::info!(event = %event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observability_error_code() {
        let err = ObservabilityError::new("test error");
        assert_eq!(err.code(), ObservabilityErrorCode::ProvObservabilityFailed);
        assert_eq!(err.message(), "test error");
    }

    #[test]
    fn test_observability_error_display() {
        let err = ObservabilityError::new("test message");
        let display = format!("{}", err);
        assert!(display.contains("PROV_OBSERVABILITY_FAILED"));
        assert!(display.contains("test message"));
    }

    #[test]
    fn test_log_event_without_subscriber() {
        // No subscriber installed: must not panic
        log_event(Event::BootStart);
        log_event(Event::SyncFailed);
    }
}
