//! Controller runtime configuration
//!
//! Built from CLI flags in `main.rs`; library code only ever sees this
//! struct and never reads the environment itself.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::DEFAULT_FIELD_MANAGER;

/// Log output format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable text
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}' (expected text or json)")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Settings shared by every controller
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Namespace to watch; `None` watches all namespaces
    pub namespace: Option<String>,
    /// Requeue interval after a successful reconcile
    pub requeue_success: Duration,
    /// Requeue interval after a retryable failure
    pub requeue_error: Duration,
    /// Timeout applied to every request against an instance
    pub request_timeout: Duration,
    /// Field manager for status patches and applied Secrets
    pub field_manager: String,
    /// Log output format
    pub log_format: LogFormat,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            requeue_success: Duration::from_secs(300),
            requeue_error: Duration::from_secs(30),
            request_timeout: Duration::from_secs(10),
            field_manager: DEFAULT_FIELD_MANAGER.to_string(),
            log_format: LogFormat::Text,
        }
    }
}

impl ControllerConfig {
    /// Requeue interval for a failed reconcile
    ///
    /// Errors that only a spec or remote change can fix wait the full
    /// success interval.
    pub fn requeue_after(&self, error: &crate::Error) -> Duration {
        if error.is_retryable() {
            self.requeue_error
        } else {
            self.requeue_success
        }
    }
}
