use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Severity of an access log record, ordered from least to most severe
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strategy mapping a response status code to a severity
pub type SeverityMapper = Arc<dyn Fn(u16) -> Severity + Send + Sync>;

/// Built-in status mapping: 5xx is an error, 4xx a warning, anything else info.
pub fn default_severity(status: u16) -> Severity {
    match status {
        500.. => Severity::Error,
        400..=499 => Severity::Warn,
        _ => Severity::Info,
    }
}

/// Record message for a status code.
///
/// Always derived from the status thresholds, whatever severity mapper is in use.
pub fn status_message(status: u16) -> &'static str {
    match status {
        500.. => "Server error",
        400..=499 => "Client error",
        300..=399 => "Redirection",
        _ => "Success",
    }
}
