//! Access log record and its fields

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::HandlerError;
use crate::severity::Severity;

/// Field names emitted on every record, in emission order
pub const TIME: &str = "time";
pub const REMOTE_IP: &str = "remote_ip";
pub const HOST: &str = "host";
pub const METHOD: &str = "method";
pub const URI: &str = "uri";
pub const USER_AGENT: &str = "user_agent";
pub const STATUS: &str = "status";
pub const LATENCY: &str = "latency";
pub const LATENCY_HUMAN: &str = "latency_human";
pub const BYTES_IN: &str = "bytes_in";
pub const BYTES_OUT: &str = "bytes_out";

/// Optional field names
pub const BODY: &str = "body";
pub const ERROR: &str = "error";
pub const INTERNAL_ERROR: &str = "internal_error";
pub const REQUEST_ID: &str = "request_id";

/// Typed value of a record field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Str(String),
    Int(i64),
    /// Arbitrary value pulled from the request context
    Any(JsonValue),
    /// Rendered error message
    Error(String),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) | FieldValue::Error(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(n) => Some(*n),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub key: String,
    pub value: FieldValue,
}

impl Field {
    pub fn str(key: &str, value: impl Into<String>) -> Self {
        Self {
            key: key.to_string(),
            value: FieldValue::Str(value.into()),
        }
    }

    pub fn int(key: &str, value: i64) -> Self {
        Self {
            key: key.to_string(),
            value: FieldValue::Int(value),
        }
    }

    pub fn any(key: impl Into<String>, value: JsonValue) -> Self {
        Self {
            key: key.into(),
            value: FieldValue::Any(value),
        }
    }

    pub fn error(key: &str, err: &dyn std::error::Error) -> Self {
        Self {
            key: key.to_string(),
            value: FieldValue::Error(err.to_string()),
        }
    }
}

/// One access log record, built and emitted once per logged request
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub severity: Severity,
    pub message: &'static str,
    pub fields: Vec<Field>,
    /// Handler error attached on its own for server errors (status >= 500)
    pub error: Option<HandlerError>,
}

impl LogRecord {
    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.key == key).map(|f| &f.value)
    }

    pub fn has_field(&self, key: &str) -> bool {
        self.field(key).is_some()
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.field(key).and_then(FieldValue::as_str)
    }

    pub fn int_field(&self, key: &str) -> Option<i64> {
        self.field(key).and_then(FieldValue::as_int)
    }

    /// Fields that came from the request context
    pub fn context_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields
            .iter()
            .filter(|f| matches!(f.value, FieldValue::Any(_)))
    }
}
