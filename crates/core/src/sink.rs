//! Log sinks receiving finished access log records

use std::error::Error as StdError;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{Map, Value as JsonValue};

use crate::record::{self, LogRecord};
use crate::severity::Severity;

/// Target used for every event emitted by [`TracingSink`]
pub const TARGET: &str = "access_log";

/// Destination for access log records.
///
/// Shared by every in-flight request, so implementations must be safe for
/// concurrent use.
pub trait LogSink: Send + Sync {
    /// Emit one finished record
    fn emit(&self, record: &LogRecord);

    /// Report a non-fatal problem hit while building a record
    fn warn(&self, message: &str, err: &(dyn StdError + 'static));
}

/// Dispatch a tracing event at a level only known at runtime.
macro_rules! event_at {
    ($severity:expr, $($rest:tt)+) => {
        match $severity {
            Severity::Debug => tracing::debug!($($rest)+),
            Severity::Info => tracing::info!($($rest)+),
            Severity::Warn => tracing::warn!($($rest)+),
            Severity::Error | Severity::Critical => tracing::error!($($rest)+),
        }
    };
}

/// Sink forwarding records to `tracing`.
///
/// `Critical` has no tracing level of its own and goes out at ERROR; the
/// `severity` field keeps it distinguishable. Context fields are grouped into
/// a single `context` JSON object since tracing field names are static.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, record: &LogRecord) {
        let context = context_json(record);
        let error_detail = record
            .error
            .as_ref()
            .map(|err| err as &(dyn StdError + 'static));

        event_at!(
            record.severity,
            target: TARGET,
            severity = record.severity.as_str(),
            time = record.str_field(record::TIME),
            remote_ip = record.str_field(record::REMOTE_IP),
            host = record.str_field(record::HOST),
            method = record.str_field(record::METHOD),
            uri = record.str_field(record::URI),
            user_agent = record.str_field(record::USER_AGENT),
            status = record.int_field(record::STATUS),
            latency = record.int_field(record::LATENCY),
            latency_human = record.str_field(record::LATENCY_HUMAN),
            bytes_in = record.int_field(record::BYTES_IN),
            bytes_out = record.int_field(record::BYTES_OUT),
            body = record.str_field(record::BODY),
            error = record.str_field(record::ERROR),
            internal_error = record.str_field(record::INTERNAL_ERROR),
            request_id = record.str_field(record::REQUEST_ID),
            context = context.as_deref(),
            error_detail = error_detail,
            "{}",
            record.message
        );
    }

    fn warn(&self, message: &str, err: &(dyn StdError + 'static)) {
        tracing::warn!(target: TARGET, error = err, "{}", message);
    }
}

fn context_json(record: &LogRecord) -> Option<String> {
    let map: Map<String, JsonValue> = record
        .context_fields()
        .filter_map(|field| match &field.value {
            record::FieldValue::Any(value) => Some((field.key.clone(), value.clone())),
            _ => None,
        })
        .collect();

    if map.is_empty() {
        None
    } else {
        Some(JsonValue::Object(map).to_string())
    }
}

/// In-memory sink that keeps everything it receives, for assertions in tests.
///
/// Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<LogRecord>>>,
    warnings: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the emitted records, oldest first
    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Warnings as `"<message>: <error>"`
    pub fn warnings(&self) -> Vec<String> {
        self.warnings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LogSink for MemorySink {
    fn emit(&self, record: &LogRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
    }

    fn warn(&self, message: &str, err: &(dyn StdError + 'static)) {
        self.warnings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(format!("{}: {}", message, err));
    }
}
