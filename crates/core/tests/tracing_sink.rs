//! Tests for the tracing sink.
//!
//! A capturing subscriber layer records every event's level, target and
//! fields so the emitted shape can be asserted on directly.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::{Arc, Mutex};

use accesslog::{
    ContextValues, Field, HandlerError, LogRecord, LogSink, LoggerConfig, RequestLogger,
    Severity, TracingSink, access_log, sink::TARGET,
};
use axum::{
    Extension, Router,
    body::Body,
    http::{Request, StatusCode},
    middleware,
    routing::get,
};
use http_body_util::BodyExt;
use tower::ServiceExt;
use tracing::field::{Field as TracingField, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct CapturedEvent {
    level: Level,
    target: String,
    fields: HashMap<String, String>,
}

impl CapturedEvent {
    fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

#[derive(Clone, Default)]
struct CaptureLayer {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl CaptureLayer {
    fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            target: event.metadata().target().to_string(),
            fields: visitor.0,
        });
    }
}

#[derive(Default)]
struct FieldVisitor(HashMap<String, String>);

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &TracingField, value: &dyn fmt::Debug) {
        self.0.insert(field.name().to_string(), format!("{:?}", value));
    }

    fn record_str(&mut self, field: &TracingField, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_i64(&mut self, field: &TracingField, value: i64) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_u64(&mut self, field: &TracingField, value: u64) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_error(&mut self, field: &TracingField, value: &(dyn StdError + 'static)) {
        self.0.insert(field.name().to_string(), value.to_string());
    }
}

/// Run `f` with a capturing subscriber installed and return what it saw.
fn capture(f: impl FnOnce()) -> Vec<CapturedEvent> {
    let layer = CaptureLayer::default();
    let subscriber = tracing_subscriber::registry().with(layer.clone());
    tracing::subscriber::with_default(subscriber, f);
    layer.events()
}

fn record(severity: Severity, status: i64) -> LogRecord {
    LogRecord {
        severity,
        message: "Success",
        fields: vec![
            Field::str("method", "GET"),
            Field::str("uri", "/x"),
            Field::int("status", status),
            Field::int("bytes_out", 3),
        ],
        error: None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn test_level_follows_severity() {
    let cases = [
        (Severity::Debug, Level::DEBUG),
        (Severity::Info, Level::INFO),
        (Severity::Warn, Level::WARN),
        (Severity::Error, Level::ERROR),
        (Severity::Critical, Level::ERROR),
    ];

    for (severity, level) in cases {
        let events = capture(|| TracingSink.emit(&record(severity, 200)));
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.level, level, "{}", severity);
        assert_eq!(event.target, TARGET);
        assert_eq!(event.field("severity"), Some(severity.as_str()));
    }
}

#[test]
fn test_fields_are_named_and_optional_ones_omitted() {
    let events = capture(|| TracingSink.emit(&record(Severity::Info, 200)));
    let event = &events[0];

    assert_eq!(event.field("message"), Some("Success"));
    assert_eq!(event.field("method"), Some("GET"));
    assert_eq!(event.field("uri"), Some("/x"));
    assert_eq!(event.field("status"), Some("200"));
    assert_eq!(event.field("bytes_out"), Some("3"));
    assert_eq!(event.field("body"), None);
    assert_eq!(event.field("request_id"), None);
    assert_eq!(event.field("context"), None);
    assert_eq!(event.field("error_detail"), None);
}

#[test]
fn test_critical_record_carries_error_detail() {
    let mut critical = record(Severity::Critical, 503);
    critical.message = "Server error";
    critical.fields.push(Field::str("error", "upstream down"));
    critical.error = Some(HandlerError::other(std::io::Error::other("upstream down")));

    let events = capture(|| TracingSink.emit(&critical));
    let event = &events[0];

    assert_eq!(event.level, Level::ERROR);
    assert_eq!(event.field("severity"), Some("critical"));
    assert_eq!(event.field("message"), Some("Server error"));
    assert_eq!(event.field("error"), Some("upstream down"));
    assert_eq!(event.field("error_detail"), Some("upstream down"));
}

#[test]
fn test_context_fields_grouped_as_json() {
    let mut with_context = record(Severity::Info, 200);
    with_context
        .fields
        .push(Field::any("tenant", serde_json::json!("acme")));
    with_context
        .fields
        .push(Field::any("user_id", serde_json::json!(42)));

    let events = capture(|| TracingSink.emit(&with_context));
    let context: serde_json::Value =
        serde_json::from_str(events[0].field("context").expect("context field")).unwrap();

    assert_eq!(context, serde_json::json!({"tenant": "acme", "user_id": 42}));
}

#[test]
fn test_warn_goes_out_at_warn_level() {
    let events = capture(|| {
        TracingSink.warn(
            "error reading request body",
            &std::io::Error::other("length limit exceeded"),
        )
    });

    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.level, Level::WARN);
    assert_eq!(event.target, TARGET);
    assert_eq!(event.field("message"), Some("error reading request body"));
    assert_eq!(event.field("error"), Some("length limit exceeded"));
}

#[tokio::test]
async fn test_middleware_emits_through_tracing() {
    let layer = CaptureLayer::default();
    let subscriber = tracing_subscriber::registry().with(layer.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    let router = Router::new().route(
        "/",
        get(|Extension(ctx): Extension<ContextValues>| async move {
            ctx.insert("tenant", "acme");
            (StatusCode::NOT_FOUND, "gone")
        }),
    );
    let logger = RequestLogger::with_config(
        TracingSink,
        LoggerConfig::default().context_keys(["tenant"]),
    );
    let app = router.layer(middleware::from_fn_with_state(Arc::new(logger), access_log));

    let request = Request::builder()
        .uri("/?q=1")
        .header("host", "example.com")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    response.into_body().collect().await.unwrap();

    let events: Vec<CapturedEvent> = layer
        .events()
        .into_iter()
        .filter(|e| e.target == TARGET)
        .collect();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.level, Level::WARN);
    assert_eq!(event.field("message"), Some("Client error"));
    assert_eq!(event.field("uri"), Some("/?q=1"));
    assert_eq!(event.field("host"), Some("example.com"));
    assert_eq!(event.field("bytes_out"), Some("4"));
    assert_eq!(event.field("context"), Some(r#"{"tenant":"acme"}"#));
}
