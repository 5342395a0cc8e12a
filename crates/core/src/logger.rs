//! Access log record assembly
//!
//! Everything here works on a snapshot of the request taken before the
//! handler ran and the response parts observed after it returned, so the
//! status and sizes are final by the time a record is built.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::OriginalUri;
use chrono::{SecondsFormat, Utc};
use http::{HeaderMap, Uri, header, request, response};

use crate::config::LoggerConfig;
use crate::context::{ContextKey, ContextValues};
use crate::error::HandlerError;
use crate::record::{self, Field, LogRecord};
use crate::severity::{Severity, default_severity, status_message};
use crate::sink::LogSink;

/// Header carrying the request correlation ID
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// What the access log sees of one finished request
#[derive(Debug, Clone, Copy)]
pub struct Exchange<'a> {
    /// Request head as it reached the middleware
    pub request: &'a request::Parts,
    /// Response head as returned by the handler
    pub response: &'a response::Parts,
    pub remote_ip: &'a str,
    /// Response body bytes written. The skipper runs before the body is sent
    /// and sees the declared size instead.
    pub bytes_out: u64,
    pub latency: Duration,
    pub error: Option<&'a HandlerError>,
}

/// Access logger shared by every request going through one middleware instance
pub struct RequestLogger {
    config: LoggerConfig,
    sink: Arc<dyn LogSink>,
}

impl RequestLogger {
    /// Logger with the default configuration
    pub fn new<S: LogSink + 'static>(sink: S) -> Self {
        Self::with_config(sink, LoggerConfig::default())
    }

    pub fn with_config<S: LogSink + 'static>(sink: S, config: LoggerConfig) -> Self {
        Self {
            config,
            sink: Arc::new(sink),
        }
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    pub fn should_skip(&self, exchange: &Exchange<'_>) -> bool {
        (self.config.skipper)(exchange)
    }

    /// Whether the request body should be read for the `body` field
    pub fn captures_body(&self, headers: &HeaderMap) -> bool {
        self.config.print_body
            && body_in_window(parse_content_length(headers), self.config.body_size_limit)
    }

    pub fn severity_for(&self, status: u16) -> Severity {
        match self.config.severity_mapper {
            Some(ref mapper) => mapper(status),
            None => default_severity(status),
        }
    }

    /// Build the record for one request. `body` is the captured request body, if any.
    pub fn build_record(&self, exchange: &Exchange<'_>, body: Option<&str>) -> LogRecord {
        let request = exchange.request;
        let status = exchange.response.status.as_u16();

        let mut fields = vec![
            Field::str(
                record::TIME,
                Utc::now().to_rfc3339_opts(SecondsFormat::AutoSi, true),
            ),
            Field::str(record::REMOTE_IP, exchange.remote_ip),
            Field::str(record::HOST, host(request)),
            Field::str(record::METHOD, request.method.as_str()),
            Field::str(record::URI, request_uri(request)),
            Field::str(
                record::USER_AGENT,
                header_str(&request.headers, header::USER_AGENT.as_str()).unwrap_or_default(),
            ),
            Field::int(record::STATUS, i64::from(status)),
            Field::int(
                record::LATENCY,
                i64::try_from(exchange.latency.as_nanos()).unwrap_or(i64::MAX),
            ),
            Field::str(record::LATENCY_HUMAN, format!("{:?}", exchange.latency)),
            Field::int(record::BYTES_IN, parse_content_length(&request.headers)),
            Field::int(
                record::BYTES_OUT,
                i64::try_from(exchange.bytes_out).unwrap_or(i64::MAX),
            ),
        ];

        if let Some(body) = body {
            fields.push(Field::str(record::BODY, body));
        }

        if !self.config.context_keys.is_empty() {
            fields.extend(context_fields(request, &self.config.context_keys));
        }

        if let Some(err) = exchange.error {
            fields.push(Field::error(record::ERROR, err));
            if let Some(internal) = err.internal() {
                fields.push(Field::error(record::INTERNAL_ERROR, internal));
            }
        }

        if let Some(id) = response_request_id(&request.headers, &exchange.response.headers) {
            fields.push(Field::str(record::REQUEST_ID, id));
        }

        LogRecord {
            severity: self.severity_for(status),
            message: status_message(status),
            fields,
            error: if status >= 500 {
                exchange.error.cloned()
            } else {
                None
            },
        }
    }

    /// Build the record for one request and hand it to the sink
    pub fn log(&self, exchange: &Exchange<'_>, body: Option<&str>) -> LogRecord {
        let record = self.build_record(exchange, body);
        self.sink.emit(&record);
        record
    }

    pub fn warn(&self, message: &str, err: &(dyn std::error::Error + 'static)) {
        self.sink.warn(message, err);
    }
}

/// Everything needed to log one request once its response body is done
pub(crate) struct PendingRecord {
    pub(crate) logger: Arc<RequestLogger>,
    pub(crate) request: request::Parts,
    pub(crate) response: response::Parts,
    pub(crate) remote_ip: String,
    pub(crate) latency: Duration,
    pub(crate) error: Option<HandlerError>,
    pub(crate) body: Option<String>,
}

impl PendingRecord {
    pub(crate) fn finish(self, bytes_out: u64) {
        let exchange = Exchange {
            request: &self.request,
            response: &self.response,
            remote_ip: &self.remote_ip,
            bytes_out,
            latency: self.latency,
            error: self.error.as_ref(),
        };
        self.logger.log(&exchange, self.body.as_deref());
    }
}

impl fmt::Debug for RequestLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestLogger")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Declared request body length; 0 when the header is missing or not a base-10 integer.
pub fn parse_content_length(headers: &HeaderMap) -> i64 {
    header_str(headers, header::CONTENT_LENGTH.as_str())
        .and_then(|raw| raw.parse::<i64>().ok())
        .unwrap_or(0)
}

/// `0 < content_length < limit`
pub fn body_in_window(content_length: i64, limit: u64) -> bool {
    content_length > 0 && (content_length as u64) < limit
}

/// Request ID to log, if any.
///
/// An ID the client sent is never logged here; only one that was generated
/// downstream and set on the response is.
pub fn response_request_id(request: &HeaderMap, response: &HeaderMap) -> Option<String> {
    if header_str(request, REQUEST_ID_HEADER).is_some_and(|id| !id.is_empty()) {
        return None;
    }
    header_str(response, REQUEST_ID_HEADER)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

fn context_fields(request: &request::Parts, keys: &[ContextKey]) -> Vec<Field> {
    match request.extensions.get::<ContextValues>() {
        Some(values) => values
            .collect(keys)
            .into_iter()
            .map(|(key, value)| Field::any(key.to_string(), value))
            .collect(),
        None => Vec::new(),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn host(request: &request::Parts) -> String {
    header_str(&request.headers, header::HOST.as_str())
        .map(str::to_string)
        .or_else(|| request.uri.authority().map(|a| a.to_string()))
        .unwrap_or_default()
}

/// URI the request arrived with, before any `nest` prefix was stripped
pub fn original_uri(request: &request::Parts) -> &Uri {
    request
        .extensions
        .get::<OriginalUri>()
        .map_or(&request.uri, |OriginalUri(uri)| uri)
}

fn request_uri(request: &request::Parts) -> String {
    let uri = original_uri(request);
    uri.path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(*value));
        }
        map
    }

    #[test]
    fn content_length_defaults_to_zero() {
        assert_eq!(parse_content_length(&HeaderMap::new()), 0);
        assert_eq!(parse_content_length(&headers(&[("content-length", "abc")])), 0);
        assert_eq!(parse_content_length(&headers(&[("content-length", "")])), 0);
        assert_eq!(parse_content_length(&headers(&[("content-length", "42")])), 42);
    }

    #[test]
    fn body_window_is_exclusive_on_both_ends() {
        assert!(!body_in_window(0, 1024));
        assert!(body_in_window(1, 1024));
        assert!(body_in_window(500, 1024));
        assert!(body_in_window(1023, 1024));
        assert!(!body_in_window(1024, 1024));
        assert!(!body_in_window(-5, 1024));
    }

    #[test]
    fn request_id_only_logged_when_set_on_response() {
        let none = HeaderMap::new();
        let req = headers(&[("x-request-id", "from-client")]);
        let res = headers(&[("x-request-id", "generated")]);

        assert_eq!(response_request_id(&none, &none), None);
        assert_eq!(response_request_id(&req, &none), None);
        assert_eq!(response_request_id(&req, &res), None);
        assert_eq!(
            response_request_id(&none, &res).as_deref(),
            Some("generated")
        );
    }

    #[test]
    fn original_uri_wins_over_stripped_uri() {
        let mut parts = http::Request::builder()
            .uri("/items?x=1")
            .body(())
            .unwrap()
            .into_parts()
            .0;
        assert_eq!(request_uri(&parts), "/items?x=1");

        parts
            .extensions
            .insert(OriginalUri("/api/items?x=1".parse().unwrap()));
        assert_eq!(request_uri(&parts), "/api/items?x=1");
        assert_eq!(original_uri(&parts).path(), "/api/items");
    }

    #[test]
    fn empty_request_id_on_request_counts_as_absent() {
        let req = headers(&[("x-request-id", "")]);
        let res = headers(&[("x-request-id", "generated")]);
        assert_eq!(
            response_request_id(&req, &res).as_deref(),
            Some("generated")
        );
    }
}
