//! accesslog: access log middleware for axum
//!
//! Wraps a handler so that, once its response has been sent, exactly one
//! structured record describing the request/response pair is handed to a
//! [`LogSink`]. What gets recorded is controlled by [`LoggerConfig`]: a skip
//! predicate, request body capture under a size limit, request-scoped
//! context keys and a pluggable status-to-severity mapping.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use accesslog::{LoggerConfig, RequestLogger, TracingSink, access_log};
//! use axum::{Router, middleware, routing::get};
//!
//! let logger = RequestLogger::with_config(
//!     TracingSink,
//!     LoggerConfig::default().context_keys(["user_id"]),
//! );
//! let app: Router = Router::new()
//!     .route("/", get(|| async { "hello" }))
//!     .layer(middleware::from_fn_with_state(Arc::new(logger), access_log));
//! ```

pub mod body;
pub mod config;
pub mod context;
pub mod error;
pub mod logger;
pub mod middleware;
pub mod record;
pub mod severity;
pub mod sink;

pub use config::{DEFAULT_BODY_SIZE_LIMIT, LoggerConfig, Skipper, default_skipper, skip_paths};
pub use context::{ContextKey, ContextValues};
pub use error::{HandlerError, HttpError};
pub use logger::{Exchange, REQUEST_ID_HEADER, RequestLogger};
pub use middleware::access_log;
pub use record::{Field, FieldValue, LogRecord};
pub use severity::{Severity, SeverityMapper, default_severity, status_message};
pub use sink::{LogSink, MemorySink, TracingSink};
