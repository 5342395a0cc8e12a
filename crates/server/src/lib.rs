//! accesslog-server library crate
//!
//! Exposes `build_app` and `config` for integration tests.
//! The actual binary entrypoint is in `main.rs`.

pub mod config;
pub mod middleware;
mod routes;

use std::sync::Arc;

use accesslog::{LogSink, RequestLogger, access_log};
use axum::{
    Router, middleware as axum_mw,
    routing::{get, post},
};

use config::Config;

/// Build the full application router with all routes and middleware.
///
/// The access log is the outermost layer so that the request ID set on the
/// response by the inner layer is already there when the record is built.
pub fn build_app<S: LogSink + 'static>(config: &Config, sink: S) -> Router {
    let logger = Arc::new(RequestLogger::with_config(sink, config.logger_config()));

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/echo", post(routes::demo::echo))
        .route("/status/{code}", get(routes::demo::status))
        .route("/fail", get(routes::demo::fail))
        .route("/redirect", get(routes::demo::redirect))
        .layer(axum_mw::from_fn(middleware::request_id_middleware))
        .layer(axum_mw::from_fn_with_state(logger, access_log))
}
