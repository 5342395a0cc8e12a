//! axum access log middleware
//!
//! Install with `axum::middleware::from_fn_with_state(Arc::new(logger), access_log)`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, header, request},
    middleware::Next,
    response::Response,
};
use http_body::Body as _;

use crate::body::{BodyTap, LoggedBody};
use crate::context::ContextValues;
use crate::error::HandlerError;
use crate::logger::{Exchange, PendingRecord, RequestLogger};

/// Log one access record per request.
///
/// The record is emitted once the response body has been fully written (or
/// dropped), so `bytes_out` counts what was actually sent. A handler error
/// travels in the response extensions (see [`HandlerError`]'s
/// `IntoResponse`). It is left there when the request is skipped and moved
/// into the record otherwise.
pub async fn access_log(
    State(logger): State<Arc<RequestLogger>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();

    let (mut parts, body) = request.into_parts();
    if parts.extensions.get::<ContextValues>().is_none() {
        parts.extensions.insert(ContextValues::new());
    }
    let remote_ip = real_ip(&parts);

    let (tap, body) = if logger.captures_body(&parts.headers) {
        let (tap, body) = BodyTap::new(body);
        (Some(tap), body)
    } else {
        (None, body)
    };
    let snapshot = parts.clone();

    let response = next.run(Request::from_parts(parts, body)).await;
    let latency = start.elapsed();

    let (mut res_parts, res_body) = response.into_parts();
    let error = res_parts.extensions.get::<HandlerError>().cloned();

    let exchange = Exchange {
        request: &snapshot,
        response: &res_parts,
        remote_ip: &remote_ip,
        bytes_out: declared_size(&res_parts.headers, &res_body),
        latency,
        error: error.as_ref(),
    };
    if logger.should_skip(&exchange) {
        return Response::from_parts(res_parts, res_body);
    }

    let captured = match tap {
        Some(tap) => read_body(&logger, tap).await,
        None => None,
    };

    res_parts.extensions.remove::<HandlerError>();
    let pending = PendingRecord {
        logger,
        request: snapshot,
        response: res_parts.clone(),
        remote_ip,
        latency,
        error,
        body: captured,
    };
    Response::from_parts(res_parts, Body::new(LoggedBody::new(res_body, pending)))
}

/// Drain what the handler left of the request body, bounded by the configured limit.
async fn read_body(logger: &RequestLogger, tap: BodyTap) -> Option<String> {
    let limit = usize::try_from(logger.config().body_size_limit).unwrap_or(usize::MAX);
    match axum::body::to_bytes(tap.take(), limit).await {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(err) => {
            logger.warn("error reading request body", &err);
            None
        }
    }
}

/// Client IP: first `X-Forwarded-For` hop, then `X-Real-IP`, then the peer address.
pub fn real_ip(parts: &request::Parts) -> String {
    let forwarded = parts
        .headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    let real = parts
        .headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = real {
        return ip.to_string();
    }

    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default()
}

/// Size of the response body as declared before it is sent, 0 when unknown
fn declared_size(headers: &HeaderMap, body: &Body) -> u64 {
    body.size_hint()
        .exact()
        .or_else(|| {
            headers
                .get(header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
        })
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request as HttpRequest;

    fn parts(headers: &[(&'static str, &'static str)]) -> request::Parts {
        let mut builder = HttpRequest::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn real_ip_prefers_forwarded_for() {
        let p = parts(&[
            ("x-forwarded-for", "203.0.113.7, 10.0.0.1"),
            ("x-real-ip", "198.51.100.2"),
        ]);
        assert_eq!(real_ip(&p), "203.0.113.7");
    }

    #[test]
    fn real_ip_falls_back_to_real_ip_then_peer() {
        let p = parts(&[("x-real-ip", "198.51.100.2")]);
        assert_eq!(real_ip(&p), "198.51.100.2");

        let mut p = parts(&[]);
        assert_eq!(real_ip(&p), "");
        p.extensions
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 10], 5555))));
        assert_eq!(real_ip(&p), "192.0.2.10");
    }

    #[test]
    fn declared_size_uses_exact_hint() {
        let headers = HeaderMap::new();
        assert_eq!(declared_size(&headers, &Body::from("hello")), 5);
        assert_eq!(declared_size(&headers, &Body::empty()), 0);
    }
}
