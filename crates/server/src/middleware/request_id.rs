use accesslog::{ContextValues, REQUEST_ID_HEADER};
use axum::{body::Body, extract::Request, http::HeaderValue, middleware::Next, response::Response};
use uuid::Uuid;

/// Context key under which the request's correlation ID is stored
pub const CORRELATION_ID_KEY: &str = "correlation_id";

/// Middleware that tags each request with a correlation ID.
///
/// A client-supplied `X-Request-Id` is kept as is. Otherwise a fresh UUID is
/// generated and set on the response only, leaving the request untouched.
pub async fn request_id_middleware(request: Request<Body>, next: Next) -> Response {
    let supplied = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|id| !id.is_empty())
        .map(str::to_string);

    let id = supplied
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    if let Some(values) = request.extensions().get::<ContextValues>() {
        values.insert(CORRELATION_ID_KEY, id.clone());
    }

    let mut response = next.run(request).await;

    if supplied.is_none() {
        if let Ok(value) = HeaderValue::from_str(&id) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
    }

    response
}
