//! Demo handlers exercising the access log

use accesslog::{ContextValues, HandlerError, HttpError};
use axum::{
    Extension,
    extract::Path,
    http::StatusCode,
    response::Redirect,
};

/// POST /echo - Return the request body unchanged
///
/// The body is consumed here, so the access log captures it as empty.
pub async fn echo(Extension(ctx): Extension<ContextValues>, body: String) -> String {
    ctx.insert("echo_bytes", body.len());
    body
}

/// GET /status/{code} - Respond with an arbitrary status code
pub async fn status(Path(code): Path<u16>) -> Result<StatusCode, HandlerError> {
    StatusCode::from_u16(code).map_err(|e| {
        HttpError::new(StatusCode::BAD_REQUEST, format!("invalid status code {}", code))
            .with_internal(e)
            .into()
    })
}

/// GET /fail - Fail with a server error wrapping an internal cause
pub async fn fail() -> Result<&'static str, HandlerError> {
    let cause = std::io::Error::new(
        std::io::ErrorKind::ConnectionRefused,
        "upstream connection refused",
    );
    Err(HttpError::new(StatusCode::BAD_GATEWAY, "upstream unavailable")
        .with_internal(cause)
        .into())
}

/// GET /redirect - Temporary redirect to the health check
pub async fn redirect() -> Redirect {
    Redirect::temporary("/health")
}
