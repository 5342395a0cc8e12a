//! Handler error types observed by the access log

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Shared, cloneable error cause
pub type Cause = Arc<dyn StdError + Send + Sync>;

/// Error carrying an HTTP status, a client-facing message and an optional
/// internal cause that is never rendered to the client.
#[derive(Debug, Clone)]
pub struct HttpError {
    pub status: StatusCode,
    pub message: String,
    pub internal: Option<Cause>,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            internal: None,
        }
    }

    /// Error with the canonical reason phrase of `status` as its message
    pub fn from_status(status: StatusCode) -> Self {
        Self::new(status, status.canonical_reason().unwrap_or_default())
    }

    pub fn with_internal<E>(mut self, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.internal = Some(Arc::new(cause));
        self
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code={}, message={}", self.status.as_u16(), self.message)?;
        if let Some(internal) = &self.internal {
            write!(f, ", internal={}", internal)?;
        }
        Ok(())
    }
}

impl StdError for HttpError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.internal
            .as_deref()
            .map(|cause| cause as &(dyn StdError + 'static))
    }
}

/// Error returned by a request handler
#[derive(Debug, Clone, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("{0}")]
    Other(Cause),
}

impl HandlerError {
    pub fn other<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        HandlerError::Other(Arc::new(err))
    }

    /// Status the error renders with; anything that is not an `HttpError` is a 500.
    pub fn status(&self) -> StatusCode {
        match self {
            HandlerError::Http(err) => err.status,
            HandlerError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Internal cause wrapped by an `HttpError`, if any
    pub fn internal(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self {
            HandlerError::Http(err) => err.internal.as_deref(),
            HandlerError::Other(_) => None,
        }
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            HandlerError::Http(err) => err.message.clone(),
            HandlerError::Other(_) => status
                .canonical_reason()
                .unwrap_or("Internal Server Error")
                .to_string(),
        };

        let mut response = (status, Json(json!({ "message": message }))).into_response();
        // The access log reads the error back from here after the handler returns
        response.extensions_mut().insert(self);
        response
    }
}
