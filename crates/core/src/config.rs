//! Access log middleware configuration

use std::fmt;
use std::sync::Arc;

use crate::context::ContextKey;
use crate::logger::{Exchange, original_uri};
use crate::severity::{Severity, SeverityMapper};

/// Request bodies are only captured when their declared length is below this
pub const DEFAULT_BODY_SIZE_LIMIT: u64 = 1024;

/// Predicate deciding whether a request bypasses the access log
pub type Skipper = Arc<dyn Fn(&Exchange<'_>) -> bool + Send + Sync>;

/// Skipper that never skips
pub fn default_skipper(_: &Exchange<'_>) -> bool {
    false
}

/// Skipper bypassing requests whose path, as received, is exactly one of `paths`
pub fn skip_paths<I, S>(paths: I) -> Skipper
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let paths: Vec<String> = paths.into_iter().map(Into::into).collect();
    Arc::new(move |exchange: &Exchange<'_>| {
        let path = original_uri(exchange.request).path();
        paths.iter().any(|p| p == path)
    })
}

/// Configuration of one access log middleware instance.
///
/// Every `default()` call builds a fresh value and clones are independent, so
/// tweaking one instance never leaks into another.
#[derive(Clone)]
pub struct LoggerConfig {
    pub skipper: Skipper,
    pub print_body: bool,
    pub body_size_limit: u64,
    pub context_keys: Vec<ContextKey>,
    pub severity_mapper: Option<SeverityMapper>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            skipper: Arc::new(default_skipper),
            print_body: true,
            body_size_limit: DEFAULT_BODY_SIZE_LIMIT,
            context_keys: Vec::new(),
            severity_mapper: None,
        }
    }
}

impl LoggerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skipper<F>(mut self, skipper: F) -> Self
    where
        F: Fn(&Exchange<'_>) -> bool + Send + Sync + 'static,
    {
        self.skipper = Arc::new(skipper);
        self
    }

    pub fn print_body(mut self, print_body: bool) -> Self {
        self.print_body = print_body;
        self
    }

    pub fn body_size_limit(mut self, limit: u64) -> Self {
        self.body_size_limit = limit;
        self
    }

    pub fn context_keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<ContextKey>,
    {
        self.context_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn severity_mapper<F>(mut self, mapper: F) -> Self
    where
        F: Fn(u16) -> Severity + Send + Sync + 'static,
    {
        self.severity_mapper = Some(Arc::new(mapper));
        self
    }
}

impl fmt::Debug for LoggerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerConfig")
            .field("print_body", &self.print_body)
            .field("body_size_limit", &self.body_size_limit)
            .field("context_keys", &self.context_keys)
            .field("severity_mapper", &self.severity_mapper.is_some())
            .finish_non_exhaustive()
    }
}
