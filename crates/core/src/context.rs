//! Request-scoped values that can be attached to access log records

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value as JsonValue;

/// Opaque key identifying a request-scoped value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextKey(Cow<'static, str>);

impl ContextKey {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for ContextKey {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

impl From<String> for ContextKey {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// Request-scoped key/value store, carried in the request extensions.
///
/// Clones share the same storage, so a value inserted by the handler is
/// visible to the middleware that installed the store.
#[derive(Debug, Clone, Default)]
pub struct ContextValues {
    inner: Arc<RwLock<HashMap<ContextKey, JsonValue>>>,
}

impl ContextValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: impl Into<ContextKey>, value: impl Into<JsonValue>) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
    }

    pub fn get(&self, key: &ContextKey) -> Option<JsonValue> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Look up each key in order, skipping the ones with no value (or a JSON null)
    pub fn collect(&self, keys: &[ContextKey]) -> Vec<(ContextKey, JsonValue)> {
        let values = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        keys.iter()
            .filter_map(|key| match values.get(key) {
                None | Some(JsonValue::Null) => None,
                Some(value) => Some((key.clone(), value.clone())),
            })
            .collect()
    }
}
