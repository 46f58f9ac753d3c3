//! # Request Scope
//!
//! Typed key/value storage that lives exactly as long as one request.
//!
//! Bones use it for request-local caches such as the guessed timezone. A new
//! scope is created with every [`crate::context::RequestContext`], so nothing
//! stored here can leak into another request.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Request-local storage for named values
///
/// Values are type-erased; [`RequestScope::get`] returns `None` when the
/// stored type doesn't match.
#[derive(Default)]
pub struct RequestScope {
    data: RwLock<HashMap<String, Box<dyn Any + Send + Sync>>>,
}

impl RequestScope {
    /// Create a new empty scope
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value with a string key
    ///
    /// Overwrites any existing value with the same key.
    pub fn set<T: Send + Sync + 'static>(&self, key: impl Into<String>, value: T) {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        data.insert(key.into(), Box::new(value));
    }

    /// Get a cloned value by key
    ///
    /// Returns `None` if key doesn't exist or type doesn't match.
    #[must_use]
    pub fn get<T: Clone + Send + Sync + 'static>(&self, key: &str) -> Option<T> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        data.get(key)
            .and_then(|boxed| boxed.downcast_ref::<T>())
            .cloned()
    }

    /// Return the cached value for `key`, computing and storing it on a miss
    pub fn get_or_insert_with<T, F>(&self, key: &str, init: F) -> T
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        if let Some(value) = self.get::<T>(key) {
            return value;
        }
        let value = init();
        self.set(key, value.clone());
        value
    }

    /// Check if a key exists
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        data.contains_key(key)
    }

    /// Remove a value by key
    pub fn remove(&self, key: &str) -> bool {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        data.remove(key).is_some()
    }

    /// Get the number of stored items
    #[must_use]
    pub fn len(&self) -> usize {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        data.len()
    }

    /// Check if the scope is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for RequestScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("RequestScope")
            .field("keys", &data.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_set_get() {
        let scope = RequestScope::new();
        scope.set("count", 42i32);
        scope.set("timeZone", "Europe/Berlin".to_string());

        assert_eq!(scope.get::<i32>("count"), Some(42));
        assert_eq!(
            scope.get::<String>("timeZone"),
            Some("Europe/Berlin".to_string())
        );
    }

    #[test]
    fn test_scope_type_mismatch() {
        let scope = RequestScope::new();
        scope.set("count", 42i32);

        assert_eq!(scope.get::<String>("count"), None);
    }

    #[test]
    fn test_get_or_insert_with_runs_once() {
        let scope = RequestScope::new();
        let mut calls = 0;
        let first = scope.get_or_insert_with("zone", || {
            calls += 1;
            "UTC".to_string()
        });
        let second = scope.get_or_insert_with("zone", || "Europe/Paris".to_string());

        assert_eq!(first, "UTC");
        assert_eq!(second, "UTC");
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_scope_remove_and_len() {
        let scope = RequestScope::new();
        assert!(scope.is_empty());

        scope.set("a", 1i32);
        scope.set("b", 2i32);
        assert_eq!(scope.len(), 2);

        assert!(scope.remove("a"));
        assert!(!scope.contains("a"));
        assert!(!scope.remove("a"));
    }
}
