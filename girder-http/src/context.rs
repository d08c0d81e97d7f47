//! Typed request context: an opaque side-channel for interceptors.
//!
//! Values are keyed by their type, so unrelated interceptors cannot collide.
//! Cloning a context shares the underlying entries — a request clone carries
//! the same context unless one is supplied explicitly.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// Type-keyed metadata carried alongside a request through the interceptor
/// chain. Never serialized, never sent on the wire.
///
/// # Examples
///
/// ```
/// use girder_http::HttpContext;
///
/// #[derive(Debug, PartialEq)]
/// struct RetryBudget(u32);
///
/// let context = HttpContext::new();
/// context.insert(RetryBudget(3));
/// assert_eq!(context.get::<RetryBudget>().unwrap().0, 3);
/// ```
#[derive(Clone, Default)]
pub struct HttpContext {
    entries: Arc<Mutex<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>>,
}

impl HttpContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value, replacing any existing value of the same type.
    pub fn insert<T: Send + Sync + 'static>(&self, value: T) -> &Self {
        self.entries
            .lock()
            .insert(TypeId::of::<T>(), Arc::new(value));
        self
    }

    /// Retrieve a value by type.
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.entries
            .lock()
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|entry| entry.downcast::<T>().ok())
    }

    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.entries.lock().contains_key(&TypeId::of::<T>())
    }

    /// Remove a value by type; returns whether one was present.
    pub fn remove<T: Send + Sync + 'static>(&self) -> bool {
        self.entries.lock().remove(&TypeId::of::<T>()).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl fmt::Debug for HttpContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpContext")
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Marker(&'static str);

    #[test]
    fn test_insert_and_get() {
        let context = HttpContext::new();
        context.insert(Marker("hello"));
        assert_eq!(context.get::<Marker>().unwrap().0, "hello");
    }

    #[test]
    fn test_insert_replaces_same_type() {
        let context = HttpContext::new();
        context.insert(Marker("first"));
        context.insert(Marker("second"));
        assert_eq!(context.get::<Marker>().unwrap().0, "second");
        assert_eq!(context.len(), 1);
    }

    #[test]
    fn test_clones_share_entries() {
        let context = HttpContext::new();
        let clone = context.clone();
        clone.insert(Marker("shared"));
        assert!(context.contains::<Marker>());
    }

    #[test]
    fn test_remove() {
        let context = HttpContext::new();
        context.insert(Marker("x"));
        assert!(context.remove::<Marker>());
        assert!(!context.remove::<Marker>());
        assert!(context.is_empty());
    }
}
