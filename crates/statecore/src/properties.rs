use crate::{AnyValue, StateData};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared key/value bag visible to every node of a run.
///
/// Clones share the same storage. Values of any [`StateData`] type may be
/// stored; reads with the wrong type return `None`.
#[derive(Clone, Default)]
pub struct RuntimeProperties {
    inner: Arc<RwLock<HashMap<String, AnyValue>>>,
}

impl RuntimeProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get<T: StateData>(&self, key: &str) -> Option<T> {
        let map = self.inner.read().await;
        map.get(key).and_then(|v| v.downcast_ref::<T>()).cloned()
    }

    pub async fn get_value(&self, key: &str) -> Option<AnyValue> {
        self.inner.read().await.get(key).cloned()
    }

    /// Insert a value, returning the previous one if any.
    pub async fn insert<T: StateData>(&self, key: impl Into<String>, value: T) -> Option<AnyValue> {
        self.inner.write().await.insert(key.into(), AnyValue::new(value))
    }

    pub async fn remove(&self, key: &str) -> Option<AnyValue> {
        self.inner.write().await.remove(key)
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.inner.read().await.contains_key(key)
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }

    /// Read-modify-write under a single write lock.
    ///
    /// A missing key, or one holding another type, starts from `default`.
    pub async fn update<T, F>(&self, key: &str, default: T, f: F) -> T
    where
        T: StateData,
        F: FnOnce(T) -> T,
    {
        let mut map = self.inner.write().await;
        let current = map
            .get(key)
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
            .unwrap_or(default);
        let next = f(current);
        map.insert(key.to_string(), AnyValue::new(next.clone()));
        next
    }
}
