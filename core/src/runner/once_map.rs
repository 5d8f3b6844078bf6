use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};

/// Map whose values are computed at most once per key.
///
/// Concurrent callers for the same key wait on the first caller's
/// computation instead of starting their own.
#[derive(Debug)]
pub struct OnceMap<K, V> {
    cells: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
}

impl<K, V> Default for OnceMap<K, V> {
    fn default() -> Self {
        Self {
            cells: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash, V: Clone> OnceMap<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_init<F, Fut>(&self, key: K, init: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let cell = {
            let mut cells = self.cells.lock().await;
            cells.entry(key).or_default().clone()
        };
        cell.get_or_init(init).await.clone()
    }

    pub async fn len(&self) -> usize {
        self.cells.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cells.lock().await.is_empty()
    }
}
