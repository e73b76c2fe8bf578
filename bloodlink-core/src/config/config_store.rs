//! Hot-swappable configuration cell.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// A shared value that can be replaced while readers keep running.
///
/// Readers take a [`snapshot`](ConfigStore::snapshot) at the start of a unit
/// of work, so a reload never changes settings halfway through a dispatch.
pub struct ConfigStore<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    value: RwLock<T>,
    generation: AtomicU64,
}

impl<T> ConfigStore<T> {
    pub fn new(initial: T) -> Self {
        Self {
            inner: Arc::new(Inner {
                value: RwLock::new(initial),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Replace the value. Returns the new generation number.
    pub async fn replace(&self, value: T) -> u64 {
        *self.inner.value.write().await = value;
        self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// How many times the value has been replaced.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }
}

impl<T: Clone> ConfigStore<T> {
    pub async fn snapshot(&self) -> T {
        self.inner.value.read().await.clone()
    }
}

impl<T> Clone for ConfigStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
