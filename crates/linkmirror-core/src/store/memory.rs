// # Memory Link Store
//
// In-memory implementation of LinkStore.
//
// ## Purpose
//
// Provides a simple, fast link store that doesn't persist across restarts.
// Useful for testing and for deployments where the startup backfill is
// enough to rebuild the registry.
//
// ## Crash Behavior
//
// - All tracked links are lost on restart/crash
// - The next backfill re-seeds everything inside the lookback window
// - Links mirrored before the window are not remembered

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::link_store::{LinkStore, TrackedLink};

/// In-memory link store implementation
///
/// This implementation stores all records in a HashMap protected by a RwLock.
/// Expired records are hidden from reads and dropped on every upsert and
/// by `purge_expired`.
///
/// # Example
///
/// ```rust,no_run
/// use linkmirror_core::store::MemoryLinkStore;
/// use linkmirror_core::traits::LinkStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryLinkStore::new(chrono::Duration::hours(72));
///
///     assert!(store.find("example.com/e/1").await?.is_none());
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryLinkStore {
    inner: Arc<RwLock<HashMap<String, TrackedLink>>>,
    retention: chrono::Duration,
}

impl MemoryLinkStore {
    /// Create a new empty memory link store
    pub fn new(retention: chrono::Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            retention,
        }
    }

    /// Get the number of records held, expired ones included
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store holds no records
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl LinkStore for MemoryLinkStore {
    async fn find(&self, url: &str) -> Result<Option<TrackedLink>, Error> {
        let guard = self.inner.read().await;
        Ok(guard
            .get(url)
            .filter(|record| !record.is_expired(self.retention))
            .cloned())
    }

    async fn upsert(&self, record: &TrackedLink) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        let now = chrono::Utc::now();
        guard.retain(|_, held| !held.is_expired_at(self.retention, now));
        guard.insert(record.url.clone(), record.clone());
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize, Error> {
        let mut guard = self.inner.write().await;
        let now = chrono::Utc::now();
        let before = guard.len();
        guard.retain(|_, record| !record.is_expired_at(self.retention, now));
        Ok(before - guard.len())
    }

    async fn list_urls(&self) -> Result<Vec<String>, Error> {
        let guard = self.inner.read().await;
        Ok(guard
            .values()
            .filter(|record| !record.is_expired(self.retention))
            .map(|record| record.url.clone())
            .collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        // Nothing buffered
        Ok(())
    }

    fn retention(&self) -> chrono::Duration {
        self.retention
    }
}
