// # Link Store Trait
//
// Defines the interface for persistent, expiring storage of tracked links.
//
// ## Purpose
//
// The link store is the persistence layer under the URL registry. It keeps
// one `TrackedLink` per distinct short URL:
// - The post identifiers that referenced it, in the order they were seen
// - The text of the earliest post
// - The duplicate count
// - The time of the last write
//
// Records expire once `last_update` falls outside the retention window.
// Expiry is the store's job; callers never delete records.
//
// ## Implementations
//
// - In-memory: `MemoryLinkStore`
// - File-based: `FileLinkStore` (JSON document with atomic writes)
//
// ## Usage
//
// ```rust,ignore
// use linkmirror_core::LinkStore;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let store = /* LinkStore implementation */;
//
//     // Look up a link (expired records read as absent)
//     let record = store.find("example.com/e/1").await?;
//
//     // Insert or replace keyed by url
//     store.upsert(&updated).await?;
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One row per distinct short URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedLink {
    /// Normalized short URL (unique key)
    pub url: String,
    /// Post identifiers in the order they were seen, without repeats
    pub post_ids: Vec<String>,
    /// Text of the post with the numerically smallest identifier
    pub first_text: String,
    /// Always `post_ids.len() - 1`
    pub duplicate_count: u64,
    /// Timestamp of the last write
    pub last_update: chrono::DateTime<chrono::Utc>,
}

impl TrackedLink {
    /// Create an empty record for a url that has not been seen yet
    ///
    /// # Visibility
    ///
    /// This is `pub(crate)` so that records only come into existence through
    /// the `UrlRegistry`, which keeps the invariants on `post_ids`,
    /// `first_text` and `duplicate_count`.
    pub(crate) fn empty(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            post_ids: Vec::new(),
            first_text: String::new(),
            duplicate_count: 0,
            last_update: chrono::Utc::now(),
        }
    }

    /// Check if the record is outside the retention window
    pub fn is_expired(&self, retention: chrono::Duration) -> bool {
        self.is_expired_at(retention, chrono::Utc::now())
    }

    /// Check expiry against an explicit clock reading
    pub fn is_expired_at(
        &self,
        retention: chrono::Duration,
        now: chrono::DateTime<chrono::Utc>,
    ) -> bool {
        now.signed_duration_since(self.last_update) > retention
    }
}

/// Trait for link store implementations
///
/// This trait defines the document-style store the registry relies on:
/// lookup by url, insert-or-replace by url, and time-based expiry.
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
/// `upsert` on its own must be atomic per url; the read-modify-write cycle
/// around it is serialized by the `UrlRegistry`.
///
/// # Trust Level: Trusted (Core Component)
///
/// ## Allowed Capabilities
/// - ✅ Perform I/O for persistent storage (files, databases, etc.)
/// - ✅ Drop records whose `last_update` is outside the retention window
/// - ✅ Implement locking/concurrency control for thread safety
///
/// ## Forbidden Capabilities
/// - ❌ Decide whether a post is a duplicate (owned by `Classifier`)
/// - ❌ Merge post ids or pick `first_text` (owned by `UrlRegistry`)
/// - ❌ Spawn background sweepers (expiry is checked on access and on persist)
#[async_trait]
pub trait LinkStore: Send + Sync {
    /// Find the record for a url
    ///
    /// # Returns
    ///
    /// - `Ok(Some(TrackedLink))`: A live record
    /// - `Ok(None)`: No record, or the record has expired
    /// - `Err(Error)`: Storage error
    async fn find(&self, url: &str) -> Result<Option<TrackedLink>, crate::Error>;

    /// Insert the record, or replace the existing record with the same url
    async fn upsert(&self, record: &TrackedLink) -> Result<(), crate::Error>;

    /// Remove every expired record
    ///
    /// # Returns
    ///
    /// The number of records removed
    async fn purge_expired(&self) -> Result<usize, crate::Error>;

    /// List the urls of all live records
    async fn list_urls(&self) -> Result<Vec<String>, crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;

    /// The retention window this store enforces
    fn retention(&self) -> chrono::Duration;
}
