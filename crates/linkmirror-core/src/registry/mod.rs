//! URL registry
//!
//! The registry is the single authority on which short links have been seen.
//! It owns every mutation of `TrackedLink` records and keeps their invariants:
//!
//! - `post_ids` never holds the same identifier twice
//! - `first_text` is the text of the numerically smallest identifier
//! - `duplicate_count == post_ids.len() - 1`
//! - `last_update` is refreshed on every write
//!
//! ## Usage
//!
//! ```rust,ignore
//! use linkmirror_core::registry::UrlRegistry;
//!
//! let registry = UrlRegistry::new(store);
//!
//! let seen_before = registry
//!     .upsert_and_check("theverge.com/e/21", "1001", "post text")
//!     .await?;
//! ```
//!
//! ## Synchronization
//!
//! Lookup and upsert happen under one registry-wide async mutex, so callers
//! sharing a registry (backfill, then the live consumer) never interleave
//! their read-modify-write cycles. Across processes the store's own
//! per-url atomic upsert is all there is; one live instance is assumed.

use crate::error::{Error, Result};
use crate::traits::{LinkStore, TrackedLink};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Registry of seen short links
pub struct UrlRegistry {
    store: Arc<dyn LinkStore>,

    /// Serializes read-modify-write cycles
    write_lock: Mutex<()>,
}

impl UrlRegistry {
    /// Create a registry over a link store
    pub fn new(store: Arc<dyn LinkStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Record that `post_id` references `url`
    ///
    /// # Parameters
    ///
    /// - `url`: Display form of the short link
    /// - `post_id`: Decimal post identifier
    /// - `text`: Text of the post
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: The url already had a live record before this call
    /// - `Ok(false)`: First sighting; a new record was created
    /// - `Err(Error)`: Non-numeric id, or the store failed
    pub async fn upsert_and_check(&self, url: &str, post_id: &str, text: &str) -> Result<bool> {
        let numeric_id = parse_post_id(post_id)?;

        let _guard = self.write_lock.lock().await;

        let existing = self.store.find(url).await?;
        let seen_before = existing.is_some();
        let mut record = existing.unwrap_or_else(|| TrackedLink::empty(url));

        if !record.post_ids.iter().any(|id| id == post_id) {
            record.post_ids.push(post_id.to_string());
        }

        let smallest = record
            .post_ids
            .iter()
            .filter_map(|id| id.parse::<u64>().ok())
            .min();
        if smallest == Some(numeric_id) {
            record.first_text = text.to_string();
        }

        record.duplicate_count = record.post_ids.len().saturating_sub(1) as u64;
        record.last_update = chrono::Utc::now();

        self.store.upsert(&record).await?;

        debug!(
            url,
            post_id,
            duplicate_count = record.duplicate_count,
            seen_before,
            "Registry updated"
        );

        Ok(seen_before)
    }

    /// Get the live record for `url`, if any
    pub async fn get(&self, url: &str) -> Result<Option<TrackedLink>> {
        self.store.find(url).await
    }

    /// Persist any pending store changes
    pub async fn flush(&self) -> Result<()> {
        self.store.flush().await
    }
}

fn parse_post_id(post_id: &str) -> Result<u64> {
    post_id
        .parse::<u64>()
        .map_err(|_| Error::invalid_input(format!("Post id is not a decimal integer: {:?}", post_id)))
}
