//! Backfill walker
//!
//! Seeds the registry with the tracked account's recent history before the
//! live consumer starts, so links mirrored before this process started are
//! not mirrored again. Backfill never mirrors anything.
//!
//! ## Paging
//!
//! ```text
//! search(from:handle, max_id=None)      -> [ 950 .. 851 ]
//! search(from:handle, max_id=850)       -> [ 850 .. 751 ]
//! ...
//! stop when fetched >= max_posts, or a page comes back empty
//! ```

use crate::classifier::Classifier;
use crate::error::Result;
use crate::traits::HistorySearch;
use std::sync::Arc;
use tracing::{debug, info};

/// Summary of a completed backfill
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillReport {
    /// Posts fetched in total
    pub fetched: usize,
    /// Pages requested (including the final empty one, if any)
    pub pages: usize,
    /// Posts that referenced an already-seen link
    pub duplicates: usize,
}

/// Pages through an account's history and feeds it to the classifier
pub struct BackfillWalker {
    search: Arc<dyn HistorySearch>,
    classifier: Arc<Classifier>,
    page_size: usize,
}

impl BackfillWalker {
    /// Create a walker requesting `page_size` posts per page
    pub fn new(
        search: Arc<dyn HistorySearch>,
        classifier: Arc<Classifier>,
        page_size: usize,
    ) -> Self {
        Self {
            search,
            classifier,
            page_size: page_size.max(1),
        }
    }

    /// Walk back through `handle`'s posts until `max_posts` have been fetched
    /// or the history runs out
    ///
    /// Any search or registry error aborts the walk.
    pub async fn backfill(&self, handle: &str, max_posts: usize) -> Result<BackfillReport> {
        let query = format!("from:{}", handle);
        let mut report = BackfillReport::default();
        let mut max_id: Option<u64> = None;

        info!(handle, max_posts, "Starting backfill");

        while report.fetched < max_posts {
            let page = self.search.search(&query, max_id, self.page_size).await?;
            report.pages += 1;

            if page.is_empty() {
                debug!("History exhausted");
                break;
            }

            let mut smallest = u64::MAX;
            for post in &page {
                smallest = smallest.min(post.id);
                if self.classifier.classify(post).await? {
                    report.duplicates += 1;
                }
            }
            report.fetched += page.len();

            debug!(
                page = report.pages,
                posts = page.len(),
                smallest,
                "Backfill page processed"
            );

            if smallest == 0 {
                break;
            }
            max_id = Some(smallest - 1);
        }

        info!(
            fetched = report.fetched,
            pages = report.pages,
            duplicates = report.duplicates,
            "Backfill complete"
        );

        Ok(report)
    }
}
