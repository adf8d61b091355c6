//! Duplicate classifier
//!
//! Decides whether a post references a short link that was seen before.
//! Every decision re-reads the registry; nothing is cached between calls.

use crate::error::Result;
use crate::registry::UrlRegistry;
use crate::traits::IncomingPost;
use std::sync::Arc;
use tracing::debug;

/// Classifies posts against the URL registry
pub struct Classifier {
    registry: Arc<UrlRegistry>,
    link_prefix: String,
}

impl Classifier {
    /// Create a classifier tracking links whose display form starts with `link_prefix`
    pub fn new(registry: Arc<UrlRegistry>, link_prefix: impl Into<String>) -> Self {
        Self {
            registry,
            link_prefix: link_prefix.into(),
        }
    }

    /// Candidate links of `post`, in order of first appearance, without repeats
    pub fn candidate_links<'a>(&self, post: &'a IncomingPost) -> Vec<&'a str> {
        let mut links: Vec<&str> = Vec::new();
        for url in post.display_urls() {
            if url.starts_with(&self.link_prefix) && !links.contains(&url) {
                links.push(url);
            }
        }
        links
    }

    /// Classify `post`, recording its links in the registry
    ///
    /// Every candidate link is upserted, even after one has already been
    /// found in the registry, so all of them stay current.
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: At least one candidate link was seen before
    /// - `Ok(false)`: No candidate links, or all of them are new
    /// - `Err(Error)`: The registry could not be consulted
    pub async fn classify(&self, post: &IncomingPost) -> Result<bool> {
        let links = self.candidate_links(post);
        if links.is_empty() {
            debug!(post_id = %post.id_str, "No candidate links");
            return Ok(false);
        }

        let mut duplicate = false;
        for url in links {
            let seen_before = self
                .registry
                .upsert_and_check(url, &post.id_str, &post.text)
                .await?;
            duplicate |= seen_before;
        }

        debug!(post_id = %post.id_str, duplicate, "Post classified");
        Ok(duplicate)
    }

    /// The registry this classifier writes to
    pub fn registry(&self) -> &Arc<UrlRegistry> {
        &self.registry
    }
}
