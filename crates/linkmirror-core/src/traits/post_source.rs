// # Post Source Traits
//
// Defines the read side of the platform: resolving the tracked account,
// paging through its history, and subscribing to its live posts.
//
// ## Implementations
//
// - Twitter v1.1: `linkmirror-twitter` crate
//
// ## Usage
//
// ```rust,ignore
// use linkmirror_core::traits::{IdentityResolver, StreamSource};
// use tokio_stream::StreamExt;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let client = /* platform client */;
//
//     let user_id = client.resolve("verge").await?.expect("account exists");
//
//     let mut lines = client.open(user_id).await?;
//     while let Some(line) = lines.next().await {
//         println!("raw: {}", line?);
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio_stream::Stream;

/// A post as delivered by history search or the live stream
///
/// Field names follow the platform's status JSON, so a raw stream line
/// deserializes straight into this type. Only the fields the classifier
/// needs are kept; everything else in the payload is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingPost {
    /// Numeric identifier
    pub id: u64,
    /// The same identifier in string form
    pub id_str: String,
    /// Post text
    pub text: String,
    /// Author of the post
    #[serde(rename = "user")]
    pub author: PostAuthor,
    /// Embedded entities (links)
    #[serde(default)]
    pub entities: PostEntities,
}

/// Author of a post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostAuthor {
    /// Handle without the leading `@`
    #[serde(rename = "screen_name")]
    pub handle: String,
}

/// Entities embedded in a post
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostEntities {
    /// Link annotations
    #[serde(rename = "urls", default)]
    pub links: Vec<LinkAnnotation>,
}

/// One embedded link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkAnnotation {
    /// Display form of the link (scheme-less, as shown to readers)
    pub display_url: String,
}

impl IncomingPost {
    /// Create a post with no links
    ///
    /// This constructor is public for use in:
    /// - Platform client implementations
    /// - Contract tests within linkmirror-core
    /// - External testing code
    pub fn new(id: u64, author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id,
            id_str: id.to_string(),
            text: text.into(),
            author: PostAuthor {
                handle: author.into(),
            },
            entities: PostEntities::default(),
        }
    }

    /// Add a link annotation by its display form
    pub fn with_link(mut self, display_url: impl Into<String>) -> Self {
        self.entities.links.push(LinkAnnotation {
            display_url: display_url.into(),
        });
        self
    }

    /// Display forms of every embedded link
    pub fn display_urls(&self) -> impl Iterator<Item = &str> {
        self.entities.links.iter().map(|link| link.display_url.as_str())
    }
}

/// Raw line stream from a live connection
///
/// Each item is one line without its terminator. Blank lines are keep-alives.
/// An `Err` item means the connection failed; the stream ending means the
/// server closed it.
pub type LineStream = Pin<Box<dyn Stream<Item = Result<String, crate::Error>> + Send + 'static>>;

/// Trait for resolving a handle to a stable numeric identity
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Look up the numeric id of `handle`
    ///
    /// # Returns
    ///
    /// - `Ok(Some(u64))`: The account's id
    /// - `Ok(None)`: No such account
    /// - `Err(Error)`: The lookup call failed
    async fn resolve(&self, handle: &str) -> Result<Option<u64>, crate::Error>;
}

/// Trait for paging through historical posts
///
/// # Trust Level: Untrusted
///
/// One call is one page. Paging, cursors and the overall ceiling are owned
/// by the `BackfillWalker`.
#[async_trait]
pub trait HistorySearch: Send + Sync {
    /// Search posts matching `query`, newest first
    ///
    /// # Parameters
    ///
    /// - `query`: Search query (e.g. `from:handle`)
    /// - `max_id`: Only return posts with an id at most this value
    /// - `page_size`: Maximum number of posts to return
    async fn search(
        &self,
        query: &str,
        max_id: Option<u64>,
        page_size: usize,
    ) -> Result<Vec<IncomingPost>, crate::Error>;
}

/// Trait for opening the filtered live post stream
///
/// # Trust Level: Semi-Trusted
///
/// ## Allowed Capabilities
/// - ✅ Hold one long-lived connection per `open` call
/// - ⚠️ Spawn a reader task that exits when the returned stream is dropped
///
/// ## Forbidden Capabilities
/// - ❌ Reconnect on its own (owned by `LiveConsumer`)
/// - ❌ Parse or filter messages (owned by `LiveConsumer`)
#[async_trait]
pub trait StreamSource: Send + Sync {
    /// Open a connection filtered to posts involving `user_id`
    async fn open(&self, user_id: u64) -> Result<LineStream, crate::Error>;
}
