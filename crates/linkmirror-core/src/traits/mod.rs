//! Core traits for the link mirroring system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`IdentityResolver`], [`HistorySearch`], [`StreamSource`]: Read posts from the platform
//! - [`MirrorAction`]: Re-share a post
//! - [`LinkStore`]: Persistent, expiring storage of tracked links

pub mod link_store;
pub mod mirror_action;
pub mod post_source;

pub use link_store::{LinkStore, TrackedLink};
pub use mirror_action::{MirrorAction, MirrorOutcome};
pub use post_source::{
    HistorySearch, IdentityResolver, IncomingPost, LineStream, LinkAnnotation, PostAuthor,
    PostEntities, StreamSource,
};
