// # linkmirror-core
//
// Core library for the link mirroring system.
//
// ## Architecture Overview
//
// This library decides which posts of one tracked account get mirrored:
// - **LinkStore**: Persistent, expiring storage of tracked short links
// - **UrlRegistry**: Idempotent upsert of link sightings, the single source of truth
// - **Classifier**: Extracts candidate links from a post and checks them against the registry
// - **BackfillWalker**: Seeds the registry from the account's recent history
// - **LiveConsumer**: Follows the live stream and mirrors posts with unseen links
//
// ## Control Flow
//
// 1. Backfill drains the bounded history through the classifier (never mirrors)
// 2. The live consumer takes over, each post passing through the same classifier
// 3. Both share one registry; backfill finishes before the consumer starts
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Platform calls sit behind traits, decisions live here
// 2. **Constructor Injection**: Clients and stores are built once at startup and passed in
// 3. **Library-First**: All core functionality can be used as a library
// 4. **Idempotency**: Re-running backfill only re-derives already-persisted state

pub mod backfill;
pub mod classifier;
pub mod config;
pub mod consumer;
pub mod error;
pub mod registry;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use backfill::{BackfillReport, BackfillWalker};
pub use classifier::Classifier;
pub use config::{MirrorConfig, StoreConfig, StreamConfig};
pub use consumer::{ConsumerEvent, LiveConsumer, StreamMessage};
pub use error::{Error, Result};
pub use registry::UrlRegistry;
pub use store::{FileLinkStore, MemoryLinkStore};
pub use traits::{
    HistorySearch, IdentityResolver, IncomingPost, LinkStore, MirrorAction, MirrorOutcome,
    StreamSource, TrackedLink,
};
