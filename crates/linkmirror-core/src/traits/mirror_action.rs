// # Mirror Action Trait
//
// Defines the side effect the live consumer triggers for a post whose
// links were not seen before: re-sharing it to the operator's audience.

use async_trait::async_trait;

/// Result of a mirror call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorOutcome {
    /// The post was re-shared
    Mirrored {
        /// The mirrored post id
        post_id: String,
    },
    /// Mirroring is disabled; the call was logged and skipped
    DryRun {
        /// The post id that would have been mirrored
        post_id: String,
    },
}

/// Trait for mirror action implementations
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Perform one HTTP call to the platform per invocation
/// - ✅ Skip the call when the deployment switch disables mirroring
///
/// ## Forbidden Capabilities
/// - ❌ Retry or back off (failures surface to the consumer)
/// - ❌ Access the link store or decide eligibility
#[async_trait]
pub trait MirrorAction: Send + Sync {
    /// Re-share the post with the given id
    async fn mirror(&self, post_id: &str) -> Result<MirrorOutcome, crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
