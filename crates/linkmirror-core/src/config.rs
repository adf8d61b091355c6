//! Configuration types for the link mirroring system
//!
//! This module defines all configuration structures used throughout the crate.
//! Platform credentials are not part of this configuration; they belong to
//! the platform client.

use serde::{Deserialize, Serialize};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Tracked account
    pub account: AccountConfig,

    /// Candidate link selection
    #[serde(default)]
    pub links: LinkConfig,

    /// Link store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Retention window for tracked links (in hours)
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,

    /// Historical backfill settings
    #[serde(default)]
    pub backfill: BackfillConfig,

    /// Mirror action settings
    #[serde(default)]
    pub mirror: MirrorSettings,

    /// Live stream settings
    #[serde(default)]
    pub stream: StreamConfig,
}

impl MirrorConfig {
    /// Create a configuration for `handle` with defaults everywhere else
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            account: AccountConfig {
                handle: handle.into(),
            },
            links: LinkConfig::default(),
            store: StoreConfig::default(),
            retention_hours: default_retention_hours(),
            backfill: BackfillConfig::default(),
            mirror: MirrorSettings::default(),
            stream: StreamConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.account.validate()?;
        self.links.validate()?;
        self.store.validate()?;
        self.backfill.validate()?;
        self.stream.validate()?;

        if !(1..=MAX_RETENTION_HOURS).contains(&self.retention_hours) {
            return Err(crate::Error::config(format!(
                "Retention window must be between 1 and {} hours. Got: {}",
                MAX_RETENTION_HOURS, self.retention_hours
            )));
        }

        Ok(())
    }

    /// Retention window as a duration
    pub fn retention(&self) -> Result<chrono::Duration, crate::Error> {
        i64::try_from(self.retention_hours)
            .ok()
            .and_then(chrono::Duration::try_hours)
            .ok_or_else(|| {
                crate::Error::config(format!(
                    "Retention window of {} hours is out of range",
                    self.retention_hours
                ))
            })
    }
}

/// Tracked account configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Handle of the account whose posts are mirrored (without `@`)
    pub handle: String,
}

impl AccountConfig {
    /// Validate the account configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.handle.is_empty() {
            return Err(crate::Error::config("Tracked account handle cannot be empty"));
        }
        if self.handle.starts_with('@') {
            return Err(crate::Error::config(
                "Tracked account handle must not start with '@'",
            ));
        }
        if self.handle.chars().any(char::is_whitespace) {
            return Err(crate::Error::config(
                "Tracked account handle cannot contain whitespace",
            ));
        }
        Ok(())
    }
}

/// Candidate link configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Display-form prefix a link must start with to be tracked
    #[serde(default = "default_link_prefix")]
    pub prefix: String,
}

impl LinkConfig {
    /// Validate the link configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.prefix.is_empty() {
            return Err(crate::Error::config("Link prefix cannot be empty"));
        }
        Ok(())
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            prefix: default_link_prefix(),
        }
    }
}

/// Link store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// File-based link store
    File {
        /// Path to the store file
        path: String,
    },

    /// In-memory link store (not persistent)
    Memory,
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::File { path } if path.is_empty() => {
                Err(crate::Error::config("Link store path cannot be empty"))
            }
            _ => Ok(()),
        }
    }

    /// Get the store type name
    pub fn type_name(&self) -> &'static str {
        match self {
            StoreConfig::File { .. } => "file",
            StoreConfig::Memory => "memory",
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::File {
            path: default_store_path(),
        }
    }
}

/// Backfill configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillConfig {
    /// Upper bound on the number of historical posts fetched
    #[serde(default = "default_max_posts")]
    pub max_posts: usize,

    /// Posts requested per page (the search API caps this at 100)
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl BackfillConfig {
    /// Validate the backfill configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if !(1..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(crate::Error::config(format!(
                "Backfill page size must be between 1 and {}. Got: {}",
                MAX_PAGE_SIZE, self.page_size
            )));
        }
        Ok(())
    }
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            max_posts: default_max_posts(),
            page_size: default_page_size(),
        }
    }
}

/// Mirror action settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MirrorSettings {
    /// Whether mirror calls reach the platform
    ///
    /// When false, eligibility is still computed and logged but the
    /// platform is never called.
    #[serde(default)]
    pub enabled: bool,
}

/// Live stream settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Consecutive failed connections tolerated before `listen` gives up
    #[serde(default = "default_max_reconnects")]
    pub max_reconnects: usize,

    /// Backoff before the first reconnect (in seconds)
    #[serde(default = "default_initial_backoff_secs")]
    pub initial_backoff_secs: u64,

    /// Upper bound on the reconnect backoff (in seconds)
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,

    /// Capacity of the consumer event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl StreamConfig {
    /// Validate the stream configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.max_backoff_secs < self.initial_backoff_secs {
            return Err(crate::Error::config(format!(
                "Maximum backoff ({}s) must be >= initial backoff ({}s)",
                self.max_backoff_secs, self.initial_backoff_secs
            )));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }

    /// Backoff before reconnect attempt `attempt` (1-based)
    pub fn backoff_for(&self, attempt: usize) -> std::time::Duration {
        let exponent = attempt.saturating_sub(1).min(16) as u32;
        let secs = self
            .initial_backoff_secs
            .saturating_mul(1u64 << exponent)
            .min(self.max_backoff_secs);
        std::time::Duration::from_secs(secs)
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_reconnects: default_max_reconnects(),
            initial_backoff_secs: default_initial_backoff_secs(),
            max_backoff_secs: default_max_backoff_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

/// Largest page the history search accepts
pub const MAX_PAGE_SIZE: usize = 100;

/// Longest retention window accepted (one year)
pub const MAX_RETENTION_HOURS: u64 = 24 * 365;

fn default_link_prefix() -> String {
    "theverge.com/e/".to_string()
}

fn default_store_path() -> String {
    "linkmirror-links.json".to_string()
}

fn default_retention_hours() -> u64 {
    72
}

fn default_max_posts() -> usize {
    1000
}

fn default_page_size() -> usize {
    MAX_PAGE_SIZE
}

fn default_max_reconnects() -> usize {
    5
}

fn default_initial_backoff_secs() -> u64 {
    1
}

fn default_max_backoff_secs() -> u64 {
    60
}

fn default_event_channel_capacity() -> usize {
    1000
}
