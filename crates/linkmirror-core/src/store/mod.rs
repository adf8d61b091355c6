// # Link Store Implementations
//
// This module provides implementations of the LinkStore trait for
// different persistence strategies.

pub mod file;
pub mod memory;

pub use file::FileLinkStore;
pub use memory::MemoryLinkStore;

use crate::config::StoreConfig;
use crate::error::Result;
use crate::traits::LinkStore;
use std::sync::Arc;

/// Build the link store described by `config`
pub async fn open_store(
    config: &StoreConfig,
    retention: chrono::Duration,
) -> Result<Arc<dyn LinkStore>> {
    config.validate()?;

    let store: Arc<dyn LinkStore> = match config {
        StoreConfig::File { path } => Arc::new(FileLinkStore::new(path, retention).await?),
        StoreConfig::Memory => Arc::new(MemoryLinkStore::new(retention)),
    };

    tracing::info!(store = config.type_name(), "Link store opened");
    Ok(store)
}
