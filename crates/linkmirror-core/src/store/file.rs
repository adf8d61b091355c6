// # File Link Store
//
// File-based implementation of LinkStore with crash recovery and expiry.
//
// ## Purpose
//
// Keeps tracked links across daemon restarts, so a link mirrored before a
// restart is still recognized afterwards even if it fell outside the
// backfill window.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON on load
// - Automatic backup: Keeps .backup of last known good state
// - Recovery: Falls back to backup if corruption detected
//
// ## Expiry
//
// Records older than the retention window are dropped when the file is
// loaded and every time it is written. Reads never return them.
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "links": {
//     "theverge.com/e/21": {
//       "url": "theverge.com/e/21",
//       "post_ids": ["100", "200"],
//       "first_text": "...",
//       "duplicate_count": 1,
//       "last_update": "2025-01-09T12:00:00Z"
//     }
//   }
// }
// ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::link_store::{LinkStore, TrackedLink};

/// Store file format version
const STORE_FILE_VERSION: &str = "1.0";

/// File-based link store with crash recovery
///
/// Every upsert is written through to disk before it returns.
///
/// # Example
///
/// ```rust,no_run
/// use linkmirror_core::store::FileLinkStore;
/// use linkmirror_core::traits::LinkStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileLinkStore::new(
///         "/var/lib/linkmirror/links.json",
///         chrono::Duration::hours(72),
///     )
///     .await?;
///
///     let urls = store.list_urls().await?;
///     println!("{} links tracked", urls.len());
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileLinkStore {
    path: PathBuf,
    retention: chrono::Duration,
    state: Arc<RwLock<FileState>>,
}

#[derive(Debug)]
struct FileState {
    links: HashMap<String, TrackedLink>,
    dirty: bool,
}

/// Serializable store file format
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct StoreFileFormat {
    version: String,
    links: HashMap<String, TrackedLink>,
}

impl FileLinkStore {
    /// Create or load a file link store
    ///
    /// This will:
    /// 1. Create parent directories if needed
    /// 2. Try to load the existing store file
    /// 3. If corruption detected, try to load from backup
    /// 4. If both fail, start with an empty store
    /// 5. Drop records that have already expired
    pub async fn new<P: AsRef<Path>>(path: P, retention: chrono::Duration) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create store directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let mut links = Self::load_with_recovery(&path).await?;

        let now = chrono::Utc::now();
        let before = links.len();
        links.retain(|_, record| !record.is_expired_at(retention, now));
        let expired = before - links.len();
        if expired > 0 {
            tracing::info!(expired, "Dropped expired links on load");
        }

        Ok(Self {
            path,
            retention,
            state: Arc::new(RwLock::new(FileState {
                links,
                dirty: expired > 0,
            })),
        })
    }

    /// Load the store file, falling back to the backup on corruption
    async fn load_with_recovery(path: &Path) -> Result<HashMap<String, TrackedLink>, Error> {
        match Self::load(path).await {
            Ok(links) => {
                tracing::debug!("Loaded link store: {} records", links.len());
                Ok(links)
            }
            Err(Error::Json(e)) => {
                tracing::warn!(
                    "Link store file appears corrupted: {}. Attempting recovery from backup.",
                    e
                );

                let backup_path = Self::backup_path(path);
                if !backup_path.exists() {
                    tracing::warn!("No backup file found. Starting with empty store.");
                    return Ok(HashMap::new());
                }

                match Self::load(&backup_path).await {
                    Ok(links) => {
                        tracing::info!("Recovered link store from backup: {} records", links.len());
                        if let Err(restore_err) = fs::copy(&backup_path, path).await {
                            tracing::error!(
                                "Failed to restore store file from backup: {}",
                                restore_err
                            );
                        }
                        Ok(links)
                    }
                    Err(backup_err) => {
                        tracing::error!(
                            "Backup also unreadable: {}. Starting with empty store.",
                            backup_err
                        );
                        Ok(HashMap::new())
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Load the store file
    ///
    /// Parse failures come back as `Error::Json` so the caller can tell
    /// corruption apart from I/O failures.
    async fn load(path: &Path) -> Result<HashMap<String, TrackedLink>, Error> {
        if !path.exists() {
            tracing::debug!("Link store file does not exist: {}", path.display());
            return Ok(HashMap::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::store(format!(
                "Failed to read store file {}: {}",
                path.display(),
                e
            ))
        })?;

        let store_file: StoreFileFormat = serde_json::from_str(&content)?;

        if store_file.version != STORE_FILE_VERSION {
            tracing::warn!(
                "Store file version mismatch: expected {}, got {}. Attempting to load anyway.",
                STORE_FILE_VERSION,
                store_file.version
            );
        }

        Ok(store_file.links)
    }

    /// Drop expired records and write the store to disk atomically
    async fn write_state(&self) -> Result<(), Error> {
        let mut state_guard = self.state.write().await;

        let now = chrono::Utc::now();
        state_guard
            .links
            .retain(|_, record| !record.is_expired_at(self.retention, now));

        let store_file = StoreFileFormat {
            version: STORE_FILE_VERSION.to_string(),
            links: state_guard.links.clone(),
        };

        let json = serde_json::to_string_pretty(&store_file)
            .map_err(|e| Error::store(format!("Failed to serialize link store: {}", e)))?;

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::store(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.flush().await.map_err(|e| {
                Error::store(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        state_guard.dirty = false;
        tracing::trace!("Link store written to file: {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl LinkStore for FileLinkStore {
    async fn find(&self, url: &str) -> Result<Option<TrackedLink>, Error> {
        let state_guard = self.state.read().await;
        Ok(state_guard
            .links
            .get(url)
            .filter(|record| !record.is_expired(self.retention))
            .cloned())
    }

    async fn upsert(&self, record: &TrackedLink) -> Result<(), Error> {
        {
            let mut state_guard = self.state.write().await;
            state_guard.links.insert(record.url.clone(), record.clone());
            state_guard.dirty = true;
        }

        // Immediate write for durability
        self.write_state().await
    }

    async fn purge_expired(&self) -> Result<usize, Error> {
        let expired = {
            let state_guard = self.state.read().await;
            let now = chrono::Utc::now();
            state_guard
                .links
                .values()
                .filter(|record| record.is_expired_at(self.retention, now))
                .count()
        };

        if expired > 0 {
            self.write_state().await?;
        }
        Ok(expired)
    }

    async fn list_urls(&self) -> Result<Vec<String>, Error> {
        let state_guard = self.state.read().await;
        Ok(state_guard
            .links
            .values()
            .filter(|record| !record.is_expired(self.retention))
            .map(|record| record.url.clone())
            .collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        let dirty = self.state.read().await.dirty;
        if dirty {
            self.write_state().await
        } else {
            Ok(())
        }
    }

    fn retention(&self) -> chrono::Duration {
        self.retention
    }
}
