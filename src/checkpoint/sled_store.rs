//! Sled-backed checkpoint store.
//!
//! Identifiers are stored as raw UTF-8 bytes in a dedicated tree, keyed by the
//! logical draft key. Writes are flushed according to [`CheckpointConfig`], so
//! a checkpoint survives a crash right after the create that produced it.

use sled::{Db, Tree};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use super::{CheckpointError, CheckpointResult, CheckpointStore};
use crate::backend::ServerId;
use crate::config::CheckpointConfig;

const TREE_CHECKPOINTS: &str = "checkpoints";

/// Sled-based checkpoint store
#[derive(Clone)]
pub struct SledCheckpointStore {
    db: Arc<Db>,
    checkpoints: Tree,
    config: CheckpointConfig,
}

impl SledCheckpointStore {
    /// Open or create a checkpoint store at the configured path
    pub fn open(config: CheckpointConfig) -> CheckpointResult<Self> {
        let path = Path::new(&config.path);

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CheckpointError::InitFailed(format!("Failed to create directory: {}", e))
            })?;
        }

        let db = sled::Config::new()
            .path(&config.path)
            .flush_every_ms(if config.flush_interval_ms > 0 {
                Some(config.flush_interval_ms)
            } else {
                None
            })
            .open()?;

        let checkpoints = db.open_tree(TREE_CHECKPOINTS)?;

        Ok(Self {
            db: Arc::new(db),
            checkpoints,
            config,
        })
    }

    /// Open with default configuration
    pub fn open_default() -> CheckpointResult<Self> {
        Self::open(CheckpointConfig::default())
    }

    /// Number of stored checkpoints
    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }

    /// Force flush all pending writes to disk
    pub fn flush(&self) -> CheckpointResult<()> {
        self.db.flush()?;
        Ok(())
    }

    fn flush_if_immediate(&self) -> CheckpointResult<()> {
        if self.config.flush_interval_ms == 0 {
            self.checkpoints.flush()?;
        }
        Ok(())
    }
}

impl CheckpointStore for SledCheckpointStore {
    fn persist(&self, key: &str, id: &ServerId) -> CheckpointResult<()> {
        self.checkpoints.insert(key.as_bytes(), id.as_str().as_bytes())?;
        self.flush_if_immediate()?;
        debug!("Checkpointed {} -> {}", key, id);
        Ok(())
    }

    fn read(&self, key: &str) -> CheckpointResult<Option<ServerId>> {
        match self.checkpoints.get(key.as_bytes())? {
            Some(bytes) => {
                let id = String::from_utf8(bytes.to_vec()).map_err(|e| {
                    CheckpointError::Corruption {
                        key: key.to_string(),
                        reason: e.to_string(),
                    }
                })?;
                Ok(Some(ServerId::new(id)))
            }
            None => Ok(None),
        }
    }

    fn clear(&self, key: &str) -> CheckpointResult<()> {
        self.checkpoints.remove(key.as_bytes())?;
        self.flush_if_immediate()?;
        debug!("Cleared checkpoint {}", key);
        Ok(())
    }
}

impl Drop for SledCheckpointStore {
    fn drop(&mut self) {
        // Attempt to flush on drop, but don't panic
        let _ = self.flush();
    }
}
