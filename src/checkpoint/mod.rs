//! Local checkpoint of the server identifier of an in-progress draft.
//!
//! One overwritable slot per logical draft key (e.g. `new-post-draft`),
//! holding the identifier the backend assigned on the first create. A reloaded
//! editor reads it back to keep updating the same remote resource instead of
//! creating a duplicate. It is neither a queue nor a log.

mod sled_store;

pub use sled_store::SledCheckpointStore;

use dashmap::DashMap;
use thiserror::Error;

use crate::backend::ServerId;

/// Errors that can occur during checkpoint operations
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Sled database error: {0}")]
    Sled(#[from] sled::Error),

    #[error("Corrupted checkpoint for {key}: {reason}")]
    Corruption { key: String, reason: String },

    #[error("Checkpoint store initialization failed: {0}")]
    InitFailed(String),
}

/// Result type for checkpoint operations
pub type CheckpointResult<T> = Result<T, CheckpointError>;

/// Durable key → identifier slots
pub trait CheckpointStore: Send + Sync {
    /// Store (or overwrite) the identifier for a draft key
    fn persist(&self, key: &str, id: &ServerId) -> CheckpointResult<()>;

    /// Read the identifier for a draft key, if any
    fn read(&self, key: &str) -> CheckpointResult<Option<ServerId>>;

    /// Remove the identifier for a draft key
    fn clear(&self, key: &str) -> CheckpointResult<()>;
}

/// Process-local checkpoint store
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    slots: DashMap<String, ServerId>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn persist(&self, key: &str, id: &ServerId) -> CheckpointResult<()> {
        self.slots.insert(key.to_string(), id.clone());
        Ok(())
    }

    fn read(&self, key: &str) -> CheckpointResult<Option<ServerId>> {
        Ok(self.slots.get(key).map(|entry| entry.value().clone()))
    }

    fn clear(&self, key: &str) -> CheckpointResult<()> {
        self.slots.remove(key);
        Ok(())
    }
}
