//! Server identity state machine.
//!
//! `Unbound` until the first create succeeds, `Bound(id)` afterwards. The
//! resolver owns the checkpoint slot of its draft and keeps it in step with
//! the in-memory state.

use std::sync::Arc;

use tracing::{info, warn};

use crate::backend::ServerId;
use crate::checkpoint::CheckpointStore;
use crate::payload::SaveMode;

/// Whether the draft exists remotely yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Unbound,
    Bound(ServerId),
}

impl Identity {
    pub fn id(&self) -> Option<&ServerId> {
        match self {
            Identity::Unbound => None,
            Identity::Bound(id) => Some(id),
        }
    }
}

/// Tracks the identity of one draft and mirrors it into the checkpoint store
pub struct IdentityResolver {
    state: Identity,
    key: String,
    checkpoints: Arc<dyn CheckpointStore>,
}

impl IdentityResolver {
    /// Restore the identity from the checkpoint slot, if one was left behind
    pub fn restore(key: impl Into<String>, checkpoints: Arc<dyn CheckpointStore>) -> Self {
        let key = key.into();
        let state = match checkpoints.read(&key) {
            Ok(Some(id)) => {
                info!("Resuming draft {} as {}", key, id);
                Identity::Bound(id)
            }
            Ok(None) => Identity::Unbound,
            Err(e) => {
                warn!("Failed to read checkpoint {}: {}", key, e);
                Identity::Unbound
            }
        };

        Self {
            state,
            key,
            checkpoints,
        }
    }

    pub fn state(&self) -> &Identity {
        &self.state
    }

    /// Create while unbound, update once bound
    pub fn mode(&self) -> SaveMode {
        match self.state {
            Identity::Unbound => SaveMode::Create,
            Identity::Bound(_) => SaveMode::Update,
        }
    }

    /// Record the identifier returned by a successful create
    pub fn bind(&mut self, id: ServerId) {
        if let Err(e) = self.checkpoints.persist(&self.key, &id) {
            warn!("Failed to checkpoint {} for {}: {}", id, self.key, e);
        }
        info!("Draft {} bound to {}", self.key, id);
        self.state = Identity::Bound(id);
    }

    /// Forget the identifier, returning the one that was dropped
    pub fn reset(&mut self) -> Option<ServerId> {
        if let Err(e) = self.checkpoints.clear(&self.key) {
            warn!("Failed to clear checkpoint {}: {}", self.key, e);
        }
        match std::mem::replace(&mut self.state, Identity::Unbound) {
            Identity::Bound(id) => {
                info!("Draft {} unbound from {}", self.key, id);
                Some(id)
            }
            Identity::Unbound => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::MemoryCheckpointStore;

    #[test]
    fn test_starts_unbound_without_checkpoint() {
        let store = Arc::new(MemoryCheckpointStore::new());
        let resolver = IdentityResolver::restore("new-post-draft", store);

        assert_eq!(resolver.state(), &Identity::Unbound);
        assert_eq!(resolver.mode(), SaveMode::Create);
    }

    #[test]
    fn test_restores_from_checkpoint() {
        let store = Arc::new(MemoryCheckpointStore::new());
        store
            .persist("new-post-draft", &ServerId::new("abc123"))
            .unwrap();

        let resolver = IdentityResolver::restore("new-post-draft", store);
        assert_eq!(resolver.state(), &Identity::Bound(ServerId::new("abc123")));
        assert_eq!(resolver.mode(), SaveMode::Update);
    }

    #[test]
    fn test_bind_and_reset_track_checkpoint() {
        let store = Arc::new(MemoryCheckpointStore::new());
        let mut resolver = IdentityResolver::restore("k", store.clone());

        resolver.bind(ServerId::new("abc123"));
        assert_eq!(store.read("k").unwrap(), Some(ServerId::new("abc123")));
        assert_eq!(resolver.state().id(), Some(&ServerId::new("abc123")));

        assert_eq!(resolver.reset(), Some(ServerId::new("abc123")));
        assert!(store.read("k").unwrap().is_none());
        assert_eq!(resolver.mode(), SaveMode::Create);

        assert_eq!(resolver.reset(), None);
    }
}
