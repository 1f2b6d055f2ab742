//! Autosave engine for post drafts.
//!
//! This module ties the pieces together:
//! - Debounced scheduling of saves after bursts of edits
//! - Single-flight create/update calls with cancellation of superseded ones
//! - Identity tracking (create → update) with checkpointing across reloads
//! - Classification of failures into skip / reset / notify
//!
//! Each [`AutosaveEngine`] runs one worker task. The handle is cheap to call
//! from the editor: [`AutosaveEngine::notify_changed`] never blocks, and the
//! editor observes progress through [`AutosaveEvent`]s and
//! [`AutosaveStatus`].

pub mod classifier;
pub mod identity;
mod worker;

pub use classifier::{classify, Disposition};
pub use identity::{Identity, IdentityResolver};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::backend::{PersistenceBackend, ServerId};
use crate::checkpoint::CheckpointStore;
use crate::config::AutosaveConfig;
use crate::draft::{Draft, ResourceKind};
use crate::payload::SaveMode;
use worker::{Command, Worker};

/// Capacity of the event broadcast channel
const EVENT_CAPACITY: usize = 64;

/// Which remote collection a draft goes to, and under which checkpoint key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftTarget {
    pub kind: ResourceKind,
    pub checkpoint_key: String,
}

impl DraftTarget {
    pub fn new(kind: ResourceKind, checkpoint_key: impl Into<String>) -> Self {
        Self {
            kind,
            checkpoint_key: checkpoint_key.into(),
        }
    }

    /// A brand-new rich post
    pub fn new_post() -> Self {
        Self::for_kind(ResourceKind::Post)
    }

    /// A brand-new simple post
    pub fn new_simple_post() -> Self {
        Self::for_kind(ResourceKind::SimplePost)
    }

    pub fn for_kind(kind: ResourceKind) -> Self {
        Self::new(kind, kind.default_checkpoint_key())
    }
}

/// Why a cycle ended without a successful save
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Title or content missing
    NothingToSave,
    /// Serialized payload above the ceiling
    TooLarge { size: usize, limit: usize },
    /// Identical to the last saved payload
    Unchanged,
    /// The backend refused this cycle (validation, size or rate limits)
    Rejected { status: Option<u16> },
}

/// Notifications for the editor UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutosaveEvent {
    /// A save completed; `id` is the (possibly new) server identifier
    Saved {
        id: ServerId,
        mode: SaveMode,
        at: DateTime<Utc>,
    },
    /// A save failed in a way the user may want to know about
    SaveFailed {
        message: String,
        status: Option<u16>,
    },
    /// The server no longer knows the draft; the next save creates it anew
    IdentityReset { stale: ServerId },
    /// A cycle was skipped
    Skipped { reason: SkipReason },
}

/// Snapshot of engine state for status indicators
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutosaveStatus {
    /// A debounce timer is armed
    pub scheduled: bool,
    /// A network call is outstanding
    pub in_flight: bool,
    /// Server identifier, once the draft exists remotely
    pub identity: Option<ServerId>,
    /// Time of the last successful save
    pub last_saved_at: Option<DateTime<Utc>>,
    /// Message of the most recent failure, cleared on success
    pub last_error: Option<String>,
    /// Failures since the last success
    pub consecutive_failures: u32,
    /// Network calls started
    pub attempts: u64,
}

impl AutosaveStatus {
    /// Whether a save is scheduled or in flight
    pub fn is_pending(&self) -> bool {
        self.scheduled || self.in_flight
    }
}

/// Handle to a running autosave worker.
///
/// Dropping the handle stops the worker: the pending timer is cancelled and
/// any in-flight call is aborted.
pub struct AutosaveEngine {
    target: DraftTarget,
    commands: mpsc::UnboundedSender<Command>,
    status: Arc<RwLock<AutosaveStatus>>,
    events: broadcast::Sender<AutosaveEvent>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl AutosaveEngine {
    /// Start a worker for one draft. Must be called within a tokio runtime.
    ///
    /// The identity is restored from `checkpoints` before this returns, so a
    /// reloaded editor resumes updating the same remote resource.
    pub fn spawn(
        target: DraftTarget,
        config: AutosaveConfig,
        backend: Arc<dyn PersistenceBackend>,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> Self {
        let identity = IdentityResolver::restore(target.checkpoint_key.clone(), checkpoints);
        let status = Arc::new(RwLock::new(AutosaveStatus {
            identity: identity.state().id().cloned(),
            ..Default::default()
        }));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let worker = Worker::new(
            target.clone(),
            config,
            backend,
            identity,
            status.clone(),
            events.clone(),
        );
        let task = tokio::spawn(worker.run(commands_rx, shutdown.clone()));

        Self {
            target,
            commands,
            status,
            events,
            shutdown,
            task: Some(task),
        }
    }

    pub fn target(&self) -> &DraftTarget {
        &self.target
    }

    /// Report the latest state of the draft; restarts the debounce timer
    pub fn notify_changed(&self, draft: Draft) {
        self.send(Command::Changed(Box::new(draft)));
    }

    /// Save the latest draft now, bypassing the debounce timer
    pub fn flush(&self) {
        self.send(Command::Flush);
    }

    /// Drop the server identity and checkpoint, e.g. after publishing
    pub fn forget(&self) {
        self.send(Command::Forget);
    }

    /// Subscribe to save notifications
    pub fn subscribe(&self) -> broadcast::Receiver<AutosaveEvent> {
        self.events.subscribe()
    }

    pub fn status(&self) -> AutosaveStatus {
        self.status.read().clone()
    }

    /// Whether a save is scheduled or in flight
    pub fn is_pending(&self) -> bool {
        self.status.read().is_pending()
    }

    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.status.read().last_saved_at
    }

    pub fn identity(&self) -> Option<ServerId> {
        self.status.read().identity.clone()
    }

    /// Stop the worker and wait for it to exit
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("Autosave worker for {} has stopped", self.target.checkpoint_key);
        }
    }
}

impl Drop for AutosaveEngine {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
