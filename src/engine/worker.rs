//! The per-draft worker task.
//!
//! Owns everything mutable about one draft: the latest snapshot, the debounce
//! deadline, the identity and the single in-flight save. Callers reach it only
//! through the command channel; network calls report back through the
//! completion channel, tagged with the generation of the attempt that issued
//! them so superseded responses can be told apart and dropped.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::classifier::{classify, Disposition};
use super::identity::IdentityResolver;
use super::{AutosaveEvent, AutosaveStatus, DraftTarget, SkipReason};
use crate::backend::{BackendError, BackendResult, PersistenceBackend, ServerId};
use crate::config::AutosaveConfig;
use crate::draft::Draft;
use crate::payload::{PayloadError, PayloadSanitizer, PreparedPayload, SaveMode};

/// Requests from the engine handle
#[derive(Debug)]
pub(super) enum Command {
    /// A new snapshot of the draft
    Changed(Box<Draft>),
    /// Save the latest snapshot now
    Flush,
    /// Drop identity, checkpoint and pending work
    Forget,
}

/// Outcome of one network call
struct Completion {
    generation: u64,
    mode: SaveMode,
    fingerprint: String,
    result: BackendResult<ServerId>,
}

/// The single outstanding save attempt
struct InFlight {
    generation: u64,
    cancel: CancellationToken,
}

pub(super) struct Worker {
    target: DraftTarget,
    config: AutosaveConfig,
    sanitizer: PayloadSanitizer,
    backend: Arc<dyn PersistenceBackend>,
    identity: IdentityResolver,
    status: Arc<RwLock<AutosaveStatus>>,
    events: broadcast::Sender<AutosaveEvent>,
    /// Most recent snapshot seen, kept after saving for forced flushes
    latest: Option<Draft>,
    deadline: Option<Instant>,
    seen_first_change: bool,
    generation: u64,
    in_flight: Option<InFlight>,
    last_saved_fingerprint: Option<String>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: Option<mpsc::UnboundedReceiver<Completion>>,
}

impl Worker {
    pub(super) fn new(
        target: DraftTarget,
        config: AutosaveConfig,
        backend: Arc<dyn PersistenceBackend>,
        identity: IdentityResolver,
        status: Arc<RwLock<AutosaveStatus>>,
        events: broadcast::Sender<AutosaveEvent>,
    ) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            target,
            sanitizer: PayloadSanitizer::from_config(&config),
            config,
            backend,
            identity,
            status,
            events,
            latest: None,
            deadline: None,
            seen_first_change: false,
            generation: 0,
            in_flight: None,
            last_saved_fingerprint: None,
            completions_tx,
            completions_rx: Some(completions_rx),
        }
    }

    pub(super) async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        shutdown: CancellationToken,
    ) {
        let Some(mut completions) = self.completions_rx.take() else {
            return;
        };

        debug!("Autosave worker started for {}", self.target.checkpoint_key);

        loop {
            let deadline = self.deadline;
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                command = commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                Some(done) = completions.recv() => self.complete(done),
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.deadline = None;
                    self.fire(false);
                }
            }
        }

        self.teardown();
        debug!("Autosave worker stopped for {}", self.target.checkpoint_key);
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Changed(draft) => {
                self.latest = Some(*draft);

                if !self.seen_first_change {
                    self.seen_first_change = true;
                    if self.config.skip_initial_change {
                        debug!("Ignoring initial change for {}", self.target.checkpoint_key);
                        return;
                    }
                }

                self.deadline = Some(Instant::now() + self.config.debounce);
                self.publish(|s| s.scheduled = true);
            }
            Command::Flush => {
                self.deadline = None;
                self.fire(true);
            }
            Command::Forget => self.forget(),
        }
    }

    /// Run one save cycle with the latest snapshot
    fn fire(&mut self, forced: bool) {
        self.publish(|s| s.scheduled = false);

        let mode = self.identity.mode();
        let built = match self.latest.as_ref() {
            Some(draft) => self.sanitizer.build(draft, mode),
            None => Err(PayloadError::NothingToSave),
        };

        let prepared = match built {
            Ok(prepared) => prepared,
            Err(PayloadError::NothingToSave) => {
                debug!("Nothing to save for {}", self.target.checkpoint_key);
                self.emit(AutosaveEvent::Skipped {
                    reason: SkipReason::NothingToSave,
                });
                return;
            }
            Err(PayloadError::TooLarge { size, limit }) => {
                warn!(
                    "Skipping autosave of {}: payload is {} bytes, limit {}",
                    self.target.checkpoint_key, size, limit
                );
                self.emit(AutosaveEvent::Skipped {
                    reason: SkipReason::TooLarge { size, limit },
                });
                return;
            }
            Err(e @ PayloadError::Serialization(_)) => {
                warn!("Failed to build payload for {}: {}", self.target.checkpoint_key, e);
                self.emit(AutosaveEvent::SaveFailed {
                    message: e.to_string(),
                    status: None,
                });
                return;
            }
        };

        let unchanged = mode == SaveMode::Update
            && self.in_flight.is_none()
            && self.last_saved_fingerprint.as_deref() == Some(prepared.fingerprint.as_str());
        if unchanged && self.config.skip_unchanged && !forced {
            debug!("Draft {} unchanged since last save", self.target.checkpoint_key);
            self.emit(AutosaveEvent::Skipped {
                reason: SkipReason::Unchanged,
            });
            return;
        }

        self.start(mode, prepared);
    }

    /// Issue the network call, superseding whatever is still outstanding
    fn start(&mut self, mode: SaveMode, prepared: PreparedPayload) {
        self.cancel_in_flight();

        self.generation += 1;
        let generation = self.generation;
        let cancel = CancellationToken::new();
        self.in_flight = Some(InFlight {
            generation,
            cancel: cancel.clone(),
        });

        debug!(
            generation,
            mode = %mode,
            bytes = prepared.size_bytes,
            stripped_media = prepared.stripped_media,
            "Saving draft {}",
            self.target.checkpoint_key
        );

        let backend = self.backend.clone();
        let kind = self.target.kind;
        let bound = self.identity.state().id().cloned();
        let completions = self.completions_tx.clone();
        let PreparedPayload {
            payload,
            fingerprint,
            ..
        } = prepared;

        tokio::spawn(async move {
            let call = async {
                match &bound {
                    None => backend.create(kind, &payload).await,
                    Some(id) => backend.update(kind, id, &payload).await.map(|()| id.clone()),
                }
            };

            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Save attempt #{} superseded", generation);
                    return;
                }
                result = call => result,
            };

            let _ = completions.send(Completion {
                generation,
                mode,
                fingerprint,
                result,
            });
        });

        self.publish(|s| {
            s.in_flight = true;
            s.attempts += 1;
        });
    }

    fn complete(&mut self, done: Completion) {
        let current = matches!(&self.in_flight, Some(f) if f.generation == done.generation);
        if !current {
            debug!("Discarding response of superseded attempt #{}", done.generation);
            return;
        }
        self.in_flight = None;

        match done.result {
            Ok(id) => {
                if done.mode == SaveMode::Create {
                    self.identity.bind(id.clone());
                }
                self.last_saved_fingerprint = Some(done.fingerprint);

                let at = Utc::now();
                self.publish(|s| {
                    s.in_flight = false;
                    s.identity = Some(id.clone());
                    s.last_saved_at = Some(at);
                    s.last_error = None;
                    s.consecutive_failures = 0;
                });
                self.emit(AutosaveEvent::Saved {
                    id,
                    mode: done.mode,
                    at,
                });
            }
            Err(err) => self.fail(err, done.mode),
        }
    }

    fn fail(&mut self, err: BackendError, mode: SaveMode) {
        let disposition = classify(&err, mode);
        let key = self.target.checkpoint_key.clone();

        match disposition {
            Disposition::Ignore => debug!("Save of {} aborted", key),
            Disposition::ResetIdentity => {
                self.last_saved_fingerprint = None;
                if let Some(stale) = self.identity.reset() {
                    warn!("Remote draft {} is gone, next save creates a new one", stale);
                    self.emit(AutosaveEvent::IdentityReset { stale });
                }
            }
            _ if disposition.notifies() => {
                warn!("Autosave of {} failed: {}", key, err);
                self.emit(AutosaveEvent::SaveFailed {
                    message: err.to_string(),
                    status: err.status_code(),
                });
            }
            _ => {
                if disposition == Disposition::DropTerminal {
                    warn!("Backend rejected draft {}: {}", key, err);
                } else {
                    debug!("Skipping this cycle for {}: {}", key, err);
                }
                self.emit(AutosaveEvent::Skipped {
                    reason: SkipReason::Rejected {
                        status: err.status_code(),
                    },
                });
            }
        }

        let identity = self.identity.state().id().cloned();
        self.publish(|s| {
            s.in_flight = false;
            s.identity = identity;
            if disposition.counts_as_failure() {
                s.consecutive_failures += 1;
                s.last_error = Some(err.to_string());
            }
        });
    }

    fn forget(&mut self) {
        self.cancel_in_flight();
        self.deadline = None;
        self.latest = None;
        self.last_saved_fingerprint = None;
        self.identity.reset();

        self.publish(|s| {
            s.scheduled = false;
            s.in_flight = false;
            s.identity = None;
            s.last_error = None;
            s.consecutive_failures = 0;
        });
    }

    fn cancel_in_flight(&mut self) {
        if let Some(previous) = self.in_flight.take() {
            debug!("Cancelling save attempt #{}", previous.generation);
            previous.cancel.cancel();
        }
    }

    fn teardown(&mut self) {
        self.cancel_in_flight();
        self.deadline = None;
        self.publish(|s| {
            s.scheduled = false;
            s.in_flight = false;
        });
    }

    fn publish(&self, update: impl FnOnce(&mut AutosaveStatus)) {
        update(&mut self.status.write());
    }

    fn emit(&self, event: AutosaveEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}
