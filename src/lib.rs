//! Draft Autosave - background persistence for posts under edit
//!
//! Keeps an in-progress post safe on the server while the author types:
//! - Debounced scheduling so a burst of edits produces one save
//! - Payload sanitization with size ceilings and oversized media stripping
//! - Create-then-update identity tracking with at most one call in flight
//! - Failure classification into silent skips, identity resets and
//!   notifications
//! - A sled-backed checkpoint of the server identifier across reloads

pub mod backend;
pub mod checkpoint;
pub mod config;
pub mod draft;
pub mod engine;
pub mod payload;

pub use backend::{BackendError, HttpBackend, PersistenceBackend, ServerId};
pub use checkpoint::{CheckpointError, CheckpointStore, MemoryCheckpointStore, SledCheckpointStore};
pub use config::{AutosaveConfig, BackendConfig, CheckpointConfig, ConfigError};
pub use draft::{Draft, ResourceKind};
pub use engine::{AutosaveEngine, AutosaveEvent, AutosaveStatus, DraftTarget, SkipReason};
pub use payload::{PayloadError, PayloadSanitizer, PostPayload, SaveMode};
