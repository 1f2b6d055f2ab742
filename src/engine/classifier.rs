//! Failure classification.
//!
//! Maps a failed persistence call to what the engine does next. Pure: no
//! state is touched here, the worker applies the returned [`Disposition`].

use crate::backend::BackendError;
use crate::payload::SaveMode;

/// What to do with a failed save attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The call was aborted; no observable effect
    Ignore,
    /// Skip this cycle quietly (size or rate limits)
    SkipSilently,
    /// The server rejected this payload; drop it and wait for the next edit
    DropTerminal,
    /// The resource is gone; go back to creating
    ResetIdentity,
    /// Skip this cycle and tell the caller
    SkipAndNotify,
}

impl Disposition {
    /// Whether the caller receives a failure event
    pub fn notifies(&self) -> bool {
        matches!(self, Disposition::SkipAndNotify)
    }

    /// Whether the failure counts toward the consecutive-failure streak
    pub fn counts_as_failure(&self) -> bool {
        !matches!(self, Disposition::Ignore | Disposition::ResetIdentity)
    }
}

/// Classify a failed create or update
pub fn classify(error: &BackendError, mode: SaveMode) -> Disposition {
    match error {
        BackendError::Aborted => Disposition::Ignore,
        BackendError::Status { status, .. } => match (*status, mode) {
            (400, _) => Disposition::DropTerminal,
            (404, SaveMode::Update) => Disposition::ResetIdentity,
            (413, _) | (429, _) => Disposition::SkipSilently,
            _ => Disposition::SkipAndNotify,
        },
        BackendError::Transport(_) | BackendError::MalformedResponse(_) => {
            Disposition::SkipAndNotify
        }
    }
}
