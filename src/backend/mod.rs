//! Persistence backend for post drafts.
//!
//! The engine never talks HTTP directly; it goes through the
//! [`PersistenceBackend`] trait so the network collaborator can be swapped for
//! a scripted fake in tests. [`HttpBackend`] is the production implementation
//! against the CMS posts API.

mod http;

pub use http::HttpBackend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::draft::ResourceKind;
use crate::payload::PostPayload;

/// Opaque identifier assigned by the backend on create
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(String);

impl ServerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ServerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ServerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ServerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Failures reported by a persistence call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Server responded {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Request aborted")]
    Aborted,
}

impl BackendError {
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        BackendError::Status {
            status,
            body: body.into(),
        }
    }

    /// HTTP status code, when the server answered at all
    pub fn status_code(&self) -> Option<u16> {
        match self {
            BackendError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Remote store for post drafts
#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Create a new resource, returning the server-assigned identifier
    async fn create(&self, kind: ResourceKind, payload: &PostPayload) -> BackendResult<ServerId>;

    /// Overwrite an existing resource
    async fn update(
        &self,
        kind: ResourceKind,
        id: &ServerId,
        payload: &PostPayload,
    ) -> BackendResult<()>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted in-memory backend for engine tests.

    use std::collections::VecDeque;
    use std::sync::Arc;

    use parking_lot::Mutex;
    use tokio::sync::{oneshot, Notify};

    use super::*;

    /// A call observed by the fake
    #[derive(Debug, Clone)]
    pub(crate) enum Call {
        Create { payload: PostPayload },
        Update { id: ServerId, payload: PostPayload },
    }

    impl Call {
        pub(crate) fn payload(&self) -> &PostPayload {
            match self {
                Call::Create { payload } | Call::Update { payload, .. } => payload,
            }
        }

        pub(crate) fn is_create(&self) -> bool {
            matches!(self, Call::Create { .. })
        }
    }

    /// Scripted response for the next call
    pub(crate) enum Reply {
        Created(ServerId),
        Updated,
        Fail(BackendError),
        /// Park the call until the sender fires
        Hold(oneshot::Receiver<BackendResult<Option<ServerId>>>),
    }

    #[derive(Default)]
    pub(crate) struct FakeBackend {
        calls: Mutex<Vec<Call>>,
        script: Mutex<VecDeque<Reply>>,
        created: Mutex<u32>,
        called: Notify,
    }

    impl FakeBackend {
        pub(crate) fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub(crate) fn push(&self, reply: Reply) {
            self.script.lock().push_back(reply);
        }

        /// Queue a held reply, returning the trigger that releases it
        pub(crate) fn hold(&self) -> oneshot::Sender<BackendResult<Option<ServerId>>> {
            let (tx, rx) = oneshot::channel();
            self.push(Reply::Hold(rx));
            tx
        }

        pub(crate) fn calls(&self) -> Vec<Call> {
            self.calls.lock().clone()
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.lock().len()
        }

        /// Wait until at least `n` calls were issued
        pub(crate) async fn wait_for_calls(&self, n: usize) {
            loop {
                let notified = self.called.notified();
                if self.call_count() >= n {
                    return;
                }
                notified.await;
            }
        }

        fn record(&self, call: Call) -> Option<Reply> {
            self.calls.lock().push(call);
            self.called.notify_waiters();
            self.script.lock().pop_front()
        }

        fn next_id(&self) -> ServerId {
            let mut created = self.created.lock();
            *created += 1;
            ServerId::new(format!("id-{}", *created))
        }
    }

    #[async_trait]
    impl PersistenceBackend for FakeBackend {
        async fn create(
            &self,
            _kind: ResourceKind,
            payload: &PostPayload,
        ) -> BackendResult<ServerId> {
            let reply = self.record(Call::Create {
                payload: payload.clone(),
            });
            match reply {
                None | Some(Reply::Updated) => Ok(self.next_id()),
                Some(Reply::Created(id)) => Ok(id),
                Some(Reply::Fail(err)) => Err(err),
                Some(Reply::Hold(rx)) => match rx.await {
                    Ok(Ok(Some(id))) => Ok(id),
                    Ok(Ok(None)) => Ok(self.next_id()),
                    Ok(Err(err)) => Err(err),
                    Err(_) => Err(BackendError::Aborted),
                },
            }
        }

        async fn update(
            &self,
            _kind: ResourceKind,
            id: &ServerId,
            payload: &PostPayload,
        ) -> BackendResult<()> {
            let reply = self.record(Call::Update {
                id: id.clone(),
                payload: payload.clone(),
            });
            match reply {
                None | Some(Reply::Updated) | Some(Reply::Created(_)) => Ok(()),
                Some(Reply::Fail(err)) => Err(err),
                Some(Reply::Hold(rx)) => match rx.await {
                    Ok(Ok(_)) => Ok(()),
                    Ok(Err(err)) => Err(err),
                    Err(_) => Err(BackendError::Aborted),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display() {
        let err = BackendError::status(404, "not found");
        assert_eq!(err.to_string(), "Server responded 404: not found");
        assert_eq!(err.status_code(), Some(404));
        assert_eq!(BackendError::Aborted.status_code(), None);
    }

    #[test]
    fn test_server_id_transparent() {
        let id = ServerId::new("abc123");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc123\"");
        assert_eq!(id.to_string(), "abc123");
    }
}
