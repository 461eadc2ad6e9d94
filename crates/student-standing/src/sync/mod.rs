//! Client-side cache synchronizer: a per-client optimistic replica of the
//! record subset visible to that client, reconciled against server acks and
//! replayed change events, with a last-known-good cache for offline starts.

pub mod backoff;
mod replica;

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::registry::{StudentDraft, StudentPatch, StudentRecord};

pub use backoff::RetryPolicy;
pub use replica::{ClientReplica, EntryState, LoadOutcome, ReplicaEntry};

/// Failure surfaced by the authoritative gateway. Transient and rate-limit
/// failures retry with backoff; rejections fail immediately.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("service unavailable: {0}")]
    Transient(String),
    #[error("rate limited")]
    RateLimited { retry_after: Option<Duration> },
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl GatewayError {
    /// `Some(hint)` for retryable failures, `None` for terminal ones.
    pub(crate) fn retry_hint(&self) -> Option<Option<Duration>> {
        match self {
            GatewayError::Transient(_) => Some(None),
            GatewayError::RateLimited { retry_after } => Some(*retry_after),
            GatewayError::Rejected(_) => None,
        }
    }
}

/// A mutation issued from the client, keyed by business identity.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMutation {
    Create(StudentDraft),
    Update {
        student_number: String,
        patch: StudentPatch,
    },
    Delete {
        student_number: String,
    },
}

impl ClientMutation {
    pub fn student_number(&self) -> &str {
        match self {
            ClientMutation::Create(draft) => &draft.student_number,
            ClientMutation::Update { student_number, .. }
            | ClientMutation::Delete { student_number } => student_number,
        }
    }
}

/// Server confirmation carrying the canonical state.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationAck {
    Record(StudentRecord),
    Deleted { student_number: String },
}

/// The authoritative server seam. A production implementation speaks HTTP;
/// tests drive the replica with scripted gateways.
pub trait RecordGateway {
    fn fetch_all(&self) -> Result<Vec<StudentRecord>, GatewayError>;
    fn apply(&self, mutation: &ClientMutation) -> Result<MutationAck, GatewayError>;
}

/// Last-known-good persistence for offline fallback.
pub trait ReplicaCache {
    fn load(&self) -> Option<Vec<StudentRecord>>;
    fn store(&self, records: &[StudentRecord]);
}

/// JSON-file cache. Failures degrade to warnings; a broken cache file reads
/// as absent.
pub struct JsonFileCache {
    path: PathBuf,
}

impl JsonFileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ReplicaCache for JsonFileCache {
    fn load(&self) -> Option<Vec<StudentRecord>> {
        let raw = std::fs::read_to_string(&self.path).ok()?;
        serde_json::from_str(&raw).ok()
    }

    fn store(&self, records: &[StudentRecord]) {
        let payload = match serde_json::to_string(records) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "replica cache serialization failed");
                return;
            }
        };
        if let Err(err) = std::fs::write(&self.path, payload) {
            warn!(error = %err, path = %self.path.display(), "replica cache write failed");
        }
    }
}
