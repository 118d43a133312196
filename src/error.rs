use thiserror::Error;

use crate::profile::SwipeAction;

/// Failures surfaced by a [`ProfileStore`](crate::store::ProfileStore) implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The backend could not be reached or timed out.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// A write targeted a document that does not exist.
    #[error("profile not found: {0}")]
    NotFound(String),
    /// A stored document could not be decoded into a profile.
    #[error("malformed profile document {id}: {reason}")]
    Malformed { id: String, reason: String },
    /// The backend refused the operation (permissions, type mismatch, ...).
    #[error("operation rejected: {0}")]
    Rejected(String),
}

impl StoreError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        StoreError::Unavailable(msg.into())
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        StoreError::Rejected(msg.into())
    }
}

/// Errors produced by the matching engine.
///
/// Store failures inside a session are converted into reports and
/// degraded outcomes; only caller-contract violations come back as `Err`
/// from [`MatchSession`](crate::session::MatchSession) operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MatchError {
    #[error("current user has no matching preferences")]
    MissingPreferences,

    #[error("candidate query failed: {0}")]
    Query(#[source] StoreError),

    #[error("{action} write for candidate {candidate_id} failed: {source}")]
    Write {
        action: SwipeAction,
        candidate_id: String,
        #[source]
        source: StoreError,
    },

    #[error(
        "mutual match with {candidate_id} left one-sided (compensated: {compensated}): {source}"
    )]
    PartialMatch {
        candidate_id: String,
        compensated: bool,
        #[source]
        source: StoreError,
    },

    #[error("undo of {action} for candidate {candidate_id} failed: {source}")]
    Undo {
        action: SwipeAction,
        candidate_id: String,
        #[source]
        source: StoreError,
    },

    #[error("swipe task for candidate {candidate_id} aborted: {reason}")]
    TaskAborted {
        candidate_id: String,
        reason: String,
    },

    #[error("candidate pool is exhausted")]
    Exhausted,

    #[error("another session operation is still in flight")]
    InFlight,

    #[error("candidate pool has not been built")]
    NotBuilt,

    #[error("candidate {requested} is not the one at the cursor (expected {expected})")]
    StaleCandidate { requested: String, expected: String },

    #[error("session was built for user {expected}, not {actual}")]
    WrongUser { expected: String, actual: String },
}
