//! Domain-level error taxonomy for the release-governance engine.

use crate::run::RunState;

/// Errors raised by the `ReleaseRun` aggregate and the use cases built on it.
///
/// Each variant is a distinguishable kind, not a formatted string — callers
/// match on the variant to decide whether to retry, re-approve, or surface
/// the error verbatim.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("invalid state: cannot {event} a run in state {state:?}")]
    InvalidState { state: RunState, event: String },

    #[error("head sha changed: pinned {pinned}, current {current}")]
    HeadShaChanged { pinned: String, current: String },

    #[error("run {run_id} is already published")]
    AlreadyPublished { run_id: String },

    #[error("approval bound to plan hash {expected}, run is now at {actual}")]
    ApprovalBoundToHash { expected: String, actual: String },

    #[error("plan hash mismatch: approval was granted against {expected}, run is at {actual}")]
    PlanHashMismatch { expected: String, actual: String },

    #[error("step not found: {0}")]
    StepNotFound(String),

    #[error("step already done: {0}")]
    StepAlreadyDone(String),

    #[error("run not found: {0}")]
    RunNotFound(String),

    #[error("port failure: {0}")]
    PortFailure(String),

    #[error("invalid version: {0}")]
    InvalidVersion(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for release-governance domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
