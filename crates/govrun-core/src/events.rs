//! Domain events emitted by the `ReleaseRun` aggregate.
//!
//! The aggregate itself only ever produces [`RunEvent`] values and collects
//! them on `domain_events`; nothing in this module knows about the wire
//! envelope or the broadcaster — that mapping lives in [`crate::broadcaster`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::run::{Actor, RunState, StepState};
use crate::value_types::BumpKind;

/// One domain event, timestamped and scoped to a single run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEvent {
    pub at: DateTime<Utc>,
    pub run_id: String,
    pub kind: DomainEventKind,
}

/// The event-specific payload. Every state transition also emits a
/// `StateTransitioned` alongside its more specific sibling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEventKind {
    RunCreated {
        repo_id: String,
        plan_hash: String,
    },
    StateTransitioned {
        from: RunState,
        to: RunState,
        trigger: String,
    },
    RunVersioned {
        version_next: String,
        bump_kind: BumpKind,
    },
    RunNotesUpdated {
        inputs_hash: String,
    },
    RunApproved {
        actor: Actor,
        auto_approved: bool,
    },
    StepCompleted {
        step: String,
        state: StepState,
    },
    PluginExecuted {
        step: String,
        plugin_name: String,
    },
    RunPublished,
    RunFailed {
        error: String,
    },
    RunCancelled,
    RunRetried,
}

impl DomainEventKind {
    /// The dotted wire name for this event's kind. Falls through to
    /// `release.event` for anything not explicitly named there, though every
    /// variant above is named.
    pub fn wire_type(&self) -> &'static str {
        match self {
            Self::RunCreated { .. } => "release.created",
            Self::StateTransitioned { .. } => "release.state_changed",
            Self::RunVersioned { .. } => "release.versioned",
            Self::RunNotesUpdated { .. } => "release.notes_updated",
            Self::RunApproved { .. } => "release.approved",
            Self::StepCompleted { .. } => "release.step_completed",
            Self::PluginExecuted { .. } => "release.plugin_executed",
            Self::RunPublished => "release.published",
            Self::RunFailed { .. } => "release.failed",
            Self::RunCancelled => "release.cancelled",
            Self::RunRetried => "release.retried",
        }
    }
}
