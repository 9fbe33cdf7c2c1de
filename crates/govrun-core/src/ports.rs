//! Port traits the core depends on but does not implement.
//!
//! Mirrors the repo's habit of keeping adapters behind `async_trait` traits
//! bound `Send + Sync + 'static` so they can be held in an `Arc` and called
//! from spawned tasks. Concrete implementations live in
//! `crate::storage` (the JSON-file repository) and in the `govrun-cli` binary
//! (the git-backed inspector, the stdout publisher/notes-generator).

use async_trait::async_trait;

use crate::error::DomainError;
use crate::run::{ReleaseNotes, ReleaseRun, RunState, StepPlan};
use crate::value_types::{Categorization, ConventionalCommit};

/// Outcome of one publisher `execute_step` call.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub success: bool,
    pub output: Option<serde_json::Value>,
    pub error: Option<String>,
    pub already_done: bool,
}

impl StepOutcome {
    pub fn success(output: Option<serde_json::Value>) -> Self {
        Self {
            success: true,
            output,
            error: None,
            already_done: false,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
            already_done: false,
        }
    }
}

/// Persists and retrieves `ReleaseRun` aggregates.
#[async_trait]
pub trait ReleaseRunRepository: Send + Sync + 'static {
    async fn save(&self, run: &ReleaseRun) -> Result<(), DomainError>;
    async fn load(&self, run_id: &str) -> Result<ReleaseRun, DomainError>;
    async fn load_latest(&self, repo_root: &str) -> Result<ReleaseRun, DomainError>;
    async fn list(&self, repo_root: &str) -> Result<Vec<ReleaseRun>, DomainError>;
    async fn find_by_state(
        &self,
        repo_root: &str,
        state: RunState,
    ) -> Result<Vec<ReleaseRun>, DomainError>;
}

/// Reads repository facts the Plan use case needs.
#[async_trait]
pub trait RepoInspector: Send + Sync + 'static {
    async fn head_sha(&self) -> Result<String, DomainError>;
    /// Commits in `from_ref..to_ref`, parsed as conventional commits so the
    /// Plan use case can build a real `ChangeSet` rather than a bag of bare
    /// hashes. A commit whose subject doesn't match the conventional format
    /// is omitted, matching `ConventionalCommit::parse`'s own contract.
    async fn commits(
        &self,
        from_ref: &str,
        to_ref: &str,
    ) -> Result<Vec<ConventionalCommit>, DomainError>;
    async fn stable_repo_id(&self) -> Result<String, DomainError>;
}

/// Performs the external effects of a publishing step.
#[async_trait]
pub trait Publisher: Send + Sync + 'static {
    async fn check_idempotency(&self, run: &ReleaseRun, step: &StepPlan) -> Result<bool, DomainError>;
    async fn execute_step(&self, run: &ReleaseRun, step: &StepPlan) -> Result<StepOutcome, DomainError>;
}

/// Options passed to a notes-generator invocation.
#[derive(Debug, Clone, Default)]
pub struct NotesOptions {
    pub audience: String,
    pub tone: String,
    pub force: bool,
}

/// Produces release notes text from a run's commit set.
#[async_trait]
pub trait NotesGenerator: Send + Sync + 'static {
    async fn generate(
        &self,
        run: &ReleaseRun,
        options: &NotesOptions,
    ) -> Result<ReleaseNotes, DomainError>;
    fn compute_inputs_hash(&self, run: &ReleaseRun, options: &NotesOptions) -> Result<String, DomainError>;
}

/// The calculated next version for a run. `VersionCalculator::calculate`
/// is a pure computation from the run's change-set, returned rather than
/// mutated in place (the Rust port avoids the Go-style "sets fields in
/// place" shape in favor of a value the Bump use case applies explicitly).
#[derive(Debug, Clone)]
pub struct VersionDecision {
    pub version_current: crate::value_types::Semver,
    pub version_next: crate::value_types::Semver,
    pub bump_kind: crate::value_types::BumpKind,
    /// The categorization of the commits the calculator derived `bump_kind`
    /// from — carried forward so downstream governance evaluation sees real
    /// breaking/security counts instead of recomputing (or dropping) them.
    pub categorization: Categorization,
    pub tag_name: String,
}

#[async_trait]
pub trait VersionCalculator: Send + Sync + 'static {
    async fn calculate(&self, run: &ReleaseRun) -> Result<VersionDecision, DomainError>;
}

/// Optional historical-risk lookups. Not every deployment wires
/// one; the risk calculator treats its absence as "no historical signal".
#[async_trait]
pub trait HistoryProvider: Send + Sync + 'static {
    async fn get_rollback_rate(&self, repo_id: &str) -> Result<f64, DomainError>;
    async fn get_actor_history(&self, actor_id: &str) -> Result<Vec<String>, DomainError>;
    async fn get_recent_incidents(&self, repo_id: &str, limit: usize) -> Result<Vec<String>, DomainError>;
}

/// Fans domain events out to subscribers. Implemented by
/// `crate::broadcaster::Broadcaster`.
#[async_trait]
pub trait EventPublisher: Send + Sync + 'static {
    async fn publish(&self, events: Vec<crate::events::RunEvent>);
}
