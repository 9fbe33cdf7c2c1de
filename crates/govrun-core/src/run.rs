//! The `ReleaseRun` aggregate: state machine, plan hash, step plan, and
//! domain-event collection.
//!
//! Every mutation goes through a method on [`ReleaseRun`]; there is no public
//! field-write path that bypasses the state machine. The struct's fields are `pub` for serialization and for the
//! storage adapter's round-trip, but use cases (`crate::usecases`) are the
//! only callers outside this module and its tests.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::digest::{digest_concat, truncate};
use crate::error::{DomainError, Result};
use crate::events::{DomainEventKind, RunEvent};
use crate::value_types::{BumpKind, Categorization, Semver};

/// The aggregate's lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Draft,
    Planned,
    Versioned,
    NotesReady,
    Approved,
    Publishing,
    Published,
    Failed,
    Cancelled,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Draft => "draft",
            Self::Planned => "planned",
            Self::Versioned => "versioned",
            Self::NotesReady => "notes_ready",
            Self::Approved => "approved",
            Self::Publishing => "publishing",
            Self::Published => "published",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// The nature of the actor driving a use case (shared with the risk
/// calculator's `ActorKind`, kept as a separate type here since the run's
/// `actor` field is persisted and the risk type is a pure-function input).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    Human,
    Ci,
    Agent,
}

impl From<ActorType> for crate::risk::ActorKind {
    fn from(value: ActorType) -> Self {
        match value {
            ActorType::Human => crate::risk::ActorKind::Human,
            ActorType::Ci => crate::risk::ActorKind::Ci,
            ActorType::Agent => crate::risk::ActorKind::Agent,
        }
    }
}

/// The actor who requested or approved a transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    #[serde(rename = "type")]
    pub actor_type: ActorType,
    pub id: String,
}

/// Approve/require-approval/block-release floors carried on the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thresholds {
    pub auto_approve: f64,
    pub require_approval: f64,
    pub block_above: f64,
}

/// The kind of external effect a publishing step performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Tag,
    Build,
    Artifact,
    Notify,
    Finalize,
    Plugin,
    Changelog,
}

/// A step's place in the per-step state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Pending,
    Running,
    Done,
    Failed,
    Skipped,
}

/// One entry in the run's ordered publishing plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepPlan {
    pub name: String,
    pub kind: StepKind,
    pub config_hash: String,
    pub idempotency_key: String,
    pub plugin_name: Option<String>,
    pub hook: Option<String>,
    #[serde(rename = "unsafe")]
    pub unsafe_step: bool,
}

impl StepPlan {
    /// Build a step plan entry, deriving its idempotency key as the first 16
    /// hex characters of `SHA-256(run_id ∥ name ∥ config_hash)`.
    pub fn new(
        run_id: &str,
        name: impl Into<String>,
        kind: StepKind,
        config_hash: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let config_hash = config_hash.into();
        let key_source = digest_concat(&[run_id, &name, &config_hash]);
        Self {
            name,
            kind,
            config_hash,
            idempotency_key: truncate(&key_source, 16),
            plugin_name: None,
            hook: None,
            unsafe_step: false,
        }
    }

    pub fn with_plugin(mut self, plugin_name: impl Into<String>, hook: impl Into<String>) -> Self {
        self.plugin_name = Some(plugin_name.into());
        self.hook = Some(hook.into());
        self
    }
}

/// Per-step execution state, tracked separately from the (immutable once
/// planned) step plan itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepStatus {
    pub state: StepState,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub output: Option<serde_json::Value>,
}

impl Default for StepStatus {
    fn default() -> Self {
        Self {
            state: StepState::Pending,
            attempts: 0,
            last_error: None,
            started_at: None,
            completed_at: None,
            output: None,
        }
    }
}

/// An append-only record of one state transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub at: DateTime<Utc>,
    pub from: RunState,
    pub to: RunState,
    pub event: String,
    pub actor: String,
    pub reason: Option<String>,
    pub metadata: HashMap<String, String>,
}

/// Opaque release notes plus the audience/tone/provider/model metadata the
/// notes-generator port attached, and the hash of the inputs they were
/// generated from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseNotes {
    pub text: String,
    pub audience: String,
    pub tone: String,
    pub provider: String,
    pub model: String,
    pub generated_at: DateTime<Utc>,
    pub inputs_hash: String,
}

/// The approval recorded on a run: which plan hash it was granted against,
/// by whom, and whether it was auto-approved by the CGP evaluator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Approval {
    pub plan_hash: String,
    pub actor: Actor,
    pub auto_approved: bool,
    pub approved_at: DateTime<Utc>,
}

/// The inputs that feed a run's plan hash and identity. Passed as a
/// group to [`ReleaseRun::new_draft`] and to [`ReleaseRun::recompute_plan_hash`]
/// so both call sites derive identity the same way.
#[derive(Debug, Clone)]
pub struct PlanInputs<'a> {
    pub repo_id: &'a str,
    pub base_ref: &'a str,
    pub head_sha: &'a str,
    pub commits: &'a [String],
    pub version_next: &'a str,
    pub config_hash: &'a str,
    pub plugin_plan_hash: &'a str,
}

/// SHA-256 over the sorted concatenation of the plan's identity inputs.
pub fn compute_plan_hash(inputs: &PlanInputs<'_>) -> String {
    let mut sorted_commits = inputs.commits.to_vec();
    sorted_commits.sort();

    let mut parts: Vec<&str> = Vec::with_capacity(6 + sorted_commits.len());
    parts.push(inputs.repo_id);
    parts.push(inputs.base_ref);
    parts.push(inputs.head_sha);
    for c in &sorted_commits {
        parts.push(c.as_str());
    }
    parts.push(inputs.version_next);
    parts.push(inputs.config_hash);
    parts.push(inputs.plugin_plan_hash);

    digest_concat(&parts)
}

pub fn run_id_for_plan_hash(plan_hash: &str) -> String {
    format!("run-{}", truncate(plan_hash, 16))
}

/// The release-governance aggregate root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseRun {
    pub id: String,
    pub plan_hash: String,
    pub state: RunState,
    pub repo_id: String,
    pub repo_root: String,
    pub base_ref: String,
    pub head_sha: String,
    pub commits: Vec<String>,
    pub config_hash: String,
    pub plugin_plan_hash: String,
    pub version_current: Option<Semver>,
    pub version_next: Option<Semver>,
    pub bump_kind: BumpKind,
    pub confidence: f64,
    pub risk_score: f64,
    pub reasons: Vec<String>,
    pub categorization: Categorization,
    pub thresholds: Thresholds,
    pub actor: Actor,
    pub tag_name: Option<String>,
    pub notes: Option<ReleaseNotes>,
    pub steps: Vec<StepPlan>,
    pub step_status: HashMap<String, StepStatus>,
    pub history: Vec<TransitionRecord>,
    pub last_error: Option<String>,
    pub changeset_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub approval: Option<Approval>,
    #[serde(skip)]
    domain_events: Vec<RunEvent>,
}

impl ReleaseRun {
    /// Create a new run in `Draft`, with its plan hash and id already derived
    /// from `inputs` (the Plan use case transitions it to `Planned` in the
    /// same breath, but the hash exists from the first instant).
    #[allow(clippy::too_many_arguments)]
    pub fn new_draft(
        inputs: &PlanInputs<'_>,
        repo_root: impl Into<String>,
        thresholds: Thresholds,
        actor: Actor,
        changeset_id: Option<String>,
    ) -> Self {
        let plan_hash = compute_plan_hash(inputs);
        let id = run_id_for_plan_hash(&plan_hash);
        let now = Utc::now();

        let mut run = Self {
            id,
            plan_hash: plan_hash.clone(),
            state: RunState::Draft,
            repo_id: inputs.repo_id.to_string(),
            repo_root: repo_root.into(),
            base_ref: inputs.base_ref.to_string(),
            head_sha: inputs.head_sha.to_string(),
            commits: inputs.commits.to_vec(),
            config_hash: inputs.config_hash.to_string(),
            plugin_plan_hash: inputs.plugin_plan_hash.to_string(),
            version_current: None,
            version_next: None,
            bump_kind: BumpKind::None,
            confidence: 1.0,
            risk_score: 0.0,
            reasons: Vec::new(),
            categorization: Categorization::default(),
            thresholds,
            actor,
            tag_name: None,
            notes: None,
            steps: Vec::new(),
            step_status: HashMap::new(),
            history: Vec::new(),
            last_error: None,
            changeset_id,
            created_at: now,
            updated_at: now,
            published_at: None,
            approval: None,
            domain_events: Vec::new(),
        };
        run.emit(DomainEventKind::RunCreated {
            repo_id: run.repo_id.clone(),
            plan_hash: run.plan_hash.clone(),
        });
        run
    }

    /// Drain (and clear) the unpublished domain events collected since the
    /// last call. Use cases call this right before persisting and
    /// fanning-out.
    pub fn take_domain_events(&mut self) -> Vec<RunEvent> {
        std::mem::take(&mut self.domain_events)
    }

    fn emit(&mut self, kind: DomainEventKind) {
        self.domain_events.push(RunEvent {
            at: Utc::now(),
            run_id: self.id.clone(),
            kind,
        });
    }

    fn transition(
        &mut self,
        to: RunState,
        event: &str,
        actor: &str,
        reason: Option<String>,
        metadata: HashMap<String, String>,
    ) {
        let from = self.state;
        self.state = to;
        self.updated_at = Utc::now();
        self.history.push(TransitionRecord {
            at: self.updated_at,
            from,
            to,
            event: event.to_string(),
            actor: actor.to_string(),
            reason,
            metadata,
        });
        self.emit(DomainEventKind::StateTransitioned {
            from,
            to,
            trigger: event.to_string(),
        });
    }

    fn invalid_state(&self, event: &str) -> DomainError {
        DomainError::InvalidState {
            state: self.state,
            event: event.to_string(),
        }
    }

    /// `Draft -> Planned` (PLAN). The Plan use case has already built
    /// the run in `Draft` via [`Self::new_draft`]; this just performs the
    /// transition and records the actor that requested it.
    pub fn mark_planned(&mut self, actor: &str) -> Result<()> {
        if self.state != RunState::Draft {
            return Err(self.invalid_state("PLAN"));
        }
        self.transition(RunState::Planned, "PLAN", actor, None, HashMap::new());
        Ok(())
    }

    /// `Planned -> Versioned` (BUMP). Recomputes the plan hash
    /// (and re-derives `id`) since `version_next`/`commits` feed it — this is
    /// the last point at which the hash may legally change. `categorization`
    /// is the conventional-commit tally the version calculator already
    /// computed to pick `bump_kind`; stored on the run so `generate_notes`
    /// can feed real breaking/security counts into the governance evaluator
    /// instead of re-deriving them.
    pub fn bump(
        &mut self,
        version_current: Semver,
        version_next: Semver,
        bump_kind: BumpKind,
        categorization: Categorization,
        tag_name: impl Into<String>,
        actor: &str,
    ) -> Result<()> {
        if self.state != RunState::Planned {
            return Err(self.invalid_state("BUMP"));
        }
        if bump_kind != BumpKind::None && version_next <= version_current {
            return Err(DomainError::InvalidVersion(format!(
                "version_next {version_next} must exceed version_current {version_current} for bump {bump_kind:?}"
            )));
        }

        self.version_current = Some(version_current);
        self.version_next = Some(version_next.clone());
        self.bump_kind = bump_kind;
        self.categorization = categorization;
        self.tag_name = Some(tag_name.into());
        self.recompute_identity(version_next.to_string().as_str());

        self.transition(RunState::Versioned, "BUMP", actor, None, HashMap::new());
        self.emit(DomainEventKind::RunVersioned {
            version_next: self
                .version_next
                .as_ref()
                .map(Semver::to_string)
                .unwrap_or_default(),
            bump_kind,
        });
        Ok(())
    }

    /// Recompute `plan_hash`/`id` from the run's current identity-bearing
    /// fields. Only legal while the run is still `Planned` (about to become
    /// `Versioned`) or `Versioned`/`NotesReady` (regenerating notes changes
    /// the commit set, via `REGENERATE_NOTES`); any other state
    /// attempting to recompute is a bug, caught by the
    /// invariant check in [`Self::assert_plan_hash_frozen`] rather than here
    /// (callers only ever call this from `bump`/`regenerate_notes`).
    fn recompute_identity(&mut self, version_next: &str) {
        let inputs = PlanInputs {
            repo_id: &self.repo_id,
            base_ref: &self.base_ref,
            head_sha: &self.head_sha,
            commits: &self.commits,
            version_next,
            config_hash: &self.config_hash,
            plugin_plan_hash: &self.plugin_plan_hash,
        };
        self.plan_hash = compute_plan_hash(&inputs);
        self.id = run_id_for_plan_hash(&self.plan_hash);
    }

    /// Frozen-plan-hash law: once a run has left `Draft`, recomputing
    /// the hash from its current fields must equal the stored hash. Exposed
    /// for tests and for a defensive check use cases may run before persisting.
    pub fn assert_plan_hash_frozen(&self) -> Result<()> {
        if self.state == RunState::Draft {
            return Ok(());
        }
        let version_next = self
            .version_next
            .as_ref()
            .map(Semver::to_string)
            .unwrap_or_default();
        let inputs = PlanInputs {
            repo_id: &self.repo_id,
            base_ref: &self.base_ref,
            head_sha: &self.head_sha,
            commits: &self.commits,
            version_next: &version_next,
            config_hash: &self.config_hash,
            plugin_plan_hash: &self.plugin_plan_hash,
        };
        let recomputed = compute_plan_hash(&inputs);
        if recomputed != self.plan_hash {
            return Err(DomainError::PlanHashMismatch {
                expected: self.plan_hash.clone(),
                actual: recomputed,
            });
        }
        Ok(())
    }

    /// `Versioned -> NotesReady` (GENERATE_NOTES), or, when called again
    /// from `NotesReady`, the two-hop `NotesReady -> Versioned -> NotesReady`
    /// the state table names: a `REGENERATE_NOTES` transition drops the run
    /// back to `Versioned` first, then this same call's `GENERATE_NOTES`
    /// advances it to `NotesReady` again, so each hop gets its own
    /// `TransitionRecord` rather than a same-state `NotesReady -> NotesReady`
    /// entry the table doesn't allow. `head_changed` lets the use case
    /// report a `HeadSHAChanged` before ever calling this (notes generation
    /// itself never re-checks HEAD).
    pub fn set_notes(
        &mut self,
        notes: ReleaseNotes,
        risk_score: f64,
        reasons: Vec<String>,
        actor: &str,
    ) -> Result<()> {
        match self.state {
            RunState::Versioned => {}
            RunState::NotesReady => {
                self.transition(RunState::Versioned, "REGENERATE_NOTES", actor, None, HashMap::new());
            }
            _ => return Err(self.invalid_state("GENERATE_NOTES")),
        }

        self.risk_score = risk_score;
        self.reasons = reasons;
        let inputs_hash = notes.inputs_hash.clone();
        self.notes = Some(notes);
        // Invalidates any existing approval: a new plan hash is coming.
        self.approval = None;
        self.transition(RunState::NotesReady, "GENERATE_NOTES", actor, None, HashMap::new());
        self.emit(DomainEventKind::RunNotesUpdated { inputs_hash });
        Ok(())
    }

    /// `NotesReady -> Approved` (APPROVE). `caller_plan_hash` must
    /// equal the run's current plan hash or this fails with
    /// `ApprovalBoundToHash` — the binding is checked here, at the
    /// moment of approval, and again in [`Self::start_publish`] against the
    /// stored [`Approval`].
    pub fn approve(
        &mut self,
        caller_plan_hash: &str,
        actor: Actor,
        auto_approved: bool,
        steps: Vec<StepPlan>,
    ) -> Result<()> {
        if self.state != RunState::NotesReady {
            return Err(self.invalid_state("APPROVE"));
        }
        if caller_plan_hash != self.plan_hash {
            return Err(DomainError::ApprovalBoundToHash {
                expected: caller_plan_hash.to_string(),
                actual: self.plan_hash.clone(),
            });
        }

        self.steps = steps;
        self.step_status = self
            .steps
            .iter()
            .map(|s| (s.name.clone(), StepStatus::default()))
            .collect();
        self.approval = Some(Approval {
            plan_hash: self.plan_hash.clone(),
            actor: actor.clone(),
            auto_approved,
            approved_at: Utc::now(),
        });
        self.transition(RunState::Approved, "APPROVE", &actor.id, None, HashMap::new());
        self.emit(DomainEventKind::RunApproved {
            actor,
            auto_approved,
        });
        Ok(())
    }

    /// `Approved -> Publishing` (START_PUBLISH). Re-validates the
    /// plan-hash binding: an approval stored against a stale hash can never
    /// start publishing.
    pub fn start_publish(&mut self, actor: &str) -> Result<()> {
        if self.state != RunState::Approved {
            return Err(self.invalid_state("START_PUBLISH"));
        }
        let approval = self.approval.as_ref().ok_or_else(|| DomainError::PortFailure(
            "approved run missing its approval record".to_string(),
        ))?;
        if approval.plan_hash != self.plan_hash {
            return Err(DomainError::PlanHashMismatch {
                expected: approval.plan_hash.clone(),
                actual: self.plan_hash.clone(),
            });
        }
        self.transition(RunState::Publishing, "START_PUBLISH", actor, None, HashMap::new());
        Ok(())
    }

    pub fn step_plan(&self, name: &str) -> Result<&StepPlan> {
        self.steps
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| DomainError::StepNotFound(name.to_string()))
    }

    fn step_status_mut(&mut self, name: &str) -> Result<&mut StepStatus> {
        self.step_status
            .get_mut(name)
            .ok_or_else(|| DomainError::StepNotFound(name.to_string()))
    }

    pub fn step_status(&self, name: &str) -> Result<&StepStatus> {
        self.step_status
            .get(name)
            .ok_or_else(|| DomainError::StepNotFound(name.to_string()))
    }

    /// Mark a step `running`, incrementing its attempt counter.
    pub fn start_step(&mut self, name: &str) -> Result<()> {
        if self.state != RunState::Publishing {
            return Err(self.invalid_state("START_STEP"));
        }
        let status = self.step_status_mut(name)?;
        if matches!(status.state, StepState::Done | StepState::Skipped) {
            return Err(DomainError::StepAlreadyDone(name.to_string()));
        }
        status.state = StepState::Running;
        status.attempts += 1;
        status.started_at = Some(Utc::now());
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Mark a step `skipped` (already observed externally).
    pub fn skip_step(&mut self, name: &str, reason: impl Into<String>) -> Result<()> {
        if self.state != RunState::Publishing {
            return Err(self.invalid_state("SKIP_STEP"));
        }
        let status = self.step_status_mut(name)?;
        if matches!(status.state, StepState::Done | StepState::Skipped) {
            return Err(DomainError::StepAlreadyDone(name.to_string()));
        }
        status.state = StepState::Skipped;
        status.last_error = Some(reason.into());
        status.completed_at = Some(Utc::now());
        self.updated_at = Utc::now();
        self.emit(DomainEventKind::StepCompleted {
            step: name.to_string(),
            state: StepState::Skipped,
        });
        Ok(())
    }

    /// Mark a step `done` with the publisher's output.
    pub fn complete_step(&mut self, name: &str, output: Option<serde_json::Value>) -> Result<()> {
        if self.state != RunState::Publishing {
            return Err(self.invalid_state("COMPLETE_STEP"));
        }
        let status = self.step_status_mut(name)?;
        status.state = StepState::Done;
        status.output = output;
        status.completed_at = Some(Utc::now());
        self.updated_at = Utc::now();
        self.emit(DomainEventKind::StepCompleted {
            step: name.to_string(),
            state: StepState::Done,
        });
        Ok(())
    }

    /// Mark a step `failed` with the publisher's error.
    pub fn fail_step(&mut self, name: &str, error: impl Into<String>) -> Result<()> {
        if self.state != RunState::Publishing {
            return Err(self.invalid_state("FAIL_STEP"));
        }
        let error = error.into();
        let status = self.step_status_mut(name)?;
        status.state = StepState::Failed;
        status.last_error = Some(error.clone());
        status.completed_at = Some(Utc::now());
        self.updated_at = Utc::now();
        self.emit(DomainEventKind::StepCompleted {
            step: name.to_string(),
            state: StepState::Failed,
        });
        Ok(())
    }

    /// Note a plugin-kind step's hook execution, for audit purposes only —
    /// does not itself change step state (the executor still calls
    /// `complete_step`/`fail_step` based on the publisher's outcome).
    pub fn note_plugin_executed(&mut self, step: &str, plugin_name: &str) {
        self.emit(DomainEventKind::PluginExecuted {
            step: step.to_string(),
            plugin_name: plugin_name.to_string(),
        });
    }

    pub fn all_steps_terminal_success(&self) -> bool {
        self.step_status
            .values()
            .all(|s| matches!(s.state, StepState::Done | StepState::Skipped))
    }

    fn any_step_failed(&self) -> bool {
        self.step_status
            .values()
            .any(|s| s.state == StepState::Failed)
    }

    /// `Publishing -> Published` (PUBLISH_COMPLETE), only legal
    /// once every step is terminal-success.
    pub fn complete_publish(&mut self, actor: &str) -> Result<()> {
        if self.state != RunState::Publishing {
            return Err(self.invalid_state("PUBLISH_COMPLETE"));
        }
        if !self.all_steps_terminal_success() {
            return Err(DomainError::InvalidState {
                state: self.state,
                event: "PUBLISH_COMPLETE (not all steps terminal)".to_string(),
            });
        }
        self.published_at = Some(Utc::now());
        self.transition(
            RunState::Published,
            "PUBLISH_COMPLETE",
            actor,
            None,
            HashMap::new(),
        );
        self.emit(DomainEventKind::RunPublished);
        Ok(())
    }

    /// `Publishing -> Failed` (FAIL), retaining `last_error`.
    pub fn fail(&mut self, error: impl Into<String>, actor: &str) -> Result<()> {
        if self.state != RunState::Publishing {
            return Err(self.invalid_state("FAIL"));
        }
        let error = error.into();
        self.last_error = Some(error.clone());
        self.transition(
            RunState::Failed,
            "FAIL",
            actor,
            Some(error.clone()),
            HashMap::new(),
        );
        self.emit(DomainEventKind::RunFailed { error });
        Ok(())
    }

    /// `Failed -> Publishing` (RETRY_PUBLISH). Rewinds every
    /// `failed` step to `pending` while *preserving* its attempt counter, so
    /// `stepStatus[name].attempts` keeps climbing across retries.
    pub fn retry_publish(&mut self, actor: &str) -> Result<()> {
        if self.state != RunState::Failed {
            return Err(self.invalid_state("RETRY_PUBLISH"));
        }
        for status in self.step_status.values_mut() {
            if status.state == StepState::Failed {
                status.state = StepState::Pending;
                status.last_error = None;
                status.started_at = None;
                status.completed_at = None;
            }
        }
        self.last_error = None;
        self.transition(
            RunState::Publishing,
            "RETRY_PUBLISH",
            actor,
            None,
            HashMap::new(),
        );
        self.emit(DomainEventKind::RunRetried);
        Ok(())
    }

    /// `{Draft,Planned,Versioned,NotesReady,Approved} -> Cancelled` (CANCEL).
    pub fn cancel(&mut self, actor: &str, reason: Option<String>) -> Result<()> {
        if self.state == RunState::Published {
            return Err(DomainError::AlreadyPublished {
                run_id: self.id.clone(),
            });
        }
        if !matches!(
            self.state,
            RunState::Draft
                | RunState::Planned
                | RunState::Versioned
                | RunState::NotesReady
                | RunState::Approved
        ) {
            return Err(self.invalid_state("CANCEL"));
        }
        self.transition(RunState::Cancelled, "CANCEL", actor, reason, HashMap::new());
        self.emit(DomainEventKind::RunCancelled);
        Ok(())
    }

    /// `Cancelled -> Draft` (operator reset), rare but explicitly legal.
    pub fn reset_to_draft_from_cancelled(&mut self, actor: &str) -> Result<()> {
        if self.state != RunState::Cancelled {
            return Err(self.invalid_state("RESET"));
        }
        self.transition(RunState::Draft, "RESET", actor, None, HashMap::new());
        Ok(())
    }

    /// `Failed -> Draft` (operator reset), rare but explicitly legal.
    pub fn reset_to_draft_from_failed(&mut self, actor: &str) -> Result<()> {
        if self.state != RunState::Failed {
            return Err(self.invalid_state("RESET"));
        }
        self.transition(RunState::Draft, "RESET", actor, None, HashMap::new());
        Ok(())
    }
}
