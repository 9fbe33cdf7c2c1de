//! In-memory fake port implementations (testing only).
//!
//! A plain, non-`cfg`-gated module (so both this crate's unit tests and
//! `tests/` integration tests can use it) with `Mutex`/`RwLock`-guarded
//! `HashMap` state behind each fake.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::DomainError;
use crate::ports::{
    HistoryProvider, NotesGenerator, NotesOptions, Publisher, ReleaseRunRepository, StepOutcome,
    VersionCalculator, VersionDecision,
};
use crate::run::{ReleaseNotes, ReleaseRun, RunState, StepPlan};
use crate::value_types::{BumpKind, Categorization, CommitType, ConventionalCommit, Semver};

/// In-memory `ReleaseRunRepository` (testing only).
#[derive(Default)]
pub struct FakeReleaseRunRepository {
    runs: Mutex<HashMap<String, ReleaseRun>>,
}

impl FakeReleaseRunRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReleaseRunRepository for FakeReleaseRunRepository {
    async fn save(&self, run: &ReleaseRun) -> Result<(), DomainError> {
        self.runs.lock().unwrap().insert(run.id.clone(), run.clone());
        Ok(())
    }

    async fn load(&self, run_id: &str) -> Result<ReleaseRun, DomainError> {
        self.runs
            .lock()
            .unwrap()
            .get(run_id)
            .cloned()
            .ok_or_else(|| DomainError::RunNotFound(run_id.to_string()))
    }

    async fn load_latest(&self, repo_root: &str) -> Result<ReleaseRun, DomainError> {
        self.runs
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.repo_root == repo_root)
            .max_by_key(|r| r.updated_at)
            .cloned()
            .ok_or_else(|| DomainError::RunNotFound("<latest>".to_string()))
    }

    async fn list(&self, repo_root: &str) -> Result<Vec<ReleaseRun>, DomainError> {
        Ok(self
            .runs
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.repo_root == repo_root)
            .cloned()
            .collect())
    }

    async fn find_by_state(
        &self,
        repo_root: &str,
        state: RunState,
    ) -> Result<Vec<ReleaseRun>, DomainError> {
        Ok(self
            .runs
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.repo_root == repo_root && r.state == state)
            .cloned()
            .collect())
    }
}

/// In-memory `RepoInspector` (testing only). Head sha and commit list are
/// set up front and returned verbatim.
pub struct FakeRepoInspector {
    head_sha: Mutex<String>,
    commits: Mutex<Vec<ConventionalCommit>>,
    repo_id: String,
}

impl FakeRepoInspector {
    /// Builds synthetic, non-conventional commits from bare hash strings —
    /// convenient for tests that only care about the hashes feeding the plan
    /// hash, not their categorization. Use [`Self::with_commits`] when a test
    /// needs real conventional-commit content (risk/governance tests).
    pub fn new(repo_id: impl Into<String>, head_sha: impl Into<String>, commit_hashes: Vec<String>) -> Self {
        let commits = commit_hashes
            .into_iter()
            .map(|hash| ConventionalCommit {
                hash: hash.clone(),
                commit_type: CommitType::Other,
                scope: None,
                breaking: false,
                description: hash,
                body: String::new(),
                footer: String::new(),
            })
            .collect();
        Self::with_commits(repo_id, head_sha, commits)
    }

    pub fn with_commits(
        repo_id: impl Into<String>,
        head_sha: impl Into<String>,
        commits: Vec<ConventionalCommit>,
    ) -> Self {
        Self {
            head_sha: Mutex::new(head_sha.into()),
            commits: Mutex::new(commits),
            repo_id: repo_id.into(),
        }
    }

    /// Simulate HEAD moving after planning (for `HeadSHAChanged` tests).
    pub fn set_head_sha(&self, head_sha: impl Into<String>) {
        *self.head_sha.lock().unwrap() = head_sha.into();
    }
}

#[async_trait]
impl crate::ports::RepoInspector for FakeRepoInspector {
    async fn head_sha(&self) -> Result<String, DomainError> {
        Ok(self.head_sha.lock().unwrap().clone())
    }

    async fn commits(
        &self,
        _from_ref: &str,
        _to_ref: &str,
    ) -> Result<Vec<ConventionalCommit>, DomainError> {
        Ok(self.commits.lock().unwrap().clone())
    }

    async fn stable_repo_id(&self) -> Result<String, DomainError> {
        Ok(self.repo_id.clone())
    }
}

/// In-memory `Publisher` (testing only). By default every step succeeds;
/// call [`Self::mark_already_done`] or [`Self::mark_failing`] to override
/// specific step names.
#[derive(Default)]
pub struct FakePublisher {
    already_done: Mutex<HashMap<String, bool>>,
    failing: Mutex<HashMap<String, String>>,
}

impl FakePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn always_succeeds() -> Self {
        Self::default()
    }

    pub fn mark_already_done(&self, step_name: &str) {
        self.already_done
            .lock()
            .unwrap()
            .insert(step_name.to_string(), true);
    }

    pub fn mark_failing(&self, step_name: &str, error: &str) {
        self.failing
            .lock()
            .unwrap()
            .insert(step_name.to_string(), error.to_string());
    }
}

#[async_trait]
impl Publisher for FakePublisher {
    async fn check_idempotency(&self, _run: &ReleaseRun, step: &StepPlan) -> Result<bool, DomainError> {
        Ok(*self
            .already_done
            .lock()
            .unwrap()
            .get(&step.name)
            .unwrap_or(&false))
    }

    async fn execute_step(&self, _run: &ReleaseRun, step: &StepPlan) -> Result<StepOutcome, DomainError> {
        if let Some(error) = self.failing.lock().unwrap().get(&step.name) {
            return Ok(StepOutcome::failure(error.clone()));
        }
        Ok(StepOutcome::success(Some(serde_json::json!({"step": step.name}))))
    }
}

/// In-memory `NotesGenerator` (testing only).
pub struct FakeNotesGenerator {
    text: String,
}

impl FakeNotesGenerator {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Default for FakeNotesGenerator {
    fn default() -> Self {
        Self::new("release notes")
    }
}

#[async_trait]
impl NotesGenerator for FakeNotesGenerator {
    async fn generate(
        &self,
        run: &ReleaseRun,
        options: &NotesOptions,
    ) -> Result<ReleaseNotes, DomainError> {
        Ok(ReleaseNotes {
            text: self.text.clone(),
            audience: options.audience.clone(),
            tone: options.tone.clone(),
            provider: "fake".to_string(),
            model: "fake".to_string(),
            generated_at: chrono::Utc::now(),
            inputs_hash: self.compute_inputs_hash(run, options)?,
        })
    }

    fn compute_inputs_hash(&self, run: &ReleaseRun, options: &NotesOptions) -> Result<String, DomainError> {
        Ok(crate::digest::digest_concat(&[
            &run.commits.join(","),
            &options.audience,
            &options.tone,
        ]))
    }
}

/// In-memory `VersionCalculator` (testing only). Always bumps minor unless
/// configured otherwise.
pub struct FakeVersionCalculator {
    current: Semver,
    bump_kind: BumpKind,
    categorization: Categorization,
}

impl FakeVersionCalculator {
    pub fn new(current: Semver, bump_kind: BumpKind) -> Self {
        Self::with_categorization(current, bump_kind, Categorization::default())
    }

    /// For tests exercising governance on the categorization a real
    /// `VersionCalculator` would have derived from the commit range.
    pub fn with_categorization(current: Semver, bump_kind: BumpKind, categorization: Categorization) -> Self {
        Self {
            current,
            bump_kind,
            categorization,
        }
    }
}

impl Default for FakeVersionCalculator {
    fn default() -> Self {
        Self::new(Semver::new(1, 0, 0), BumpKind::Minor)
    }
}

#[async_trait]
impl VersionCalculator for FakeVersionCalculator {
    async fn calculate(&self, _run: &ReleaseRun) -> Result<VersionDecision, DomainError> {
        let next = self.current.bump(self.bump_kind);
        Ok(VersionDecision {
            version_current: self.current.clone(),
            tag_name: format!("v{next}"),
            version_next: next,
            bump_kind: self.bump_kind,
            categorization: self.categorization.clone(),
        })
    }
}

/// In-memory `HistoryProvider` (testing only).
#[derive(Default)]
pub struct FakeHistoryProvider {
    rollback_rate: Mutex<f64>,
}

impl FakeHistoryProvider {
    pub fn new(rollback_rate: f64) -> Self {
        Self {
            rollback_rate: Mutex::new(rollback_rate),
        }
    }
}

#[async_trait]
impl HistoryProvider for FakeHistoryProvider {
    async fn get_rollback_rate(&self, _repo_id: &str) -> Result<f64, DomainError> {
        Ok(*self.rollback_rate.lock().unwrap())
    }

    async fn get_actor_history(&self, _actor_id: &str) -> Result<Vec<String>, DomainError> {
        Ok(Vec::new())
    }

    async fn get_recent_incidents(&self, _repo_id: &str, _limit: usize) -> Result<Vec<String>, DomainError> {
        Ok(Vec::new())
    }
}
