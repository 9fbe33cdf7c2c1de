//! JSON-file-per-run repository adapter.
//!
//! Persists one `ReleaseRun` per file at
//! `<repoRoot>/.state/runs/<RunID>.json` (the aggregate's own
//! `Serialize`/`Deserialize` derive already produces a stable field layout
//! via plain snake_case field names). Wraps blocking I/O in a small adapter
//! type and translates failures into a dedicated error enum rather than
//! leaking `std::io::Error` into domain code.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::error::DomainError;
use crate::ports::ReleaseRunRepository;
use crate::run::{ReleaseRun, RunState};

/// Storage-adapter failure modes, kept distinct from [`DomainError`] so
/// a storage implementation detail never leaks into domain logic. Use cases
/// fold a `RunNotFound` miss into `DomainError::RunNotFound` at the boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("run not found: {0}")]
    RunNotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt run record at {path}: {reason}")]
    Corrupt { path: String, reason: String },
}

impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::RunNotFound(id) => DomainError::RunNotFound(id),
            other => DomainError::PortFailure(other.to_string()),
        }
    }
}

/// JSON-file-per-run implementation of [`ReleaseRunRepository`].
pub struct JsonFileRepository {
    repo_root: PathBuf,
}

impl JsonFileRepository {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
        }
    }

    fn runs_dir(&self) -> PathBuf {
        self.repo_root.join(".state").join("runs")
    }

    fn run_path(&self, run_id: &str) -> PathBuf {
        self.runs_dir().join(format!("{run_id}.json"))
    }

    fn read_run(path: &Path) -> Result<ReleaseRun, StoreError> {
        let bytes = std::fs::read(path)?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    fn write_run(&self, run: &ReleaseRun) -> Result<(), StoreError> {
        std::fs::create_dir_all(self.runs_dir())?;
        let path = self.run_path(&run.id);
        let bytes = serde_json::to_vec_pretty(run)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    fn all_runs(&self) -> Result<Vec<ReleaseRun>, StoreError> {
        let dir = self.runs_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut runs = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if entry.path().extension().and_then(|e| e.to_str()) == Some("json") {
                runs.push(Self::read_run(&entry.path())?);
            }
        }
        Ok(runs)
    }
}

#[async_trait]
impl ReleaseRunRepository for JsonFileRepository {
    async fn save(&self, run: &ReleaseRun) -> Result<(), DomainError> {
        self.write_run(run).map_err(DomainError::from)
    }

    async fn load(&self, run_id: &str) -> Result<ReleaseRun, DomainError> {
        let path = self.run_path(run_id);
        if !path.exists() {
            return Err(DomainError::RunNotFound(run_id.to_string()));
        }
        Self::read_run(&path).map_err(DomainError::from)
    }

    async fn load_latest(&self, _repo_root: &str) -> Result<ReleaseRun, DomainError> {
        let mut runs = self.all_runs().map_err(DomainError::from)?;
        runs.sort_by_key(|r| r.updated_at);
        runs.pop()
            .ok_or_else(|| DomainError::RunNotFound("<latest>".to_string()))
    }

    async fn list(&self, _repo_root: &str) -> Result<Vec<ReleaseRun>, DomainError> {
        self.all_runs().map_err(DomainError::from)
    }

    async fn find_by_state(
        &self,
        _repo_root: &str,
        state: RunState,
    ) -> Result<Vec<ReleaseRun>, DomainError> {
        Ok(self
            .all_runs()
            .map_err(DomainError::from)?
            .into_iter()
            .filter(|r| r.state == state)
            .collect())
    }
}
