//! Conventional-commit-driven `VersionCalculator`: walks the commit
//! range recorded on the run, parses each subject/body/footer as a
//! conventional commit, and bumps the last-known version by the resulting
//! release type. The last-known version is tracked in a small sidecar file
//! under `<repoRoot>/.state/version` rather than any ecosystem's own
//! manifest — writing `Cargo.toml`/`package.json`/etc. is explicitly a
//! pluggable adapter's job, not this one's.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use govrun_core::error::DomainError;
use govrun_core::ports::{VersionCalculator, VersionDecision};
use govrun_core::run::ReleaseRun;
use govrun_core::value_types::{ChangeSet, Semver};

use crate::git_log;

pub struct GitConventionalVersionCalculator {
    repo_dir: PathBuf,
}

impl GitConventionalVersionCalculator {
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
        }
    }

    fn version_path(repo_root: &str) -> PathBuf {
        Path::new(repo_root).join(".state").join("version")
    }

    fn read_current_version(repo_root: &str) -> Semver {
        std::fs::read_to_string(Self::version_path(repo_root))
            .ok()
            .and_then(|s| Semver::parse(s.trim()))
            .unwrap_or_else(|| Semver::new(0, 0, 0))
    }
}

#[async_trait]
impl VersionCalculator for GitConventionalVersionCalculator {
    async fn calculate(&self, run: &ReleaseRun) -> Result<VersionDecision, DomainError> {
        let commits = git_log::log_range(&self.repo_dir, &run.base_ref, &run.head_sha)?;
        let changeset = ChangeSet::new("changeset-1", &run.base_ref, &run.head_sha, commits);
        let bump_kind = changeset.release_type();
        let categorization = changeset.categorize();

        let version_current = Self::read_current_version(&run.repo_root);
        let version_next = version_current.bump(bump_kind);
        let tag_name = format!("v{version_next}");

        Ok(VersionDecision {
            version_current,
            version_next,
            bump_kind,
            categorization,
            tag_name,
        })
    }
}
