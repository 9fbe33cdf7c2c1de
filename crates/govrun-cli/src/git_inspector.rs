//! Git-backed `RepoInspector`: shells out to `git` directly, reporting
//! failures through `DomainError` instead of a bespoke git error type.

use std::path::PathBuf;
use std::process::Command;

use async_trait::async_trait;
use govrun_core::error::DomainError;
use govrun_core::ports::RepoInspector;
use govrun_core::value_types::ConventionalCommit;

use crate::git_log;

pub struct GitRepoInspector {
    repo_dir: PathBuf,
}

impl GitRepoInspector {
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
        }
    }

    fn run(&self, args: &[&str]) -> Result<String, DomainError> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_dir)
            .output()
            .map_err(|e| DomainError::PortFailure(format!("failed to run git: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DomainError::PortFailure(format!(
                "git {args:?} failed: {stderr}"
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl RepoInspector for GitRepoInspector {
    async fn head_sha(&self) -> Result<String, DomainError> {
        let sha = self.run(&["rev-parse", "HEAD"])?;
        if sha.is_empty() {
            return Err(DomainError::PortFailure(
                "git rev-parse HEAD returned empty output".to_string(),
            ));
        }
        Ok(sha)
    }

    async fn commits(
        &self,
        from_ref: &str,
        to_ref: &str,
    ) -> Result<Vec<ConventionalCommit>, DomainError> {
        git_log::log_range(&self.repo_dir, from_ref, to_ref)
    }

    /// The stable repo id is the first commit's hash, or a configured
    /// remote URL when one is available — a remote URL is preferred when
    /// `origin` is configured.
    async fn stable_repo_id(&self) -> Result<String, DomainError> {
        if let Ok(remote) = self.run(&["remote", "get-url", "origin"]) {
            if !remote.is_empty() {
                return Ok(remote);
            }
        }
        self.run(&["rev-list", "--max-parents=0", "HEAD"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_git(repo_dir: &std::path::Path, args: &[&str]) {
        let output = Command::new("git")
            .args(args)
            .current_dir(repo_dir)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    fn make_git_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        run_git(dir.path(), &["init"]);
        run_git(dir.path(), &["config", "user.name", "test-user"]);
        run_git(dir.path(), &["config", "user.email", "test@example.com"]);
        run_git(dir.path(), &["commit", "--allow-empty", "-m", "initial"]);
        dir
    }

    #[tokio::test]
    async fn head_sha_is_40_hex_chars() {
        let repo = make_git_repo();
        let inspector = GitRepoInspector::new(repo.path());
        let sha = inspector.head_sha().await.unwrap();
        assert_eq!(sha.len(), 40);
        assert!(sha.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn head_sha_fails_outside_repo() {
        let dir = tempfile::tempdir().unwrap();
        let inspector = GitRepoInspector::new(dir.path());
        assert!(inspector.head_sha().await.is_err());
    }

    #[tokio::test]
    async fn stable_repo_id_falls_back_to_first_commit() {
        let repo = make_git_repo();
        let inspector = GitRepoInspector::new(repo.path());
        let id = inspector.stable_repo_id().await.unwrap();
        assert_eq!(id.len(), 40);
    }
}
