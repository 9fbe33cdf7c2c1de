//! Shared `git log` commit-range parsing used by both the repo inspector and
//! the conventional-commit version calculator, so the two adapters agree on
//! exactly which commits in a range are conventional and how they're parsed.

use std::path::Path;
use std::process::Command;

use govrun_core::error::DomainError;
use govrun_core::value_types::ConventionalCommit;

const RECORD_SEP: char = '\u{1e}';
const FIELD_SEP: char = '\u{1f}';

/// Runs `git log` over `from_ref..to_ref` and parses each commit's
/// subject/body/footer as a conventional commit. A commit whose subject
/// doesn't match the conventional format is silently omitted, matching
/// `ConventionalCommit::parse`'s own `Option` contract.
pub fn log_range(
    repo_dir: &Path,
    from_ref: &str,
    to_ref: &str,
) -> Result<Vec<ConventionalCommit>, DomainError> {
    let format = format!("%H{FIELD_SEP}%s{FIELD_SEP}%b{FIELD_SEP}%(trailers){RECORD_SEP}");
    let range = format!("{from_ref}..{to_ref}");
    let output = Command::new("git")
        .args(["log", &format!("--format={format}"), &range])
        .current_dir(repo_dir)
        .output()
        .map_err(|e| DomainError::PortFailure(format!("failed to run git log: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DomainError::PortFailure(format!("git log failed: {stderr}")));
    }

    let raw = String::from_utf8_lossy(&output.stdout);
    let mut commits = Vec::new();
    for record in raw.split(RECORD_SEP) {
        let record = record.trim_matches('\n');
        if record.is_empty() {
            continue;
        }
        let mut fields = record.splitn(4, FIELD_SEP);
        let (Some(hash), Some(subject), Some(body), Some(footer)) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            continue;
        };
        if let Some(commit) = ConventionalCommit::parse(hash, subject, body, footer) {
            commits.push(commit);
        }
    }
    Ok(commits)
}
