//! Conventional-commit parsing, semantic versions, and the change-set value object.
//!
//! Hand-rolls small, self-contained value types rather than reaching for an
//! external `semver` crate for internal ordering logic.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

// ---------------------------------------------------------------------------
// Semver
// ---------------------------------------------------------------------------

/// Parsed semantic version: MAJOR.MINOR.PATCH with an optional pre-release suffix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Semver {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Option<String>,
}

impl Semver {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre: None,
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        let (version_part, pre) = match input.split_once('-') {
            Some((v, p)) if !p.is_empty() => (v, Some(p.to_string())),
            _ => (input, None),
        };
        let parts: Vec<&str> = version_part.split('.').collect();
        if parts.len() != 3 {
            return None;
        }
        Some(Self {
            major: parts[0].parse().ok()?,
            minor: parts[1].parse().ok()?,
            patch: parts[2].parse().ok()?,
            pre,
        })
    }

    pub fn bump(&self, kind: BumpKind) -> Self {
        match kind {
            BumpKind::Major => Self::new(self.major + 1, 0, 0),
            BumpKind::Minor => Self::new(self.major, self.minor + 1, 0),
            BumpKind::Patch => Self::new(self.major, self.minor, self.patch + 1),
            BumpKind::Prerelease | BumpKind::None => self.clone(),
        }
    }
}

impl std::fmt::Display for Semver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.pre {
            write!(f, "-{pre}")?;
        }
        Ok(())
    }
}

impl PartialOrd for Semver {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Semver {
    /// Numeric triple first; for equal triples a pre-release sorts below a release.
    fn cmp(&self, other: &Self) -> Ordering {
        let tuple_cmp = (self.major, self.minor, self.patch).cmp(&(
            other.major,
            other.minor,
            other.patch,
        ));
        if tuple_cmp != Ordering::Equal {
            return tuple_cmp;
        }
        match (&self.pre, &other.pre) {
            (None, None) => Ordering::Equal,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(a), Some(b)) => a.cmp(b),
        }
    }
}

// ---------------------------------------------------------------------------
// Commit types / bump kind / release type
// ---------------------------------------------------------------------------

/// The conventional-commit `type(scope)!: description` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitType {
    Feat,
    Fix,
    Perf,
    Docs,
    Refactor,
    Test,
    Build,
    Ci,
    Chore,
    Revert,
    Other,
}

impl CommitType {
    fn from_str(s: &str) -> Self {
        match s {
            "feat" => Self::Feat,
            "fix" => Self::Fix,
            "perf" => Self::Perf,
            "docs" => Self::Docs,
            "refactor" => Self::Refactor,
            "test" | "tests" => Self::Test,
            "build" => Self::Build,
            "ci" => Self::Ci,
            "chore" => Self::Chore,
            "revert" => Self::Revert,
            _ => Self::Other,
        }
    }
}

/// A categorical version step, derived from commit types and breaking flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BumpKind {
    None,
    Prerelease,
    Patch,
    Minor,
    Major,
}

impl BumpKind {
    /// The maximum of two bump kinds under `major > minor > patch > prerelease > none`.
    pub fn max(self, other: Self) -> Self {
        std::cmp::max(self, other)
    }
}

/// `ReleaseType` and `BumpKind` share the same lattice in this implementation;
/// `ReleaseType` is kept as a distinct name for call sites that think in
/// terms of a commit set's aggregate release impact rather than a single bump.
pub type ReleaseType = BumpKind;

fn release_type_from_commit_type(kind: CommitType, breaking: bool) -> ReleaseType {
    if breaking {
        return BumpKind::Major;
    }
    match kind {
        CommitType::Feat => BumpKind::Minor,
        CommitType::Fix | CommitType::Perf | CommitType::Revert => BumpKind::Patch,
        _ => BumpKind::None,
    }
}

// ---------------------------------------------------------------------------
// Conventional commit
// ---------------------------------------------------------------------------

/// A single parsed conventional commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConventionalCommit {
    pub hash: String,
    pub commit_type: CommitType,
    pub scope: Option<String>,
    pub breaking: bool,
    pub description: String,
    pub body: String,
    pub footer: String,
}

impl ConventionalCommit {
    /// Parse `type(scope)!: description` out of a commit subject line, with an
    /// optional body/footer that may additionally carry `BREAKING CHANGE:`.
    pub fn parse(hash: &str, subject: &str, body: &str, footer: &str) -> Option<Self> {
        let (head, description) = subject.split_once(':')?;
        let description = description.trim().to_string();
        if description.is_empty() {
            return None;
        }

        let breaking_marker = head.ends_with('!');
        let head = head.strip_suffix('!').unwrap_or(head);

        let (type_part, scope) = match head.split_once('(') {
            Some((t, rest)) => {
                let scope = rest.strip_suffix(')').unwrap_or(rest);
                (t, Some(scope.to_string()))
            }
            None => (head, None),
        };
        if type_part.is_empty() || !type_part.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }

        let breaking = breaking_marker || footer.contains("BREAKING CHANGE:");
        let security = description.to_lowercase().contains("security")
            || description.to_lowercase().contains("cve-")
            || scope
                .as_deref()
                .map(|s| s.eq_ignore_ascii_case("security"))
                .unwrap_or(false);
        let _ = security; // categorization surface reserved for analysis callers

        Some(Self {
            hash: hash.to_string(),
            commit_type: CommitType::from_str(&type_part.to_lowercase()),
            scope,
            breaking,
            description,
            body: body.to_string(),
            footer: footer.to_string(),
        })
    }

    /// Render back to the `type(scope)!: description` subject line this commit
    /// was parsed from (round-trip for subjects with empty body/footer).
    pub fn to_subject(&self) -> String {
        let type_str = match self.commit_type {
            CommitType::Feat => "feat",
            CommitType::Fix => "fix",
            CommitType::Perf => "perf",
            CommitType::Docs => "docs",
            CommitType::Refactor => "refactor",
            CommitType::Test => "test",
            CommitType::Build => "build",
            CommitType::Ci => "ci",
            CommitType::Chore => "chore",
            CommitType::Revert => "revert",
            CommitType::Other => "other",
        };
        let scope = self
            .scope
            .as_ref()
            .map(|s| format!("({s})"))
            .unwrap_or_default();
        let bang = if self.breaking { "!" } else { "" };
        format!("{type_str}{scope}{bang}: {}", self.description)
    }

    pub fn is_security(&self) -> bool {
        let lower = self.description.to_lowercase();
        lower.contains("security")
            || lower.contains("cve-")
            || self
                .scope
                .as_deref()
                .map(|s| s.eq_ignore_ascii_case("security"))
                .unwrap_or(false)
    }

    pub fn release_type(&self) -> ReleaseType {
        release_type_from_commit_type(self.commit_type, self.breaking)
    }
}

// ---------------------------------------------------------------------------
// Change set
// ---------------------------------------------------------------------------

/// Categorized tally of a `ChangeSet`'s commits, computed at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Categorization {
    pub features: usize,
    pub fixes: usize,
    pub breaking: usize,
    pub perf: usize,
    pub docs: usize,
    pub refactors: usize,
    pub tests: usize,
    pub build: usize,
    pub ci: usize,
    pub chores: usize,
    pub reverts: usize,
    pub security: usize,
    pub other: usize,
}

/// A value object over the commits that will make up a release, built by a
/// `RepoInspector`-backed collaborator and consumed by the aggregate.
///
/// The categorization is computed lazily and frozen on first read: later
/// mutation of `commits` (there is none in this implementation — the type is
/// otherwise immutable once built) would not retroactively change it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeSet {
    pub id: String,
    pub from_ref: String,
    pub to_ref: String,
    pub commits: Vec<ConventionalCommit>,
    #[serde(skip)]
    categorization: std::cell::RefCell<Option<Categorization>>,
}

impl ChangeSet {
    pub fn new(
        id: impl Into<String>,
        from_ref: impl Into<String>,
        to_ref: impl Into<String>,
        commits: Vec<ConventionalCommit>,
    ) -> Self {
        Self {
            id: id.into(),
            from_ref: from_ref.into(),
            to_ref: to_ref.into(),
            commits,
            categorization: std::cell::RefCell::new(None),
        }
    }

    /// The categorization, computed once and cached for the lifetime of this value.
    pub fn categorize(&self) -> Categorization {
        if let Some(cached) = self.categorization.borrow().as_ref() {
            return cached.clone();
        }
        let mut cat = Categorization::default();
        for commit in &self.commits {
            if commit.breaking {
                cat.breaking += 1;
            }
            if commit.is_security() {
                cat.security += 1;
            }
            match commit.commit_type {
                CommitType::Feat => cat.features += 1,
                CommitType::Fix => cat.fixes += 1,
                CommitType::Perf => cat.perf += 1,
                CommitType::Docs => cat.docs += 1,
                CommitType::Refactor => cat.refactors += 1,
                CommitType::Test => cat.tests += 1,
                CommitType::Build => cat.build += 1,
                CommitType::Ci => cat.ci += 1,
                CommitType::Chore => cat.chores += 1,
                CommitType::Revert => cat.reverts += 1,
                CommitType::Other => cat.other += 1,
            }
        }
        *self.categorization.borrow_mut() = Some(cat.clone());
        cat
    }

    /// The overall release type: the maximum of every commit's release type.
    /// Any breaking commit forces `Major`; an empty change set is `None`.
    pub fn release_type(&self) -> ReleaseType {
        self.commits
            .iter()
            .map(ConventionalCommit::release_type)
            .fold(BumpKind::None, BumpKind::max)
    }

    pub fn commit_hashes(&self) -> Vec<String> {
        self.commits.iter().map(|c| c.hash.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_simple_commits() {
        let samples = [
            "feat(api): add endpoint",
            "fix: null deref",
            "chore(deps): bump serde",
            "docs: update readme",
        ];
        for subject in samples {
            let c = ConventionalCommit::parse("abc123", subject, "", "").expect("parses");
            assert_eq!(c.to_subject(), subject);
        }
    }

    #[test]
    fn bang_marks_breaking_and_forces_major() {
        let c = ConventionalCommit::parse("abc", "feat!: redesign API", "", "").unwrap();
        assert!(c.breaking);
        assert_eq!(c.release_type(), BumpKind::Major);
    }

    #[test]
    fn breaking_change_footer_sets_breaking() {
        let c = ConventionalCommit::parse(
            "abc",
            "feat: add new client",
            "",
            "BREAKING CHANGE: removes old client",
        )
        .unwrap();
        assert!(c.breaking);
    }

    #[test]
    fn security_keyword_detected_in_description() {
        let c = ConventionalCommit::parse("abc", "fix: patch CVE-2024-1234", "", "").unwrap();
        assert!(c.is_security());
    }

    #[test]
    fn non_conventional_subject_does_not_parse() {
        assert!(ConventionalCommit::parse("abc", "just a message", "", "").is_none());
        assert!(ConventionalCommit::parse("abc", "feat:", "", "").is_none());
    }

    #[test]
    fn change_set_release_type_is_max_of_commits() {
        let commits = vec![
            ConventionalCommit::parse("a", "fix: x", "", "").unwrap(),
            ConventionalCommit::parse("b", "feat: y", "", "").unwrap(),
        ];
        let cs = ChangeSet::new("cs1", "v1.0.0", "HEAD", commits);
        assert_eq!(cs.release_type(), BumpKind::Minor);
    }

    #[test]
    fn empty_change_set_release_type_is_none() {
        let cs = ChangeSet::new("cs1", "v1.0.0", "HEAD", vec![]);
        assert_eq!(cs.release_type(), BumpKind::None);
    }

    #[test]
    fn single_breaking_commit_forces_major() {
        let commits = vec![ConventionalCommit::parse("a", "feat!: redesign", "", "").unwrap()];
        let cs = ChangeSet::new("cs1", "v1.0.0", "HEAD", commits);
        assert_eq!(cs.release_type(), BumpKind::Major);
        assert_eq!(cs.categorize().breaking, 1);
    }

    #[test]
    fn categorization_is_frozen_after_first_read() {
        let commits = vec![ConventionalCommit::parse("a", "fix: x", "", "").unwrap()];
        let cs = ChangeSet::new("cs1", "v1.0.0", "HEAD", commits);
        let first = cs.categorize();
        let second = cs.categorize();
        assert_eq!(first, second);
    }

    #[test]
    fn max_release_type_is_associative_commutative_idempotent() {
        let kinds = [
            BumpKind::None,
            BumpKind::Prerelease,
            BumpKind::Patch,
            BumpKind::Minor,
            BumpKind::Major,
        ];
        for a in kinds {
            for b in kinds {
                assert_eq!(a.max(b), b.max(a));
                assert_eq!(a.max(a), a);
            }
        }
        assert_eq!(
            BumpKind::Minor.max(BumpKind::Major).max(BumpKind::Patch),
            BumpKind::Minor.max(BumpKind::Major.max(BumpKind::Patch))
        );
    }

    #[test]
    fn semver_ordering_and_bump() {
        let v = Semver::new(1, 0, 0);
        assert_eq!(v.bump(BumpKind::Minor), Semver::new(1, 1, 0));
        assert_eq!(v.bump(BumpKind::Major), Semver::new(2, 0, 0));
        assert!(Semver::new(1, 1, 0) > Semver::new(1, 0, 0));
    }

    #[test]
    fn semver_parse_rejects_malformed() {
        assert!(Semver::parse("1.0").is_none());
        assert!(Semver::parse("not-a-version").is_none());
        assert_eq!(Semver::parse("1.2.3").unwrap(), Semver::new(1, 2, 3));
    }
}
