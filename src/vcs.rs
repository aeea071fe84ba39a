//! # Version-Control Provider
//!
//! Staging consults version control for two things: the repository
//! coordinates written to the log and the provenance manifest, and the
//! "dirty" flag of every copied source file.
//!
//! The [`VersionControl`] trait separates those questions from the `git`
//! binary. [`GitVersionControl`] is the real implementation;
//! [`StaticVersionControl`] answers from fixed values and is used for source
//! trees that are not git checkouts (and in tests).
//!
//! None of these queries can fail a staging run. When git is unavailable the
//! coordinates fall back to `Unknown ...` placeholders and files count as
//! clean.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::warn;

use crate::git;

/// Read-only questions staging asks of version control
pub trait VersionControl {
    /// Remote URL of the source repository
    fn repo(&self) -> String;

    /// Checked-out branch
    fn branch(&self) -> String;

    /// Commit hash of the checkout
    fn commit(&self) -> String;

    /// Whether `path` is new, modified or deleted without a commit
    fn is_dirty(&self, path: &Path) -> bool;

    /// Whether anything in the working tree has uncommitted changes
    fn tree_is_dirty(&self) -> bool;
}

/// Answers version-control questions by running `git` in a work tree.
#[derive(Debug, Clone)]
pub struct GitVersionControl {
    work_dir: PathBuf,
}

impl GitVersionControl {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }

    fn query(&self, result: crate::error::Result<String>, fallback: &str) -> String {
        match result {
            Ok(value) if !value.is_empty() => value,
            Ok(_) => fallback.to_string(),
            Err(e) => {
                warn!("{}; using '{}'", e, fallback);
                fallback.to_string()
            }
        }
    }
}

impl VersionControl for GitVersionControl {
    fn repo(&self) -> String {
        self.query(git::remote_url(&self.work_dir), "Unknown repo")
    }

    fn branch(&self) -> String {
        self.query(git::current_branch(&self.work_dir), "Unknown branch")
    }

    fn commit(&self) -> String {
        self.query(git::head_commit(&self.work_dir), "Unknown commit hash")
    }

    fn is_dirty(&self, path: &Path) -> bool {
        // Paths are handed to git relative to the work tree when possible.
        let relative = path.strip_prefix(&self.work_dir).unwrap_or(path);
        match git::status_porcelain(&self.work_dir, Some(relative)) {
            Ok(lines) => !lines.is_empty(),
            Err(e) => {
                warn!("{}; treating {} as clean", e, path.display());
                false
            }
        }
    }

    fn tree_is_dirty(&self) -> bool {
        match git::status_porcelain(&self.work_dir, None) {
            Ok(lines) => !lines.is_empty(),
            Err(e) => {
                warn!("{}; treating work tree as clean", e);
                false
            }
        }
    }
}

/// Fixed answers, for source trees without git.
#[derive(Debug, Clone, Default)]
pub struct StaticVersionControl {
    repo: String,
    branch: String,
    commit: String,
    dirty: HashSet<PathBuf>,
    tree_dirty: bool,
}

impl StaticVersionControl {
    pub fn new(repo: &str, branch: &str, commit: &str) -> Self {
        Self {
            repo: repo.to_string(),
            branch: branch.to_string(),
            commit: commit.to_string(),
            ..Self::default()
        }
    }

    /// The placeholders used when no version control is available.
    pub fn unknown() -> Self {
        Self::new("Unknown repo", "Unknown branch", "Unknown commit hash")
    }

    /// Mark `path` as having uncommitted changes.
    pub fn with_dirty(mut self, path: impl Into<PathBuf>) -> Self {
        self.dirty.insert(path.into());
        self.tree_dirty = true;
        self
    }

    pub fn with_tree_dirty(mut self, dirty: bool) -> Self {
        self.tree_dirty = dirty;
        self
    }
}

impl VersionControl for StaticVersionControl {
    fn repo(&self) -> String {
        self.repo.clone()
    }

    fn branch(&self) -> String {
        self.branch.clone()
    }

    fn commit(&self) -> String {
        self.commit.clone()
    }

    fn is_dirty(&self, path: &Path) -> bool {
        self.dirty.contains(path)
    }

    fn tree_is_dirty(&self) -> bool {
        self.tree_dirty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_static_dirty_files() {
        let vcs = StaticVersionControl::unknown().with_dirty("src/Dockerfile");
        assert!(vcs.is_dirty(Path::new("src/Dockerfile")));
        assert!(!vcs.is_dirty(Path::new("src/other")));
        assert!(vcs.tree_is_dirty());
    }

    #[test]
    fn test_static_unknown_placeholders() {
        let vcs = StaticVersionControl::unknown();
        assert_eq!(vcs.repo(), "Unknown repo");
        assert_eq!(vcs.branch(), "Unknown branch");
        assert_eq!(vcs.commit(), "Unknown commit hash");
        assert!(!vcs.tree_is_dirty());
    }

    #[test]
    fn test_git_outside_repository_falls_back() {
        let temp = TempDir::new().unwrap();
        let vcs = GitVersionControl::new(temp.path());
        assert_eq!(vcs.commit(), "Unknown commit hash");
        assert_eq!(vcs.branch(), "Unknown branch");
        assert!(!vcs.is_dirty(&temp.path().join("file")));
        assert!(!vcs.tree_is_dirty());
    }
}
