//! Repository connectors
//!
//! A connector abstracts the git hosting side: listing commits and tags,
//! materializing the tree at a given commit, and fetching diffs. The
//! audit engine only ever sees this trait, so hosting-API clients and the
//! local git2 connector are interchangeable.

mod git;

pub use git::GitConnector;

use crate::error::Result;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Information about a repository commit
#[derive(Debug, Clone, PartialEq)]
pub struct CommitInfo {
    pub sha: String,
    /// Commit message (first line)
    pub message: String,
    pub author: String,
    pub author_email: String,
    pub date: DateTime<Utc>,
    /// Files touched by this commit
    pub files_changed: Vec<String>,
}

/// Information about a repository tag
#[derive(Debug, Clone, PartialEq)]
pub struct TagInfo {
    pub name: String,
    /// Sha of the commit the tag points at
    pub sha: String,
}

/// A checked-out tree for one commit. Owns its temporary directory, so
/// dropping the snapshot removes the tree.
#[derive(Debug)]
pub struct SnapshotTree {
    path: PathBuf,
    _tempdir: Option<tempfile::TempDir>,
}

impl SnapshotTree {
    pub fn new(path: PathBuf, tempdir: Option<tempfile::TempDir>) -> Self {
        Self {
            path,
            _tempdir: tempdir,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Abstract interface for accessing a repository's history and content
pub trait RepositoryConnector: Send + Sync {
    /// Repository identifier used as the storage key
    fn repo_id(&self) -> &str;

    /// List commits, newest first, optionally bounded by date or branch
    fn list_commits(
        &self,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
        branch: Option<&str>,
    ) -> Result<Vec<CommitInfo>>;

    /// List all tags
    fn list_tags(&self) -> Result<Vec<TagInfo>>;

    /// Materialize the full tree at a commit
    fn clone_at(&self, sha: &str) -> Result<SnapshotTree>;

    /// Unified diff introduced by a commit
    fn get_diff(&self, sha: &str) -> Result<String>;
}
