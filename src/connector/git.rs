//! Local git connector using libgit2
//!
//! Extracts commit history and per-commit trees with the git2 crate.
//! A `Repository` handle is not `Sync`, so the connector keeps only the
//! repository path and opens a fresh handle per call.

use super::{CommitInfo, RepositoryConnector, SnapshotTree, TagInfo};
use crate::error::{AuditError, Result};
use chrono::{DateTime, TimeZone, Utc};
use git2::{build::CheckoutBuilder, Commit, DiffOptions, Repository, Sort};
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct GitConnector {
    repo_path: PathBuf,
    repo_id: String,
}

impl GitConnector {
    /// Open a connector for the repository at (or above) `path`.
    ///
    /// The repository id defaults to the workdir directory name.
    pub fn open(path: &Path) -> Result<Self> {
        let repo = Repository::discover(path)
            .map_err(|e| AuditError::Configuration(format!("not a git repository: {e}")))?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| AuditError::Configuration("bare repositories are not supported".into()))?
            .to_path_buf();
        let repo_id = workdir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "repository".to_string());
        debug!("opened git repository at {}", workdir.display());
        Ok(Self {
            repo_path: workdir,
            repo_id,
        })
    }

    /// Override the repository id used as the storage key
    pub fn with_repo_id(mut self, repo_id: impl Into<String>) -> Self {
        self.repo_id = repo_id.into();
        self
    }

    fn repo(&self) -> Result<Repository> {
        Ok(Repository::open(&self.repo_path)?)
    }

    fn commit_time(commit: &Commit) -> DateTime<Utc> {
        Utc.timestamp_opt(commit.time().seconds(), 0)
            .single()
            .unwrap_or_default()
    }

    fn files_changed(repo: &Repository, commit: &Commit) -> Result<Vec<String>> {
        let tree = commit.tree()?;
        let parent_tree = match commit.parent(0) {
            Ok(parent) => Some(parent.tree()?),
            Err(_) => None,
        };
        let diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)?;

        let mut files = Vec::new();
        for delta in diff.deltas() {
            if let Some(path) = delta.new_file().path().or_else(|| delta.old_file().path()) {
                files.push(path.to_string_lossy().into_owned());
            }
        }
        Ok(files)
    }

    fn extract_commit_info(repo: &Repository, commit: &Commit) -> Result<CommitInfo> {
        let author = commit.author();
        Ok(CommitInfo {
            sha: commit.id().to_string(),
            message: commit.summary().unwrap_or("").to_string(),
            author: author.name().unwrap_or("unknown").to_string(),
            author_email: author.email().unwrap_or("").to_string(),
            date: Self::commit_time(commit),
            files_changed: Self::files_changed(repo, commit)?,
        })
    }
}

impl RepositoryConnector for GitConnector {
    fn repo_id(&self) -> &str {
        &self.repo_id
    }

    fn list_commits(
        &self,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
        branch: Option<&str>,
    ) -> Result<Vec<CommitInfo>> {
        let repo = self.repo()?;
        let mut revwalk = repo.revwalk()?;
        revwalk.set_sorting(Sort::TIME)?;
        match branch {
            Some(name) => {
                let reference = repo
                    .find_branch(name, git2::BranchType::Local)
                    .map_err(|e| AuditError::Connector(format!("branch '{name}': {e}")))?;
                let oid = reference
                    .get()
                    .target()
                    .ok_or_else(|| AuditError::Connector(format!("branch '{name}' has no target")))?;
                revwalk.push(oid)?;
            }
            None => revwalk.push_head()?,
        }

        let mut commits = Vec::new();
        for oid in revwalk {
            let commit = repo.find_commit(oid?)?;
            let date = Self::commit_time(&commit);
            if let Some(until) = until {
                if date > until {
                    continue;
                }
            }
            if let Some(since) = since {
                // Walk is newest-first, everything from here on is older
                if date < since {
                    break;
                }
            }
            commits.push(Self::extract_commit_info(&repo, &commit)?);
        }
        debug!("listed {} commits from {}", commits.len(), self.repo_id);
        Ok(commits)
    }

    fn list_tags(&self) -> Result<Vec<TagInfo>> {
        let repo = self.repo()?;
        let mut tags = Vec::new();
        for name in repo.tag_names(None)?.iter().flatten() {
            let obj = repo.revparse_single(&format!("refs/tags/{name}"))?;
            let commit = obj.peel_to_commit()?;
            tags.push(TagInfo {
                name: name.to_string(),
                sha: commit.id().to_string(),
            });
        }
        Ok(tags)
    }

    fn clone_at(&self, sha: &str) -> Result<SnapshotTree> {
        let repo = self.repo()?;
        let obj = repo.revparse_single(sha)?;
        let commit = obj.peel_to_commit()?;
        let tree = commit.tree()?;

        let tempdir = tempfile::TempDir::with_prefix("repopulse-snapshot-")
            .map_err(|e| AuditError::Connector(format!("snapshot dir: {e}")))?;

        let mut checkout = CheckoutBuilder::new();
        checkout
            .target_dir(tempdir.path())
            .force()
            .recreate_missing(true)
            .update_index(false);
        repo.checkout_tree(tree.as_object(), Some(&mut checkout))?;

        debug!(
            "checked out {} into {}",
            &sha[..sha.len().min(7)],
            tempdir.path().display()
        );
        let path = tempdir.path().to_path_buf();
        Ok(SnapshotTree::new(path, Some(tempdir)))
    }

    fn get_diff(&self, sha: &str) -> Result<String> {
        let repo = self.repo()?;
        let obj = repo.revparse_single(sha)?;
        let commit = obj.peel_to_commit()?;
        let tree = commit.tree()?;
        let parent_tree = match commit.parent(0) {
            Ok(parent) => Some(parent.tree()?),
            Err(_) => None,
        };

        let mut opts = DiffOptions::new();
        let diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut opts))?;

        let mut buf = Vec::new();
        diff.print(git2::DiffFormat::Patch, |_delta, _hunk, line| {
            match line.origin() {
                '+' | '-' | ' ' => buf.push(line.origin() as u8),
                _ => {}
            }
            buf.extend_from_slice(line.content());
            true
        })?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}
