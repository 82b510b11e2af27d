//! Audit persistence
//!
//! Commit audits are stored as documents keyed by (repository, sha);
//! storing the same sha twice is an idempotent upsert. A per-repository
//! metadata document tracks commit totals and the analyzed time span.
//!
//! Queries carry date-range and score filters, which every backend
//! applies during its scan, plus optional author/file set filters. Set
//! filters are pushed into the scan only while the set is small enough
//! for the backend's operator limits; larger sets fall back to
//! post-filtering the scanned stream. `limit` is applied last either
//! way, so a fallback never under-counts.

mod memory;
mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use crate::error::Result;
use crate::models::CommitAudit;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Per-repository metadata document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryStats {
    pub name: String,
    pub total_commits: u64,
    pub first_analyzed: Option<DateTime<Utc>>,
    pub last_analyzed: Option<DateTime<Utc>>,
}

impl RepositoryStats {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            total_commits: 0,
            first_analyzed: None,
            last_analyzed: None,
        }
    }

    /// Fold one newly stored audit into the metadata
    pub fn record(&mut self, now: DateTime<Utc>) {
        self.total_commits += 1;
        if self.first_analyzed.is_none() {
            self.first_analyzed = Some(now);
        }
        self.last_analyzed = Some(now);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// A filtered, ordered query over one repository's stored audits
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub repository: String,
    /// Match commits touching any of these files
    pub files: Vec<String>,
    /// Match commits by any of these authors
    pub authors: Vec<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub min_quality: Option<f64>,
    pub min_security: Option<f64>,
    pub limit: Option<usize>,
    pub order: QueryOrder,
}

impl AuditQuery {
    pub fn for_repository(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            ..Self::default()
        }
    }

    /// Date and score predicates, always evaluated inside the scan
    fn matches_base(&self, audit: &CommitAudit) -> bool {
        if self.date_from.is_some_and(|from| audit.date < from) {
            return false;
        }
        if self.date_to.is_some_and(|to| audit.date > to) {
            return false;
        }
        if self.min_quality.is_some_and(|q| audit.quality_score < q) {
            return false;
        }
        if self.min_security.is_some_and(|s| audit.security_score < s) {
            return false;
        }
        true
    }

    /// Author/file set predicates, pushed down only under the cap
    fn matches_sets(&self, audit: &CommitAudit) -> bool {
        if !self.authors.is_empty() && !self.authors.iter().any(|a| *a == audit.author) {
            return false;
        }
        if !self.files.is_empty()
            && !audit
                .files_changed
                .iter()
                .any(|f| self.files.iter().any(|q| q == f))
        {
            return false;
        }
        true
    }
}

/// Run a query plan over a backend's raw document stream.
///
/// Every backend hands its full per-repository scan here; which side of
/// the cap the set filters land on never changes the result set, only
/// where the work happens.
pub(crate) fn execute_query(
    scan: impl Iterator<Item = CommitAudit>,
    query: &AuditQuery,
    pushdown_cap: usize,
) -> Vec<CommitAudit> {
    let set_size = query.authors.len().max(query.files.len());
    let pushdown = set_size <= pushdown_cap;
    if !pushdown {
        debug!(
            "filter set of {set_size} exceeds pushdown cap {pushdown_cap}, \
             falling back to client-side filtering"
        );
    }

    let mut matches: Vec<CommitAudit> = scan
        .filter(|audit| query.matches_base(audit))
        .filter(|audit| !pushdown || query.matches_sets(audit))
        .collect();

    if !pushdown {
        matches.retain(|audit| query.matches_sets(audit));
    }

    match query.order {
        QueryOrder::NewestFirst => matches.sort_by(|a, b| b.date.cmp(&a.date)),
        QueryOrder::OldestFirst => matches.sort_by(|a, b| a.date.cmp(&b.date)),
    }

    if let Some(limit) = query.limit {
        matches.truncate(limit);
    }
    matches
}

/// Abstract persistence for commit audits
pub trait AuditStore: Send + Sync {
    /// Idempotent upsert keyed by (repository, sha). First insert of a
    /// sha bumps the repository's commit total.
    fn store(&self, audit: &CommitAudit) -> Result<()>;

    /// Fetch one audit by key
    fn get(&self, repository: &str, sha: &str) -> Result<Option<CommitAudit>>;

    /// Filtered, ordered query over one repository's audits
    fn query(&self, query: &AuditQuery) -> Result<Vec<CommitAudit>>;

    /// Metadata for one repository, if any audits are stored
    fn repository_stats(&self, repository: &str) -> Result<Option<RepositoryStats>>;

    /// Metadata for every stored repository
    fn list_repositories(&self) -> Result<Vec<RepositoryStats>>;

    /// Delete a repository and all its commit documents. Returns the
    /// number of commit documents removed.
    fn delete_repository(&self, repository: &str) -> Result<usize>;
}
