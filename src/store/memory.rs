//! In-memory audit store
//!
//! Session-scoped backend with the same upsert and query semantics as
//! the persistent store, for tests and embedding callers whose audits
//! never need to outlive the process.

use super::{execute_query, AuditQuery, AuditStore, RepositoryStats};
use crate::config::StoreConfig;
use crate::error::Result;
use crate::models::CommitAudit;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Mutex;

#[derive(Default)]
struct Inner {
    commits: BTreeMap<(String, String), CommitAudit>,
    repositories: BTreeMap<String, RepositoryStats>,
}

pub struct MemoryStore {
    inner: Mutex<Inner>,
    pushdown_cap: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(StoreConfig::default().pushdown_cap)
    }
}

impl MemoryStore {
    pub fn new(pushdown_cap: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            pushdown_cap,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .expect("store lock poisoned: a thread panicked while holding it")
    }
}

impl AuditStore for MemoryStore {
    fn store(&self, audit: &CommitAudit) -> Result<()> {
        let mut inner = self.lock();
        let key = (audit.repository.clone(), audit.sha.clone());
        let existed = inner.commits.insert(key, audit.clone()).is_some();
        if !existed {
            inner
                .repositories
                .entry(audit.repository.clone())
                .or_insert_with(|| RepositoryStats::new(&audit.repository))
                .record(Utc::now());
        }
        Ok(())
    }

    fn get(&self, repository: &str, sha: &str) -> Result<Option<CommitAudit>> {
        let inner = self.lock();
        Ok(inner
            .commits
            .get(&(repository.to_string(), sha.to_string()))
            .cloned())
    }

    fn query(&self, query: &AuditQuery) -> Result<Vec<CommitAudit>> {
        let inner = self.lock();
        let scan: Vec<CommitAudit> = inner
            .commits
            .iter()
            .filter(|((repo, _), _)| *repo == query.repository)
            .map(|(_, audit)| audit.clone())
            .collect();
        Ok(execute_query(scan.into_iter(), query, self.pushdown_cap))
    }

    fn repository_stats(&self, repository: &str) -> Result<Option<RepositoryStats>> {
        Ok(self.lock().repositories.get(repository).cloned())
    }

    fn list_repositories(&self) -> Result<Vec<RepositoryStats>> {
        Ok(self.lock().repositories.values().cloned().collect())
    }

    fn delete_repository(&self, repository: &str) -> Result<usize> {
        let mut inner = self.lock();
        let before = inner.commits.len();
        inner.commits.retain(|(repo, _), _| repo != repository);
        let removed = before - inner.commits.len();
        inner.repositories.remove(repository);
        Ok(removed)
    }
}
