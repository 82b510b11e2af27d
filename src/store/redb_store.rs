//! redb-backed audit store
//!
//! Single-file embedded database with two tables: one metadata document
//! per repository and one document per audited commit. Commit keys are
//! `repository NUL sha`, so one repository's documents form a contiguous
//! key range and queries and cascade deletes are plain range scans.
//!
//! A first-time commit insert and its metadata increment happen in the
//! same write transaction.

use super::{execute_query, AuditQuery, AuditStore, RepositoryStats};
use crate::config::StoreConfig;
use crate::error::{AuditError, Result};
use crate::models::CommitAudit;
use chrono::Utc;
use redb::ReadableTable;
use std::path::Path;
use tracing::{debug, info};

const REPOSITORIES_TABLE: redb::TableDefinition<&str, &[u8]> =
    redb::TableDefinition::new("repositories");
const COMMITS_TABLE: redb::TableDefinition<&str, &[u8]> = redb::TableDefinition::new("commits");

fn commit_key(repository: &str, sha: &str) -> String {
    format!("{repository}\x00{sha}")
}

/// Key range covering every commit document of one repository
fn repo_range(repository: &str) -> (String, String) {
    (format!("{repository}\x00"), format!("{repository}\x01"))
}

pub struct RedbStore {
    db: redb::Database,
    config: StoreConfig,
}

impl RedbStore {
    /// Create or open the database file at `path`
    pub fn open(path: &Path, config: StoreConfig) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AuditError::Store(format!("creating {}: {e}", parent.display())))?;
        }
        let db = redb::Database::create(path)?;
        debug!("opened audit store at {}", path.display());
        Ok(Self { db, config })
    }

    /// Commit documents for one repository, in key order
    fn scan_repository(&self, repository: &str) -> Result<Vec<CommitAudit>> {
        let read_txn = self.db.begin_read()?;
        let table = match read_txn.open_table(COMMITS_TABLE) {
            Ok(table) => table,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let (start, end) = repo_range(repository);
        let mut audits = Vec::new();
        for item in table.range(start.as_str()..end.as_str())? {
            let (_, value) = item?;
            audits.push(serde_json::from_slice(value.value())?);
        }
        Ok(audits)
    }
}

impl AuditStore for RedbStore {
    fn store(&self, audit: &CommitAudit) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut commits = write_txn.open_table(COMMITS_TABLE)?;
            let key = commit_key(&audit.repository, &audit.sha);
            let value = serde_json::to_vec(audit)?;
            let existed = commits.insert(key.as_str(), value.as_slice())?.is_some();

            // Re-storing a sha replaces the document without touching the
            // commit total.
            if !existed {
                let mut repositories = write_txn.open_table(REPOSITORIES_TABLE)?;
                let mut stats = match repositories.get(audit.repository.as_str())? {
                    Some(value) => serde_json::from_slice(value.value())?,
                    None => RepositoryStats::new(&audit.repository),
                };
                stats.record(Utc::now());
                let value = serde_json::to_vec(&stats)?;
                repositories.insert(audit.repository.as_str(), value.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    fn get(&self, repository: &str, sha: &str) -> Result<Option<CommitAudit>> {
        let read_txn = self.db.begin_read()?;
        let table = match read_txn.open_table(COMMITS_TABLE) {
            Ok(table) => table,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let key = commit_key(repository, sha);
        match table.get(key.as_str())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    fn query(&self, query: &AuditQuery) -> Result<Vec<CommitAudit>> {
        let scan = self.scan_repository(&query.repository)?;
        Ok(execute_query(
            scan.into_iter(),
            query,
            self.config.pushdown_cap,
        ))
    }

    fn repository_stats(&self, repository: &str) -> Result<Option<RepositoryStats>> {
        let read_txn = self.db.begin_read()?;
        let table = match read_txn.open_table(REPOSITORIES_TABLE) {
            Ok(table) => table,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match table.get(repository)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    fn list_repositories(&self) -> Result<Vec<RepositoryStats>> {
        let read_txn = self.db.begin_read()?;
        let table = match read_txn.open_table(REPOSITORIES_TABLE) {
            Ok(table) => table,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut repositories = Vec::new();
        for item in table.range::<&str>(..)? {
            let (_, value) = item?;
            repositories.push(serde_json::from_slice(value.value())?);
        }
        Ok(repositories)
    }

    fn delete_repository(&self, repository: &str) -> Result<usize> {
        // Collect keys first, then remove in bounded batches so one huge
        // repository does not produce one huge transaction.
        let keys: Vec<String> = {
            let read_txn = self.db.begin_read()?;
            match read_txn.open_table(COMMITS_TABLE) {
                Ok(table) => {
                    let (start, end) = repo_range(repository);
                    let mut keys = Vec::new();
                    for item in table.range(start.as_str()..end.as_str())? {
                        let (key, _) = item?;
                        keys.push(key.value().to_string());
                    }
                    keys
                }
                Err(redb::TableError::TableDoesNotExist(_)) => Vec::new(),
                Err(e) => return Err(e.into()),
            }
        };

        let mut removed = 0;
        for batch in keys.chunks(self.config.delete_batch_size.max(1)) {
            let write_txn = self.db.begin_write()?;
            {
                let mut commits = write_txn.open_table(COMMITS_TABLE)?;
                for key in batch {
                    if commits.remove(key.as_str())?.is_some() {
                        removed += 1;
                    }
                }
            }
            write_txn.commit()?;
        }

        let write_txn = self.db.begin_write()?;
        {
            let mut repositories = write_txn.open_table(REPOSITORIES_TABLE)?;
            repositories.remove(repository)?;
        }
        write_txn.commit()?;

        info!("deleted {removed} commit documents for {repository}");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::sample_audit;
    use super::*;
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> RedbStore {
        RedbStore::open(&dir.path().join("audits.redb"), StoreConfig::default()).unwrap()
    }

    #[test]
    fn test_round_trip_is_field_equal() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let audit = sample_audit("o/r", "abc123", 5, "Alice");
        store.store(&audit).unwrap();

        let loaded = store.get("o/r", "abc123").unwrap().expect("stored");
        assert_eq!(
            serde_json::to_value(&audit).unwrap(),
            serde_json::to_value(&loaded).unwrap()
        );
    }

    #[test]
    fn test_get_missing_returns_none() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        assert!(store.get("o/r", "nothere").unwrap().is_none());
    }

    #[test]
    fn test_upsert_is_idempotent_for_metadata() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let audit = sample_audit("o/r", "abc123", 5, "Alice");
        store.store(&audit).unwrap();
        store.store(&audit).unwrap();
        store.store(&audit).unwrap();

        let stats = store.repository_stats("o/r").unwrap().expect("stats");
        assert_eq!(stats.total_commits, 1);
        assert!(stats.first_analyzed.is_some());
    }

    #[test]
    fn test_metadata_counts_distinct_shas() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        for (sha, day) in [("a1", 1), ("b2", 2), ("c3", 3)] {
            store.store(&sample_audit("o/r", sha, day, "Alice")).unwrap();
        }
        let stats = store.repository_stats("o/r").unwrap().expect("stats");
        assert_eq!(stats.total_commits, 3);
    }

    #[test]
    fn test_query_is_scoped_to_repository() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store.store(&sample_audit("o/r", "aaa", 1, "Alice")).unwrap();
        store.store(&sample_audit("o/other", "bbb", 2, "Bob")).unwrap();

        let result = store.query(&AuditQuery::for_repository("o/r")).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].sha, "aaa");
    }

    #[test]
    fn test_cascade_delete_with_small_batches() {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig {
            delete_batch_size: 2,
            ..StoreConfig::default()
        };
        let store = RedbStore::open(&dir.path().join("audits.redb"), config).unwrap();
        for (i, sha) in ["a", "b", "c", "d", "e"].iter().enumerate() {
            store
                .store(&sample_audit("o/r", sha, i as u32 + 1, "Alice"))
                .unwrap();
        }
        store.store(&sample_audit("o/keep", "zzz", 9, "Bob")).unwrap();

        let removed = store.delete_repository("o/r").unwrap();
        assert_eq!(removed, 5);
        assert!(store.repository_stats("o/r").unwrap().is_none());
        assert!(store.query(&AuditQuery::for_repository("o/r")).unwrap().is_empty());
        // Other repositories are untouched
        assert!(store.get("o/keep", "zzz").unwrap().is_some());
    }

    #[test]
    fn test_list_repositories() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store.store(&sample_audit("o/a", "aaa", 1, "Alice")).unwrap();
        store.store(&sample_audit("o/b", "bbb", 2, "Bob")).unwrap();

        let repositories = store.list_repositories().unwrap();
        let names: Vec<_> = repositories.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["o/a", "o/b"]);
    }
}
