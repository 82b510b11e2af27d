//! Scan command handlers
//!
//! Glue between the CLI and the engine: a bootstrap handler for the
//! initial historical scan and a sync handler for incremental catch-up.
//! Handlers never panic outward; every outcome, including connector
//! failures after retries, becomes a `CommandResult`.

use crate::audit::{CommitAuditor, RepositoryAuditor};
use crate::connector::RepositoryConnector;
use crate::error::AuditError;
use crate::models::{CommandResult, CommandStatus, RepositoryAudit, ScanType};
use crate::review::with_retry;
use crate::sampling::{sample_bootstrap, SamplingStrategy};
use crate::store::{AuditQuery, AuditStore, QueryOrder};
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Progress callback: (commits audited, total commits)
pub type Progress<'a> = Option<&'a (dyn Fn(usize, usize) + Sync)>;

#[derive(Debug, Clone)]
pub struct BootstrapCommand {
    pub strategy: SamplingStrategy,
    pub branch: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl Default for BootstrapCommand {
    fn default() -> Self {
        Self {
            strategy: SamplingStrategy::Weekly,
            branch: None,
            since: None,
            until: None,
        }
    }
}

fn success(command: &str, audit: RepositoryAudit, started: Instant) -> CommandResult {
    let message = format!(
        "audited {} commits of {} (avg quality {:.1}, trend {})",
        audit.commits_scanned, audit.repository, audit.avg_quality_score, audit.quality_trend
    );
    CommandResult {
        command: command.to_string(),
        status: CommandStatus::Success,
        message,
        audit: Some(audit),
        error: None,
        processing_time: started.elapsed().as_secs_f64(),
    }
}

fn no_data(command: &str, message: impl Into<String>, started: Instant) -> CommandResult {
    CommandResult {
        command: command.to_string(),
        status: CommandStatus::NoData,
        message: message.into(),
        audit: None,
        error: None,
        processing_time: started.elapsed().as_secs_f64(),
    }
}

fn failure(command: &str, err: &AuditError, started: Instant) -> CommandResult {
    warn!("{command} failed: {err}");
    CommandResult {
        command: command.to_string(),
        status: CommandStatus::Error,
        message: format!("{command} failed"),
        audit: None,
        error: Some(err.to_string()),
        processing_time: started.elapsed().as_secs_f64(),
    }
}

pub struct BootstrapHandler<'a> {
    connector: &'a dyn RepositoryConnector,
    store: &'a dyn AuditStore,
    auditor: &'a CommitAuditor,
    retries: usize,
    retry_delay: Duration,
}

impl<'a> BootstrapHandler<'a> {
    pub fn new(
        connector: &'a dyn RepositoryConnector,
        store: &'a dyn AuditStore,
        auditor: &'a CommitAuditor,
        retries: usize,
        retry_delay: Duration,
    ) -> Self {
        Self {
            connector,
            store,
            auditor,
            retries: retries.max(1),
            retry_delay,
        }
    }

    /// Historical scan: list, sample, audit, persist.
    pub fn run(&self, command: &BootstrapCommand, progress: Progress<'_>) -> CommandResult {
        let started = Instant::now();
        let repo = self.connector.repo_id().to_string();
        info!("bootstrap of {repo} with {} sampling", command.strategy);

        let commits = match with_retry(self.retries, self.retry_delay, || {
            self.connector
                .list_commits(command.since, command.until, command.branch.as_deref())
        }) {
            Ok(commits) => commits,
            Err(e) => return failure("bootstrap", &e, started),
        };

        let tags = if command.strategy == SamplingStrategy::Tags {
            match with_retry(self.retries, self.retry_delay, || self.connector.list_tags()) {
                Ok(tags) => tags,
                Err(e) => return failure("bootstrap", &e, started),
            }
        } else {
            Vec::new()
        };

        let sample = sample_bootstrap(&commits, command.strategy, &tags);
        if sample.is_empty() {
            return no_data("bootstrap", "no commits to audit", started);
        }

        let auditor = RepositoryAuditor::new(self.connector, self.auditor);
        let audit = match auditor.audit_repository(command.strategy.scan_type(), &sample, progress)
        {
            Ok(audit) => audit,
            Err(e) => return failure("bootstrap", &e, started),
        };

        for commit_audit in &audit.commit_audits {
            if let Err(e) = self.store.store(commit_audit) {
                return failure("bootstrap", &e, started);
            }
        }

        success("bootstrap", audit, started)
    }
}

pub struct SyncHandler<'a> {
    connector: &'a dyn RepositoryConnector,
    store: &'a dyn AuditStore,
    auditor: &'a CommitAuditor,
    retries: usize,
    retry_delay: Duration,
}

impl<'a> SyncHandler<'a> {
    pub fn new(
        connector: &'a dyn RepositoryConnector,
        store: &'a dyn AuditStore,
        auditor: &'a CommitAuditor,
        retries: usize,
        retry_delay: Duration,
    ) -> Self {
        Self {
            connector,
            store,
            auditor,
            retries: retries.max(1),
            retry_delay,
        }
    }

    /// Incremental scan: audit every commit newer than the most recently
    /// stored one. Requires a prior bootstrap.
    pub fn run(&self, branch: Option<&str>, progress: Progress<'_>) -> CommandResult {
        let started = Instant::now();
        let repo = self.connector.repo_id().to_string();

        let last_stored = match self.newest_stored_date(&repo) {
            Ok(Some(date)) => date,
            Ok(None) => {
                return no_data(
                    "sync",
                    format!("{repo} has no stored audits, run bootstrap first"),
                    started,
                )
            }
            Err(e) => return failure("sync", &e, started),
        };

        let commits = match with_retry(self.retries, self.retry_delay, || {
            self.connector.list_commits(Some(last_stored), None, branch)
        }) {
            Ok(commits) => commits,
            Err(e) => return failure("sync", &e, started),
        };

        // The since-bound is inclusive, so the newest stored commit comes
        // back; drop everything already persisted.
        let mut fresh = Vec::new();
        for commit in commits {
            match self.store.get(&repo, &commit.sha) {
                Ok(None) => fresh.push(commit),
                Ok(Some(_)) => {}
                Err(e) => return failure("sync", &e, started),
            }
        }
        if fresh.is_empty() {
            return no_data("sync", format!("{repo} is already up to date"), started);
        }
        info!("sync of {repo}: {} new commits", fresh.len());

        let auditor = RepositoryAuditor::new(self.connector, self.auditor);
        let audit = match auditor.audit_repository(ScanType::Sync, &fresh, progress) {
            Ok(audit) => audit,
            Err(e) => return failure("sync", &e, started),
        };

        for commit_audit in &audit.commit_audits {
            if let Err(e) = self.store.store(commit_audit) {
                return failure("sync", &e, started);
            }
        }

        success("sync", audit, started)
    }

    fn newest_stored_date(&self, repo: &str) -> crate::error::Result<Option<DateTime<Utc>>> {
        let mut query = AuditQuery::for_repository(repo);
        query.order = QueryOrder::NewestFirst;
        query.limit = Some(1);
        Ok(self.store.query(&query)?.first().map(|a| a.date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::default_analyzers;
    use crate::config::ScoringPolicy;
    use crate::connector::{CommitInfo, SnapshotTree, TagInfo};
    use crate::error::Result;
    use crate::store::MemoryStore;
    use chrono::TimeZone;
    use std::fs;
    use std::sync::Mutex;

    /// Connector over a set of fabricated commits, each materializing a
    /// fixed tree, with optional injected listing failures.
    struct FakeConnector {
        commits: Vec<CommitInfo>,
        failures: Mutex<usize>,
    }

    impl FakeConnector {
        fn new(commits: Vec<CommitInfo>) -> Self {
            Self {
                commits,
                failures: Mutex::new(0),
            }
        }

        fn failing_first(commits: Vec<CommitInfo>, failures: usize) -> Self {
            Self {
                commits,
                failures: Mutex::new(failures),
            }
        }
    }

    impl RepositoryConnector for FakeConnector {
        fn repo_id(&self) -> &str {
            "o/fake"
        }

        fn list_commits(
            &self,
            since: Option<DateTime<Utc>>,
            _until: Option<DateTime<Utc>>,
            _branch: Option<&str>,
        ) -> Result<Vec<CommitInfo>> {
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(AuditError::Connector("transient".into()));
            }
            Ok(self
                .commits
                .iter()
                .filter(|c| since.is_none_or(|s| c.date >= s))
                .cloned()
                .collect())
        }

        fn list_tags(&self) -> Result<Vec<TagInfo>> {
            Ok(vec![])
        }

        fn clone_at(&self, _sha: &str) -> Result<SnapshotTree> {
            let dir = tempfile::TempDir::new().unwrap();
            fs::write(dir.path().join("app.py"), "def main():\n    pass\n").unwrap();
            let path = dir.path().to_path_buf();
            Ok(SnapshotTree::new(path, Some(dir)))
        }

        fn get_diff(&self, _sha: &str) -> Result<String> {
            Ok(String::new())
        }
    }

    fn commit(sha: &str, day: u32) -> CommitInfo {
        CommitInfo {
            sha: sha.to_string(),
            message: format!("commit {sha}"),
            author: "Alice".into(),
            author_email: "alice@example.com".into(),
            date: Utc.with_ymd_and_hms(2026, 5, day, 12, 0, 0).unwrap(),
            files_changed: vec!["app.py".into()],
        }
    }

    fn auditor() -> CommitAuditor {
        let policy = ScoringPolicy::default();
        CommitAuditor::new(default_analyzers(&policy), policy)
    }

    #[test]
    fn test_bootstrap_persists_every_sampled_commit() {
        let connector = FakeConnector::new(vec![commit("ccc", 3), commit("bbb", 2), commit("aaa", 1)]);
        let store = MemoryStore::new(30);
        let auditor = auditor();
        let handler = BootstrapHandler::new(&connector, &store, &auditor, 2, Duration::ZERO);

        let command = BootstrapCommand {
            strategy: SamplingStrategy::Full,
            ..BootstrapCommand::default()
        };
        let result = handler.run(&command, None);
        assert_eq!(result.status, CommandStatus::Success);
        let audit = result.audit.expect("audit attached");
        assert_eq!(audit.commits_scanned, 3);
        assert!(store.get("o/fake", "aaa").unwrap().is_some());
        assert!(store.get("o/fake", "ccc").unwrap().is_some());
        assert_eq!(
            store.repository_stats("o/fake").unwrap().unwrap().total_commits,
            3
        );
    }

    #[test]
    fn test_bootstrap_retries_transient_connector_failure() {
        let connector = FakeConnector::failing_first(vec![commit("aaa", 1)], 1);
        let store = MemoryStore::new(30);
        let auditor = auditor();
        let handler = BootstrapHandler::new(&connector, &store, &auditor, 2, Duration::ZERO);

        let result = handler.run(&BootstrapCommand::default(), None);
        assert_eq!(result.status, CommandStatus::Success);
    }

    #[test]
    fn test_bootstrap_exhausted_retries_is_error_result() {
        let connector = FakeConnector::failing_first(vec![commit("aaa", 1)], 10);
        let store = MemoryStore::new(30);
        let auditor = auditor();
        let handler = BootstrapHandler::new(&connector, &store, &auditor, 2, Duration::ZERO);

        let result = handler.run(&BootstrapCommand::default(), None);
        assert_eq!(result.status, CommandStatus::Error);
        assert!(result.error.unwrap().contains("transient"));
    }

    #[test]
    fn test_bootstrap_empty_history_is_no_data() {
        let connector = FakeConnector::new(vec![]);
        let store = MemoryStore::new(30);
        let auditor = auditor();
        let handler = BootstrapHandler::new(&connector, &store, &auditor, 2, Duration::ZERO);

        let result = handler.run(&BootstrapCommand::default(), None);
        assert_eq!(result.status, CommandStatus::NoData);
    }

    #[test]
    fn test_sync_requires_bootstrap() {
        let connector = FakeConnector::new(vec![commit("aaa", 1)]);
        let store = MemoryStore::new(30);
        let auditor = auditor();
        let handler = SyncHandler::new(&connector, &store, &auditor, 2, Duration::ZERO);

        let result = handler.run(None, None);
        assert_eq!(result.status, CommandStatus::NoData);
        assert!(result.message.contains("bootstrap"));
    }

    #[test]
    fn test_sync_audits_only_new_commits() {
        let connector = FakeConnector::new(vec![commit("ccc", 3), commit("bbb", 2), commit("aaa", 1)]);
        let store = MemoryStore::new(30);
        let auditor = auditor();

        // Seed the store with the two oldest commits already audited
        for sha in ["aaa", "bbb"] {
            let info = connector.commits.iter().find(|c| c.sha == sha).unwrap();
            let snapshot = connector.clone_at(sha).unwrap();
            let audit = auditor.audit_commit("o/fake", info, snapshot.path()).unwrap();
            store.store(&audit).unwrap();
        }

        let handler = SyncHandler::new(&connector, &store, &auditor, 2, Duration::ZERO);
        let result = handler.run(None, None);
        assert_eq!(result.status, CommandStatus::Success);
        let audit = result.audit.unwrap();
        assert_eq!(audit.commits_scanned, 1);
        assert_eq!(audit.commit_audits[0].sha, "ccc");
        assert_eq!(audit.scan_type, ScanType::Sync);
    }

    #[test]
    fn test_sync_up_to_date_is_no_data() {
        let connector = FakeConnector::new(vec![commit("aaa", 1)]);
        let store = MemoryStore::new(30);
        let auditor = auditor();
        let bootstrap = BootstrapHandler::new(&connector, &store, &auditor, 2, Duration::ZERO);
        let command = BootstrapCommand {
            strategy: SamplingStrategy::Full,
            ..BootstrapCommand::default()
        };
        assert_eq!(bootstrap.run(&command, None).status, CommandStatus::Success);

        let handler = SyncHandler::new(&connector, &store, &auditor, 2, Duration::ZERO);
        let result = handler.run(None, None);
        assert_eq!(result.status, CommandStatus::NoData);
        assert!(result.message.contains("up to date"));
    }
}
