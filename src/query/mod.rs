//! Query surface over stored audits
//!
//! The read side of the system: filtered commit lookups, per-commit
//! metric details, and windowed trend samples, all answered from the
//! audit store without touching the repository itself.

use crate::audit::classify_trend;
use crate::config::TrendConfig;
use crate::error::Result;
use crate::models::{CommitAudit, QualityTrend, SeverityCounts};
use crate::sampling::{select_sample, TrendPoint};
use crate::store::{AuditQuery, AuditStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Which level of metrics a details request wants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetailScope {
    /// Commit-level aggregates only
    #[default]
    Repository,
    /// Include per-file metrics
    Files,
}

/// Per-file metrics inside a details response
#[derive(Debug, Clone, Serialize)]
pub struct FileMetrics {
    pub file_path: String,
    pub security_score: f64,
    pub quality_score: f64,
    pub avg_complexity: f64,
    pub issue_count: usize,
}

/// Metrics for one stored commit audit
#[derive(Debug, Clone, Serialize)]
pub struct CommitDetails {
    pub sha: String,
    pub date: DateTime<Utc>,
    pub author: String,
    pub message: String,
    pub quality_score: f64,
    pub security_score: f64,
    pub avg_complexity: f64,
    pub counts: SeverityCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<FileMetrics>>,
}

/// Whether a trend request could be answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendStatus {
    Ok,
    /// Fewer than two audits in the window. A status, not an error.
    InsufficientData,
}

#[derive(Debug, Serialize)]
pub struct TrendReport {
    pub repository: String,
    pub status: TrendStatus,
    pub trend: QualityTrend,
    pub sample: Vec<TrendPoint>,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
    pub total_commits_in_db: u64,
    pub sample_size: usize,
    pub filters_applied: BTreeMap<String, String>,
}

pub struct QueryService<'a> {
    store: &'a dyn AuditStore,
    trend: TrendConfig,
}

impl<'a> QueryService<'a> {
    pub fn new(store: &'a dyn AuditStore, trend: TrendConfig) -> Self {
        Self { store, trend }
    }

    /// Shas of the commits matching a filtered query
    pub fn filter_commits(&self, query: &AuditQuery) -> Result<Vec<String>> {
        let audits = self.store.query(query)?;
        debug!(
            "filter_commits matched {} of repository {}",
            audits.len(),
            query.repository
        );
        Ok(audits.into_iter().map(|a| a.sha).collect())
    }

    /// Metric details for specific commits. Unknown shas are silently
    /// absent from the result, preserving request order otherwise.
    pub fn get_commit_details(
        &self,
        repository: &str,
        shas: &[String],
        scope: DetailScope,
        files: &[String],
    ) -> Result<Vec<CommitDetails>> {
        let mut details = Vec::with_capacity(shas.len());
        for sha in shas {
            let Some(audit) = self.store.get(repository, sha)? else {
                continue;
            };
            details.push(Self::to_details(audit, scope, files));
        }
        Ok(details)
    }

    fn to_details(audit: CommitAudit, scope: DetailScope, files: &[String]) -> CommitDetails {
        let file_metrics = match scope {
            DetailScope::Repository => None,
            DetailScope::Files => Some(
                audit
                    .files
                    .iter()
                    .filter(|f| files.is_empty() || files.contains(&f.file_path))
                    .map(|f| FileMetrics {
                        file_path: f.file_path.clone(),
                        security_score: f.security_score,
                        quality_score: f.quality_score,
                        avg_complexity: f.avg_complexity,
                        issue_count: f.counts.total,
                    })
                    .collect(),
            ),
        };
        CommitDetails {
            sha: audit.sha,
            date: audit.date,
            author: audit.author,
            message: audit.message,
            quality_score: audit.quality_score,
            security_score: audit.security_score,
            avg_complexity: audit.avg_complexity,
            counts: audit.counts,
            files: file_metrics,
        }
    }

    /// Windowed trend sample over stored audits.
    ///
    /// Fewer than two audits in the window is reported as
    /// `insufficient_data`, never as an error or an empty success.
    pub fn sample_trend(
        &self,
        repository: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        max_points: Option<usize>,
    ) -> Result<TrendReport> {
        let max_points = max_points.unwrap_or(self.trend.max_points);
        let total_commits_in_db = self
            .store
            .repository_stats(repository)?
            .map(|s| s.total_commits)
            .unwrap_or(0);

        // Only the end bound is pushed into the store query: the sampler
        // needs the pre-window history so its baseline point can carry
        // the state just before the requested start date.
        let mut query = AuditQuery::for_repository(repository);
        query.date_to = end;
        let audits = self.store.query(&query)?;
        let in_window: Vec<CommitAudit> = audits
            .iter()
            .filter(|a| start.is_none_or(|s| a.date >= s))
            .cloned()
            .collect();

        let mut filters_applied = BTreeMap::new();
        if let Some(start) = start {
            filters_applied.insert("start".into(), start.to_rfc3339());
        }
        if let Some(end) = end {
            filters_applied.insert("end".into(), end.to_rfc3339());
        }
        filters_applied.insert("max_points".into(), max_points.to_string());

        if in_window.len() < 2 {
            return Ok(TrendReport {
                repository: repository.to_string(),
                status: TrendStatus::InsufficientData,
                trend: QualityTrend::InsufficientData,
                sample: Vec::new(),
                period_start: start,
                period_end: end,
                total_commits_in_db,
                sample_size: 0,
                filters_applied,
            });
        }

        let trend = classify_trend(&in_window);
        let sample = select_sample(&audits, start, end, max_points);
        let period_start = start.or_else(|| sample.first().map(|p| p.date));
        let period_end = end.or_else(|| sample.last().map(|p| p.date));

        Ok(TrendReport {
            repository: repository.to_string(),
            status: TrendStatus::Ok,
            trend,
            sample_size: sample.len(),
            sample,
            period_start,
            period_end,
            total_commits_in_db,
            filters_applied,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrendConfig;
    use crate::models::{Issue, IssueKind, Severity};
    use crate::sampling::PointLabel;
    use crate::store::{test_support::sample_audit, MemoryStore};
    use chrono::TimeZone;

    fn seeded_store(days: u32) -> MemoryStore {
        let store = MemoryStore::new(30);
        for day in 1..=days {
            let mut audit = sample_audit("o/r", &format!("sha{day:02}"), day, "Alice");
            audit.quality_score = 70.0 + day as f64;
            store.store(&audit).unwrap();
        }
        store
    }

    #[test]
    fn test_filter_commits_returns_shas() {
        let store = seeded_store(3);
        let service = QueryService::new(&store, TrendConfig::default());
        let shas = service
            .filter_commits(&AuditQuery::for_repository("o/r"))
            .unwrap();
        assert_eq!(shas, vec!["sha03", "sha02", "sha01"]);
    }

    #[test]
    fn test_commit_details_repository_scope() {
        let store = seeded_store(2);
        let service = QueryService::new(&store, TrendConfig::default());
        let details = service
            .get_commit_details("o/r", &["sha01".into(), "missing".into()], DetailScope::Repository, &[])
            .unwrap();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].sha, "sha01");
        assert!(details[0].files.is_none());
    }

    #[test]
    fn test_commit_details_files_scope_filters() {
        let store = MemoryStore::new(30);
        let mut audit = sample_audit("o/r", "abc", 1, "Alice");
        audit.files = vec![
            crate::models::FileAudit {
                file_path: "src/a.py".into(),
                issues: vec![Issue::new(IssueKind::Security, Severity::Low, "src/a.py", 1, "x")],
                security_score: 99.0,
                avg_complexity: 1.0,
                max_complexity: 1.0,
                function_count: 1,
                lines_of_code: 10,
                counts: SeverityCounts::from_issues(&[Issue::new(
                    IssueKind::Security,
                    Severity::Low,
                    "src/a.py",
                    1,
                    "x",
                )]),
                quality_score: 99.4,
            },
            crate::models::FileAudit {
                file_path: "src/b.py".into(),
                issues: vec![],
                security_score: 100.0,
                avg_complexity: 1.0,
                max_complexity: 1.0,
                function_count: 1,
                lines_of_code: 5,
                counts: SeverityCounts::default(),
                quality_score: 100.0,
            },
        ];
        store.store(&audit).unwrap();

        let service = QueryService::new(&store, TrendConfig::default());
        let details = service
            .get_commit_details("o/r", &["abc".into()], DetailScope::Files, &["src/b.py".into()])
            .unwrap();
        let files = details[0].files.as_ref().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file_path, "src/b.py");
    }

    #[test]
    fn test_sample_trend_happy_path() {
        let store = seeded_store(25);
        let service = QueryService::new(&store, TrendConfig::default());
        let report = service.sample_trend("o/r", None, None, None).unwrap();
        assert_eq!(report.status, TrendStatus::Ok);
        assert_eq!(report.trend, QualityTrend::Improving);
        assert!(report.sample_size <= 20);
        assert_eq!(report.total_commits_in_db, 25);
        assert_eq!(report.filters_applied.get("max_points").unwrap(), "20");
    }

    #[test]
    fn test_sample_trend_baseline_carries_pre_window_state() {
        let store = MemoryStore::new(30);
        let mut pre = sample_audit("o/r", "pre", 1, "Alice");
        pre.quality_score = 40.0;
        store.store(&pre).unwrap();
        for day in 10..=30 {
            let mut audit = sample_audit("o/r", &format!("s{day}"), day, "Alice");
            audit.quality_score = 70.0 + day as f64;
            store.store(&audit).unwrap();
        }

        let service = QueryService::new(&store, TrendConfig::default());
        let start = Utc.with_ymd_and_hms(2026, 4, 10, 0, 0, 0).unwrap();
        let report = service
            .sample_trend("o/r", Some(start), None, Some(5))
            .unwrap();
        assert_eq!(report.status, TrendStatus::Ok);

        // The first sample point carries the state just before the
        // window, not the oldest in-range commit.
        assert_eq!(report.sample[0].sha, "pre");
        assert_eq!(report.sample[0].label, PointLabel::Baseline);
        assert!(report.sample[0].date < start);

        // The pre-window audit does not skew the trend classification
        assert_eq!(report.trend, QualityTrend::Improving);
    }

    #[test]
    fn test_sample_trend_insufficient_data_is_a_status() {
        let store = seeded_store(1);
        let service = QueryService::new(&store, TrendConfig::default());
        let report = service.sample_trend("o/r", None, None, None).unwrap();
        assert_eq!(report.status, TrendStatus::InsufficientData);
        assert!(report.sample.is_empty());
        assert_eq!(report.total_commits_in_db, 1);
    }

    #[test]
    fn test_sample_trend_unknown_repository() {
        let store = MemoryStore::new(30);
        let service = QueryService::new(&store, TrendConfig::default());
        let report = service.sample_trend("o/none", None, None, None).unwrap();
        assert_eq!(report.status, TrendStatus::InsufficientData);
        assert_eq!(report.total_commits_in_db, 0);
    }
}
