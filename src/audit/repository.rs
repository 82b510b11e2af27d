//! Repository-level audit aggregation
//!
//! Drives one scan run: checks out each selected commit, audits the
//! snapshot, and rolls the commit audits up into a `RepositoryAudit`
//! with severity totals and a quality trend.

use super::CommitAuditor;
use crate::connector::{CommitInfo, RepositoryConnector};
use crate::error::Result;
use crate::models::{
    CommitAudit, IssueKind, QualityTrend, RepositoryAudit, ScanType, SeverityCounts,
};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::info;

/// Commits compared from each end of the sequence when classifying trend
const TREND_WINDOW: usize = 3;

/// Mean quality delta beyond which the trend leaves "stable"
const TREND_DELTA: f64 = 5.0;

pub struct RepositoryAuditor<'a> {
    connector: &'a dyn RepositoryConnector,
    commit_auditor: &'a CommitAuditor,
}

impl<'a> RepositoryAuditor<'a> {
    pub fn new(connector: &'a dyn RepositoryConnector, commit_auditor: &'a CommitAuditor) -> Self {
        Self {
            connector,
            commit_auditor,
        }
    }

    /// Audit the snapshot at each selected commit and aggregate.
    ///
    /// `progress` is called after each commit with (done, total).
    pub fn audit_repository(
        &self,
        scan_type: ScanType,
        commits: &[CommitInfo],
        progress: Option<&(dyn Fn(usize, usize) + Sync)>,
    ) -> Result<RepositoryAudit> {
        let started = Instant::now();
        let repository = self.connector.repo_id().to_string();
        info!(
            "auditing {} commits from {repository} ({scan_type:?})",
            commits.len()
        );

        let mut commit_audits = Vec::with_capacity(commits.len());
        for (idx, commit) in commits.iter().enumerate() {
            let snapshot = self.connector.clone_at(&commit.sha)?;
            let audit = self
                .commit_auditor
                .audit_commit(&repository, commit, snapshot.path())?;
            commit_audits.push(audit);
            if let Some(progress) = progress {
                progress(idx + 1, commits.len());
            }
        }

        Ok(Self::aggregate(
            repository,
            scan_type,
            commit_audits,
            started.elapsed().as_secs_f64(),
        ))
    }

    fn aggregate(
        repository: String,
        scan_type: ScanType,
        commit_audits: Vec<CommitAudit>,
        processing_time: f64,
    ) -> RepositoryAudit {
        let all_issues: Vec<_> = commit_audits
            .iter()
            .flat_map(|a| a.issues.iter().cloned())
            .collect();
        let counts = SeverityCounts::from_issues(&all_issues);

        let mut issues_by_type = BTreeMap::new();
        for kind in [IssueKind::Security, IssueKind::Complexity] {
            let total = all_issues.iter().filter(|i| i.kind == kind).count();
            issues_by_type.insert(kind.to_string(), total);
        }

        let avg_quality_score = if commit_audits.is_empty() {
            0.0
        } else {
            commit_audits.iter().map(|a| a.quality_score).sum::<f64>() / commit_audits.len() as f64
        };

        RepositoryAudit {
            repository,
            audit_id: uuid::Uuid::new_v4().to_string(),
            audit_date: chrono::Utc::now(),
            scan_type,
            commits_scanned: commit_audits.len(),
            date_range_start: commit_audits.iter().map(|a| a.date).min(),
            date_range_end: commit_audits.iter().map(|a| a.date).max(),
            quality_trend: classify_trend(&commit_audits),
            commit_audits,
            counts,
            issues_by_type,
            avg_quality_score,
            processing_time,
        }
    }
}

/// Classify the quality trend by comparing the mean quality of the three
/// most recent commits against the three oldest. Fewer than two audited
/// commits cannot show a direction.
pub fn classify_trend(audits: &[CommitAudit]) -> QualityTrend {
    if audits.len() < 2 {
        return QualityTrend::InsufficientData;
    }

    let mut by_date: Vec<&CommitAudit> = audits.iter().collect();
    by_date.sort_by_key(|a| a.date);

    let window = TREND_WINDOW.min(by_date.len());
    let oldest: f64 =
        by_date[..window].iter().map(|a| a.quality_score).sum::<f64>() / window as f64;
    let newest: f64 = by_date[by_date.len() - window..]
        .iter()
        .map(|a| a.quality_score)
        .sum::<f64>()
        / window as f64;

    let delta = newest - oldest;
    if delta > TREND_DELTA {
        QualityTrend::Improving
    } else if delta < -TREND_DELTA {
        QualityTrend::Declining
    } else {
        QualityTrend::Stable
    }
}
