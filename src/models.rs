//! Core data models for Repopulse
//!
//! These models represent audit results at three levels of aggregation:
//! file, commit, and repository. A commit audit is the unit of storage;
//! a repository audit is the transient result of one bootstrap/sync run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity levels for detected issues
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Category of a detected issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueKind {
    Security,
    Complexity,
}

impl std::fmt::Display for IssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IssueKind::Security => write!(f, "security"),
            IssueKind::Complexity => write!(f, "complexity"),
        }
    }
}

/// A single finding produced by a source analyzer.
///
/// Immutable after construction; aggregation never mutates issues, it
/// only collects them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub severity: Severity,
    /// File path relative to the repository root
    pub file: String,
    pub line: u32,
    pub message: String,
}

impl Issue {
    pub fn new(
        kind: IssueKind,
        severity: Severity,
        file: impl Into<String>,
        line: u32,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity,
            file: file.into(),
            line,
            message: message.into(),
        }
    }
}

/// Issue counts bucketed by severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub total: usize,
}

impl SeverityCounts {
    pub fn from_issues(issues: &[Issue]) -> Self {
        let mut counts = Self::default();
        for issue in issues {
            match issue.severity {
                Severity::Critical => counts.critical += 1,
                Severity::High => counts.high += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Low => counts.low += 1,
            }
            counts.total += 1;
        }
        counts
    }
}

/// Audit result for a single file within a commit snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAudit {
    /// File path relative to the repository root
    pub file_path: String,
    pub issues: Vec<Issue>,
    /// 100 = no security findings
    pub security_score: f64,
    pub avg_complexity: f64,
    pub max_complexity: f64,
    pub function_count: usize,
    pub lines_of_code: usize,
    pub counts: SeverityCounts,
    /// Weighted blend of security and complexity scores
    pub quality_score: f64,
}

/// Audit result for the full repository snapshot at one commit.
///
/// Keyed by (repository, sha) in the audit store. Aggregate fields are
/// always recomputed from the per-file audits, never derived separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitAudit {
    /// Repository identifier (owner/repo or a local path name)
    pub repository: String,
    pub sha: String,
    pub message: String,
    pub author: String,
    pub author_email: String,
    pub date: DateTime<Utc>,
    /// Files touched by this commit (denormalized for store filtering)
    pub files_changed: Vec<String>,
    /// Per-file audits over the whole snapshot
    pub files: Vec<FileAudit>,
    pub issues: Vec<Issue>,
    pub security_score: f64,
    pub avg_complexity: f64,
    pub max_complexity: f64,
    pub counts: SeverityCounts,
    pub quality_score: f64,
}

impl CommitAudit {
    /// Short sha for display (7 characters, like git)
    pub fn short_sha(&self) -> &str {
        &self.sha[..self.sha.len().min(7)]
    }
}

/// Direction of the quality trend across a commit sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTrend {
    Improving,
    Stable,
    Declining,
    InsufficientData,
}

impl std::fmt::Display for QualityTrend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QualityTrend::Improving => write!(f, "improving"),
            QualityTrend::Stable => write!(f, "stable"),
            QualityTrend::Declining => write!(f, "declining"),
            QualityTrend::InsufficientData => write!(f, "insufficient_data"),
        }
    }
}

/// How a bootstrap/sync run selected its commits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanType {
    BootstrapFull,
    BootstrapWeekly,
    BootstrapMonthly,
    BootstrapTags,
    Sync,
}

/// Aggregate audit result for one scan run.
///
/// Transient: the contained commit audits are persisted individually, the
/// repository audit itself is not a storage unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryAudit {
    pub repository: String,
    pub audit_id: String,
    pub audit_date: DateTime<Utc>,
    pub scan_type: ScanType,
    pub commits_scanned: usize,
    pub date_range_start: Option<DateTime<Utc>>,
    pub date_range_end: Option<DateTime<Utc>>,
    pub commit_audits: Vec<CommitAudit>,
    pub counts: SeverityCounts,
    /// Issue totals keyed by kind ("security", "complexity")
    pub issues_by_type: std::collections::BTreeMap<String, usize>,
    pub avg_quality_score: f64,
    pub quality_trend: QualityTrend,
    pub processing_time: f64,
}

/// Outcome of a bootstrap or sync command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    pub command: String,
    pub status: CommandStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit: Option<RepositoryAudit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub processing_time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Success,
    Error,
    NoData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn test_severity_counts() {
        let issues = vec![
            Issue::new(IssueKind::Security, Severity::Critical, "a.py", 1, "x"),
            Issue::new(IssueKind::Security, Severity::High, "a.py", 2, "y"),
            Issue::new(IssueKind::Complexity, Severity::High, "b.py", 3, "z"),
            Issue::new(IssueKind::Complexity, Severity::Low, "b.py", 9, "w"),
        ];
        let counts = SeverityCounts::from_issues(&issues);
        assert_eq!(counts.critical, 1);
        assert_eq!(counts.high, 2);
        assert_eq!(counts.medium, 0);
        assert_eq!(counts.low, 1);
        assert_eq!(counts.total, 4);
    }

    #[test]
    fn test_short_sha() {
        let audit = CommitAudit {
            repository: "o/r".into(),
            sha: "abcdef0123456789".into(),
            message: String::new(),
            author: String::new(),
            author_email: String::new(),
            date: Utc::now(),
            files_changed: vec![],
            files: vec![],
            issues: vec![],
            security_score: 100.0,
            avg_complexity: 0.0,
            max_complexity: 0.0,
            counts: SeverityCounts::default(),
            quality_score: 100.0,
        };
        assert_eq!(audit.short_sha(), "abcdef0");
    }
}
