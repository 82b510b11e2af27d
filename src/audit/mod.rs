//! Snapshot audit engine
//!
//! Audits the complete repository state at a commit, not the diff. The
//! file auditor runs the configured analyzers over one file's text; the
//! commit auditor walks the checked-out tree, audits every eligible file
//! in parallel, and aggregates. Commit-level numbers are always recomputed
//! from the union of the per-file issue lists.

mod repository;

pub use repository::{classify_trend, RepositoryAuditor};

use crate::analyzers::{Language, SourceAnalyzer};
use crate::config::ScoringPolicy;
use crate::connector::CommitInfo;
use crate::error::Result;
use crate::models::{CommitAudit, FileAudit, Issue, IssueKind, SeverityCounts};
use ignore::WalkBuilder;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Directories never scanned, by name
const EXCLUDED_DIRS: &[&str] = &[
    ".git",
    "__pycache__",
    "node_modules",
    "venv",
    ".venv",
    "env",
    ".tox",
    "build",
    "dist",
    ".eggs",
    "target",
    "vendor",
];

/// Outcome of scanning a single file.
///
/// A file that cannot be read or analyzed is skipped with a reason; it
/// never fails the containing commit audit.
#[derive(Debug)]
pub enum FileScanOutcome {
    Audited(FileAudit),
    Skipped { path: String, reason: String },
}

/// Security score: 100 minus the summed severity penalties of all
/// security issues, clamped to zero.
pub fn security_score(issues: &[Issue], policy: &ScoringPolicy) -> f64 {
    let penalty: f64 = issues
        .iter()
        .filter(|i| i.kind == IssueKind::Security)
        .map(|i| policy.penalty(i.severity))
        .sum();
    (100.0 - penalty).max(0.0)
}

/// Complexity score: 100 minus an average-complexity term (only when the
/// average exceeds the flag threshold) and a per-flagged-function term.
pub fn complexity_score(avg_complexity: f64, flagged_count: usize, policy: &ScoringPolicy) -> f64 {
    let mut penalty = 0.0;
    if avg_complexity > policy.complexity_flag_threshold {
        penalty += (avg_complexity - policy.complexity_flag_threshold) * 2.0;
    }
    penalty += flagged_count as f64 * 3.0;
    (100.0 - penalty).max(0.0)
}

/// Quality score: the configured blend of security and complexity scores,
/// rounded to two decimals. Pure function of its inputs.
pub fn quality_score(
    security: f64,
    avg_complexity: f64,
    flagged_count: usize,
    policy: &ScoringPolicy,
) -> f64 {
    let blended = security * policy.security_weight
        + complexity_score(avg_complexity, flagged_count, policy) * policy.complexity_weight;
    (blended * 100.0).round() / 100.0
}

/// Runs the analyzer set over one file and derives per-file scores
pub struct FileAuditor {
    analyzers: Vec<Arc<dyn SourceAnalyzer>>,
    policy: ScoringPolicy,
}

impl FileAuditor {
    pub fn new(analyzers: Vec<Arc<dyn SourceAnalyzer>>, policy: ScoringPolicy) -> Self {
        Self { analyzers, policy }
    }

    /// Audit one file's text. Analyzer failures skip the file.
    pub fn audit_file(&self, rel_path: &str, code: &str, language: Language) -> FileScanOutcome {
        let mut issues = Vec::new();
        let mut functions = Vec::new();

        for analyzer in &self.analyzers {
            match analyzer.analyze(code, language) {
                Ok(report) => {
                    issues.extend(report.issues.into_iter().map(|raw| Issue {
                        kind: raw.kind,
                        severity: raw.severity,
                        file: rel_path.to_string(),
                        line: raw.line,
                        message: raw.message,
                    }));
                    functions.extend(report.functions);
                }
                Err(e) => {
                    return FileScanOutcome::Skipped {
                        path: rel_path.to_string(),
                        reason: format!("{} failed: {e}", analyzer.name()),
                    };
                }
            }
        }

        let function_count = functions.len();
        let avg_complexity = if function_count > 0 {
            functions.iter().map(|f| f.complexity).sum::<f64>() / function_count as f64
        } else {
            0.0
        };
        let max_complexity = functions.iter().map(|f| f.complexity).fold(0.0, f64::max);
        let flagged = issues
            .iter()
            .filter(|i| i.kind == IssueKind::Complexity)
            .count();

        let security = security_score(&issues, &self.policy);
        let quality = quality_score(security, avg_complexity, flagged, &self.policy);
        let counts = SeverityCounts::from_issues(&issues);

        FileScanOutcome::Audited(FileAudit {
            file_path: rel_path.to_string(),
            issues,
            security_score: security,
            avg_complexity,
            max_complexity,
            function_count,
            lines_of_code: code.lines().count(),
            counts,
            quality_score: quality,
        })
    }
}

/// Audits the full snapshot at one commit
pub struct CommitAuditor {
    file_auditor: FileAuditor,
    policy: ScoringPolicy,
}

impl CommitAuditor {
    pub fn new(analyzers: Vec<Arc<dyn SourceAnalyzer>>, policy: ScoringPolicy) -> Self {
        Self {
            file_auditor: FileAuditor::new(analyzers, policy.clone()),
            policy,
        }
    }

    pub fn file_auditor(&self) -> &FileAuditor {
        &self.file_auditor
    }

    /// Enumerate analyzable files under `tree`, excluding VCS/build/cache
    /// and dependency directories by name.
    pub fn discover_files(tree: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        let walker = WalkBuilder::new(tree)
            .standard_filters(true)
            .filter_entry(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .map(|name| !EXCLUDED_DIRS.contains(&name))
                    .unwrap_or(true)
            })
            .build();

        for entry in walker.flatten() {
            if entry.file_type().is_some_and(|t| t.is_file()) {
                let path = entry.path();
                if Language::from_path(path).is_some() {
                    files.push(path.to_path_buf());
                }
            }
        }
        files.sort();
        files
    }

    /// Audit the snapshot at one commit, already checked out at `tree`.
    pub fn audit_commit(
        &self,
        repository: &str,
        commit: &CommitInfo,
        tree: &Path,
    ) -> Result<CommitAudit> {
        let files = Self::discover_files(tree);
        debug!(
            "auditing {}@{}: {} files",
            repository,
            &commit.sha[..commit.sha.len().min(7)],
            files.len()
        );

        let outcomes: Vec<FileScanOutcome> = files
            .par_iter()
            .map(|path| self.scan_file(path, tree))
            .collect();

        let mut file_audits = Vec::new();
        for outcome in outcomes {
            match outcome {
                FileScanOutcome::Audited(audit) => file_audits.push(audit),
                FileScanOutcome::Skipped { path, reason } => {
                    warn!("skipped {path}: {reason}");
                }
            }
        }

        Ok(self.aggregate(repository, commit, file_audits))
    }

    fn scan_file(&self, path: &Path, tree: &Path) -> FileScanOutcome {
        let rel_path = path
            .strip_prefix(tree)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned();
        let language = match Language::from_path(path) {
            Some(language) => language,
            None => {
                return FileScanOutcome::Skipped {
                    path: rel_path,
                    reason: "unsupported language".into(),
                }
            }
        };
        match std::fs::read_to_string(path) {
            Ok(code) => self.file_auditor.audit_file(&rel_path, &code, language),
            Err(e) => FileScanOutcome::Skipped {
                path: rel_path,
                reason: format!("unreadable: {e}"),
            },
        }
    }

    /// Aggregate commit-level metrics from the per-file audits. The union
    /// of the file issue lists is the single source of truth here.
    fn aggregate(
        &self,
        repository: &str,
        commit: &CommitInfo,
        file_audits: Vec<FileAudit>,
    ) -> CommitAudit {
        let mut issues = Vec::new();
        let mut weighted_complexity = 0.0;
        let mut total_functions = 0usize;
        let mut max_complexity = 0.0f64;

        for audit in &file_audits {
            issues.extend(audit.issues.iter().cloned());
            weighted_complexity += audit.avg_complexity * audit.function_count as f64;
            total_functions += audit.function_count;
            max_complexity = max_complexity.max(audit.max_complexity);
        }

        let avg_complexity = if total_functions > 0 {
            weighted_complexity / total_functions as f64
        } else {
            0.0
        };
        let flagged = issues
            .iter()
            .filter(|i| i.kind == IssueKind::Complexity)
            .count();
        let security = security_score(&issues, &self.policy);
        let quality = quality_score(security, avg_complexity, flagged, &self.policy);
        let counts = SeverityCounts::from_issues(&issues);

        CommitAudit {
            repository: repository.to_string(),
            sha: commit.sha.clone(),
            message: commit.message.clone(),
            author: commit.author.clone(),
            author_email: commit.author_email.clone(),
            date: commit.date,
            files_changed: commit.files_changed.clone(),
            files: file_audits,
            issues,
            security_score: security,
            avg_complexity,
            max_complexity,
            counts,
            quality_score: quality,
        }
    }
}
