//! Review pipeline
//!
//! Drives one review run: merge the incoming patch into a private copy
//! of the base tree, run the two analysis stages in parallel, assemble a
//! verdict. A merge failure is fatal (no tree means nothing to analyze);
//! a stage failure is not: after its retries are spent the stage result
//! degrades to a placeholder and the report is produced anyway.
//!
//! The merged snapshot directory is owned by this run alone and is
//! removed on every exit path.

mod impact;
mod merge;

pub use impact::{analyze_impact, changed_files, ImpactReport, RiskLevel};
pub use merge::merge_snapshot;

use crate::analyzers::Language;
use crate::audit::{FileAuditor, FileScanOutcome};
use crate::config::ReviewConfig;
use crate::error::Result;
use crate::models::{FileAudit, Issue, SeverityCounts};
use crossbeam_channel::Receiver;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Outcome of one analysis stage
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "value")]
pub enum StageResult<T> {
    Success(T),
    /// The stage exhausted its retries or timed out; the report is
    /// produced without it.
    Degraded(String),
}

impl<T> StageResult<T> {
    pub fn as_success(&self) -> Option<&T> {
        match self {
            StageResult::Success(value) => Some(value),
            StageResult::Degraded(_) => None,
        }
    }
}

/// Review verdict, in descending order of severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    RequestChanges,
    Comment,
    Approve,
}

impl Verdict {
    /// Verdict rule over the resolved stage outcomes.
    pub fn decide(high: usize, medium: usize, breaking: bool, risk_high: bool) -> Self {
        if high > 0 || breaking {
            Verdict::RequestChanges
        } else if medium > 0 || risk_high {
            Verdict::Comment
        } else {
            Verdict::Approve
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::RequestChanges => write!(f, "REQUEST_CHANGES"),
            Verdict::Comment => write!(f, "COMMENT"),
            Verdict::Approve => write!(f, "APPROVE"),
        }
    }
}

/// Post-merge audit of the files the patch touches
#[derive(Debug, Serialize)]
pub struct ReviewAudit {
    pub files: Vec<FileAudit>,
    pub issues: Vec<Issue>,
    pub counts: SeverityCounts,
}

#[derive(Debug, Serialize)]
pub struct ReviewReport {
    pub verdict: Verdict,
    pub audit: StageResult<ReviewAudit>,
    pub impact: StageResult<ImpactReport>,
    pub processing_time: f64,
}

pub struct ReviewPipeline {
    file_auditor: Arc<FileAuditor>,
    config: ReviewConfig,
}

impl ReviewPipeline {
    pub fn new(file_auditor: FileAuditor, config: ReviewConfig) -> Self {
        Self {
            file_auditor: Arc::new(file_auditor),
            config,
        }
    }

    /// Run one review: merge, analyze in parallel, assemble the verdict.
    pub fn run(&self, base_tree: &Path, patch: &str) -> Result<ReviewReport> {
        let started = Instant::now();
        let attempts = self.config.max_retries.max(1);
        let delay = self.config.retry_delay();

        // No merged tree means nothing to analyze, so this is the one
        // stage that fails the whole run.
        let snapshot = with_retry(attempts, delay, || merge_snapshot(base_tree, patch))?;

        let audit_rx = {
            let auditor = Arc::clone(&self.file_auditor);
            let tree: PathBuf = snapshot.path().to_path_buf();
            let patch = patch.to_string();
            spawn_stage("snapshot-audit", attempts, delay, move || {
                audit_changed_files(&auditor, &tree, &patch)
            })
        };
        let impact_rx = {
            let patch = patch.to_string();
            spawn_stage("impact-analysis", attempts, delay, move || {
                analyze_impact(&patch)
            })
        };

        // One deadline covers both stages. A stage that misses it keeps
        // running detached; its result is simply never collected.
        let deadline = Instant::now() + self.config.stage_timeout();
        let audit = collect_stage(audit_rx, deadline, "snapshot-audit");
        let impact = collect_stage(impact_rx, deadline, "impact-analysis");

        let (high, medium) = match audit.as_success() {
            Some(a) => (a.counts.high + a.counts.critical, a.counts.medium),
            None => (0, 0),
        };
        let (breaking, risk_high) = match impact.as_success() {
            Some(i) => (i.has_breaking_changes(), i.risk == RiskLevel::High),
            None => (false, false),
        };
        let verdict = Verdict::decide(high, medium, breaking, risk_high);
        info!("review verdict: {verdict}");

        drop(snapshot);
        Ok(ReviewReport {
            verdict,
            audit,
            impact,
            processing_time: started.elapsed().as_secs_f64(),
        })
    }
}

/// Run `job` up to `attempts` times with a fixed delay between tries,
/// surfacing the last error. Also used at the handler boundary for
/// connector calls.
pub(crate) fn with_retry<T>(
    attempts: usize,
    delay: Duration,
    mut job: impl FnMut() -> Result<T>,
) -> Result<T> {
    let mut last_err = None;
    for attempt in 1..=attempts {
        match job() {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!("attempt {attempt}/{attempts} failed: {e}");
                last_err = Some(e);
                if attempt < attempts {
                    thread::sleep(delay);
                }
            }
        }
    }
    Err(last_err.expect("at least one attempt"))
}

fn spawn_stage<T: Send + 'static>(
    name: &'static str,
    attempts: usize,
    delay: Duration,
    job: impl FnMut() -> Result<T> + Send + 'static,
) -> Receiver<StageResult<T>> {
    let (tx, rx) = crossbeam_channel::bounded(1);
    thread::spawn(move || {
        let result = match with_retry(attempts, delay, job) {
            Ok(value) => StageResult::Success(value),
            Err(e) => {
                warn!("stage {name} degraded: {e}");
                StageResult::Degraded(format!("{name} failed: {e}"))
            }
        };
        // The collector may have given up on us already
        let _ = tx.send(result);
    });
    rx
}

fn collect_stage<T>(
    rx: Receiver<StageResult<T>>,
    deadline: Instant,
    name: &'static str,
) -> StageResult<T> {
    match rx.recv_deadline(deadline) {
        Ok(result) => result,
        Err(_) => {
            warn!("stage {name} missed the deadline");
            StageResult::Degraded(format!("{name} timed out"))
        }
    }
}

/// Audit the post-merge state of every file the patch touches. Files the
/// patch deleted or that are not source code are skipped.
fn audit_changed_files(
    auditor: &FileAuditor,
    tree: &Path,
    patch: &str,
) -> Result<ReviewAudit> {
    let mut files = Vec::new();
    for rel in changed_files(patch) {
        let path = tree.join(&rel);
        let Some(language) = Language::from_path(&path) else {
            continue;
        };
        let Ok(code) = std::fs::read_to_string(&path) else {
            continue;
        };
        match auditor.audit_file(&rel, &code, language) {
            FileScanOutcome::Audited(audit) => files.push(audit),
            FileScanOutcome::Skipped { path, reason } => {
                warn!("review skipped {path}: {reason}");
            }
        }
    }

    let issues: Vec<Issue> = files.iter().flat_map(|f| f.issues.iter().cloned()).collect();
    let counts = SeverityCounts::from_issues(&issues);
    Ok(ReviewAudit {
        files,
        issues,
        counts,
    })
}
