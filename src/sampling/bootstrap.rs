//! Bootstrap sampling strategies
//!
//! A historical scan of a long-lived repository cannot afford to audit
//! every commit, so the full history (newest first) is thinned before
//! auditing. Interval strategies always keep the newest commit and then
//! keep a commit only once enough time has elapsed since the last kept
//! one; the tag strategy keeps only commits a tag points at.

use crate::connector::{CommitInfo, TagInfo};
use crate::models::ScanType;
use chrono::Duration;
use std::collections::HashSet;
use tracing::debug;

/// How a bootstrap scan reduces the full history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingStrategy {
    /// Every commit
    Full,
    /// One commit per 7-day interval
    Weekly,
    /// One commit per 30-day interval
    Monthly,
    /// Only commits pointed at by tags; falls back to `Full` when the
    /// repository has no tags
    Tags,
}

impl SamplingStrategy {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "full" => Some(Self::Full),
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            "tags" | "tag-based" => Some(Self::Tags),
            _ => None,
        }
    }

    pub fn scan_type(self) -> ScanType {
        match self {
            Self::Full => ScanType::BootstrapFull,
            Self::Weekly => ScanType::BootstrapWeekly,
            Self::Monthly => ScanType::BootstrapMonthly,
            Self::Tags => ScanType::BootstrapTags,
        }
    }

    fn interval(self) -> Option<Duration> {
        match self {
            Self::Weekly => Some(Duration::days(7)),
            Self::Monthly => Some(Duration::days(30)),
            Self::Full | Self::Tags => None,
        }
    }
}

impl std::fmt::Display for SamplingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Weekly => write!(f, "weekly"),
            Self::Monthly => write!(f, "monthly"),
            Self::Tags => write!(f, "tags"),
        }
    }
}

/// Thin a newest-first commit list per the strategy.
///
/// Interval strategies always keep the newest commit; order is preserved.
pub fn sample_bootstrap(
    commits: &[CommitInfo],
    strategy: SamplingStrategy,
    tags: &[TagInfo],
) -> Vec<CommitInfo> {
    let sampled = match strategy {
        SamplingStrategy::Full => commits.to_vec(),
        SamplingStrategy::Weekly | SamplingStrategy::Monthly => {
            sample_interval(commits, strategy.interval().expect("interval strategy"))
        }
        SamplingStrategy::Tags => {
            if tags.is_empty() {
                debug!("no tags found, falling back to full history");
                commits.to_vec()
            } else {
                let tagged: HashSet<&str> = tags.iter().map(|t| t.sha.as_str()).collect();
                commits
                    .iter()
                    .filter(|c| tagged.contains(c.sha.as_str()))
                    .cloned()
                    .collect()
            }
        }
    };
    debug!(
        "sampled {} of {} commits ({strategy})",
        sampled.len(),
        commits.len()
    );
    sampled
}

fn sample_interval(commits: &[CommitInfo], interval: Duration) -> Vec<CommitInfo> {
    let mut kept: Vec<CommitInfo> = Vec::new();
    for commit in commits {
        match kept.last() {
            None => kept.push(commit.clone()),
            Some(last) => {
                if last.date - commit.date >= interval {
                    kept.push(commit.clone());
                }
            }
        }
    }
    kept
}
