//! Grid-based trend sampling
//!
//! Picks a bounded, chronologically-ordered subset of stored commit
//! audits for a date window. When more audits exist than the point
//! budget, a fixed grid of timestamps is laid over the window and each
//! grid point takes the most recent audit at or before it, carrying the
//! previous selection forward through gaps.

use crate::models::CommitAudit;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Position of a sample point within the requested window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PointLabel {
    /// State just before the requested start date
    Baseline,
    /// Oldest audit in the sample (no explicit start date requested)
    Oldest,
    InRange,
    Newest,
}

impl std::fmt::Display for PointLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PointLabel::Baseline => write!(f, "baseline"),
            PointLabel::Oldest => write!(f, "oldest"),
            PointLabel::InRange => write!(f, "in_range"),
            PointLabel::Newest => write!(f, "newest"),
        }
    }
}

/// One selected audit in a trend sample
#[derive(Debug, Clone, Serialize)]
pub struct TrendPoint {
    pub sha: String,
    pub date: DateTime<Utc>,
    pub quality_score: f64,
    pub security_score: f64,
    pub issue_count: usize,
    pub label: PointLabel,
}

impl TrendPoint {
    fn from_audit(audit: &CommitAudit, label: PointLabel) -> Self {
        Self {
            sha: audit.sha.clone(),
            date: audit.date,
            quality_score: audit.quality_score,
            security_score: audit.security_score,
            issue_count: audit.counts.total,
            label,
        }
    }
}

/// Select a representative sample of at most `max_points` audits.
///
/// `audits` may arrive in any order; the output is chronological with no
/// two consecutive identical shas. With a `start` date the first point is
/// the baseline (state just before the window); without one it is simply
/// the oldest selected audit.
pub fn select_sample(
    audits: &[CommitAudit],
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    max_points: usize,
) -> Vec<TrendPoint> {
    if audits.is_empty() || max_points == 0 {
        return Vec::new();
    }

    let mut chronological: Vec<&CommitAudit> = audits.iter().collect();
    chronological.sort_by_key(|a| (a.date, a.sha.clone()));

    let eligible: Vec<&CommitAudit> = chronological
        .iter()
        .filter(|a| start.is_none_or(|s| a.date >= s) && end.is_none_or(|e| a.date <= e))
        .copied()
        .collect();

    if eligible.len() <= max_points {
        return label_points(
            eligible.iter().map(|a| TrendPoint::from_audit(a, PointLabel::InRange)).collect(),
            start,
        );
    }

    // Baseline sits one unit before the window so the first grid point
    // captures the state entering it.
    let oldest = chronological.first().expect("non-empty").date;
    let newest = chronological.last().expect("non-empty").date;
    let baseline = start.map(|s| s - Duration::days(1)).unwrap_or(oldest);
    let end_instant = end.unwrap_or(newest);
    if end_instant <= baseline {
        return Vec::new();
    }

    let step = (end_instant - baseline) / (max_points as i32 - 1).max(1);
    let mut points: Vec<TrendPoint> = Vec::with_capacity(max_points);
    let mut cursor = 0usize;
    let mut selected: Option<usize> = None;

    for i in 0..max_points {
        let grid_ts = baseline + step * i as i32;
        while cursor < chronological.len() && chronological[cursor].date <= grid_ts {
            selected = Some(cursor);
            cursor += 1;
        }
        // No audit at or before this grid point yet: nothing to carry
        // forward, skip it.
        let Some(idx) = selected else {
            continue;
        };
        let audit = chronological[idx];
        if points.last().is_some_and(|p: &TrendPoint| p.sha == audit.sha) {
            continue;
        }
        points.push(TrendPoint::from_audit(audit, PointLabel::InRange));
    }

    label_points(points, start)
}

fn label_points(mut points: Vec<TrendPoint>, start: Option<DateTime<Utc>>) -> Vec<TrendPoint> {
    let len = points.len();
    if len == 0 {
        return points;
    }
    points[0].label = if start.is_some() {
        PointLabel::Baseline
    } else {
        PointLabel::Oldest
    };
    if len > 1 {
        points[len - 1].label = PointLabel::Newest;
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SeverityCounts;
    use chrono::{TimeZone, Utc};

    fn audit(sha: &str, day: u32, quality: f64) -> CommitAudit {
        CommitAudit {
            repository: "o/r".into(),
            sha: sha.to_string(),
            message: String::new(),
            author: "Alice".into(),
            author_email: String::new(),
            date: Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0).unwrap(),
            files_changed: vec![],
            files: vec![],
            issues: vec![],
            security_score: 100.0,
            avg_complexity: 0.0,
            max_complexity: 0.0,
            counts: SeverityCounts::default(),
            quality_score: quality,
        }
    }

    fn march(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_small_set_passes_through() {
        let audits: Vec<_> = (1..=5).map(|d| audit(&format!("s{d}"), d, 80.0)).collect();
        let sample = select_sample(&audits, None, None, 20);
        assert_eq!(sample.len(), 5);
        assert_eq!(sample[0].label, PointLabel::Oldest);
        assert_eq!(sample[4].label, PointLabel::Newest);
        assert!(sample.windows(2).all(|w| w[0].date <= w[1].date));
    }

    #[test]
    fn test_sample_bounded_by_max_points() {
        let audits: Vec<_> = (1..=30).map(|d| audit(&format!("s{d}"), d, 80.0)).collect();
        let sample = select_sample(&audits, None, None, 10);
        assert!(sample.len() <= 10, "{}", sample.len());
        assert!(sample.len() >= 2);
    }

    #[test]
    fn test_sample_chronological_without_duplicates() {
        let audits: Vec<_> = (1..=30).map(|d| audit(&format!("s{d}"), d, 80.0)).collect();
        let sample = select_sample(&audits, None, None, 8);
        for pair in sample.windows(2) {
            assert!(pair[0].date <= pair[1].date);
            assert_ne!(pair[0].sha, pair[1].sha);
        }
    }

    #[test]
    fn test_baseline_label_with_start_date() {
        let audits: Vec<_> = (1..=30).map(|d| audit(&format!("s{d}"), d, 80.0)).collect();
        let sample = select_sample(&audits, Some(march(10)), Some(march(28)), 5);
        assert_eq!(sample[0].label, PointLabel::Baseline);
        assert_eq!(sample.last().unwrap().label, PointLabel::Newest);
        // The baseline carries the state just before the window
        assert!(sample[0].date <= march(10));
    }

    #[test]
    fn test_forward_fill_through_gaps() {
        // Dense cluster early, then one late commit; the grid points in
        // the gap must reuse the cluster's last commit once, not error.
        let mut audits: Vec<_> = (1..=6).map(|d| audit(&format!("s{d}"), d, 80.0)).collect();
        for d in 25..=30 {
            audits.push(audit(&format!("s{d}"), d, 90.0));
        }
        let sample = select_sample(&audits, None, None, 6);
        assert!(sample.len() <= 6);
        for pair in sample.windows(2) {
            assert_ne!(pair[0].sha, pair[1].sha);
        }
        assert_eq!(sample.last().unwrap().sha, "s30");
    }

    #[test]
    fn test_window_filters_pass_through() {
        // Fixture audits sit at noon, so the midnight end bound excludes
        // the audit on the end day itself.
        let audits: Vec<_> = (1..=10).map(|d| audit(&format!("s{d}"), d, 80.0)).collect();
        let sample = select_sample(&audits, Some(march(4)), Some(march(7)), 20);
        assert_eq!(sample.len(), 3);
        assert_eq!(sample[0].sha, "s4");
        assert_eq!(sample[2].sha, "s6");
    }

    #[test]
    fn test_empty_input() {
        assert!(select_sample(&[], None, None, 20).is_empty());
    }

    #[test]
    fn test_newest_first_input_accepted() {
        let mut audits: Vec<_> = (1..=25).map(|d| audit(&format!("s{d}"), d, 80.0)).collect();
        audits.reverse();
        let sample = select_sample(&audits, None, None, 5);
        assert!(sample.windows(2).all(|w| w[0].date <= w[1].date));
        assert_eq!(sample.last().unwrap().sha, "s25");
    }
}
