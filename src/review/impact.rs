//! Change impact analysis
//!
//! Works purely on the unified diff text: which files changed, how much
//! churn, whether any function or class definitions were removed without
//! a replacement, and a coarse risk level for the change as a whole.

use crate::error::Result;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::OnceLock;

static DEFINITION: OnceLock<Regex> = OnceLock::new();

fn definition() -> &'static Regex {
    DEFINITION.get_or_init(|| {
        Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?(?:def|fn|func|function|class)\s+(?P<name>\w+)")
            .expect("valid regex")
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImpactReport {
    pub changed_files: Vec<String>,
    pub additions: usize,
    pub deletions: usize,
    /// Definitions removed by the patch with no same-named replacement
    pub breaking_changes: Vec<String>,
    pub risk: RiskLevel,
}

impl ImpactReport {
    pub fn has_breaking_changes(&self) -> bool {
        !self.breaking_changes.is_empty()
    }
}

/// Paths touched by a unified diff, in order of first appearance
pub fn changed_files(patch: &str) -> Vec<String> {
    let mut files = Vec::new();
    let mut seen = HashSet::new();
    for line in patch.lines() {
        let path = if let Some(rest) = line.strip_prefix("+++ b/") {
            rest
        } else if let Some(rest) = line.strip_prefix("--- a/") {
            rest
        } else {
            continue;
        };
        if seen.insert(path.to_string()) {
            files.push(path.to_string());
        }
    }
    files
}

/// Analyze a unified diff for churn, removed definitions, and risk.
pub fn analyze_impact(patch: &str) -> Result<ImpactReport> {
    let files = changed_files(patch);
    let mut additions = 0;
    let mut deletions = 0;
    let mut removed_defs: Vec<String> = Vec::new();
    let mut added_names: HashSet<String> = HashSet::new();

    for line in patch.lines() {
        if line.starts_with("+++") || line.starts_with("---") {
            continue;
        }
        if let Some(body) = line.strip_prefix('+') {
            additions += 1;
            if let Some(caps) = definition().captures(body) {
                added_names.insert(caps["name"].to_string());
            }
        } else if let Some(body) = line.strip_prefix('-') {
            deletions += 1;
            if let Some(caps) = definition().captures(body) {
                removed_defs.push(caps["name"].to_string());
            }
        }
    }

    // A definition that reappears on the added side is a modification,
    // not a removal.
    let breaking_changes: Vec<String> = removed_defs
        .into_iter()
        .filter(|name| !added_names.contains(name))
        .map(|name| format!("removed definition '{name}'"))
        .collect();

    let churn = additions + deletions;
    let risk = if !breaking_changes.is_empty() || churn > 500 || files.len() > 20 {
        RiskLevel::High
    } else if churn > 100 || files.len() > 5 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    Ok(ImpactReport {
        changed_files: files,
        additions,
        deletions,
        breaking_changes,
        risk,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_changed_files_deduplicated_in_order() {
        let patch = "--- a/src/a.py\n+++ b/src/a.py\n@@ -1 +1 @@\n-x\n+y\n--- a/src/b.py\n+++ b/src/b.py\n@@ -1 +1 @@\n-x\n+y\n";
        assert_eq!(changed_files(patch), vec!["src/a.py", "src/b.py"]);
    }

    #[test]
    fn test_small_additive_patch_is_low_risk() {
        let patch = "+++ b/a.py\n@@ -1 +1,2 @@\n x = 1\n+y = 2\n";
        let report = analyze_impact(patch).unwrap();
        assert_eq!(report.additions, 1);
        assert_eq!(report.deletions, 0);
        assert!(report.breaking_changes.is_empty());
        assert_eq!(report.risk, RiskLevel::Low);
    }

    #[test]
    fn test_removed_function_is_breaking_and_high_risk() {
        let patch = "+++ b/a.py\n@@ -1,2 +1 @@\n-def legacy_endpoint():\n-    pass\n x = 1\n";
        let report = analyze_impact(patch).unwrap();
        assert_eq!(report.breaking_changes, vec!["removed definition 'legacy_endpoint'"]);
        assert_eq!(report.risk, RiskLevel::High);
    }

    #[test]
    fn test_moved_function_is_not_breaking() {
        let patch = "+++ b/a.py\n@@ -1,2 +1,2 @@\n-def handler(x):\n+def handler(x, y):\n     pass\n";
        let report = analyze_impact(patch).unwrap();
        assert!(report.breaking_changes.is_empty());
    }

    #[test]
    fn test_large_churn_is_medium_risk() {
        let mut patch = String::from("+++ b/a.py\n@@ -0,0 +1,150 @@\n");
        for i in 0..150 {
            patch.push_str(&format!("+line{i}\n"));
        }
        let report = analyze_impact(&patch).unwrap();
        assert_eq!(report.risk, RiskLevel::Medium);
    }
}
