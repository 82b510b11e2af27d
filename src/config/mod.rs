//! Configuration for repopulse
//!
//! Supports loading config from:
//! - Environment variables (highest priority)
//! - ~/.config/repopulse/config.toml
//!
//! Scoring constants are policy values, not structural invariants, so they
//! all live here and can be tuned per deployment.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::models::Severity;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scoring: ScoringPolicy,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub review: ReviewConfig,
    #[serde(default)]
    pub trend: TrendConfig,
}

/// Weights and thresholds behind the 0-100 scores.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScoringPolicy {
    /// Score penalty per issue, by severity
    pub penalty_critical: f64,
    pub penalty_high: f64,
    pub penalty_medium: f64,
    pub penalty_low: f64,
    /// A function is flagged when cyclomatic complexity exceeds this
    pub complexity_flag_threshold: f64,
    /// Severity boundaries for flagged functions
    pub complexity_high_threshold: f64,
    pub complexity_critical_threshold: f64,
    /// Share of the quality score taken from the security score
    pub security_weight: f64,
    /// Share of the quality score taken from the complexity score
    pub complexity_weight: f64,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            penalty_critical: 20.0,
            penalty_high: 10.0,
            penalty_medium: 5.0,
            penalty_low: 1.0,
            complexity_flag_threshold: 10.0,
            complexity_high_threshold: 15.0,
            complexity_critical_threshold: 20.0,
            security_weight: 0.6,
            complexity_weight: 0.4,
        }
    }
}

impl ScoringPolicy {
    pub fn penalty(&self, severity: Severity) -> f64 {
        match severity {
            Severity::Critical => self.penalty_critical,
            Severity::High => self.penalty_high,
            Severity::Medium => self.penalty_medium,
            Severity::Low => self.penalty_low,
        }
    }

    /// Severity of a flagged function, by its cyclomatic complexity
    pub fn complexity_severity(&self, complexity: f64) -> Severity {
        if complexity > self.complexity_critical_threshold {
            Severity::Critical
        } else if complexity > self.complexity_high_threshold {
            Severity::High
        } else if complexity > self.complexity_flag_threshold {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to the redb database file
    pub db_path: Option<PathBuf>,
    /// Maximum filter-set size pushed down to the backend scan. Larger
    /// authors/files sets fall back to client-side post-filtering. This is
    /// a backend property (document stores cap IN-style operators around
    /// 30 items), so it is configurable per deployment.
    pub pushdown_cap: usize,
    /// Commit documents deleted per transaction during cascade delete
    pub delete_batch_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            pushdown_cap: 30,
            delete_batch_size: 500,
        }
    }
}

impl StoreConfig {
    /// Resolve the database path, defaulting to `.repopulse/audits.redb`
    /// under the given repository root.
    pub fn resolve_db_path(&self, repo_root: &std::path::Path) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| repo_root.join(".repopulse").join("audits.redb"))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Retry attempts for snapshot merge and for each analysis stage
    pub max_retries: usize,
    /// Fixed delay between retry attempts, in milliseconds
    pub retry_delay_ms: u64,
    /// Overall timeout covering both analysis stages, in seconds
    pub stage_timeout_secs: u64,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_delay_ms: 1000,
            stage_timeout_secs: 120,
        }
    }
}

impl ReviewConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TrendConfig {
    /// Maximum points returned by the trend sampler
    pub max_points: usize,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self { max_points: 20 }
    }
}

impl AppConfig {
    /// Load config with priority:
    /// 1. Environment variables (highest)
    /// 2. User config (~/.config/repopulse/config.toml)
    /// 3. Built-in defaults
    pub fn load() -> Result<Self> {
        let mut config = Self::user_config_path()
            .filter(|p| p.exists())
            .and_then(|p| std::fs::read_to_string(&p).ok())
            .and_then(|content| toml::from_str::<AppConfig>(&content).ok())
            .unwrap_or_default();

        if let Ok(path) = std::env::var("REPOPULSE_DB_PATH") {
            config.store.db_path = Some(PathBuf::from(path));
        }
        if let Ok(cap) = std::env::var("REPOPULSE_PUSHDOWN_CAP") {
            if let Ok(cap) = cap.parse() {
                config.store.pushdown_cap = cap;
            }
        }
        if let Ok(timeout) = std::env::var("REPOPULSE_STAGE_TIMEOUT_SECS") {
            if let Ok(timeout) = timeout.parse() {
                config.review.stage_timeout_secs = timeout;
            }
        }

        Ok(config)
    }

    fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("repopulse").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_values() {
        let policy = ScoringPolicy::default();
        assert_eq!(policy.penalty(Severity::Critical), 20.0);
        assert_eq!(policy.penalty(Severity::High), 10.0);
        assert_eq!(policy.penalty(Severity::Medium), 5.0);
        assert_eq!(policy.penalty(Severity::Low), 1.0);
        assert_eq!(policy.security_weight + policy.complexity_weight, 1.0);
    }

    #[test]
    fn test_complexity_severity_boundaries() {
        let policy = ScoringPolicy::default();
        assert_eq!(policy.complexity_severity(21.0), Severity::Critical);
        assert_eq!(policy.complexity_severity(20.0), Severity::High);
        assert_eq!(policy.complexity_severity(16.0), Severity::High);
        assert_eq!(policy.complexity_severity(15.0), Severity::Medium);
        assert_eq!(policy.complexity_severity(11.0), Severity::Medium);
        assert_eq!(policy.complexity_severity(10.0), Severity::Low);
    }

    #[test]
    fn test_toml_roundtrip() {
        let toml_src = r#"
            [scoring]
            penalty_critical = 25.0

            [store]
            pushdown_cap = 10
        "#;
        let config: AppConfig = toml::from_str(toml_src).unwrap();
        assert_eq!(config.scoring.penalty_critical, 25.0);
        assert_eq!(config.scoring.penalty_high, 10.0);
        assert_eq!(config.store.pushdown_cap, 10);
        assert_eq!(config.review.max_retries, 2);
    }
}
