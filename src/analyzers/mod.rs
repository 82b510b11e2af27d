//! Source analyzers
//!
//! This module defines the pluggable analysis seam:
//! - `SourceAnalyzer` trait implemented by every analyzer
//! - `AnalyzerReport` carrying raw findings and per-function metrics
//!
//! Multiple analyzers are composed per file (security + complexity by
//! default). Analyzers see only source text; attaching file paths to
//! findings is the file auditor's job.

mod complexity;
mod security;

pub use complexity::BranchComplexityAnalyzer;
pub use security::PatternSecurityAnalyzer;

use crate::models::{IssueKind, Severity};
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

/// Source language, detected from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Rust,
    Go,
    Java,
    Ruby,
}

impl Language {
    /// Detect language from a path, `None` for files we do not analyze
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "py" => Some(Language::Python),
            "js" | "jsx" | "mjs" => Some(Language::JavaScript),
            "ts" | "tsx" => Some(Language::TypeScript),
            "rs" => Some(Language::Rust),
            "go" => Some(Language::Go),
            "java" => Some(Language::Java),
            "rb" => Some(Language::Ruby),
            _ => None,
        }
    }

    /// Whether function bodies are delimited by indentation (Python) or braces
    pub fn indentation_scoped(self) -> bool {
        matches!(self, Language::Python)
    }
}

/// A raw finding from an analyzer, not yet tied to a file path
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerIssue {
    pub kind: IssueKind,
    pub severity: Severity,
    pub line: u32,
    pub message: String,
}

/// Cyclomatic complexity of a single function
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionComplexity {
    pub name: String,
    pub line: u32,
    pub complexity: f64,
}

/// Result of running one analyzer over one file's text
#[derive(Debug, Clone, Default)]
pub struct AnalyzerReport {
    pub issues: Vec<AnalyzerIssue>,
    /// Per-function metrics; empty for analyzers that do not model functions
    pub functions: Vec<FunctionComplexity>,
}

/// Trait for all source analyzers
pub trait SourceAnalyzer: Send + Sync {
    /// Unique identifier for this analyzer
    fn name(&self) -> &'static str;

    /// Analyze one file's source text
    fn analyze(&self, source: &str, language: Language) -> Result<AnalyzerReport>;
}

/// The default analyzer set: pattern-based security scan plus
/// branch-counting complexity analysis.
pub fn default_analyzers(policy: &crate::config::ScoringPolicy) -> Vec<Arc<dyn SourceAnalyzer>> {
    vec![
        Arc::new(PatternSecurityAnalyzer::new()),
        Arc::new(BranchComplexityAnalyzer::new(policy.clone())),
    ]
}
