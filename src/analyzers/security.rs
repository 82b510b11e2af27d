//! Pattern-based security analyzer
//!
//! Scans source text against a fixed table of vulnerability patterns:
//! code injection sinks, shell execution, hardcoded credentials, weak
//! crypto, unsafe deserialization. Line-oriented, language-agnostic.

use super::{AnalyzerIssue, AnalyzerReport, Language, SourceAnalyzer};
use crate::models::{IssueKind, Severity};
use anyhow::Result;
use regex::Regex;
use std::sync::OnceLock;

struct SecurityPattern {
    regex: Regex,
    severity: Severity,
    message: &'static str,
}

static PATTERNS: OnceLock<Vec<SecurityPattern>> = OnceLock::new();

fn patterns() -> &'static [SecurityPattern] {
    PATTERNS.get_or_init(|| {
        let table: &[(&str, Severity, &str)] = &[
            (
                r#"(?i)(password|passwd|secret|api_key|apikey|auth_token)\s*=\s*["'][^"']{4,}["']"#,
                Severity::Critical,
                "Hardcoded credential",
            ),
            (
                r"\beval\s*\(",
                Severity::High,
                "Use of eval() allows code injection",
            ),
            (
                r"\bexec\s*\(",
                Severity::High,
                "Use of exec() allows code injection",
            ),
            (
                r"pickle\.loads?\s*\(",
                Severity::High,
                "Unsafe deserialization with pickle",
            ),
            (
                r"shell\s*=\s*True",
                Severity::High,
                "Subprocess call with shell=True",
            ),
            (
                r"os\.system\s*\(",
                Severity::High,
                "Shell command execution via os.system",
            ),
            (
                r"verify\s*=\s*False",
                Severity::High,
                "TLS certificate verification disabled",
            ),
            (
                r#"(?i)(execute|query)\s*\(\s*(f["']|["'][^"']*["']\s*%|["'][^"']*["']\s*\+)"#,
                Severity::High,
                "SQL built by string formatting, possible injection",
            ),
            (
                r"yaml\.load\s*\((?:[^)]*)?\)",
                Severity::Medium,
                "yaml.load without SafeLoader",
            ),
            (
                r"\b(md5|sha1)\s*\(",
                Severity::Medium,
                "Weak hash algorithm",
            ),
            (
                r#"bind.*["']0\.0\.0\.0["']"#,
                Severity::Medium,
                "Binding to all network interfaces",
            ),
            (
                r"tempfile\.mktemp\s*\(",
                Severity::Medium,
                "Insecure temporary file creation",
            ),
            (
                r"(?i)debug\s*=\s*True",
                Severity::Low,
                "Debug mode enabled",
            ),
        ];
        table
            .iter()
            .map(|(pattern, severity, message)| SecurityPattern {
                regex: Regex::new(pattern).expect("valid security pattern"),
                severity: *severity,
                message,
            })
            .collect()
    })
}

/// Line-oriented security scanner over the built-in pattern table
#[derive(Debug, Default)]
pub struct PatternSecurityAnalyzer;

impl PatternSecurityAnalyzer {
    pub fn new() -> Self {
        Self
    }

    fn is_comment(line: &str, language: Language) -> bool {
        let trimmed = line.trim_start();
        match language {
            Language::Python | Language::Ruby => trimmed.starts_with('#'),
            _ => trimmed.starts_with("//"),
        }
    }
}

impl SourceAnalyzer for PatternSecurityAnalyzer {
    fn name(&self) -> &'static str {
        "pattern-security"
    }

    fn analyze(&self, source: &str, language: Language) -> Result<AnalyzerReport> {
        let mut report = AnalyzerReport::default();

        for (idx, line) in source.lines().enumerate() {
            if Self::is_comment(line, language) {
                continue;
            }
            for pattern in patterns() {
                if pattern.regex.is_match(line) {
                    report.issues.push(AnalyzerIssue {
                        kind: IssueKind::Security,
                        severity: pattern.severity,
                        line: idx as u32 + 1,
                        message: pattern.message.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(source: &str) -> Vec<AnalyzerIssue> {
        PatternSecurityAnalyzer::new()
            .analyze(source, Language::Python)
            .unwrap()
            .issues
    }

    #[test]
    fn test_clean_code_has_no_issues() {
        let issues = scan("def add(a, b):\n    return a + b\n");
        assert!(issues.is_empty());
    }

    #[test]
    fn test_detects_eval() {
        let issues = scan("result = eval(user_input)\n");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::High);
        assert_eq!(issues[0].line, 1);
        assert_eq!(issues[0].kind, IssueKind::Security);
    }

    #[test]
    fn test_detects_hardcoded_credential_as_critical() {
        let issues = scan("password = \"hunter22\"\n");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Critical);
    }

    #[test]
    fn test_skips_comments() {
        let issues = scan("# password = \"hunter22\"\n");
        assert!(issues.is_empty());
    }

    #[test]
    fn test_line_numbers_are_one_based() {
        let issues = scan("x = 1\ny = 2\nos.system(cmd)\n");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].line, 3);
    }
}
