//! Branch-counting complexity analyzer
//!
//! Lightweight cyclomatic complexity without a full parser: function
//! headers are found by pattern, bodies by indentation (Python) or brace
//! tracking (everything else), and complexity is 1 + the number of
//! decision points in the body.
//!
//! This trades AST fidelity for zero parsing dependencies; on
//! straightforward code it matches a full AST count, which is what the
//! flagging thresholds were calibrated against.

use super::{AnalyzerIssue, AnalyzerReport, FunctionComplexity, Language, SourceAnalyzer};
use crate::config::ScoringPolicy;
use crate::models::IssueKind;
use anyhow::Result;
use regex::Regex;
use std::sync::OnceLock;

static PY_DEF: OnceLock<Regex> = OnceLock::new();
static BRACE_FN: OnceLock<Regex> = OnceLock::new();
static PY_BRANCH: OnceLock<Regex> = OnceLock::new();
static BRACE_BRANCH: OnceLock<Regex> = OnceLock::new();

fn py_def() -> &'static Regex {
    PY_DEF.get_or_init(|| Regex::new(r"^(?P<indent>[ \t]*)(?:async\s+)?def\s+(?P<name>\w+)").expect("valid regex"))
}

fn brace_fn() -> &'static Regex {
    BRACE_FN.get_or_init(|| {
        Regex::new(
            r"^[ \t]*(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?(?:fn|func|function)\s+(?:\([^)]*\)\s*)?(?P<name>\w+)",
        )
        .expect("valid regex")
    })
}

fn py_branch() -> &'static Regex {
    PY_BRANCH.get_or_init(|| {
        Regex::new(r"\b(if|elif|for|while|except|and|or|case)\b").expect("valid regex")
    })
}

fn brace_branch() -> &'static Regex {
    BRACE_BRANCH.get_or_init(|| {
        Regex::new(r"\b(if|for|while|case|catch|match)\b|&&|\|\|").expect("valid regex")
    })
}

/// Computes per-function cyclomatic complexity and flags functions above
/// the configured threshold.
#[derive(Debug)]
pub struct BranchComplexityAnalyzer {
    policy: ScoringPolicy,
}

impl BranchComplexityAnalyzer {
    pub fn new(policy: ScoringPolicy) -> Self {
        Self { policy }
    }

    /// Extract (name, 1-based header line, body lines) for each function
    fn extract_functions<'a>(
        source: &'a str,
        language: Language,
    ) -> Vec<(String, u32, Vec<&'a str>)> {
        let lines: Vec<&str> = source.lines().collect();
        if language.indentation_scoped() {
            Self::extract_indented(&lines)
        } else {
            Self::extract_braced(&lines)
        }
    }

    fn extract_indented<'a>(lines: &[&'a str]) -> Vec<(String, u32, Vec<&'a str>)> {
        let mut functions = Vec::new();
        for (idx, line) in lines.iter().enumerate() {
            let Some(caps) = py_def().captures(line) else {
                continue;
            };
            let indent = caps.name("indent").map_or(0, |m| m.as_str().len());
            let name = caps.name("name").expect("named group").as_str().to_string();

            let mut body = vec![*line];
            for next in &lines[idx + 1..] {
                if next.trim().is_empty() {
                    body.push(*next);
                    continue;
                }
                let next_indent = next.len() - next.trim_start().len();
                if next_indent <= indent {
                    break;
                }
                body.push(*next);
            }
            functions.push((name, idx as u32 + 1, body));
        }
        functions
    }

    fn extract_braced<'a>(lines: &[&'a str]) -> Vec<(String, u32, Vec<&'a str>)> {
        let mut functions = Vec::new();
        for (idx, line) in lines.iter().enumerate() {
            let Some(caps) = brace_fn().captures(line) else {
                continue;
            };
            let name = caps.name("name").expect("named group").as_str().to_string();

            // Walk forward tracking brace depth; the body ends when depth
            // returns to zero after the opening brace.
            let mut body = Vec::new();
            let mut depth: i32 = 0;
            let mut opened = false;
            for next in &lines[idx..] {
                body.push(*next);
                for ch in next.chars() {
                    match ch {
                        '{' => {
                            depth += 1;
                            opened = true;
                        }
                        '}' => depth -= 1,
                        _ => {}
                    }
                }
                if opened && depth <= 0 {
                    break;
                }
            }
            if opened {
                functions.push((name, idx as u32 + 1, body));
            }
        }
        functions
    }

    fn count_decision_points(body: &[&str], language: Language) -> usize {
        let branch = if language.indentation_scoped() {
            py_branch()
        } else {
            brace_branch()
        };
        body.iter().map(|line| branch.find_iter(line).count()).sum()
    }
}

impl SourceAnalyzer for BranchComplexityAnalyzer {
    fn name(&self) -> &'static str {
        "branch-complexity"
    }

    fn analyze(&self, source: &str, language: Language) -> Result<AnalyzerReport> {
        let mut report = AnalyzerReport::default();

        for (name, line, body) in Self::extract_functions(source, language) {
            let complexity = 1.0 + Self::count_decision_points(&body, language) as f64;
            report.functions.push(FunctionComplexity {
                name: name.clone(),
                line,
                complexity,
            });

            if complexity > self.policy.complexity_flag_threshold {
                report.issues.push(AnalyzerIssue {
                    kind: IssueKind::Complexity,
                    severity: self.policy.complexity_severity(complexity),
                    line,
                    message: format!(
                        "High complexity function '{name}' (complexity: {complexity:.0})"
                    ),
                });
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;

    fn analyzer() -> BranchComplexityAnalyzer {
        BranchComplexityAnalyzer::new(ScoringPolicy::default())
    }

    #[test]
    fn test_simple_function_complexity_one() {
        let report = analyzer()
            .analyze("def add(a, b):\n    return a + b\n", Language::Python)
            .unwrap();
        assert_eq!(report.functions.len(), 1);
        assert_eq!(report.functions[0].name, "add");
        assert_eq!(report.functions[0].complexity, 1.0);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_branches_add_complexity() {
        let source = "def check(x):\n    if x > 0:\n        return 1\n    elif x < 0:\n        return -1\n    return 0\n";
        let report = analyzer().analyze(source, Language::Python).unwrap();
        // 1 + if + elif
        assert_eq!(report.functions[0].complexity, 3.0);
    }

    #[test]
    fn test_complex_function_is_flagged() {
        // 11 ifs -> complexity 12, above the flag threshold of 10
        let mut source = String::from("def dispatch(x):\n");
        for i in 0..11 {
            source.push_str(&format!("    if x == {i}:\n        return {i}\n"));
        }
        let report = analyzer().analyze(&source, Language::Python).unwrap();
        assert_eq!(report.functions[0].complexity, 12.0);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].severity, Severity::Medium);
        assert!(report.issues[0].message.contains("dispatch"));
    }

    #[test]
    fn test_critical_severity_above_twenty() {
        let mut source = String::from("def monster(x):\n");
        for i in 0..21 {
            source.push_str(&format!("    if x == {i}:\n        return {i}\n"));
        }
        let report = analyzer().analyze(&source, Language::Python).unwrap();
        assert_eq!(report.functions[0].complexity, 22.0);
        assert_eq!(report.issues[0].severity, Severity::Critical);
    }

    #[test]
    fn test_brace_language_extraction() {
        let source = "fn route(x: u32) -> u32 {\n    if x > 1 && x < 10 {\n        return 1;\n    }\n    0\n}\n\nfn plain() {}\n";
        let report = analyzer().analyze(source, Language::Rust).unwrap();
        assert_eq!(report.functions.len(), 2);
        // 1 + if + &&
        assert_eq!(report.functions[0].complexity, 3.0);
        assert_eq!(report.functions[1].complexity, 1.0);
    }

    #[test]
    fn test_multiple_python_functions() {
        let source = "def a():\n    pass\n\ndef b(x):\n    for i in x:\n        print(i)\n";
        let report = analyzer().analyze(source, Language::Python).unwrap();
        assert_eq!(report.functions.len(), 2);
        assert_eq!(report.functions[1].complexity, 2.0);
    }
}
