//! Review command - verdict for an incoming patch

use super::Cli;
use crate::analyzers::default_analyzers;
use crate::audit::FileAuditor;
use crate::config::AppConfig;
use crate::review::{ReviewPipeline, StageResult, Verdict};
use anyhow::{Context, Result};
use console::style;
use std::io::Read;

pub(crate) fn run(cli: &Cli, config: &AppConfig, patch: &str, json: bool) -> Result<()> {
    let patch_text = if patch == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading patch from stdin")?;
        buf
    } else {
        std::fs::read_to_string(patch).with_context(|| format!("reading patch file {patch}"))?
    };

    let file_auditor = FileAuditor::new(default_analyzers(&config.scoring), config.scoring.clone());
    let pipeline = ReviewPipeline::new(file_auditor, config.review.clone());
    let report = pipeline.run(&cli.path, &patch_text)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let verdict = match report.verdict {
        Verdict::RequestChanges => style(report.verdict).red(),
        Verdict::Comment => style(report.verdict).yellow(),
        Verdict::Approve => style(report.verdict).green(),
    };
    println!("\nReview verdict: {verdict}\n");

    match &report.audit {
        StageResult::Success(audit) => {
            if audit.issues.is_empty() {
                println!("  {} no issues in changed files", style("[OK]").green());
            } else {
                println!("  Issues in changed files:");
                for issue in &audit.issues {
                    println!(
                        "    {} {}:{} {}",
                        style(format!("[{}]", issue.severity)).yellow(),
                        issue.file,
                        issue.line,
                        issue.message
                    );
                }
            }
        }
        StageResult::Degraded(reason) => {
            println!("  {} audit unavailable: {reason}", style("[??]").yellow());
        }
    }

    match &report.impact {
        StageResult::Success(impact) => {
            println!(
                "  Impact: {} files, +{} -{} lines, risk {}",
                impact.changed_files.len(),
                impact.additions,
                impact.deletions,
                style(impact.risk).cyan()
            );
            for change in &impact.breaking_changes {
                println!("    {} {change}", style("[!!]").red());
            }
        }
        StageResult::Degraded(reason) => {
            println!("  {} impact unavailable: {reason}", style("[??]").yellow());
        }
    }

    println!("\n  Took {:.1}s\n", report.processing_time);
    Ok(())
}
