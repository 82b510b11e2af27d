//! Read-side commands: trend, commits, repos, delete

use super::Cli;
use crate::config::AppConfig;
use crate::query::{DetailScope, QueryService, TrendStatus};
use crate::sampling::PointLabel;
use crate::store::{AuditQuery, AuditStore};
use anyhow::Result;
use chrono::{DateTime, Utc};
use console::style;
use std::io::Write;

pub(crate) fn trend(
    cli: &Cli,
    config: &AppConfig,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    max_points: Option<usize>,
    json: bool,
) -> Result<()> {
    let store = super::open_store(cli, config)?;
    let service = QueryService::new(&store, config.trend.clone());
    let repo = super::repo_id(cli);
    let report = service.sample_trend(&repo, start, end, max_points)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("\nQuality trend for {}\n", style(&repo).cyan());
    if report.status == TrendStatus::InsufficientData {
        println!(
            "  {} not enough audited commits in this window ({} stored in total)",
            style("[--]").dim(),
            report.total_commits_in_db
        );
        println!();
        return Ok(());
    }

    for point in &report.sample {
        let label = match point.label {
            PointLabel::InRange => String::new(),
            other => format!("  [{other}]"),
        };
        println!(
            "  {}  {}  quality {}  security {}  issues {}{}",
            point.date.format("%Y-%m-%d"),
            style(&point.sha[..point.sha.len().min(7)]).dim(),
            style(format!("{:>5.1}", point.quality_score)).cyan(),
            format_args!("{:>5.1}", point.security_score),
            point.issue_count,
            style(label).dim()
        );
    }
    println!(
        "\n  Trend: {} ({} points from {} stored commits)\n",
        style(&report.trend).cyan(),
        report.sample_size,
        report.total_commits_in_db
    );
    Ok(())
}

pub(crate) struct CommitsArgs {
    pub authors: Vec<String>,
    pub files: Vec<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub min_quality: Option<f64>,
    pub min_security: Option<f64>,
    pub limit: usize,
    pub details: bool,
}

pub(crate) fn commits(cli: &Cli, config: &AppConfig, args: CommitsArgs, json: bool) -> Result<()> {
    let store = super::open_store(cli, config)?;
    let service = QueryService::new(&store, config.trend.clone());
    let repo = super::repo_id(cli);

    let mut query = AuditQuery::for_repository(&repo);
    query.authors = args.authors;
    query.files = args.files.clone();
    query.date_from = args.since;
    query.date_to = args.until;
    query.min_quality = args.min_quality;
    query.min_security = args.min_security;
    query.limit = Some(args.limit);

    let shas = service.filter_commits(&query)?;
    let scope = if args.details {
        DetailScope::Files
    } else {
        DetailScope::Repository
    };
    let details = service.get_commit_details(&repo, &shas, scope, &args.files)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&details)?);
        return Ok(());
    }

    if details.is_empty() {
        println!("\n  {} no stored audits match\n", style("[--]").dim());
        return Ok(());
    }

    println!("\nStored audits for {}\n", style(&repo).cyan());
    for commit in &details {
        println!(
            "  {}  {}  {}  quality {}  security {}  issues {}",
            style(&commit.sha[..commit.sha.len().min(7)]).cyan(),
            commit.date.format("%Y-%m-%d"),
            commit.author,
            style(format!("{:.1}", commit.quality_score)).cyan(),
            format_args!("{:.1}", commit.security_score),
            commit.counts.total
        );
        if let Some(files) = &commit.files {
            for file in files {
                println!(
                    "      {}  quality {:.1}  complexity {:.1}  issues {}",
                    style(&file.file_path).dim(),
                    file.quality_score,
                    file.avg_complexity,
                    file.issue_count
                );
            }
        }
    }
    println!();
    Ok(())
}

pub(crate) fn repos(cli: &Cli, config: &AppConfig) -> Result<()> {
    let store = super::open_store(cli, config)?;
    let repositories = store.list_repositories()?;

    if repositories.is_empty() {
        println!("\n  {} no repositories audited yet\n", style("[--]").dim());
        return Ok(());
    }

    println!("\nAudited repositories\n");
    for repo in &repositories {
        let last = repo
            .last_analyzed
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "  {}  {} commits, last analyzed {}",
            style(&repo.name).cyan(),
            style(repo.total_commits).cyan(),
            last
        );
    }
    println!();
    Ok(())
}

pub(crate) fn delete(cli: &Cli, config: &AppConfig, name: Option<&str>, yes: bool) -> Result<()> {
    let store = super::open_store(cli, config)?;
    let repo = name.map(String::from).unwrap_or_else(|| super::repo_id(cli));

    let Some(stats) = store.repository_stats(&repo)? else {
        println!("\n  {} no stored audits for '{repo}'\n", style("[--]").dim());
        return Ok(());
    };

    if !yes {
        print!(
            "Delete {} stored audits for '{}'? [y/N] ",
            stats.total_commits, repo
        );
        std::io::stdout().flush()?;
        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        if !matches!(answer.trim(), "y" | "Y" | "yes") {
            println!("Aborted.");
            return Ok(());
        }
    }

    let removed = store.delete_repository(&repo)?;
    println!(
        "  {} removed {} commit audits for '{}'",
        style("[OK]").green(),
        removed,
        repo
    );
    Ok(())
}
