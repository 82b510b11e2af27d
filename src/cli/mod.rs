//! CLI command definitions and dispatch

mod query;
mod review;
mod scan;

use crate::config::AppConfig;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Repopulse - commit-by-commit repository quality auditing
#[derive(Parser, Debug)]
#[command(name = "repopulse")]
#[command(
    version,
    about = "Audit the full code snapshot at each commit and track how quality evolves",
    long_about = "Repopulse audits the complete repository state at selected commits \
(not diffs), scores security and complexity per file, and stores the results so \
quality trends can be queried over time.\n\n\
Start with a bootstrap scan, then keep the history current with sync:\n  \
repopulse bootstrap --strategy weekly\n  \
repopulse sync",
    after_help = "\
Examples:
  repopulse bootstrap --strategy weekly      Initial historical scan, one commit per week
  repopulse sync                             Audit commits added since the last scan
  repopulse trend --start 2026-01-01         Quality trend for this year
  repopulse commits --author alice@dev.io    Stored audits filtered by author
  repopulse review --patch change.diff       Verdict for an incoming patch
  repopulse repos                            List audited repositories"
)]
pub struct Cli {
    /// Path to the repository (default: current directory)
    #[arg(global = true, long, default_value = ".")]
    pub path: PathBuf,

    /// Repository id used as the storage key (default: directory name)
    #[arg(global = true, long)]
    pub repo: Option<String>,

    /// Database file override
    #[arg(global = true, long)]
    pub db: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the initial historical scan
    #[command(after_help = "\
Examples:
  repopulse bootstrap                          Weekly sampling (default)
  repopulse bootstrap --strategy full          Audit every commit
  repopulse bootstrap --strategy tags          Audit tagged releases only
  repopulse bootstrap --since 2025-06-01       Limit history to a date range")]
    Bootstrap {
        /// Sampling strategy: full, weekly, monthly, tags
        #[arg(long, default_value = "weekly", value_parser = ["full", "weekly", "monthly", "tags"])]
        strategy: String,

        /// Branch to scan (default: HEAD)
        #[arg(long)]
        branch: Option<String>,

        /// Only commits on or after this date (YYYY-MM-DD)
        #[arg(long)]
        since: Option<String>,

        /// Only commits on or before this date (YYYY-MM-DD)
        #[arg(long)]
        until: Option<String>,

        /// Output the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Audit commits added since the last stored audit
    Sync {
        /// Branch to scan (default: HEAD)
        #[arg(long)]
        branch: Option<String>,

        /// Output the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the quality trend over stored audits
    Trend {
        /// Window start (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,

        /// Window end (YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,

        /// Maximum sample points
        #[arg(long)]
        max_points: Option<usize>,

        /// Output the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List stored commit audits, filtered
    Commits {
        /// Filter by author (repeatable)
        #[arg(long = "author")]
        authors: Vec<String>,

        /// Filter by touched file (repeatable)
        #[arg(long = "file")]
        files: Vec<String>,

        /// Only commits on or after this date (YYYY-MM-DD)
        #[arg(long)]
        since: Option<String>,

        /// Only commits on or before this date (YYYY-MM-DD)
        #[arg(long)]
        until: Option<String>,

        /// Minimum quality score
        #[arg(long)]
        min_quality: Option<f64>,

        /// Minimum security score
        #[arg(long)]
        min_security: Option<f64>,

        /// Maximum commits to show
        #[arg(long, default_value = "20")]
        limit: usize,

        /// Include per-file metrics
        #[arg(long)]
        details: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Review an incoming patch against the working tree
    Review {
        /// Patch file to review ("-" reads stdin)
        #[arg(long, default_value = "-")]
        patch: String,

        /// Output the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List audited repositories
    Repos,

    /// Delete a repository's stored audits
    Delete {
        /// Repository id to delete (default: this repository)
        #[arg(long)]
        name: Option<String>,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

/// Repository id used as the storage key
pub(crate) fn repo_id(cli: &Cli) -> String {
    cli.repo.clone().unwrap_or_else(|| {
        cli.path
            .canonicalize()
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "repository".to_string())
    })
}

pub(crate) fn open_connector(cli: &Cli) -> Result<crate::connector::GitConnector> {
    let connector = crate::connector::GitConnector::open(&cli.path)?;
    Ok(match &cli.repo {
        Some(repo) => connector.with_repo_id(repo),
        None => connector,
    })
}

pub(crate) fn open_store(cli: &Cli, config: &AppConfig) -> Result<crate::store::RedbStore> {
    let db_path = config.store.resolve_db_path(&cli.path);
    Ok(crate::store::RedbStore::open(
        &db_path,
        config.store.clone(),
    )?)
}

pub(crate) fn build_auditor(config: &AppConfig) -> crate::audit::CommitAuditor {
    crate::audit::CommitAuditor::new(
        crate::analyzers::default_analyzers(&config.scoring),
        config.scoring.clone(),
    )
}

/// Parse a YYYY-MM-DD argument; end-of-window dates round up to 23:59:59.
fn parse_date(value: &str, end_of_day: bool) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{value}', expected YYYY-MM-DD"))?;
    let time = if end_of_day {
        date.and_hms_opt(23, 59, 59)
    } else {
        date.and_hms_opt(0, 0, 0)
    };
    Ok(DateTime::from_naive_utc_and_offset(
        time.expect("valid time of day"),
        Utc,
    ))
}

/// Run the CLI with parsed arguments
pub fn run(cli: Cli) -> Result<()> {
    let mut config = AppConfig::load()?;
    if let Some(db) = &cli.db {
        config.store.db_path = Some(db.clone());
    }

    match &cli.command {
        Commands::Bootstrap {
            strategy,
            branch,
            since,
            until,
            json,
        } => scan::bootstrap(
            &cli,
            &config,
            strategy,
            branch.as_deref(),
            since.as_deref().map(|s| parse_date(s, false)).transpose()?,
            until.as_deref().map(|s| parse_date(s, true)).transpose()?,
            *json,
        ),

        Commands::Sync { branch, json } => scan::sync(&cli, &config, branch.as_deref(), *json),

        Commands::Trend {
            start,
            end,
            max_points,
            json,
        } => query::trend(
            &cli,
            &config,
            start.as_deref().map(|s| parse_date(s, false)).transpose()?,
            end.as_deref().map(|s| parse_date(s, true)).transpose()?,
            *max_points,
            *json,
        ),

        Commands::Commits {
            authors,
            files,
            since,
            until,
            min_quality,
            min_security,
            limit,
            details,
            json,
        } => query::commits(
            &cli,
            &config,
            query::CommitsArgs {
                authors: authors.clone(),
                files: files.clone(),
                since: since.as_deref().map(|s| parse_date(s, false)).transpose()?,
                until: until.as_deref().map(|s| parse_date(s, true)).transpose()?,
                min_quality: *min_quality,
                min_security: *min_security,
                limit: *limit,
                details: *details,
            },
            *json,
        ),

        Commands::Review { patch, json } => review::run(&cli, &config, patch, *json),

        Commands::Repos => query::repos(&cli, &config),

        Commands::Delete { name, yes } => query::delete(&cli, &config, name.as_deref(), *yes),
    }
}
