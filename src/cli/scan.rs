//! Bootstrap and sync commands

use super::Cli;
use crate::config::AppConfig;
use crate::connector::RepositoryConnector;
use crate::handlers::{BootstrapCommand, BootstrapHandler, SyncHandler};
use crate::models::{CommandResult, CommandStatus};
use crate::sampling::SamplingStrategy;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template("  {bar:40.cyan/dim} {pos}/{len} commits ({elapsed})")
            .expect("valid progress template"),
    );
    pb
}

pub(crate) fn bootstrap(
    cli: &Cli,
    config: &AppConfig,
    strategy: &str,
    branch: Option<&str>,
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
    json: bool,
) -> Result<()> {
    let strategy = SamplingStrategy::parse(strategy)
        .with_context(|| format!("unknown sampling strategy '{strategy}'"))?;
    let connector = super::open_connector(cli)?;
    let store = super::open_store(cli, config)?;
    let auditor = super::build_auditor(config);
    let handler = BootstrapHandler::new(
        &connector,
        &store,
        &auditor,
        config.review.max_retries,
        config.review.retry_delay(),
    );

    if !json {
        println!(
            "\nBootstrapping {} ({} sampling)\n",
            style(connector.repo_id()).cyan(),
            strategy
        );
    }

    let command = BootstrapCommand {
        strategy,
        branch: branch.map(String::from),
        since,
        until,
    };
    let pb = progress_bar();
    let result = handler.run(&command, Some(&|done, total| {
        pb.set_length(total as u64);
        pb.set_position(done as u64);
    }));
    pb.finish_and_clear();

    print_result(&result, json)
}

pub(crate) fn sync(cli: &Cli, config: &AppConfig, branch: Option<&str>, json: bool) -> Result<()> {
    let connector = super::open_connector(cli)?;
    let store = super::open_store(cli, config)?;
    let auditor = super::build_auditor(config);
    let handler = SyncHandler::new(
        &connector,
        &store,
        &auditor,
        config.review.max_retries,
        config.review.retry_delay(),
    );

    if !json {
        println!("\nSyncing {}\n", style(connector.repo_id()).cyan());
    }

    let pb = progress_bar();
    let result = handler.run(branch, Some(&|done, total| {
        pb.set_length(total as u64);
        pb.set_position(done as u64);
    }));
    pb.finish_and_clear();

    print_result(&result, json)
}

fn print_result(result: &CommandResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        if result.status == CommandStatus::Error {
            bail!("{} failed", result.command);
        }
        return Ok(());
    }

    match result.status {
        CommandStatus::Success => {
            println!("  {} {}", style("[OK]").green(), result.message);
            if let Some(audit) = &result.audit {
                println!();
                println!(
                    "  Quality:  avg {} (trend: {})",
                    style(format!("{:.1}", audit.avg_quality_score)).cyan(),
                    style(&audit.quality_trend).cyan()
                );
                println!(
                    "  Issues:   {} total ({} critical, {} high, {} medium, {} low)",
                    style(audit.counts.total).cyan(),
                    style(audit.counts.critical).red(),
                    style(audit.counts.high).yellow(),
                    audit.counts.medium,
                    audit.counts.low
                );
                if let (Some(start), Some(end)) = (audit.date_range_start, audit.date_range_end) {
                    println!(
                        "  Range:    {} .. {}",
                        start.format("%Y-%m-%d"),
                        end.format("%Y-%m-%d")
                    );
                }
                println!("  Took:     {:.1}s", audit.processing_time);
            }
            println!();
            Ok(())
        }
        CommandStatus::NoData => {
            println!("  {} {}", style("[--]").dim(), result.message);
            println!();
            Ok(())
        }
        CommandStatus::Error => {
            let detail = result.error.as_deref().unwrap_or("unknown error");
            println!("  {} {}", style("[!!]").red(), detail);
            bail!("{} failed: {detail}", result.command);
        }
    }
}
