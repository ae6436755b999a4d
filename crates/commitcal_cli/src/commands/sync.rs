//! Sync and backfill commands.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use console::style;
use serde::Serialize;
use tabled::Tabled;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use commitcal::entity::commit::Model as CommitModel;
use commitcal::service::{BackfillResponse, RepositoryStats, SyncResponse, SyncSummary};
use commitcal::sync::{DateRange, SyncError, SyncOptions, SyncReport};

use crate::commands::shared::{OutputFormat, open_service, print_json, print_table};
use crate::config::Config;
use crate::progress::ProgressReporter;
use crate::{BackfillArgs, SyncArgs, TuningOptions};

const REAUTH_HINT: &str =
    "GitHub rejected the configured token. Set a new one with: commitcal token set";

impl TuningOptions {
    /// Overlay the flags that were given on `base`.
    pub(crate) fn apply(&self, mut base: SyncOptions) -> SyncOptions {
        if let Some(minutes) = self.ttl_minutes {
            base.ttl = Duration::minutes(minutes);
        }
        if let Some(concurrency) = self.concurrency {
            base.concurrency = concurrency;
        }
        if let Some(max_pages) = self.max_pages {
            base.max_pages_per_window = max_pages;
        }
        if let Some(max_commits) = self.max_commits {
            base.max_commits_per_repo = (max_commits > 0).then_some(max_commits);
        }
        base
    }
}

/// The range to sync: explicit bounds, or the last `months_back` months.
fn resolve_range(
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
    months_back: u32,
    now: DateTime<Utc>,
) -> Result<DateRange, SyncError> {
    let end = until.unwrap_or(now);
    match since {
        Some(start) => DateRange::new(start, end),
        None => Ok(DateRange::months_back(end, months_back)),
    }
}

/// Turn batch-level failures into actionable messages.
fn explain(err: SyncError) -> Box<dyn std::error::Error> {
    match err {
        SyncError::AuthRequired => {
            "No GitHub token configured. Set one with: commitcal token set".into()
        }
        other => Box::new(other),
    }
}

#[derive(Debug, Tabled)]
struct RepoRow {
    #[tabled(rename = "Repository")]
    repository: String,
    #[tabled(rename = "Outcome")]
    outcome: String,
    #[tabled(rename = "Fetched")]
    fetched: usize,
    #[tabled(rename = "Stored")]
    stored: u64,
    #[tabled(rename = "Detail")]
    detail: String,
}

impl From<&RepositoryStats> for RepoRow {
    fn from(stats: &RepositoryStats) -> Self {
        Self {
            repository: stats.full_name.clone(),
            outcome: stats.outcome.to_string(),
            fetched: stats.commits_fetched,
            stored: stats.commits_stored,
            detail: stats
                .error
                .clone()
                .unwrap_or_else(|| format!("{} in range", stats.commits_in_range)),
        }
    }
}

impl From<&SyncReport> for RepoRow {
    fn from(report: &SyncReport) -> Self {
        Self {
            repository: report.full_name.clone(),
            outcome: report.outcome.to_string(),
            fetched: report.commits_fetched,
            stored: report.commits_stored,
            detail: match &report.error {
                Some(failure) => failure.message.clone(),
                None => format!(
                    "{}/{} windows",
                    report.windows_completed, report.windows_total
                ),
            },
        }
    }
}

/// JSON shape of `sync`: commits only when asked for.
#[derive(Serialize)]
struct SyncOutput<'a> {
    summary: &'a SyncSummary,
    repositories: &'a [RepositoryStats],
    #[serde(skip_serializing_if = "Option::is_none")]
    commits: Option<&'a [CommitModel]>,
}

fn print_commits(commits: &[CommitModel], repositories: &[RepositoryStats]) {
    let names: HashMap<Uuid, &str> = repositories
        .iter()
        .map(|r| (r.id, r.full_name.as_str()))
        .collect();

    for commit in commits {
        println!(
            "{} {} {:24} {}",
            commit.author_date.with_timezone(&Utc).format("%Y-%m-%d %H:%M"),
            style(commit.sha.chars().take(7).collect::<String>()).yellow(),
            names.get(&commit.repository_id).copied().unwrap_or("?"),
            commit.summary_line()
        );
    }
}

fn print_sync_summary(summary: &SyncSummary) {
    let source = match summary.source {
        commitcal::service::ResponseSource::Cache => style("cache").green(),
        commitcal::service::ResponseSource::Remote => style("remote").cyan(),
    };
    println!(
        "{} commits from {} ({} synced, {} cached, {} failed, {} cancelled)",
        style(summary.total_commits).bold(),
        source,
        summary.synced,
        summary.served_from_cache,
        summary.failed,
        summary.cancelled,
    );
}

pub(crate) async fn handle_sync(
    args: SyncArgs,
    config: &Config,
    database_url: &str,
    user_id: &str,
    cancel: &CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = args.tuning.apply(config.sync.to_options());
    let months_back = args.months_back.unwrap_or(config.sync.months_back);
    let range = resolve_range(args.since, args.until, months_back, Utc::now())?;

    let reporter = Arc::new(ProgressReporter::new());
    let service = open_service(config, database_url, options, Some(reporter.as_callback())).await?;

    tracing::debug!(user_id, start = %range.start, end = %range.end, force = args.force, "Starting sync");
    let result = service
        .request_sync(user_id, range, args.force, cancel)
        .await;
    reporter.finish();
    let response: SyncResponse = result.map_err(explain)?;

    match args.output {
        OutputFormat::Table => {
            if !response.repositories.is_empty() {
                print_table(response.repositories.iter().map(RepoRow::from));
            }
            if args.commits {
                print_commits(&response.commits, &response.repositories);
            }
            print_sync_summary(&response.summary);
        }
        OutputFormat::Json => print_json(&SyncOutput {
            summary: &response.summary,
            repositories: &response.repositories,
            commits: args.commits.then_some(response.commits.as_slice()),
        })?,
    }

    if response.summary.requires_reauth {
        return Err(REAUTH_HINT.into());
    }
    if cancel.is_cancelled() {
        eprintln!("{} Sync interrupted; fetched commits were kept.", style("!").yellow());
    }
    Ok(())
}

pub(crate) async fn handle_backfill(
    args: BackfillArgs,
    config: &Config,
    database_url: &str,
    user_id: &str,
    cancel: &CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = args.tuning.apply(config.sync.to_options());

    let reporter = Arc::new(ProgressReporter::new());
    let service = open_service(config, database_url, options, Some(reporter.as_callback())).await?;

    let result = service.request_backfill(user_id, args.since, cancel).await;
    reporter.finish();
    let response: BackfillResponse = result.map_err(explain)?;

    match args.output {
        OutputFormat::Table => {
            if !response.report.reports.is_empty() {
                print_table(response.report.reports.iter().map(RepoRow::from));
            }
            println!(
                "{} new commits, {} cached since {}",
                style(response.new_commits).bold(),
                style(response.total_commits).bold(),
                args.since.format("%Y-%m-%d"),
            );
        }
        OutputFormat::Json => print_json(&response)?,
    }

    if response.report.requires_reauth() {
        return Err(REAUTH_HINT.into());
    }
    Ok(())
}
