//! Helpers shared by the command handlers.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::ValueEnum;
use commitcal::{CommitStore, db};

use crate::config::Config;

/// Output format for tables.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Display as a formatted table (default)
    #[default]
    Table,
    /// Display as JSON
    Json,
}

/// Print `rows` as a rounded table.
pub(crate) fn print_table<T: tabled::Tabled>(rows: impl IntoIterator<Item = T>) {
    let mut table = tabled::Table::new(rows);
    table.with(tabled::settings::Style::rounded());
    println!("{}", table);
}

pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Open the cache, applying pending migrations.
pub(crate) async fn open_store(database_url: &str) -> Result<CommitStore, Box<dyn std::error::Error>> {
    let db = db::connect_and_migrate(database_url).await?;
    Ok(CommitStore::new(Arc::new(db)))
}

/// Parse `owner/name`.
pub(crate) fn parse_full_name(s: &str) -> Result<(String, String), String> {
    match s.trim().split_once('/') {
        Some((owner, name))
            if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
        {
            Ok((owner.to_string(), name.to_string()))
        }
        _ => Err(format!("expected owner/name, got '{}'", s)),
    }
}

/// Parse a date as the start of a range: `YYYY-MM-DD` is midnight UTC.
pub(crate) fn parse_start_date(s: &str) -> Result<DateTime<Utc>, String> {
    parse_date(s, NaiveTime::MIN)
}

/// Parse a date as the end of a range: `YYYY-MM-DD` is the last second of the day.
pub(crate) fn parse_end_date(s: &str) -> Result<DateTime<Utc>, String> {
    let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
    parse_date(s, end_of_day)
}

fn parse_date(s: &str, time_of_day: NaiveTime) -> Result<DateTime<Utc>, String> {
    if let Ok(at) = DateTime::parse_from_rfc3339(s) {
        return Ok(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|date| date.and_time(time_of_day).and_utc())
        .map_err(|_| format!("expected YYYY-MM-DD or an RFC 3339 timestamp, got '{}'", s))
}

/// Format an optional timestamp for a table cell.
pub(crate) fn format_time<Tz: chrono::TimeZone>(at: Option<&DateTime<Tz>>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.map(|t| t.with_timezone(&Utc).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "never".to_string())
}

/// The user the CLI acts for: the flag, else the configured id.
pub(crate) fn user_id(flag: Option<String>, config: &Config) -> String {
    flag.unwrap_or_else(|| config.user.id.clone())
}

#[cfg(feature = "github")]
pub(crate) use service::open_service;

#[cfg(feature = "github")]
mod service {
    use std::sync::Arc;

    use commitcal::github::{GitHubClient, GitHubClientConfig};
    use commitcal::service::SyncService;
    use commitcal::sync::{ProgressCallback, SyncOptions, SyncOrchestrator};

    use super::open_store;
    use crate::config::Config;

    pub(crate) type GitHubService = SyncService<GitHubClient>;

    fn github_client(config: &Config) -> Result<GitHubClient, Box<dyn std::error::Error>> {
        let mut client_config = GitHubClientConfig::default();
        if let Some(url) = &config.github.api_url {
            client_config.base_url = url.trim_end_matches('/').to_string();
        }
        client_config.requests_per_second =
            (config.github.requests_per_second > 0).then_some(config.github.requests_per_second);
        client_config.fetch_diffs = config.github.fetch_diffs;
        client_config.fetch_author_profiles = config.github.fetch_author_profiles;

        Ok(GitHubClient::new(
            config.github_token().as_deref(),
            client_config,
        )?)
    }

    /// Build the sync service over the configured cache and GitHub.
    pub(crate) async fn open_service(
        config: &Config,
        database_url: &str,
        options: SyncOptions,
        on_progress: Option<Arc<ProgressCallback>>,
    ) -> Result<GitHubService, Box<dyn std::error::Error>> {
        let store = open_store(database_url).await?;
        let mut builder = SyncOrchestrator::builder()
            .source(github_client(config)?)
            .store(store)
            .options(options);
        if let Some(callback) = on_progress {
            builder = builder.progress(callback);
        }
        Ok(SyncService::new(builder.build()?))
    }
}
