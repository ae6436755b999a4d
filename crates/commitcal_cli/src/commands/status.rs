//! Cache statistics.

use console::style;
use tabled::Tabled;

use commitcal::store::{CacheStats, RepositoryCacheStats};

use crate::commands::shared::{OutputFormat, format_time, open_store, print_json, print_table};

#[derive(Debug, Tabled)]
struct StatsRow {
    #[tabled(rename = "Repository")]
    repository: String,
    #[tabled(rename = "Sync")]
    sync: &'static str,
    #[tabled(rename = "Commits")]
    commits: u64,
    #[tabled(rename = "Oldest")]
    oldest: String,
    #[tabled(rename = "Latest")]
    latest: String,
    #[tabled(rename = "Last synced")]
    last_synced: String,
}

impl From<&RepositoryCacheStats> for StatsRow {
    fn from(stats: &RepositoryCacheStats) -> Self {
        Self {
            repository: stats.full_name.clone(),
            sync: if stats.sync_enabled { "on" } else { "off" },
            commits: stats.commit_count,
            oldest: format_time(stats.oldest_commit.as_ref()),
            latest: format_time(stats.latest_commit.as_ref()),
            last_synced: format_time(stats.last_synced_at.as_ref()),
        }
    }
}

fn print_stats(stats: &CacheStats) {
    print_table(stats.repositories.iter().map(StatsRow::from));
    println!(
        "{} repositories, {} cached commits, last sync {}",
        style(stats.repository_count).bold(),
        style(stats.commit_count).bold(),
        format_time(stats.last_commit_sync.as_ref()),
    );
}

pub(crate) async fn handle_status(
    output: OutputFormat,
    database_url: &str,
    user_id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(database_url).await?;
    let stats = store.cache_stats(user_id).await?;

    match output {
        OutputFormat::Table => print_stats(&stats),
        OutputFormat::Json => print_json(&stats)?,
    }
    Ok(())
}
