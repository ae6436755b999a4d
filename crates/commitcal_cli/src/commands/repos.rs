//! Tracked repository management.

use console::style;
use serde::Serialize;
use tabled::Tabled;
use tokio_util::sync::CancellationToken;

use commitcal::entity::repository::Model as RepositoryModel;
use commitcal::store::{CommitStore, RepositoryInput};

use crate::ReposAction;
use crate::commands::shared::{
    OutputFormat, format_time, open_store, parse_full_name, print_json, print_table,
};
use crate::config::Config;

/// One row of `repos list`.
#[derive(Debug, Serialize, Tabled)]
struct RepositoryRow {
    #[tabled(rename = "Repository")]
    repository: String,
    #[tabled(rename = "Sync")]
    sync: &'static str,
    #[tabled(rename = "Visibility")]
    visibility: String,
    #[tabled(rename = "Language")]
    language: String,
    #[tabled(rename = "Stars")]
    stars: i32,
    #[tabled(rename = "Last synced")]
    last_synced: String,
}

impl From<&RepositoryModel> for RepositoryRow {
    fn from(repo: &RepositoryModel) -> Self {
        Self {
            repository: repo.full_name(),
            sync: if repo.sync_enabled { "on" } else { "off" },
            visibility: repo.visibility.to_string(),
            language: repo.language.clone().unwrap_or_else(|| "-".to_string()),
            stars: repo.stars,
            last_synced: format_time(repo.last_synced_at.as_ref()),
        }
    }
}

pub(crate) async fn handle_repos(
    action: ReposAction,
    config: &Config,
    database_url: &str,
    user_id: &str,
    cancel: &CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ReposAction::Add { repos, disabled } => {
            let store = open_store(database_url).await?;
            for full_name in repos {
                let (owner, name) = parse_full_name(&full_name)?;
                let repo = store
                    .register_repository(user_id, &RepositoryInput::new(owner, name))
                    .await?;
                if disabled {
                    store.set_sync_enabled(repo.id, false).await?;
                }
                println!("{} Tracking {}", style("✓").green(), repo.full_name());
            }
        }
        #[cfg(feature = "github")]
        ReposAction::Discover => {
            let service = crate::commands::shared::open_service(
                config,
                database_url,
                config.sync.to_options(),
                None,
            )
            .await?;
            let registered = service.discover_repositories(user_id, cancel).await?;
            println!(
                "{} Registered {} repositories",
                style("✓").green(),
                registered.len()
            );
        }
        ReposAction::List { output } => {
            let store = open_store(database_url).await?;
            let repos = store.all_repositories(user_id).await?;
            let rows: Vec<RepositoryRow> = repos.iter().map(RepositoryRow::from).collect();
            match output {
                OutputFormat::Table if rows.is_empty() => {
                    println!("No repositories tracked. Add one with: commitcal repos add owner/name");
                }
                OutputFormat::Table => print_table(rows),
                OutputFormat::Json => print_json(&rows)?,
            }
        }
        ReposAction::Enable { repo } => {
            let store = open_store(database_url).await?;
            let found = find(&store, user_id, &repo).await?;
            store.set_sync_enabled(found.id, true).await?;
            println!("{} Sync enabled for {}", style("✓").green(), found.full_name());
        }
        ReposAction::Disable { repo } => {
            let store = open_store(database_url).await?;
            let found = find(&store, user_id, &repo).await?;
            store.set_sync_enabled(found.id, false).await?;
            println!("{} Sync disabled for {}", style("·").dim(), found.full_name());
        }
        ReposAction::Remove { repo } => {
            let store = open_store(database_url).await?;
            let found = find(&store, user_id, &repo).await?;
            store.remove_repository(found.id).await?;
            println!(
                "{} Removed {} and its cached commits",
                style("✓").green(),
                found.full_name()
            );
        }
    }

    #[cfg(not(feature = "github"))]
    let _ = (config, cancel);

    Ok(())
}

/// Look up a tracked repository by `owner/name`.
async fn find(
    store: &CommitStore,
    user_id: &str,
    full_name: &str,
) -> Result<RepositoryModel, Box<dyn std::error::Error>> {
    let (owner, name) = parse_full_name(full_name)?;
    store
        .all_repositories(user_id)
        .await?
        .into_iter()
        .find(|r| r.owner == owner && r.name == name)
        .ok_or_else(|| {
            format!(
                "Repository '{}' is not tracked. Add it first with: commitcal repos add {}",
                full_name, full_name
            )
            .into()
        })
}
