use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use uuid::Uuid;

use super::commits::{count_for_repository, latest_commit_date, oldest_commit_date};
use super::errors::Result;
use super::repositories::find_for_user;

/// Cache coverage of one tracked repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryCacheStats {
    pub id: Uuid,
    pub full_name: String,
    pub sync_enabled: bool,
    pub commit_count: u64,
    pub oldest_commit: Option<DateTime<Utc>>,
    pub latest_commit: Option<DateTime<Utc>>,
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// Cache coverage across all repositories of a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub repository_count: usize,
    pub commit_count: u64,
    /// Most recent successful sync of any repository.
    pub last_commit_sync: Option<DateTime<Utc>>,
    pub repositories: Vec<RepositoryCacheStats>,
}

pub async fn cache_stats(db: &DatabaseConnection, user_id: &str) -> Result<CacheStats> {
    let repos = find_for_user(db, user_id, false).await?;

    let mut stats = CacheStats {
        repository_count: repos.len(),
        ..CacheStats::default()
    };

    for repo in repos {
        let commit_count = count_for_repository(db, repo.id).await?;
        let (oldest_commit, latest_commit) = if commit_count > 0 {
            (
                oldest_commit_date(db, repo.id).await?,
                latest_commit_date(db, repo.id).await?,
            )
        } else {
            (None, None)
        };
        let last_synced_at = repo.last_synced_at.map(|t| t.with_timezone(&Utc));

        stats.commit_count += commit_count;
        stats.last_commit_sync = stats.last_commit_sync.max(last_synced_at);
        stats.repositories.push(RepositoryCacheStats {
            id: repo.id,
            full_name: repo.full_name(),
            sync_enabled: repo.sync_enabled,
            commit_count,
            oldest_commit,
            latest_commit,
            last_synced_at,
        });
    }

    Ok(stats)
}
