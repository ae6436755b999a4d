use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, sea_query::OnConflict,
};
use serde::Serialize;
use uuid::Uuid;

use crate::entity::commit::{ActiveModel, Column, Entity as Commit, Model};
use crate::entity::commit_details::{AuthorProfile, CommitAction};
use crate::platform::RemoteCommit;

use super::errors::{Result, StoreError};

/// Default number of retry attempts for a commit upsert chunk.
pub const DEFAULT_UPSERT_RETRIES: u32 = 3;

/// Default initial backoff delay in milliseconds (doubles each retry).
pub const DEFAULT_UPSERT_BACKOFF_MS: u64 = 100;

/// Rows per INSERT statement. Keeps bind parameters well under SQLite's limit.
const UPSERT_CHUNK_SIZE: usize = 250;

/// Rows fetched per round-trip by [`query_range`].
pub(crate) const QUERY_PAGE_SIZE: u64 = 1000;

/// Repository ids per `IN (...)` list.
const REPO_ID_CHUNK_SIZE: usize = 100;

/// Which enrichment columns an upsert refreshes on conflict.
///
/// A commit whose diff or author profile could not be fetched leaves the
/// stored value in place instead of overwriting it with a placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Enrichment {
    pub diff: bool,
    pub profile: bool,
}

impl Enrichment {
    /// Refresh every enrichment column.
    pub const FULL: Self = Self {
        diff: true,
        profile: true,
    };

    pub fn of(commit: &RemoteCommit) -> Self {
        Self {
            diff: commit.diff.is_some(),
            profile: commit.author_profile.is_some(),
        }
    }
}

/// Outcome of writing one batch of commits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    /// Distinct commits in the batch after de-duplicating by sha.
    pub unique: usize,
    /// Rows inserted or updated.
    pub stored: u64,
}

// ─── Conversion ──────────────────────────────────────────────────────────────

fn to_json<T: Serialize + ?Sized>(field: &str, value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| StoreError::InvalidInput {
        message: format!("cannot encode {field}: {e}"),
    })
}

/// Build the row for a fetched commit. Timestamps are stored as UTC.
pub(crate) fn to_active_model(
    repository_id: Uuid,
    commit: &RemoteCommit,
    now: DateTime<Utc>,
) -> Result<ActiveModel> {
    if commit.sha.trim().is_empty() {
        return Err(StoreError::InvalidInput {
            message: "commit sha is empty".to_string(),
        });
    }

    let profile = commit.author_profile.clone().unwrap_or_else(|| {
        AuthorProfile::fallback(&commit.author_name, commit.author_login.as_deref())
    });
    let now = now.fixed_offset();

    Ok(ActiveModel {
        id: Set(Uuid::new_v4()),
        repository_id: Set(repository_id),
        sha: Set(commit.sha.clone()),
        message: Set(commit.message.clone()),
        author_name: Set(commit.author_name.clone()),
        author_date: Set(commit.author_date.fixed_offset()),
        status: Set(commit.status()),
        html_url: Set(commit.html_url.clone()),
        avatar_url: Set(Some(commit.avatar_or_default())),
        author_details: Set(Some(to_json("author_details", &profile)?)),
        diff: Set(to_json("diff", commit.diff.as_deref().unwrap_or_default())?),
        actions: Set(to_json(
            "actions",
            &CommitAction::defaults_for(&commit.html_url),
        )?),
        created_at: Set(now),
        updated_at: Set(now),
    })
}

/// Keep the last occurrence of each sha, preserving the original order.
fn dedupe_by_sha(commits: &[RemoteCommit]) -> Vec<&RemoteCommit> {
    let mut seen = HashSet::new();
    let mut unique: Vec<&RemoteCommit> = commits
        .iter()
        .rev()
        .filter(|c| seen.insert(c.sha.as_str()))
        .collect();
    unique.reverse();
    unique
}

// ─── Writes ──────────────────────────────────────────────────────────────────

/// Build the ON CONFLICT clause for commit upserts.
///
/// The conflict target is `(repository_id, sha)`. Enrichment columns take the
/// incoming value when `enrichment` says it was fetched; `author_date`,
/// `author_name`, `message`, `id` and `created_at` keep the value from the
/// first insert.
pub(crate) fn build_commit_upsert_on_conflict(enrichment: Enrichment) -> OnConflict {
    let mut columns = vec![
        Column::Status,
        Column::HtmlUrl,
        Column::AvatarUrl,
        Column::Actions,
        Column::UpdatedAt,
    ];
    if enrichment.profile {
        columns.push(Column::AuthorDetails);
    }
    if enrichment.diff {
        columns.push(Column::Diff);
    }

    OnConflict::columns([Column::RepositoryId, Column::Sha])
        .update_columns(columns)
        .to_owned()
}

async fn upsert_chunk(
    db: &DatabaseConnection,
    models: Vec<ActiveModel>,
    enrichment: Enrichment,
) -> Result<u64> {
    if models.is_empty() {
        return Ok(0);
    }

    Commit::insert_many(models)
        .on_conflict(build_commit_upsert_on_conflict(enrichment))
        .exec_without_returning(db)
        .await
        .map_err(StoreError::from)
}

/// Upsert one chunk, retrying transient database errors with doubling backoff.
pub async fn bulk_upsert_with_retry(
    db: &DatabaseConnection,
    models: Vec<ActiveModel>,
    enrichment: Enrichment,
    max_retries: u32,
    initial_backoff_ms: u64,
) -> Result<u64> {
    if models.is_empty() {
        return Ok(0);
    }

    let mut backoff_ms = initial_backoff_ms;
    let mut attempt = 0;
    loop {
        match upsert_chunk(db, models.clone(), enrichment).await {
            Ok(count) => return Ok(count),
            Err(e) if e.is_retryable() && attempt < max_retries => {
                attempt += 1;
                tracing::warn!(
                    attempt,
                    max_retries,
                    backoff_ms,
                    error = %e,
                    "Commit upsert failed, retrying..."
                );
                tokio::time::sleep(std::time::Duration::from_millis(backoff_ms)).await;
                backoff_ms = backoff_ms.saturating_mul(2);
            }
            Err(e) => return Err(e),
        }
    }
}

/// Store a batch of fetched commits for one repository.
///
/// Duplicate shas inside the batch collapse to their last occurrence. Commits
/// are grouped by the enrichment they carry so a missing diff or profile never
/// replaces a stored one. Each chunk is written atomically; a failure leaves
/// earlier chunks committed.
pub async fn upsert_commits(
    db: &DatabaseConnection,
    repository_id: Uuid,
    commits: &[RemoteCommit],
    max_retries: u32,
    initial_backoff_ms: u64,
) -> Result<UpsertSummary> {
    let unique = dedupe_by_sha(commits);
    if unique.is_empty() {
        return Ok(UpsertSummary::default());
    }

    let now = Utc::now();
    let mut groups: Vec<(Enrichment, Vec<ActiveModel>)> = Vec::new();
    for commit in &unique {
        let enrichment = Enrichment::of(commit);
        let model = to_active_model(repository_id, commit, now)?;
        match groups.iter_mut().find(|(e, _)| *e == enrichment) {
            Some((_, models)) => models.push(model),
            None => groups.push((enrichment, vec![model])),
        }
    }

    let mut stored = 0u64;
    for (enrichment, models) in groups {
        for chunk in models.chunks(UPSERT_CHUNK_SIZE) {
            stored += bulk_upsert_with_retry(
                db,
                chunk.to_vec(),
                enrichment,
                max_retries,
                initial_backoff_ms,
            )
            .await?;
        }
    }

    tracing::debug!(
        %repository_id,
        received = commits.len(),
        unique = unique.len(),
        stored,
        "Stored commits"
    );

    Ok(UpsertSummary {
        unique: unique.len(),
        stored,
    })
}

// ─── Reads ───────────────────────────────────────────────────────────────────

/// All cached commits of the given repositories authored within `[start, end]`.
///
/// Reads in pages of [`QUERY_PAGE_SIZE`] rows until a short page, then re-checks
/// every row's date in memory. Results are unique per `(repository_id, sha)`
/// and sorted newest first.
pub async fn query_range(
    db: &DatabaseConnection,
    repository_ids: &[Uuid],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<Model>> {
    if repository_ids.is_empty() || start > end {
        return Ok(Vec::new());
    }

    let mut seen: HashSet<(Uuid, String)> = HashSet::new();
    let mut commits = Vec::new();

    for ids in repository_ids.chunks(REPO_ID_CHUNK_SIZE) {
        let mut offset = 0u64;
        loop {
            let page = Commit::find()
                .filter(Column::RepositoryId.is_in(ids.iter().copied()))
                .filter(Column::AuthorDate.gte(start.fixed_offset()))
                .filter(Column::AuthorDate.lte(end.fixed_offset()))
                .order_by_desc(Column::AuthorDate)
                .order_by_asc(Column::Id)
                .offset(offset)
                .limit(QUERY_PAGE_SIZE)
                .all(db)
                .await?;

            let fetched = page.len() as u64;
            for model in page {
                let at = model.author_date.with_timezone(&Utc);
                if at < start || at > end {
                    continue;
                }
                if seen.insert((model.repository_id, model.sha.clone())) {
                    commits.push(model);
                }
            }

            if fetched < QUERY_PAGE_SIZE {
                break;
            }
            offset += fetched;
        }
    }

    sort_newest_first(&mut commits);
    Ok(commits)
}

/// Order commits newest first, ties broken by sha.
pub(crate) fn sort_newest_first(commits: &mut [Model]) {
    commits.sort_by(|a, b| {
        b.author_date
            .cmp(&a.author_date)
            .then_with(|| a.sha.cmp(&b.sha))
    });
}

/// Author date of the oldest cached commit of a repository.
pub async fn oldest_commit_date(
    db: &DatabaseConnection,
    repository_id: Uuid,
) -> Result<Option<DateTime<Utc>>> {
    let oldest = Commit::find()
        .filter(Column::RepositoryId.eq(repository_id))
        .order_by_asc(Column::AuthorDate)
        .one(db)
        .await?;
    Ok(oldest.map(|m| m.author_date.with_timezone(&Utc)))
}

/// Author date of the newest cached commit of a repository.
pub async fn latest_commit_date(
    db: &DatabaseConnection,
    repository_id: Uuid,
) -> Result<Option<DateTime<Utc>>> {
    let latest = Commit::find()
        .filter(Column::RepositoryId.eq(repository_id))
        .order_by_desc(Column::AuthorDate)
        .one(db)
        .await?;
    Ok(latest.map(|m| m.author_date.with_timezone(&Utc)))
}

pub async fn count_for_repository(db: &DatabaseConnection, repository_id: Uuid) -> Result<u64> {
    Commit::find()
        .filter(Column::RepositoryId.eq(repository_id))
        .count(db)
        .await
        .map_err(StoreError::from)
}
