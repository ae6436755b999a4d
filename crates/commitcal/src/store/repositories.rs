use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    sea_query::{Expr, OnConflict},
};
use uuid::Uuid;

use crate::entity::repository::{ActiveModel, Column, Entity as Repository, Model};
use crate::entity::visibility::Visibility;
use crate::platform::RemoteRepository;

use super::errors::{Result, StoreError};

/// Metadata supplied when a user selects a repository for tracking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryInput {
    pub owner: String,
    pub name: String,
    pub description: Option<String>,
    pub language: Option<String>,
    pub stars: u32,
    pub forks: u32,
    pub visibility: Visibility,
    pub html_url: String,
}

impl RepositoryInput {
    /// Minimal input for a public GitHub repository.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        let owner = owner.into();
        let name = name.into();
        Self {
            html_url: format!("https://github.com/{owner}/{name}"),
            owner,
            name,
            description: None,
            language: None,
            stars: 0,
            forks: 0,
            visibility: Visibility::Public,
        }
    }
}

impl From<&RemoteRepository> for RepositoryInput {
    fn from(repo: &RemoteRepository) -> Self {
        Self {
            owner: repo.owner.clone(),
            name: repo.name.clone(),
            description: repo.description.clone(),
            language: repo.language.clone(),
            stars: repo.stars,
            forks: repo.forks,
            visibility: Visibility::from_private_flag(repo.is_private),
            html_url: repo.html_url.clone(),
        }
    }
}

fn clamp_count(n: u32) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

/// Conflict target is `(user_id, owner, name)`. Only metadata is refreshed;
/// `last_synced_at`, `sync_enabled` and `created_at` keep their stored values.
pub(crate) fn build_repository_upsert_on_conflict() -> OnConflict {
    OnConflict::columns([Column::UserId, Column::Owner, Column::Name])
        .update_columns([
            Column::Description,
            Column::Language,
            Column::Stars,
            Column::Forks,
            Column::Visibility,
            Column::HtmlUrl,
            Column::UpdatedAt,
        ])
        .to_owned()
}

/// Create or refresh a tracked repository.
pub async fn register(
    db: &DatabaseConnection,
    user_id: &str,
    input: &RepositoryInput,
) -> Result<Model> {
    if user_id.trim().is_empty() || input.owner.trim().is_empty() || input.name.trim().is_empty()
    {
        return Err(StoreError::InvalidInput {
            message: "user id, owner and name are required".to_string(),
        });
    }

    let now = Utc::now().fixed_offset();
    let model = ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id.to_string()),
        owner: Set(input.owner.clone()),
        name: Set(input.name.clone()),
        description: Set(input.description.clone()),
        language: Set(input.language.clone()),
        stars: Set(clamp_count(input.stars)),
        forks: Set(clamp_count(input.forks)),
        visibility: Set(input.visibility),
        html_url: Set(input.html_url.clone()),
        sync_enabled: Set(true),
        last_synced_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };

    Repository::insert(model)
        .on_conflict(build_repository_upsert_on_conflict())
        .exec_without_returning(db)
        .await?;

    find_by_natural_key(db, user_id, &input.owner, &input.name)
        .await?
        .ok_or_else(|| StoreError::not_found_by_key(user_id, &input.owner, &input.name))
}

pub async fn find_by_id(db: &DatabaseConnection, id: Uuid) -> Result<Option<Model>> {
    Repository::find_by_id(id)
        .one(db)
        .await
        .map_err(StoreError::from)
}

pub async fn find_by_natural_key(
    db: &DatabaseConnection,
    user_id: &str,
    owner: &str,
    name: &str,
) -> Result<Option<Model>> {
    Repository::find()
        .filter(Column::UserId.eq(user_id))
        .filter(Column::Owner.eq(owner))
        .filter(Column::Name.eq(name))
        .one(db)
        .await
        .map_err(StoreError::from)
}

/// Repositories of a user. With `enabled_only`, skips those excluded from sync.
pub async fn find_for_user(
    db: &DatabaseConnection,
    user_id: &str,
    enabled_only: bool,
) -> Result<Vec<Model>> {
    let mut query = Repository::find().filter(Column::UserId.eq(user_id));
    if enabled_only {
        query = query.filter(Column::SyncEnabled.eq(true));
    }
    query
        .order_by_asc(Column::Owner)
        .order_by_asc(Column::Name)
        .all(db)
        .await
        .map_err(StoreError::from)
}

/// Advance `last_synced_at` to `at`.
///
/// The update is conditional so the timestamp never moves backwards, even
/// when two syncs of the same repository finish out of order. Returns whether
/// the row changed.
pub async fn mark_synced(db: &DatabaseConnection, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
    let at = at.fixed_offset();
    let result = Repository::update_many()
        .col_expr(Column::LastSyncedAt, Expr::value(at))
        .col_expr(Column::UpdatedAt, Expr::value(at))
        .filter(Column::Id.eq(id))
        .filter(
            Condition::any()
                .add(Column::LastSyncedAt.is_null())
                .add(Column::LastSyncedAt.lt(at)),
        )
        .exec(db)
        .await?;
    Ok(result.rows_affected > 0)
}

pub async fn set_sync_enabled(db: &DatabaseConnection, id: Uuid, enabled: bool) -> Result<()> {
    let result = Repository::update_many()
        .col_expr(Column::SyncEnabled, Expr::value(enabled))
        .col_expr(Column::UpdatedAt, Expr::value(Utc::now().fixed_offset()))
        .filter(Column::Id.eq(id))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(StoreError::not_found_by_id(id));
    }
    Ok(())
}

/// Delete a repository. Its commits are removed by the foreign key cascade.
pub async fn remove(db: &DatabaseConnection, id: Uuid) -> Result<()> {
    let result = Repository::delete_by_id(id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(StoreError::not_found_by_id(id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, QueryTrait};

    use super::*;

    fn exec(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            rows_affected,
            last_insert_id: 0,
        }
    }

    fn stored(owner: &str, name: &str) -> Model {
        let now = Utc::now().fixed_offset();
        Model {
            id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
            owner: owner.to_string(),
            name: name.to_string(),
            description: None,
            language: None,
            stars: 0,
            forks: 0,
            visibility: Visibility::Public,
            html_url: String::new(),
            sync_enabled: true,
            last_synced_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn repository_upsert_leaves_sync_state_alone() {
        let sql = Repository::insert(ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set("u".to_string()),
            owner: Set("a".to_string()),
            name: Set("x".to_string()),
            ..Default::default()
        })
        .on_conflict(build_repository_upsert_on_conflict())
        .build(DatabaseBackend::Sqlite)
        .to_string();

        assert!(sql.contains(r#"ON CONFLICT ("user_id", "owner", "name") DO UPDATE"#));
        let update_clause = sql.split("DO UPDATE").nth(1).expect("update clause");
        assert!(!update_clause.contains("last_synced_at"));
        assert!(!update_clause.contains("sync_enabled"));
        assert!(update_clause.contains(r#""stars" = "excluded"."stars""#));
    }

    #[test]
    fn input_from_remote_maps_visibility() {
        let remote = RemoteRepository {
            owner: "a".to_string(),
            name: "x".to_string(),
            description: Some("d".to_string()),
            language: Some("Rust".to_string()),
            stars: 5,
            forks: 1,
            is_private: true,
            html_url: "https://github.com/a/x".to_string(),
        };
        let input = RepositoryInput::from(&remote);
        assert_eq!(input.visibility, Visibility::Private);
        assert_eq!(input.stars, 5);
        assert_eq!(RepositoryInput::new("a", "x").html_url, "https://github.com/a/x");
    }

    #[test]
    fn counts_saturate_at_i32_max() {
        assert_eq!(clamp_count(u32::MAX), i32::MAX);
        assert_eq!(clamp_count(7), 7);
    }

    #[tokio::test]
    async fn register_rejects_blank_names() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let err = register(&db, "user-1", &RepositoryInput::new("", "x"))
            .await
            .expect_err("blank owner");
        assert!(matches!(err, StoreError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn register_upserts_then_reads_back() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_exec_results([exec(1)])
            .append_query_results([vec![stored("a", "x")]])
            .into_connection();

        let model = register(&db, "user-1", &RepositoryInput::new("a", "x"))
            .await
            .expect("register should succeed");
        assert_eq!(model.full_name(), "a/x");
    }

    #[tokio::test]
    async fn mark_synced_reports_whether_timestamp_advanced() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_exec_results([exec(1), exec(0)])
            .into_connection();

        let id = Uuid::new_v4();
        assert!(mark_synced(&db, id, Utc::now()).await.expect("update"));
        assert!(!mark_synced(&db, id, Utc::now()).await.expect("update"));

        let log = db.into_transaction_log();
        let sql = format!("{:?}", log[0]);
        assert!(sql.contains("last_synced_at"), "unexpected statement: {sql}");
        assert!(sql.contains("IS NULL"), "missing monotonic guard: {sql}");
    }

    #[tokio::test]
    async fn set_sync_enabled_and_remove_report_missing_rows() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_exec_results([exec(0), exec(0)])
            .into_connection();

        let id = Uuid::new_v4();
        let err = set_sync_enabled(&db, id, false)
            .await
            .expect_err("missing row");
        assert!(matches!(err, StoreError::NotFound { .. }));
        let err = remove(&db, id).await.expect_err("missing row");
        assert!(err.to_string().contains(&id.to_string()));
    }
}
