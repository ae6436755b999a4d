//! Commit entity - one cached commit of a tracked repository.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::entity::commit_details::{AuthorProfile, CommitAction, DiffFileSummary};
use crate::entity::commit_status::CommitStatus;

/// A cached commit. `(repository_id, sha)` is the natural key.
///
/// `author_date`, `author_name` and `message` are written once on first insert.
/// The remaining non-key columns are enrichment and are replaced on re-sync.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "commits")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    // ─── Natural Key ─────────────────────────────────────────────────────────
    pub repository_id: Uuid,
    pub sha: String,

    // ─── Immutable History ───────────────────────────────────────────────────
    #[sea_orm(column_type = "Text")]
    pub message: String,
    pub author_name: String,
    /// Authoring timestamp, stored in UTC. All range queries filter on it.
    pub author_date: DateTimeWithTimeZone,

    // ─── Enrichment ──────────────────────────────────────────────────────────
    pub status: CommitStatus,
    #[sea_orm(column_type = "Text")]
    pub html_url: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub avatar_url: Option<String>,
    /// [`AuthorProfile`] snapshot as JSON.
    #[sea_orm(column_type = "Json", nullable)]
    pub author_details: Option<Json>,
    /// List of [`DiffFileSummary`] as JSON.
    #[sea_orm(column_type = "Json")]
    pub diff: Json,
    /// List of [`CommitAction`] as JSON.
    #[sea_orm(column_type = "Json")]
    pub actions: Json,

    // ─── Tracking ────────────────────────────────────────────────────────────
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::repository::Entity",
        from = "Column::RepositoryId",
        to = "super::repository::Column::Id",
        on_delete = "Cascade"
    )]
    Repository,
}

impl Related<super::repository::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Repository.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Decode the author profile snapshot, if one was stored.
    pub fn author_profile(&self) -> Option<AuthorProfile> {
        self.author_details
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Decode the diff summary. Undecodable data reads as an empty summary.
    pub fn diff_summary(&self) -> Vec<DiffFileSummary> {
        serde_json::from_value(self.diff.clone()).unwrap_or_default()
    }

    pub fn action_links(&self) -> Vec<CommitAction> {
        serde_json::from_value(self.actions.clone()).unwrap_or_default()
    }

    /// First line of the commit message.
    pub fn summary_line(&self) -> &str {
        self.message.lines().next().unwrap_or_default()
    }
}
