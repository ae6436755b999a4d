//! Repository entity - a remote repository a user has selected for tracking.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::entity::visibility::Visibility;

/// A tracked repository, unique per `(user_id, owner, name)`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "repositories")]
pub struct Model {
    /// Internal UUID primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    // ─── Ownership ───────────────────────────────────────────────────────────
    /// The user who connected this repository.
    pub user_id: String,

    // ─── Naming ──────────────────────────────────────────────────────────────
    /// Owner login (user or organization).
    pub owner: String,
    /// Repository name (URL-safe slug).
    pub name: String,

    // ─── Metadata ────────────────────────────────────────────────────────────
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    /// Primary programming language.
    pub language: Option<String>,
    #[sea_orm(default_value = 0)]
    pub stars: i32,
    #[sea_orm(default_value = 0)]
    pub forks: i32,
    pub visibility: Visibility,
    /// Web URL of the repository.
    pub html_url: String,

    // ─── Tracking ────────────────────────────────────────────────────────────
    /// Whether batch syncs include this repository.
    #[sea_orm(default_value = true)]
    pub sync_enabled: bool,
    /// When commits were last synced successfully. Never moves backwards and
    /// is never written by a failed sync.
    pub last_synced_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::commit::Entity")]
    Commits,
}

impl Related<super::commit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Commits.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Compute the full name (owner/name).
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_full_name() {
        let now = Utc::now().fixed_offset();
        let model = Model {
            id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
            owner: "octocat".to_string(),
            name: "hello-world".to_string(),
            description: None,
            language: Some("Rust".to_string()),
            stars: 3,
            forks: 1,
            visibility: Visibility::Public,
            html_url: "https://github.com/octocat/hello-world".to_string(),
            sync_enabled: true,
            last_synced_at: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(model.full_name(), "octocat/hello-world");
    }
}
