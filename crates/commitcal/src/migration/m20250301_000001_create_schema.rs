//! Initial migration to create the commitcal database schema.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        self.create_repositories(manager).await?;
        self.create_commits(manager).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Commits::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Repositories::Table).to_owned())
            .await?;
        Ok(())
    }
}

impl Migration {
    async fn create_repositories(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Repositories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Repositories::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Repositories::UserId).string().not_null())
                    // Naming
                    .col(ColumnDef::new(Repositories::Owner).string().not_null())
                    .col(ColumnDef::new(Repositories::Name).string().not_null())
                    // Metadata
                    .col(ColumnDef::new(Repositories::Description).text().null())
                    .col(ColumnDef::new(Repositories::Language).string().null())
                    .col(
                        ColumnDef::new(Repositories::Stars)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Repositories::Forks)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Repositories::Visibility)
                            .string()
                            .not_null()
                            .default("public"),
                    )
                    .col(ColumnDef::new(Repositories::HtmlUrl).text().not_null())
                    // Tracking
                    .col(
                        ColumnDef::new(Repositories::SyncEnabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Repositories::LastSyncedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Repositories::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Repositories::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_repositories_user_owner_name")
                    .table(Repositories::Table)
                    .col(Repositories::UserId)
                    .col(Repositories::Owner)
                    .col(Repositories::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_repositories_last_synced")
                    .table(Repositories::Table)
                    .col(Repositories::LastSyncedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn create_commits(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Commits::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Commits::Id).uuid().not_null().primary_key())
                    // Natural key
                    .col(ColumnDef::new(Commits::RepositoryId).uuid().not_null())
                    .col(ColumnDef::new(Commits::Sha).string().not_null())
                    // History
                    .col(ColumnDef::new(Commits::Message).text().not_null())
                    .col(ColumnDef::new(Commits::AuthorName).string().not_null())
                    .col(
                        ColumnDef::new(Commits::AuthorDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    // Enrichment
                    .col(
                        ColumnDef::new(Commits::Status)
                            .string()
                            .not_null()
                            .default("Unverified"),
                    )
                    .col(ColumnDef::new(Commits::HtmlUrl).text().not_null())
                    .col(ColumnDef::new(Commits::AvatarUrl).text().null())
                    .col(ColumnDef::new(Commits::AuthorDetails).json().null())
                    .col(
                        ColumnDef::new(Commits::Diff)
                            .json()
                            .not_null()
                            .default(Expr::cust("'[]'")),
                    )
                    .col(
                        ColumnDef::new(Commits::Actions)
                            .json()
                            .not_null()
                            .default(Expr::cust("'[]'")),
                    )
                    // Tracking
                    .col(
                        ColumnDef::new(Commits::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Commits::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_commits_repository")
                            .from(Commits::Table, Commits::RepositoryId)
                            .to(Repositories::Table, Repositories::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Conflict target for commit upserts
        manager
            .create_index(
                Index::create()
                    .name("idx_commits_repository_sha")
                    .table(Commits::Table)
                    .col(Commits::RepositoryId)
                    .col(Commits::Sha)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Range queries and oldest/latest lookups
        manager
            .create_index(
                Index::create()
                    .name("idx_commits_repository_date")
                    .table(Commits::Table)
                    .col(Commits::RepositoryId)
                    .col((Commits::AuthorDate, IndexOrder::Desc))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Repositories {
    Table,
    Id,
    UserId,
    Owner,
    Name,
    Description,
    Language,
    Stars,
    Forks,
    Visibility,
    HtmlUrl,
    SyncEnabled,
    LastSyncedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Commits {
    Table,
    Id,
    RepositoryId,
    Sha,
    Message,
    AuthorName,
    AuthorDate,
    Status,
    HtmlUrl,
    AvatarUrl,
    AuthorDetails,
    Diff,
    Actions,
    CreatedAt,
    UpdatedAt,
}
