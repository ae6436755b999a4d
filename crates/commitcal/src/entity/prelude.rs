//! Common re-exports for convenient entity usage.

pub use super::commit::{
    ActiveModel as CommitActiveModel, Column as CommitColumn, Entity as Commit,
    Model as CommitModel,
};
pub use super::commit_details::{AuthorProfile, CommitAction, DiffFileSummary};
pub use super::commit_status::CommitStatus;
pub use super::repository::{
    ActiveModel as RepositoryActiveModel, Column as RepositoryColumn, Entity as Repository,
    Model as RepositoryModel,
};
pub use super::visibility::Visibility;
