//! SeaORM entity definitions for the commitcal database schema.

pub mod commit;
pub mod commit_details;
pub mod commit_status;
pub mod prelude;
pub mod repository;
pub mod visibility;
