//! GitHub commit source.
//!
//! [`GitHubClient`] implements [`crate::platform::CommitSource`] over the REST
//! API: commit listing pages, per-commit diffs and author profiles, and the
//! authenticated user's repository list.
//!
//! # Module Structure
//!
//! - [`error`] - Error types for GitHub API operations
//! - [`types`] - Wire payloads
//! - [`client`] - The HTTP client and its `CommitSource` implementation
//! - [`convert`] - Payload to platform type conversion and diff parsing
//!
//! ```ignore
//! use commitcal::github::{GitHubClient, GitHubClientConfig};
//!
//! let client = GitHubClient::new(Some(&token), GitHubClientConfig::default())?;
//! ```

mod client;
mod convert;
mod error;
mod types;

pub use client::{GITHUB_API_URL, GitHubClient, GitHubClientConfig};
pub use convert::parse_diff_summary;
pub use error::GitHubError;
