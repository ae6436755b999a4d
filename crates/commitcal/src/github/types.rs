//! GitHub REST payloads.
//!
//! Only the fields the fetcher reads are declared; serde ignores the rest.
//! Required fields are not `Option`, so a payload missing them fails to
//! decode instead of reaching the store half-filled.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// One entry of `GET /repos/{owner}/{repo}/commits`.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubCommitItem {
    pub sha: String,
    #[serde(default)]
    pub html_url: String,
    pub commit: GitHubCommitPayload,
    /// Linked account of the author; `null` when the email matches no account.
    #[serde(default)]
    pub author: Option<GitHubAccount>,
    #[serde(default)]
    pub committer: Option<GitHubAccount>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubCommitPayload {
    pub message: String,
    #[serde(default)]
    pub author: Option<GitSignature>,
    #[serde(default)]
    pub committer: Option<GitSignature>,
    #[serde(default)]
    pub tree: Option<GitTreeRef>,
    #[serde(default)]
    pub verification: Option<GitVerification>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitSignature {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitTreeRef {
    pub sha: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitVerification {
    pub verified: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubAccount {
    pub login: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// `GET /users/{login}`.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubUserProfile {
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub blog: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// One entry of `GET /user/repos`.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubRepoItem {
    pub name: String,
    pub owner: GitHubAccount,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub stargazers_count: u32,
    #[serde(default)]
    pub forks_count: u32,
    #[serde(default)]
    pub private: bool,
    pub html_url: String,
}

/// Error body GitHub sends with non-success statuses.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubErrorBody {
    pub message: String,
}
