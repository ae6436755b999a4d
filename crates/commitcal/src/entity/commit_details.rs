//! Typed views over the JSON enrichment columns of the `commits` table.
//!
//! The `author_details`, `diff` and `actions` columns hold JSON so they can be
//! refreshed on re-sync without a schema change. These structs give type-safe
//! access to them.
//!
//! ```ignore
//! use commitcal::entity::commit_details::DiffFileSummary;
//!
//! let files: Vec<DiffFileSummary> = serde_json::from_value(commit.diff.clone())?;
//! ```

use serde::{Deserialize, Serialize};

/// Avatar shown when the remote has no profile picture for a committer.
pub const DEFAULT_AVATAR_URL: &str = "https://github.com/identicons/default.png";

/// Snapshot of the commit author's public profile at sync time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorProfile {
    pub login: Option<String>,
    pub name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub blog: Option<String>,
    pub company: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: Option<String>,
}

impl AuthorProfile {
    /// Placeholder used when the profile lookup fails or the commit has no
    /// linked account. Only the name from the commit itself is known.
    pub fn fallback(author_name: &str, login: Option<&str>) -> Self {
        Self {
            login: login.map(str::to_string),
            name: Some(author_name.to_string()),
            ..Self::default()
        }
    }
}

/// Per-file line counts derived from a unified diff.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffFileSummary {
    pub filename: String,
    pub additions: u32,
    pub deletions: u32,
}

/// A named link rendered next to a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitAction {
    pub name: String,
    pub url: String,
}

impl CommitAction {
    /// The standard link set for a commit with the given origin URL.
    pub fn defaults_for(html_url: &str) -> Vec<Self> {
        if html_url.is_empty() {
            return Vec::new();
        }
        vec![
            Self {
                name: "View".to_string(),
                url: html_url.to_string(),
            },
            Self {
                name: "GitHub".to_string(),
                url: html_url.to_string(),
            },
        ]
    }
}
