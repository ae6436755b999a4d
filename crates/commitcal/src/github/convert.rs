//! Conversion from GitHub payloads to platform types.

use crate::entity::commit_details::{AuthorProfile, DiffFileSummary};
use crate::platform::{RemoteCommit, RemoteRepository};

use super::error::GitHubError;
use super::types::{GitHubCommitItem, GitHubRepoItem, GitHubUserProfile};

/// Convert a listed commit, before enrichment.
///
/// The author date falls back to the committer date; a commit carrying
/// neither is rejected.
pub fn to_remote_commit(item: GitHubCommitItem) -> Result<RemoteCommit, GitHubError> {
    if item.sha.trim().is_empty() {
        return Err(GitHubError::Decode {
            context: "commit".to_string(),
            message: "empty sha".to_string(),
        });
    }

    let signature = item
        .commit
        .author
        .as_ref()
        .filter(|s| s.date.is_some())
        .or(item.commit.committer.as_ref());
    let author_date = signature
        .and_then(|s| s.date)
        .ok_or_else(|| GitHubError::Decode {
            context: format!("commit {}", item.sha),
            message: "missing author date".to_string(),
        })?;
    let author_name = signature
        .and_then(|s| s.name.clone())
        .or_else(|| item.author.as_ref().map(|a| a.login.clone()))
        .unwrap_or_else(|| "Unknown".to_string());

    let avatar_url = item
        .author
        .as_ref()
        .and_then(|a| a.avatar_url.clone())
        .or_else(|| item.committer.as_ref().and_then(|c| c.avatar_url.clone()));

    Ok(RemoteCommit {
        author_login: item.author.as_ref().map(|a| a.login.clone()),
        verified: item
            .commit
            .verification
            .as_ref()
            .is_some_and(|v| v.verified),
        sha: item.sha,
        message: item.commit.message,
        author_name,
        author_date,
        html_url: item.html_url,
        avatar_url,
        author_profile: None,
        diff: None,
    })
}

pub fn to_author_profile(user: GitHubUserProfile) -> AuthorProfile {
    AuthorProfile {
        login: Some(user.login),
        name: user.name,
        bio: user.bio,
        location: user.location,
        blog: user.blog.filter(|b| !b.is_empty()),
        company: user.company,
        avatar_url: user.avatar_url,
        created_at: user.created_at.map(|t| t.to_rfc3339()),
    }
}

pub fn to_remote_repository(repo: GitHubRepoItem) -> RemoteRepository {
    RemoteRepository {
        owner: repo.owner.login,
        name: repo.name,
        description: repo.description,
        language: repo.language,
        stars: repo.stargazers_count,
        forks: repo.forks_count,
        is_private: repo.private,
        html_url: repo.html_url,
    }
}

/// Summarize a unified diff as per-file line counts.
///
/// Files are split on `diff --git a/<old> b/<new>` headers and named by their
/// new path. `+++`/`---` header lines are not counted.
pub fn parse_diff_summary(diff: &str) -> Vec<DiffFileSummary> {
    let mut files: Vec<DiffFileSummary> = Vec::new();

    for line in diff.lines() {
        if let Some(header) = line.strip_prefix("diff --git ") {
            let filename = header
                .rsplit_once(" b/")
                .map(|(_, new)| new)
                .unwrap_or(header)
                .to_string();
            files.push(DiffFileSummary {
                filename,
                additions: 0,
                deletions: 0,
            });
            continue;
        }

        let Some(current) = files.last_mut() else {
            continue;
        };
        if line.starts_with("+++") || line.starts_with("---") {
            continue;
        }
        if line.starts_with('+') {
            current.additions += 1;
        } else if line.starts_with('-') {
            current.deletions += 1;
        }
    }

    files
}
