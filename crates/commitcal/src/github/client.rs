//! GitHub commit source over the REST API.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::convert::{
    parse_diff_summary, to_author_profile, to_remote_commit, to_remote_repository,
};
use super::error::GitHubError;
use super::types::{GitHubCommitItem, GitHubErrorBody, GitHubRepoItem, GitHubUserProfile};
use crate::entity::commit_details::AuthorProfile;
use crate::http::reqwest_transport::ReqwestTransport;
use crate::http::{HttpHeaders, HttpRequest, HttpResponse, HttpTransport, header_get};
use crate::platform::{
    self, ApiRateLimiter, CommitSource, PageRequest, PlatformError, RateLimitInfo, RemoteCommit,
    RemoteRepository, RepoRef, rate_limits,
};

/// Public GitHub API root.
pub const GITHUB_API_URL: &str = "https://api.github.com";

const ACCEPT_JSON: &str = "application/vnd.github+json";
const ACCEPT_DIFF: &str = "application/vnd.github.v3.diff";
const API_VERSION: &str = "2022-11-28";

/// Settings for [`GitHubClient`].
#[derive(Debug, Clone)]
pub struct GitHubClientConfig {
    /// API root. Override for GitHub Enterprise or tests.
    pub base_url: String,
    pub timeout: StdDuration,
    /// Fetch each commit's diff to build the per-file summary.
    pub fetch_diffs: bool,
    /// Fetch the author's public profile for each distinct login.
    pub fetch_author_profiles: bool,
    /// Proactive request pacing. `None` disables the limiter.
    pub requests_per_second: Option<u32>,
}

impl Default for GitHubClientConfig {
    fn default() -> Self {
        Self {
            base_url: GITHUB_API_URL.to_string(),
            timeout: StdDuration::from_secs(30),
            fetch_diffs: true,
            fetch_author_profiles: true,
            requests_per_second: Some(rate_limits::GITHUB_DEFAULT_RPS),
        }
    }
}

/// GitHub API client implementing [`CommitSource`].
///
/// Clones share the transport, the rate limiter and the author profile cache.
#[derive(Clone)]
pub struct GitHubClient {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    token: Option<String>,
    fetch_diffs: bool,
    fetch_author_profiles: bool,
    rate_limiter: Option<ApiRateLimiter>,
    profiles: Arc<Mutex<HashMap<String, AuthorProfile>>>,
}

impl GitHubClient {
    /// Create a client backed by reqwest.
    ///
    /// A missing or blank token yields a client that reports no credentials;
    /// sync refuses to start remote work with it.
    pub fn new(token: Option<&str>, config: GitHubClientConfig) -> Result<Self, GitHubError> {
        let transport = ReqwestTransport::with_timeout(config.timeout)
            .map_err(|e| GitHubError::Config(e.to_string()))?;
        Ok(Self::new_with_transport(token, config, Arc::new(transport)))
    }

    pub fn new_with_transport(
        token: Option<&str>,
        config: GitHubClientConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            transport,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: token
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            fetch_diffs: config.fetch_diffs,
            fetch_author_profiles: config.fetch_author_profiles,
            rate_limiter: config.requests_per_second.map(ApiRateLimiter::new),
            profiles: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Share an existing limiter so several clients draw from one budget.
    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: ApiRateLimiter) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn wait_for_rate_limit(&self) {
        if let Some(ref limiter) = self.rate_limiter {
            limiter.wait().await;
        }
    }

    /// Extract rate limit info from GitHub response headers.
    pub(crate) fn parse_rate_limit_headers(headers: &HttpHeaders) -> Option<RateLimitInfo> {
        let limit = header_get(headers, "x-ratelimit-limit")?.parse().ok()?;
        let remaining = header_get(headers, "x-ratelimit-remaining")?
            .parse()
            .ok()?;
        let reset_epoch = header_get(headers, "x-ratelimit-reset")?
            .parse::<i64>()
            .ok()?;
        let reset_at = chrono::DateTime::from_timestamp(reset_epoch, 0).unwrap_or_else(Utc::now);
        Some(RateLimitInfo {
            limit,
            remaining,
            reset_at,
        })
    }

    /// Delay hint for a rejected request: `retry-after` seconds, else the time
    /// until the quota resets when it is exhausted.
    pub(crate) fn retry_after_hint(headers: &HttpHeaders) -> Option<StdDuration> {
        if let Some(secs) = header_get(headers, "retry-after").and_then(|v| v.trim().parse().ok())
        {
            return Some(StdDuration::from_secs(secs));
        }
        let info = Self::parse_rate_limit_headers(headers)?;
        if info.remaining > 0 {
            return None;
        }
        let wait = (info.reset_at - Utc::now()).num_seconds().max(0);
        Some(StdDuration::from_secs(wait.unsigned_abs()))
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, GitHubError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| GitHubError::Config(format!("invalid base URL {}: {e}", self.base_url)))?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| GitHubError::Config(format!("base URL {} cannot be a base", self.base_url)))?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    /// URL of one page of a repository's commit listing.
    pub(crate) fn commits_url(
        &self,
        repo: &RepoRef,
        request: &PageRequest,
    ) -> Result<String, GitHubError> {
        let mut url = self.endpoint(&["repos", &repo.owner, &repo.name, "commits"])?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("page", &request.page.to_string())
                .append_pair("per_page", &request.per_page.to_string());
            if let Some(since) = request.since {
                query.append_pair("since", &since.to_rfc3339_opts(SecondsFormat::Secs, true));
            }
            if let Some(until) = request.until {
                query.append_pair("until", &until.to_rfc3339_opts(SecondsFormat::Secs, true));
            }
        }
        Ok(url.to_string())
    }

    async fn get(&self, url: String, accept: &str) -> Result<HttpResponse, GitHubError> {
        self.wait_for_rate_limit().await;

        let mut request = HttpRequest::get(url)
            .header("Accept", accept)
            .header("X-GitHub-Api-Version", API_VERSION)
            .header("User-Agent", "commitcal");
        if let Some(ref token) = self.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = self.transport.send(request).await?;

        if let Some(info) = Self::parse_rate_limit_headers(&response.headers)
            && info.remaining == 0
        {
            tracing::debug!(reset_at = %info.reset_at, "GitHub rate limit quota exhausted");
        }

        if !response.is_success() {
            let text = response.text();
            let message = serde_json::from_str::<GitHubErrorBody>(&text)
                .map(|b| b.message)
                .unwrap_or(text);
            return Err(GitHubError::Api {
                status: response.status,
                message,
                retry_after: Self::retry_after_hint(&response.headers),
                remaining: header_get(&response.headers, "x-ratelimit-remaining")
                    .and_then(|v| v.parse().ok()),
            });
        }

        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: String,
        context: &str,
    ) -> Result<T, GitHubError> {
        let response = self.get(url, ACCEPT_JSON).await?;
        serde_json::from_slice(&response.body).map_err(|e| GitHubError::Decode {
            context: context.to_string(),
            message: e.to_string(),
        })
    }

    async fn fetch_diff(&self, repo: &RepoRef, sha: &str) -> Result<String, GitHubError> {
        let url = self.endpoint(&["repos", &repo.owner, &repo.name, "commits", sha])?;
        Ok(self.get(url.to_string(), ACCEPT_DIFF).await?.text())
    }

    async fn fetch_author_profile(&self, login: &str) -> Result<AuthorProfile, GitHubError> {
        if let Ok(cache) = self.profiles.lock()
            && let Some(profile) = cache.get(login)
        {
            return Ok(profile.clone());
        }

        let url = self.endpoint(&["users", login])?;
        let user: GitHubUserProfile = self
            .get_json(url.to_string(), &format!("profile of {login}"))
            .await?;
        let profile = to_author_profile(user);

        if let Ok(mut cache) = self.profiles.lock() {
            cache.insert(login.to_string(), profile.clone());
        }
        Ok(profile)
    }

    /// Attach diff summary and author profile. A failed lookup leaves the
    /// field unset so the cache keeps what it already has; it never fails the
    /// page.
    async fn enrich(&self, repo: &RepoRef, mut commit: RemoteCommit) -> RemoteCommit {
        if self.fetch_diffs {
            match self.fetch_diff(repo, &commit.sha).await {
                Ok(diff) => commit.diff = Some(parse_diff_summary(&diff)),
                Err(e) => {
                    tracing::warn!(repo = %repo, sha = %commit.sha, error = %e, "Could not fetch commit diff");
                }
            }
        }

        if self.fetch_author_profiles
            && let Some(login) = commit.author_login.clone()
        {
            match self.fetch_author_profile(&login).await {
                Ok(profile) => commit.author_profile = Some(profile),
                Err(e) => {
                    tracing::debug!(%login, error = %e, "Could not fetch author profile");
                }
            }
        }

        commit
    }
}

#[async_trait]
impl CommitSource for GitHubClient {
    fn has_credentials(&self) -> bool {
        self.token.is_some()
    }

    async fn fetch_page(
        &self,
        repo: &RepoRef,
        request: &PageRequest,
        cancel: &CancellationToken,
    ) -> platform::Result<Vec<RemoteCommit>> {
        if cancel.is_cancelled() {
            return Err(PlatformError::Cancelled);
        }

        let url = self.commits_url(repo, request)?;
        let context = format!("commits of {repo} page {}", request.page);
        let items: Vec<GitHubCommitItem> = self.get_json(url, &context).await?;

        // Decode the whole page before any enrichment so a bad entry fails it.
        let decoded = items
            .into_iter()
            .map(to_remote_commit)
            .collect::<Result<Vec<_>, _>>()?;

        let mut commits = Vec::with_capacity(decoded.len());
        for commit in decoded {
            if cancel.is_cancelled() {
                tracing::debug!(repo = %repo, kept = commits.len(), "Cancelled during enrichment");
                break;
            }
            commits.push(self.enrich(repo, commit).await);
        }

        tracing::debug!(repo = %repo, page = request.page, count = commits.len(), "Fetched commit page");
        Ok(commits)
    }

    async fn list_user_repos(
        &self,
        page: u32,
        per_page: u32,
    ) -> platform::Result<Vec<RemoteRepository>> {
        if self.token.is_none() {
            return Err(PlatformError::AuthRequired);
        }

        let mut url = self.endpoint(&["user", "repos"])?;
        url.query_pairs_mut()
            .append_pair("sort", "updated")
            .append_pair("page", &page.max(1).to_string())
            .append_pair("per_page", &per_page.clamp(1, platform::MAX_PAGE_SIZE).to_string());

        let repos: Vec<GitHubRepoItem> = self
            .get_json(url.to_string(), &format!("user repositories page {page}"))
            .await?;
        Ok(repos.into_iter().map(to_remote_repository).collect())
    }
}
