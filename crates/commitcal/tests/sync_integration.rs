//! Integration tests for sync and backfill.
//!
//! Every test runs against an in-memory SQLite cache with migrations applied
//! and a scripted commit source, and is wrapped in a timeout so a hang shows
//! up as a failure rather than a stuck test run.

#![cfg(all(feature = "sqlite", feature = "migrate"))]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use commitcal::connect_and_migrate;
use commitcal::entity::repository::Model as RepositoryModel;
use commitcal::platform::{
    CommitSource, PageRequest, PlatformError, RemoteCommit, RemoteRepository, RepoRef, Result,
};
use commitcal::retry::RetryConfig;
use commitcal::service::{ResponseSource, SyncService};
use commitcal::store::{CommitStore, RepositoryInput};
use commitcal::sync::{
    DateRange, FailureKind, ProgressCallback, RepoOutcome, SyncError, SyncOptions,
    SyncOrchestrator, SyncProgress, TimeWindowPlanner,
};
use tokio_util::sync::CancellationToken;

/// Maximum time any sync operation should take in tests.
/// If exceeded, there's likely a hang/deadlock.
const SYNC_TIMEOUT: StdDuration = StdDuration::from_secs(10);

const USER: &str = "user-1";

// ─── Scripted source ─────────────────────────────────────────────────────────

type ErrorFn = fn() -> PlatformError;

/// A commit source that serves fixed histories and records every request.
#[derive(Default)]
struct ScriptedSource {
    no_credentials: bool,
    /// Commits per `owner/name`, any order.
    histories: HashMap<String, Vec<RemoteCommit>>,
    /// Repositories that fail every request.
    failing: HashMap<String, ErrorFn>,
    /// Repositories that always return a full page.
    endless: Vec<String>,
    /// Requests whose `since` is before this instant get a malformed response.
    malformed_before: Option<DateTime<Utc>>,
    /// Cancelled during the first request.
    cancel_on_first_call: Option<CancellationToken>,
    user_repos: Vec<RemoteRepository>,
    calls: Mutex<Vec<(String, PageRequest)>>,
}

impl ScriptedSource {
    fn with_history(mut self, repo: &str, commits: Vec<RemoteCommit>) -> Self {
        self.histories.insert(repo.to_string(), commits);
        self
    }

    fn failing(mut self, repo: &str, error: ErrorFn) -> Self {
        self.failing.insert(repo.to_string(), error);
        self
    }

    fn calls(&self) -> Vec<(String, PageRequest)> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn calls_for(&self, repo: &str) -> Vec<PageRequest> {
        self.calls()
            .into_iter()
            .filter(|(name, _)| name == repo)
            .map(|(_, request)| request)
            .collect()
    }
}

#[async_trait]
impl CommitSource for ScriptedSource {
    fn has_credentials(&self) -> bool {
        !self.no_credentials
    }

    async fn fetch_page(
        &self,
        repo: &RepoRef,
        request: &PageRequest,
        _cancel: &CancellationToken,
    ) -> Result<Vec<RemoteCommit>> {
        let name = repo.full_name();
        let first_call = {
            let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
            calls.push((name.clone(), request.clone()));
            calls.len() == 1
        };
        if first_call && let Some(token) = &self.cancel_on_first_call {
            token.cancel();
        }

        if let Some(error) = self.failing.get(&name) {
            return Err(error());
        }
        if let (Some(cutoff), Some(since)) = (self.malformed_before, request.since)
            && since < cutoff
        {
            return Err(PlatformError::malformed("commits page", "expected an array"));
        }

        let until = request.until.unwrap_or_else(Utc::now);
        if self.endless.contains(&name) {
            return Ok((0..request.per_page)
                .map(|i| {
                    commit(
                        &format!("{}-p{}-{}", until.timestamp(), request.page, i),
                        until - Duration::minutes(i64::from(i)),
                    )
                })
                .collect());
        }

        let mut matching: Vec<RemoteCommit> = self
            .histories
            .get(&name)
            .into_iter()
            .flatten()
            .filter(|c| request.since.is_none_or(|s| c.author_date >= s) && c.author_date <= until)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.author_date.cmp(&a.author_date));

        let per_page = request.per_page as usize;
        let skip = (request.page as usize - 1) * per_page;
        Ok(matching.into_iter().skip(skip).take(per_page).collect())
    }

    async fn list_user_repos(&self, page: u32, per_page: u32) -> Result<Vec<RemoteRepository>> {
        let skip = (page as usize - 1) * per_page as usize;
        Ok(self
            .user_repos
            .iter()
            .skip(skip)
            .take(per_page as usize)
            .cloned()
            .collect())
    }
}

// ─── Fixtures ────────────────────────────────────────────────────────────────

fn commit(sha: &str, at: DateTime<Utc>) -> RemoteCommit {
    RemoteCommit {
        sha: sha.to_string(),
        message: format!("commit {sha}"),
        author_name: "Jane".to_string(),
        author_login: Some("jane".to_string()),
        author_date: at,
        verified: false,
        html_url: format!("https://github.com/a/x/commit/{sha}"),
        avatar_url: None,
        author_profile: None,
        diff: None,
    }
}

/// `count` commits, one per day, the newest `offset_days` before now.
fn history(prefix: &str, count: usize, offset_days: i64) -> Vec<RemoteCommit> {
    let now = Utc::now();
    (0..count)
        .map(|i| {
            commit(
                &format!("{prefix}{i}"),
                now - Duration::days(offset_days + i as i64),
            )
        })
        .collect()
}

async fn setup_store() -> CommitStore {
    let db = connect_and_migrate("sqlite::memory:")
        .await
        .expect("Failed to create test database");
    CommitStore::new(Arc::new(db))
}

async fn register(store: &CommitStore, owner: &str, name: &str) -> RepositoryModel {
    store
        .register_repository(USER, &RepositoryInput::new(owner, name))
        .await
        .expect("register repository")
}

fn orchestrator(
    source: &Arc<ScriptedSource>,
    store: &CommitStore,
    options: SyncOptions,
) -> SyncOrchestrator<ScriptedSource> {
    SyncOrchestrator::builder()
        .shared_source(Arc::clone(source))
        .store(store.clone())
        .retry(RetryConfig::disabled())
        .options(options)
        .build()
        .expect("orchestrator builds")
}

fn last_month() -> DateRange {
    let now = Utc::now();
    DateRange::new(now - Duration::days(30), now).expect("valid range")
}

async fn reload(store: &CommitStore, repo: &RepositoryModel) -> RepositoryModel {
    store.find_repository(repo.id).await.expect("reload")
}

// ─── Sync ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn sync_twice_does_not_duplicate_commits() {
    let store = setup_store().await;
    let repo = register(&store, "a", "x").await;
    let source = Arc::new(ScriptedSource::default().with_history("a/x", history("c", 5, 1)));
    let orchestrator = orchestrator(&source, &store, SyncOptions::default().with_force_refresh(true));
    let cancel = CancellationToken::new();

    for _ in 0..2 {
        let result = tokio::time::timeout(
            SYNC_TIMEOUT,
            orchestrator.sync(USER, std::slice::from_ref(&repo), last_month(), &cancel),
        )
        .await
        .expect("sync timed out")
        .expect("sync succeeds");

        assert_eq!(result.commits.len(), 5);
        let report = &result.report.reports[0];
        assert_eq!(report.outcome, RepoOutcome::Synced);
        assert_eq!(report.commits_fetched, 5);
    }

    assert_eq!(store.count_for_repository(repo.id).await.expect("count"), 5);
}

#[tokio::test]
async fn fresh_repository_is_served_without_remote_calls() {
    let store = setup_store().await;
    let repo = register(&store, "a", "x").await;
    let source = Arc::new(ScriptedSource::default().with_history("a/x", history("c", 4, 1)));
    let orchestrator = orchestrator(&source, &store, SyncOptions::default());
    let cancel = CancellationToken::new();

    orchestrator
        .sync(USER, std::slice::from_ref(&repo), last_month(), &cancel)
        .await
        .expect("first sync");
    let calls_after_first = source.calls().len();
    assert!(calls_after_first > 0);

    let repo = reload(&store, &repo).await;
    let result = orchestrator
        .sync(USER, std::slice::from_ref(&repo), last_month(), &cancel)
        .await
        .expect("second sync");

    assert_eq!(source.calls().len(), calls_after_first);
    assert_eq!(result.commits.len(), 4);
    assert_eq!(result.report.reports[0].outcome, RepoOutcome::ServedFromCache);
    assert!(!result.report.touched_remote());
}

#[tokio::test]
async fn only_stale_repositories_are_fetched() {
    let store = setup_store().await;
    let x = register(&store, "a", "x").await;
    let y = register(&store, "a", "y").await;

    store
        .upsert(y.id, &history("y", 10, 1))
        .await
        .expect("seed y");
    store
        .mark_synced(y.id, Utc::now() - Duration::minutes(5))
        .await
        .expect("mark y");
    let y = reload(&store, &y).await;

    let source = Arc::new(ScriptedSource::default().with_history("a/x", history("x", 3, 2)));
    let orchestrator = orchestrator(&source, &store, SyncOptions::default());

    let result = orchestrator
        .sync(USER, &[x.clone(), y.clone()], last_month(), &CancellationToken::new())
        .await
        .expect("sync");

    assert!(source.calls_for("a/y").is_empty());
    assert!(!source.calls_for("a/x").is_empty());

    let x_report = result.report.report_for("a/x").expect("x report");
    assert_eq!(x_report.outcome, RepoOutcome::Synced);
    assert_eq!(x_report.commits_fetched, 3);
    assert_eq!(x_report.commits_stored, 3);

    let y_report = result.report.report_for("a/y").expect("y report");
    assert_eq!(y_report.outcome, RepoOutcome::ServedFromCache);
    assert_eq!(y_report.commits_fetched, 0);
    assert_eq!(y_report.commits_stored, 0);

    assert_eq!(result.commits.len(), 13);
    assert!(reload(&store, &x).await.last_synced_at.is_some());
}

#[tokio::test]
async fn endless_history_stops_at_page_cap() {
    let store = setup_store().await;
    let repo = register(&store, "a", "x").await;
    let source = Arc::new(ScriptedSource {
        endless: vec!["a/x".to_string()],
        ..ScriptedSource::default()
    });
    let options = SyncOptions {
        page_size: 10,
        max_pages_per_window: 3,
        max_commits_per_repo: None,
        ..SyncOptions::default()
    };
    let orchestrator = orchestrator(&source, &store, options);

    let result = tokio::time::timeout(
        SYNC_TIMEOUT,
        orchestrator.sync(USER, std::slice::from_ref(&repo), last_month(), &CancellationToken::new()),
    )
    .await
    .expect("sync must terminate")
    .expect("sync succeeds");

    assert_eq!(source.calls().len(), 3);
    let report = &result.report.reports[0];
    assert_eq!(report.outcome, RepoOutcome::Synced);
    assert_eq!(report.commits_fetched, 30);
}

#[tokio::test]
async fn commit_cap_limits_fetch_across_pages() {
    let store = setup_store().await;
    let repo = register(&store, "a", "x").await;
    let source = Arc::new(ScriptedSource {
        endless: vec!["a/x".to_string()],
        ..ScriptedSource::default()
    });
    let options = SyncOptions {
        page_size: 10,
        max_pages_per_window: 50,
        max_commits_per_repo: Some(25),
        ..SyncOptions::default()
    };
    let orchestrator = orchestrator(&source, &store, options);

    let result = orchestrator
        .sync(USER, std::slice::from_ref(&repo), last_month(), &CancellationToken::new())
        .await
        .expect("sync");

    assert_eq!(source.calls().len(), 3);
    assert_eq!(result.report.reports[0].commits_fetched, 25);
    assert_eq!(store.count_for_repository(repo.id).await.expect("count"), 25);
}

#[tokio::test]
async fn commit_on_window_boundary_is_fetched_once() {
    let store = setup_store().await;
    let repo = register(&store, "a", "x").await;
    let now = Utc::now();
    let range = DateRange::new(now - Duration::days(90), now).expect("valid range");
    let windows = TimeWindowPlanner::new(1).plan_range(range.start, range.end);
    assert!(windows.len() > 1);
    let boundary = windows.last().expect("windows planned").start;

    let source = Arc::new(
        ScriptedSource::default().with_history("a/x", vec![commit("edge", boundary)]),
    );
    let options = SyncOptions {
        window_months: 1,
        ..SyncOptions::default()
    };
    let orchestrator = orchestrator(&source, &store, options);

    let result = tokio::time::timeout(
        SYNC_TIMEOUT,
        orchestrator.sync(USER, std::slice::from_ref(&repo), range, &CancellationToken::new()),
    )
    .await
    .expect("sync timed out")
    .expect("sync succeeds");

    let report = &result.report.reports[0];
    assert_eq!(report.outcome, RepoOutcome::Synced);
    assert_eq!(report.windows_total, windows.len());
    assert_eq!(report.commits_fetched, 1);
    assert_eq!(result.commits.len(), 1);
}

#[tokio::test]
async fn returned_commits_stay_inside_the_range() {
    let store = setup_store().await;
    let repo = register(&store, "a", "x").await;

    // Cached history on both sides of the requested range.
    let mut seeded = history("old", 5, 40);
    seeded.extend(history("new", 3, 0));
    store.upsert(repo.id, &seeded).await.expect("seed");

    let source = Arc::new(ScriptedSource::default().with_history("a/x", history("mid", 6, 10)));
    let orchestrator = orchestrator(&source, &store, SyncOptions::default());

    let now = Utc::now();
    let range = DateRange::new(now - Duration::days(20), now - Duration::days(5)).expect("range");
    let result = orchestrator
        .sync(USER, std::slice::from_ref(&repo), range, &CancellationToken::new())
        .await
        .expect("sync");

    assert_eq!(result.commits.len(), 6);
    for commit in &result.commits {
        let at = commit.author_date.with_timezone(&Utc);
        assert!(range.contains(at), "{} outside range", commit.sha);
    }
    assert!(
        result
            .commits
            .windows(2)
            .all(|w| w[0].author_date >= w[1].author_date)
    );
    for request in source.calls_for("a/x") {
        assert_eq!(request.since, Some(range.start));
        assert_eq!(request.until, Some(range.end));
    }
}

#[tokio::test]
async fn one_failing_repository_does_not_abort_the_batch() {
    let store = setup_store().await;
    let one = register(&store, "a", "one").await;
    let two = register(&store, "a", "two").await;
    let three = register(&store, "a", "three").await;

    let source = Arc::new(
        ScriptedSource::default()
            .with_history("a/one", history("o", 2, 1))
            .with_history("a/three", history("t", 4, 1))
            .failing("a/two", || PlatformError::api(500, "boom")),
    );
    let orchestrator = orchestrator(&source, &store, SyncOptions::default());

    let result = orchestrator
        .sync(
            USER,
            &[one.clone(), two.clone(), three.clone()],
            last_month(),
            &CancellationToken::new(),
        )
        .await
        .expect("batch completes");

    let outcomes: Vec<(&str, RepoOutcome)> = result
        .report
        .reports
        .iter()
        .map(|r| (r.full_name.as_str(), r.outcome))
        .collect();
    assert_eq!(
        outcomes,
        vec![
            ("a/one", RepoOutcome::Synced),
            ("a/two", RepoOutcome::Failed),
            ("a/three", RepoOutcome::Synced),
        ]
    );

    let failure = result.report.reports[1].error.as_ref().expect("error recorded");
    assert_eq!(failure.kind, FailureKind::Remote);
    assert_eq!(result.commits.len(), 6);

    assert!(reload(&store, &one).await.last_synced_at.is_some());
    assert!(reload(&store, &two).await.last_synced_at.is_none());
    assert!(reload(&store, &three).await.last_synced_at.is_some());
}

#[tokio::test]
async fn malformed_page_aborts_only_its_window() {
    let store = setup_store().await;
    let repo = register(&store, "a", "x").await;
    let now = Utc::now();

    // Two windows: [now-3m, now-2m] fails, [now-2m, now] succeeds.
    let source = Arc::new(ScriptedSource {
        malformed_before: Some(now - Duration::days(70)),
        ..ScriptedSource::default().with_history("a/x", history("c", 3, 1))
    });
    let orchestrator = orchestrator(&source, &store, SyncOptions::default());
    let range = DateRange::new(now - Duration::days(90), now).expect("range");

    let result = orchestrator
        .sync(USER, std::slice::from_ref(&repo), range, &CancellationToken::new())
        .await
        .expect("sync");

    let report = &result.report.reports[0];
    assert_eq!(report.outcome, RepoOutcome::Failed);
    assert_eq!(report.windows_total, 2);
    assert_eq!(report.windows_completed, 1);
    assert_eq!(
        report.error.as_ref().map(|e| e.kind),
        Some(FailureKind::MalformedResponse)
    );
    assert_eq!(report.commits_stored, 3);
    assert!(reload(&store, &repo).await.last_synced_at.is_none());
}

// ─── Credentials ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_credentials_fail_fast_when_fetch_is_needed() {
    let store = setup_store().await;
    let repo = register(&store, "a", "x").await;
    let source = Arc::new(ScriptedSource {
        no_credentials: true,
        ..ScriptedSource::default()
    });
    let orchestrator = orchestrator(&source, &store, SyncOptions::default());

    let err = orchestrator
        .sync(USER, std::slice::from_ref(&repo), last_month(), &CancellationToken::new())
        .await
        .expect_err("auth required");

    assert!(matches!(err, SyncError::AuthRequired));
    assert!(err.requires_reauth());
    assert!(source.calls().is_empty());
}

#[tokio::test]
async fn fresh_batch_is_served_without_credentials() {
    let store = setup_store().await;
    let repo = register(&store, "a", "x").await;
    store.upsert(repo.id, &history("c", 2, 1)).await.expect("seed");
    store.mark_synced(repo.id, Utc::now()).await.expect("mark");
    let repo = reload(&store, &repo).await;

    let source = Arc::new(ScriptedSource {
        no_credentials: true,
        ..ScriptedSource::default()
    });
    let orchestrator = orchestrator(&source, &store, SyncOptions::default());

    let result = orchestrator
        .sync(USER, std::slice::from_ref(&repo), last_month(), &CancellationToken::new())
        .await
        .expect("served from cache");
    assert_eq!(result.commits.len(), 2);
}

#[tokio::test]
async fn rejected_token_flags_reauth_without_stopping_siblings() {
    let store = setup_store().await;
    let x = register(&store, "a", "x").await;
    let y = register(&store, "a", "y").await;
    let source = Arc::new(
        ScriptedSource::default()
            .with_history("a/y", history("y", 2, 1))
            .failing("a/x", || PlatformError::AuthRequired),
    );
    let orchestrator = orchestrator(&source, &store, SyncOptions::default());

    let result = orchestrator
        .sync(USER, &[x, y], last_month(), &CancellationToken::new())
        .await
        .expect("batch completes");

    assert!(result.report.requires_reauth());
    assert_eq!(
        result.report.report_for("a/x").map(|r| r.outcome),
        Some(RepoOutcome::Failed)
    );
    assert_eq!(
        result.report.report_for("a/y").map(|r| r.outcome),
        Some(RepoOutcome::Synced)
    );
}

// ─── Cancellation ────────────────────────────────────────────────────────────

#[tokio::test]
async fn cancelled_before_start_marks_repositories_cancelled() {
    let store = setup_store().await;
    let x = register(&store, "a", "x").await;
    let y = register(&store, "a", "y").await;
    let source = Arc::new(ScriptedSource::default().with_history("a/x", history("c", 2, 1)));
    let orchestrator = orchestrator(&source, &store, SyncOptions::default());

    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = orchestrator
        .sync(USER, &[x.clone(), y], last_month(), &cancel)
        .await
        .expect("cancelled batch still reports");

    assert_eq!(result.report.cancelled(), 2);
    assert_eq!(result.report.failed(), 0);
    assert!(source.calls().is_empty());
    assert!(reload(&store, &x).await.last_synced_at.is_none());
}

#[tokio::test]
async fn cancellation_mid_fetch_keeps_fetched_commits() {
    let store = setup_store().await;
    let repo = register(&store, "a", "x").await;
    let cancel = CancellationToken::new();
    let source = Arc::new(ScriptedSource {
        endless: vec!["a/x".to_string()],
        cancel_on_first_call: Some(cancel.clone()),
        ..ScriptedSource::default()
    });
    let options = SyncOptions {
        page_size: 10,
        ..SyncOptions::default()
    };
    let orchestrator = orchestrator(&source, &store, options);

    let result = tokio::time::timeout(
        SYNC_TIMEOUT,
        orchestrator.sync(USER, std::slice::from_ref(&repo), last_month(), &cancel),
    )
    .await
    .expect("cancellation must not hang")
    .expect("sync");

    let report = &result.report.reports[0];
    assert_eq!(report.outcome, RepoOutcome::Cancelled);
    assert!(report.error.is_none());
    assert_eq!(source.calls().len(), 1);
    assert_eq!(store.count_for_repository(repo.id).await.expect("count"), 10);
    assert!(reload(&store, &repo).await.last_synced_at.is_none());
}

// ─── Backfill ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn backfill_fetches_only_the_missing_history() {
    let store = setup_store().await;
    let repo = register(&store, "a", "x").await;

    let cached = history("recent", 3, 10);
    let oldest = cached
        .iter()
        .map(|c| c.author_date)
        .min()
        .expect("seeded commits");
    store.upsert(repo.id, &cached).await.expect("seed");

    // Remote history spans both the cached stretch and the gap before it.
    let mut remote = cached.clone();
    remote.extend(history("older", 20, 13));
    let source = Arc::new(ScriptedSource::default().with_history("a/x", remote));
    let orchestrator = orchestrator(&source, &store, SyncOptions::default());

    let start = oldest - Duration::days(90);
    let report = orchestrator
        .backfill_older(USER, std::slice::from_ref(&repo), start, &CancellationToken::new())
        .await
        .expect("backfill");

    let calls = source.calls_for("a/x");
    assert!(!calls.is_empty());
    for request in &calls {
        let since = request.since.expect("bounded request");
        let until = request.until.expect("bounded request");
        assert!(since >= start, "window starts before requested start");
        assert!(until < oldest, "window overlaps cached history");
    }
    assert_eq!(calls.first().and_then(|r| r.since), Some(start));

    assert_eq!(report.reports[0].outcome, RepoOutcome::Synced);
    assert_eq!(report.total_stored(), 20);
    assert_eq!(store.count_for_repository(repo.id).await.expect("count"), 23);
    assert!(
        reload(&store, &repo).await.last_synced_at.is_none(),
        "backfill must not touch the sync timestamp"
    );
}

#[tokio::test]
async fn backfill_skips_repositories_without_a_gap() {
    let store = setup_store().await;
    let repo = register(&store, "a", "x").await;
    let cached = history("c", 3, 10);
    let oldest = cached.iter().map(|c| c.author_date).min().expect("seeded");
    store.upsert(repo.id, &cached).await.expect("seed");

    let source = Arc::new(ScriptedSource::default());
    let orchestrator = orchestrator(&source, &store, SyncOptions::default());

    let report = orchestrator
        .backfill_older(USER, std::slice::from_ref(&repo), oldest, &CancellationToken::new())
        .await
        .expect("backfill");

    assert_eq!(report.reports[0].outcome, RepoOutcome::Skipped);
    assert!(source.calls().is_empty());
}

#[tokio::test]
async fn backfill_of_empty_cache_covers_up_to_now() {
    let store = setup_store().await;
    let repo = register(&store, "a", "x").await;
    let source = Arc::new(ScriptedSource::default().with_history("a/x", history("c", 4, 1)));
    let orchestrator = orchestrator(&source, &store, SyncOptions::default());

    let before = Utc::now();
    let report = orchestrator
        .backfill_older(
            USER,
            std::slice::from_ref(&repo),
            before - Duration::days(30),
            &CancellationToken::new(),
        )
        .await
        .expect("backfill");

    assert_eq!(report.total_stored(), 4);
    let latest_until = source
        .calls_for("a/x")
        .iter()
        .filter_map(|r| r.until)
        .max()
        .expect("bounded requests");
    assert!(latest_until >= before - Duration::seconds(1));
}

// ─── Service ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn request_sync_reports_source_and_per_repository_stats() {
    let store = setup_store().await;
    let x = register(&store, "a", "x").await;
    let disabled = register(&store, "a", "off").await;
    store
        .set_sync_enabled(disabled.id, false)
        .await
        .expect("disable");

    let source = Arc::new(ScriptedSource::default().with_history("a/x", history("c", 3, 1)));
    let service = SyncService::new(orchestrator(&source, &store, SyncOptions::default()));
    let cancel = CancellationToken::new();

    let first = service
        .request_sync(USER, last_month(), false, &cancel)
        .await
        .expect("first request");
    assert_eq!(first.summary.source, ResponseSource::Remote);
    assert_eq!(first.summary.repositories, 1);
    assert_eq!(first.summary.total_commits, 3);
    assert_eq!(first.repositories[0].id, x.id);
    assert_eq!(first.repositories[0].commits_in_range, 3);
    assert!(source.calls_for("a/off").is_empty());

    let second = service
        .request_sync(USER, last_month(), false, &cancel)
        .await
        .expect("second request");
    assert_eq!(second.summary.source, ResponseSource::Cache);
    assert_eq!(second.summary.served_from_cache, 1);

    let forced = service
        .request_sync(USER, last_month(), true, &cancel)
        .await
        .expect("forced request");
    assert_eq!(forced.summary.source, ResponseSource::Remote);
    assert_eq!(forced.summary.synced, 1);
}

#[tokio::test]
async fn request_backfill_counts_new_and_total_commits() {
    let store = setup_store().await;
    let repo = register(&store, "a", "x").await;
    let cached = history("recent", 2, 5);
    store.upsert(repo.id, &cached).await.expect("seed");

    let mut remote = cached.clone();
    remote.extend(history("older", 4, 8));
    let source = Arc::new(ScriptedSource::default().with_history("a/x", remote));
    let service = SyncService::new(orchestrator(&source, &store, SyncOptions::default()));

    let response = service
        .request_backfill(USER, Utc::now() - Duration::days(60), &CancellationToken::new())
        .await
        .expect("backfill");

    assert_eq!(response.new_commits, 4);
    assert_eq!(response.total_commits, 6);
}

#[tokio::test]
async fn discover_registers_user_repositories() {
    let store = setup_store().await;
    let source = Arc::new(ScriptedSource {
        user_repos: vec![
            RemoteRepository {
                owner: "a".to_string(),
                name: "x".to_string(),
                description: None,
                language: Some("Rust".to_string()),
                stars: 3,
                forks: 0,
                is_private: false,
                html_url: "https://github.com/a/x".to_string(),
            },
            RemoteRepository {
                owner: "a".to_string(),
                name: "y".to_string(),
                description: Some("private".to_string()),
                language: None,
                stars: 0,
                forks: 1,
                is_private: true,
                html_url: "https://github.com/a/y".to_string(),
            },
        ],
        ..ScriptedSource::default()
    });
    let service = SyncService::new(orchestrator(&source, &store, SyncOptions::default()));

    let registered = service
        .discover_repositories(USER, &CancellationToken::new())
        .await
        .expect("discover");
    assert_eq!(registered.len(), 2);

    let listed = service.list_repositories(USER).await.expect("list");
    let names: Vec<String> = listed.iter().map(RepositoryModel::full_name).collect();
    assert_eq!(names, vec!["a/x".to_string(), "a/y".to_string()]);

    let stats = service.cache_stats(USER).await.expect("stats");
    assert_eq!(stats.repository_count, 2);
    assert_eq!(stats.commit_count, 0);
}

// ─── Progress ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn progress_events_trace_the_repository_lifecycle() {
    let store = setup_store().await;
    let repo = register(&store, "a", "x").await;
    let source = Arc::new(ScriptedSource::default().with_history("a/x", history("c", 2, 1)));

    let events: Arc<Mutex<Vec<SyncProgress>>> = Arc::new(Mutex::new(Vec::new()));
    let capture = Arc::clone(&events);
    let callback: ProgressCallback = Box::new(move |event| {
        capture
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    });

    let orchestrator = SyncOrchestrator::builder()
        .shared_source(Arc::clone(&source))
        .store(store.clone())
        .retry(RetryConfig::disabled())
        .progress(Arc::new(callback))
        .build()
        .expect("orchestrator builds");

    orchestrator
        .sync(USER, std::slice::from_ref(&repo), last_month(), &CancellationToken::new())
        .await
        .expect("sync");

    let events = events.lock().unwrap_or_else(|e| e.into_inner());
    assert!(matches!(
        events.first(),
        Some(SyncProgress::RepoState { .. })
    ));
    assert!(events.iter().any(|e| matches!(
        e,
        SyncProgress::SyncPlanned {
            stale: 1,
            fresh: 0,
            ..
        }
    )));
    assert!(events.iter().any(|e| matches!(e, SyncProgress::FetchedPage { count: 2, .. })));
    assert!(events.iter().any(|e| matches!(e, SyncProgress::CommitsStored { stored: 2, .. })));
    assert!(matches!(
        events.last(),
        Some(SyncProgress::SyncComplete { synced: 1, .. })
    ));
}
