use commitcal::sync::{RepoOutcome, SyncProgress};

/// Logging reporter using tracing for structured output.
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, event: SyncProgress) {
        match event {
            SyncProgress::SyncPlanned {
                repositories,
                fresh,
                stale,
            } => {
                tracing::info!(repositories, fresh, stale, "Sync planned");
            }

            SyncProgress::RepoState { repo, state } => {
                tracing::trace!(repo = %repo, state = ?state, "Repository state");
            }

            SyncProgress::FetchingWindow {
                repo,
                window,
                index,
                total,
            } => {
                tracing::debug!(repo = %repo, window = %window, index, total, "Fetching window");
            }

            SyncProgress::FetchedPage {
                repo,
                window,
                page,
                count,
                total_so_far,
            } => {
                tracing::debug!(repo = %repo, window = %window, page, count, total_so_far, "Fetched page");
            }

            SyncProgress::PageCapReached {
                repo,
                window,
                max_pages,
            } => {
                tracing::warn!(repo = %repo, window = %window, max_pages, "Page cap reached");
            }

            SyncProgress::CommitCapReached { repo, max_commits } => {
                tracing::warn!(repo = %repo, max_commits, "Commit cap reached");
            }

            SyncProgress::CommitsStored {
                repo,
                window,
                stored,
            } => {
                tracing::debug!(repo = %repo, window = %window, stored, "Stored commits");
            }

            SyncProgress::WindowSkipped {
                repo,
                window,
                error,
            } => {
                tracing::warn!(repo = %repo, window = %window, error = %error, "Skipped window");
            }

            SyncProgress::RateLimitBackoff {
                label,
                retry_after_ms,
                attempt,
            } => {
                tracing::warn!(
                    call = %label,
                    retry_after_ms,
                    attempt,
                    "Rate limited, backing off"
                );
            }

            SyncProgress::TransientRetry {
                label,
                attempt,
                delay_ms,
                error,
            } => {
                tracing::info!(call = %label, attempt, delay_ms, error = %error, "Retrying");
            }

            SyncProgress::RepoFinished {
                repo,
                outcome,
                fetched,
                stored,
            } => {
                if outcome == RepoOutcome::Failed {
                    tracing::debug!(repo = %repo, fetched, stored, "Repository finished with errors");
                } else {
                    tracing::info!(repo = %repo, outcome = %outcome, fetched, stored, "Repository finished");
                }
            }

            SyncProgress::RepoFailed { repo, error } => {
                tracing::error!(repo = %repo, error = %error, "Repository failed");
            }

            SyncProgress::SyncComplete {
                synced,
                cached,
                failed,
                cancelled,
                skipped,
            } => {
                tracing::info!(synced, cached, failed, cancelled, skipped, "Sync complete");
            }

            _ => {}
        }
    }
}

impl Default for LoggingReporter {
    fn default() -> Self {
        Self::new()
    }
}
