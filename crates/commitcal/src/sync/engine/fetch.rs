//! Page walk within one sync window.

use crate::platform::{CommitSource, PageRequest, PlatformError, RemoteCommit, RepoRef};
use crate::sync::progress::{SyncProgress, emit};
use crate::sync::window::SyncWindow;

use super::worker::RepoWorker;

/// How a window walk ended.
#[derive(Debug)]
pub(super) enum WindowEnd {
    /// A short page: the remote has nothing more in this window.
    Exhausted,
    /// The per-window page cap was hit before a short page.
    PageCap,
    /// The repository's commit budget ran out.
    CommitCap,
    Cancelled,
    Failed(PlatformError),
}

/// Commits collected from one window. Always carries whatever was fetched
/// before the walk ended, so a late failure does not discard earlier pages.
#[derive(Debug)]
pub(super) struct WindowFetch {
    pub commits: Vec<RemoteCommit>,
    pub end: WindowEnd,
}

impl<S: CommitSource> RepoWorker<S> {
    /// Walk pages of `window` in the remote's order until a short page, the
    /// page cap, the commit budget or cancellation stops it.
    ///
    /// `remaining` is the repository's commit budget across windows and is
    /// reduced by what this window keeps. `fetched` is the running total for
    /// progress events.
    pub(super) async fn walk_window(
        &self,
        repo: &RepoRef,
        window: &SyncWindow,
        remaining: &mut Option<usize>,
        fetched: &mut usize,
    ) -> WindowFetch {
        let full_name = repo.full_name();
        let page_size = self.options.page_size;
        let mut commits: Vec<RemoteCommit> = Vec::new();

        for page in 1..=self.options.max_pages_per_window {
            if self.cancel.is_cancelled() {
                return WindowFetch {
                    commits,
                    end: WindowEnd::Cancelled,
                };
            }
            if *remaining == Some(0) {
                return WindowFetch {
                    commits,
                    end: WindowEnd::CommitCap,
                };
            }

            let request = PageRequest::new(page, page_size).within(window.start, window.end);
            let label = format!("{} {} p{}", full_name, window.label, page);

            let result = tokio::select! {
                biased;

                () = self.cancel.cancelled() => {
                    return WindowFetch { commits, end: WindowEnd::Cancelled };
                }

                result = self.retry.execute(&label, self.on_progress(), || {
                    self.source.fetch_page(repo, &request, &self.cancel)
                }) => result,
            };

            let mut batch = match result {
                Ok(batch) => batch,
                Err(e) => {
                    tracing::warn!(
                        repo = %full_name,
                        window = %window.label,
                        page,
                        error = %e,
                        "Commit page fetch failed"
                    );
                    return WindowFetch {
                        commits,
                        end: WindowEnd::Failed(e),
                    };
                }
            };

            let short_page = batch.len() < page_size as usize;
            let mut capped = false;
            if let Some(left) = remaining.as_mut() {
                if batch.len() >= *left {
                    batch.truncate(*left);
                    capped = true;
                }
                *left -= batch.len();
            }

            *fetched += batch.len();
            tracing::debug!(
                repo = %full_name,
                window = %window.label,
                page,
                count = batch.len(),
                "Fetched commit page"
            );
            emit(
                self.on_progress(),
                SyncProgress::FetchedPage {
                    repo: full_name.clone(),
                    window: window.label.clone(),
                    page,
                    count: batch.len(),
                    total_so_far: *fetched,
                },
            );
            commits.append(&mut batch);

            if self.cancel.is_cancelled() {
                return WindowFetch {
                    commits,
                    end: WindowEnd::Cancelled,
                };
            }
            if capped {
                let max_commits = self.options.max_commits_per_repo.unwrap_or_default();
                tracing::info!(repo = %full_name, max_commits, "Commit cap reached");
                emit(
                    self.on_progress(),
                    SyncProgress::CommitCapReached {
                        repo: full_name,
                        max_commits,
                    },
                );
                return WindowFetch {
                    commits,
                    end: WindowEnd::CommitCap,
                };
            }
            if short_page {
                return WindowFetch {
                    commits,
                    end: WindowEnd::Exhausted,
                };
            }
        }

        tracing::warn!(
            repo = %full_name,
            window = %window.label,
            max_pages = self.options.max_pages_per_window,
            "Page cap reached; window may be incomplete"
        );
        emit(
            self.on_progress(),
            SyncProgress::PageCapReached {
                repo: full_name,
                window: window.label.clone(),
                max_pages: self.options.max_pages_per_window,
            },
        );
        WindowFetch {
            commits,
            end: WindowEnd::PageCap,
        }
    }
}
