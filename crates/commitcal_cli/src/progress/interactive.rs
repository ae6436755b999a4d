use std::collections::HashMap;
use std::sync::Mutex;

use commitcal::sync::{RepoOutcome, SyncProgress};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Consolidated progress state to avoid multiple mutex locks.
#[derive(Default)]
struct ProgressState {
    /// Counts repositories reaching a terminal state.
    overall: Option<ProgressBar>,
    /// Spinners for repositories being fetched, by `owner/name`.
    repo_bars: HashMap<String, ProgressBar>,
}

/// Interactive progress reporter using indicatif.
pub struct InteractiveReporter {
    multi: MultiProgress,
    state: Mutex<ProgressState>,
}

impl InteractiveReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            state: Mutex::new(ProgressState::default()),
        }
    }

    /// The spinner for `repo`, created on first use below the overall bar.
    fn repo_bar(&self, state: &mut ProgressState, repo: &str) -> ProgressBar {
        if let Some(bar) = state.repo_bars.get(repo) {
            return bar.clone();
        }

        let bar = ProgressBar::new_spinner();
        let bar = match &state.overall {
            Some(overall) => self.multi.insert_after(overall, bar),
            None => self.multi.add(bar),
        };
        bar.set_style(Self::spinner_style());
        bar.set_prefix(format!("{:24}", truncate(repo, 24)));
        bar.enable_steady_tick(std::time::Duration::from_millis(100));
        state.repo_bars.insert(repo.to_string(), bar.clone());
        bar
    }

    pub fn handle(&self, event: SyncProgress) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        match event {
            SyncProgress::SyncPlanned {
                repositories,
                fresh,
                stale,
            } => {
                let pb = self.multi.add(ProgressBar::new(repositories as u64));
                pb.set_style(Self::bar_style());
                pb.set_prefix(format!("{:24}", "Repositories"));
                pb.set_position(fresh as u64);
                pb.set_message(format!("{} cached, {} to fetch", fresh, stale));
                state.overall = Some(pb);
            }

            SyncProgress::FetchingWindow {
                repo,
                window,
                index,
                total,
            } => {
                let bar = self.repo_bar(&mut state, &repo);
                bar.set_message(format!("{} ({}/{})", window, index, total));
            }

            SyncProgress::FetchedPage {
                repo,
                window,
                page,
                total_so_far,
                ..
            } => {
                let bar = self.repo_bar(&mut state, &repo);
                bar.set_message(format!(
                    "{} page {} ({} commits)",
                    window, page, total_so_far
                ));
            }

            SyncProgress::PageCapReached { repo, window, .. } => {
                let bar = self.repo_bar(&mut state, &repo);
                bar.set_message(format!("⚠ {} truncated at page cap", window));
            }

            SyncProgress::CommitCapReached { repo, max_commits } => {
                let bar = self.repo_bar(&mut state, &repo);
                bar.set_message(format!("⚠ stopped at {} commits", max_commits));
            }

            SyncProgress::WindowSkipped { repo, window, .. } => {
                let bar = self.repo_bar(&mut state, &repo);
                bar.set_message(format!("✗ {} unreadable, skipped", window));
            }

            SyncProgress::RateLimitBackoff { retry_after_ms, .. } => {
                if let Some(ref pb) = state.overall {
                    pb.set_message(format!(
                        "rate limited, waiting {}s",
                        retry_after_ms.div_ceil(1000)
                    ));
                }
            }

            SyncProgress::RepoFinished {
                repo,
                outcome,
                fetched,
                stored,
            } => {
                if let Some(bar) = state.repo_bars.remove(&repo) {
                    let msg = match outcome {
                        RepoOutcome::Synced => {
                            format!("✓ {} fetched, {} stored", fetched, stored)
                        }
                        RepoOutcome::Cancelled => format!("· cancelled after {} commits", fetched),
                        RepoOutcome::Failed => format!("✗ failed after {} commits", fetched),
                        other => other.to_string(),
                    };
                    bar.finish_with_message(msg);
                }
                if let Some(ref pb) = state.overall {
                    pb.inc(1);
                }
            }

            SyncProgress::RepoFailed { repo, error } => {
                let bar = self.repo_bar(&mut state, &repo);
                bar.set_message(format!("✗ {}", error));
            }

            SyncProgress::SyncComplete {
                synced,
                cached,
                failed,
                cancelled,
                skipped,
            } => {
                if let Some(ref pb) = state.overall {
                    let mut msg = format!("✓ {} synced, {} cached", synced, cached);
                    if skipped > 0 {
                        msg.push_str(&format!(", {} skipped", skipped));
                    }
                    if failed > 0 {
                        msg.push_str(&format!(", {} failed", failed));
                    }
                    if cancelled > 0 {
                        msg.push_str(&format!(", {} cancelled", cancelled));
                    }
                    pb.finish_with_message(msg);
                }
            }

            _ => {}
        }
    }

    pub fn finish(&self) {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        for bar in state.repo_bars.values() {
            if !bar.is_finished() {
                bar.finish();
            }
        }
        if let Some(ref pb) = state.overall
            && !pb.is_finished()
        {
            pb.finish();
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{prefix:.bold.cyan} {spinner:.green} {msg}")
            .expect("Invalid template")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{prefix:.bold.cyan} [{bar:40.cyan/blue}] {pos:>3}/{len:3} {msg}")
            .expect("Invalid template")
            .progress_chars("█▓░")
    }
}

impl Default for InteractiveReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Shorten `s` to `max` characters, ending with an ellipsis when cut.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_names() {
        assert_eq!(truncate("a/x", 24), "a/x");
    }

    #[test]
    fn truncate_shortens_long_names() {
        let cut = truncate("some-org/a-very-long-repository-name", 10);
        assert_eq!(cut.chars().count(), 10);
        assert!(cut.ends_with('…'));
    }

    #[test]
    fn handles_full_event_sequence_without_panicking() {
        let reporter = InteractiveReporter {
            multi: MultiProgress::with_draw_target(indicatif::ProgressDrawTarget::hidden()),
            state: Mutex::new(ProgressState::default()),
        };

        reporter.handle(SyncProgress::SyncPlanned {
            repositories: 2,
            fresh: 1,
            stale: 1,
        });
        reporter.handle(SyncProgress::FetchingWindow {
            repo: "a/x".to_string(),
            window: "Jan 2024 - Mar 2024".to_string(),
            index: 1,
            total: 1,
        });
        reporter.handle(SyncProgress::FetchedPage {
            repo: "a/x".to_string(),
            window: "Jan 2024 - Mar 2024".to_string(),
            page: 1,
            count: 3,
            total_so_far: 3,
        });
        reporter.handle(SyncProgress::RepoFinished {
            repo: "a/x".to_string(),
            outcome: RepoOutcome::Synced,
            fetched: 3,
            stored: 3,
        });
        reporter.handle(SyncProgress::SyncComplete {
            synced: 1,
            cached: 1,
            failed: 0,
            cancelled: 0,
            skipped: 0,
        });
        reporter.finish();

        let state = reporter.state.lock().unwrap();
        assert!(state.repo_bars.is_empty());
        assert_eq!(state.overall.as_ref().map(|pb| pb.position()), Some(2));
    }
}
