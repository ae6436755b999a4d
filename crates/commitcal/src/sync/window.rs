//! Splitting a date range into bounded sync windows.

use chrono::{DateTime, Duration, Months, Utc};

use super::types::DEFAULT_WINDOW_MONTHS;

/// A slice of history fetched as one unit. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// e.g. `"Jan 2024 - Mar 2024"`
    pub label: String,
}

impl SyncWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        let label = format!("{} - {}", start.format("%b %Y"), end.format("%b %Y"));
        Self { start, end, label }
    }
}

/// Plans fixed-width windows, oldest first.
///
/// Windows are cut backwards from the end of the range so that the newest
/// window is always full width; only the oldest window may be shorter.
/// Returning them oldest first means an interrupted run leaves a contiguous
/// stretch of history behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindowPlanner {
    window_months: u32,
}

impl Default for TimeWindowPlanner {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_MONTHS)
    }
}

impl TimeWindowPlanner {
    pub fn new(window_months: u32) -> Self {
        Self {
            window_months: window_months.max(1),
        }
    }

    pub fn window_months(&self) -> u32 {
        self.window_months
    }

    /// Windows covering the last `months_back` months.
    pub fn plan(&self, months_back: u32) -> Vec<SyncWindow> {
        self.plan_from(Utc::now(), months_back)
    }

    /// Windows covering the `months_back` months ending at `now`.
    pub fn plan_from(&self, now: DateTime<Utc>, months_back: u32) -> Vec<SyncWindow> {
        if months_back == 0 {
            return Vec::new();
        }
        let oldest = now
            .checked_sub_months(Months::new(months_back))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.plan_range(oldest, now)
    }

    /// Windows covering `[start, end]`. Empty when `start >= end`.
    ///
    /// The remote treats both `since` and `until` as inclusive, so each
    /// window ends one second before the next one starts and a commit on a
    /// boundary is fetched once.
    pub fn plan_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<SyncWindow> {
        let step = Months::new(self.window_months);
        let mut windows = Vec::new();
        let mut cursor = end;
        let mut window_end = end;

        while cursor > start {
            let window_start = cursor
                .checked_sub_months(step)
                .map_or(start, |s| s.max(start));
            if window_end >= window_start {
                windows.push(SyncWindow::new(window_start, window_end));
            }
            cursor = window_start;
            window_end = window_start - Duration::seconds(1);
        }

        windows.reverse();
        windows
    }
}
