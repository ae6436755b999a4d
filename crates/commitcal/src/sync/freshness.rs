//! Deciding whether cached commits can be served without a fetch.

use chrono::{DateTime, Duration, Utc};

use crate::entity::repository::Model as RepositoryModel;

use super::types::DEFAULT_TTL_MINUTES;

/// Why a repository is or is not fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    /// Caller asked for a refetch.
    Forced,
    /// Nothing cached in the requested range.
    NoCachedCommits,
    NeverSynced,
    /// The last successful sync is older than the TTL.
    Expired { age: Duration },
}

impl Freshness {
    pub fn needs_refresh(self) -> bool {
        !matches!(self, Self::Fresh)
    }
}

/// Applies a TTL to a repository's last successful sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessEvaluator {
    ttl: Duration,
}

impl Default for FreshnessEvaluator {
    fn default() -> Self {
        Self::from_minutes(DEFAULT_TTL_MINUTES)
    }
}

impl FreshnessEvaluator {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: ttl.max(Duration::zero()),
        }
    }

    pub fn from_minutes(minutes: i64) -> Self {
        Self::new(Duration::minutes(minutes))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Classify a repository at `now`.
    ///
    /// `cached_in_range` is the number of cached commits inside the requested
    /// range. A sync timestamp in the future counts as fresh.
    pub fn evaluate(
        &self,
        last_synced_at: Option<DateTime<Utc>>,
        cached_in_range: usize,
        force: bool,
        now: DateTime<Utc>,
    ) -> Freshness {
        if force {
            return Freshness::Forced;
        }
        if cached_in_range == 0 {
            return Freshness::NoCachedCommits;
        }
        let Some(last) = last_synced_at else {
            return Freshness::NeverSynced;
        };
        let age = now - last;
        if age > self.ttl {
            Freshness::Expired { age }
        } else {
            Freshness::Fresh
        }
    }

    pub fn needs_refresh(
        &self,
        repository: &RepositoryModel,
        cached_in_range: usize,
        force: bool,
    ) -> bool {
        self.evaluate(
            repository.last_synced_at.map(|t| t.with_timezone(&Utc)),
            cached_in_range,
            force,
            Utc::now(),
        )
        .needs_refresh()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluator() -> FreshnessEvaluator {
        FreshnessEvaluator::from_minutes(30)
    }

    #[test]
    fn recent_sync_with_cached_commits_is_fresh() {
        let now = Utc::now();
        let result = evaluator().evaluate(Some(now - Duration::minutes(5)), 10, false, now);
        assert_eq!(result, Freshness::Fresh);
        assert!(!result.needs_refresh());
    }

    #[test]
    fn expired_sync_needs_refresh() {
        let now = Utc::now();
        let result = evaluator().evaluate(Some(now - Duration::minutes(31)), 10, false, now);
        assert_eq!(
            result,
            Freshness::Expired {
                age: Duration::minutes(31)
            }
        );
        assert!(result.needs_refresh());
    }

    #[test]
    fn ttl_boundary_is_still_fresh() {
        let now = Utc::now();
        let result = evaluator().evaluate(Some(now - Duration::minutes(30)), 1, false, now);
        assert_eq!(result, Freshness::Fresh);
    }

    #[test]
    fn empty_range_needs_refresh_even_when_recent() {
        let now = Utc::now();
        let result = evaluator().evaluate(Some(now), 0, false, now);
        assert_eq!(result, Freshness::NoCachedCommits);
    }

    #[test]
    fn never_synced_needs_refresh() {
        let now = Utc::now();
        assert_eq!(
            evaluator().evaluate(None, 3, false, now),
            Freshness::NeverSynced
        );
    }

    #[test]
    fn force_overrides_everything() {
        let now = Utc::now();
        assert_eq!(
            evaluator().evaluate(Some(now), 10, true, now),
            Freshness::Forced
        );
    }

    #[test]
    fn future_sync_timestamp_counts_as_fresh() {
        let now = Utc::now();
        let result = evaluator().evaluate(Some(now + Duration::minutes(2)), 4, false, now);
        assert_eq!(result, Freshness::Fresh);
    }

    #[test]
    fn negative_ttl_is_clamped() {
        assert_eq!(FreshnessEvaluator::from_minutes(-1).ttl(), Duration::zero());
    }
}
