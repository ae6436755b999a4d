//! Remote API boundary shared by every commit source.
//!
//! [`CommitSource`] is the seam the sync orchestrator drives. The GitHub
//! client implements it over HTTP; tests implement it with scripted pages.
//!
//! ```ignore
//! use commitcal::platform::{CommitSource, PageRequest, RepoRef};
//!
//! let page = source
//!     .fetch_page(&RepoRef::new("a", "x"), &PageRequest::new(1, 100), &cancel)
//!     .await?;
//! ```

mod errors;
mod rate_limit;
mod types;

pub use errors::{PlatformError, Result, short_error_message};
pub use rate_limit::{ApiRateLimiter, rate_limits};
pub use types::{
    CommitSource, MAX_PAGE_SIZE, PageRequest, RateLimitInfo, RemoteCommit, RemoteRepository,
    RepoRef,
};
