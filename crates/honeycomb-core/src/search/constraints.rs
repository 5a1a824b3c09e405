//! Search limit configuration.

use std::time::Duration;

use crate::error::SearchError;

/// Execution strategy for a search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchMode {
    /// Single-threaded search on the caller's thread.
    Seq,
    /// Fork-join parallel search.
    Par,
}

/// Limits guiding one search call.
///
/// `time_limit` of zero means unbounded. When both depth and time limits
/// are set, the search stops at whichever is reached first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchConstraints {
    depth_limit: i32,
    time_limit: Duration,
    mode: SearchMode,
}

impl SearchConstraints {
    /// Creates validated constraints. Fails with `InvalidArgument` when
    /// `depth_limit` is below one.
    pub fn new(
        depth_limit: i32,
        time_limit: Duration,
        mode: SearchMode,
    ) -> Result<SearchConstraints, SearchError> {
        if depth_limit < 1 {
            return Err(SearchError::InvalidArgument(format!(
                "depth limit must be at least 1, got {depth_limit}"
            )));
        }
        Ok(SearchConstraints {
            depth_limit,
            time_limit,
            mode,
        })
    }

    /// Sequential, depth-only constraints.
    pub fn depth(depth_limit: i32) -> Result<SearchConstraints, SearchError> {
        SearchConstraints::new(depth_limit, Duration::ZERO, SearchMode::Seq)
    }

    /// The same constraints with a different time limit.
    pub fn with_time_limit(mut self, time_limit: Duration) -> SearchConstraints {
        self.time_limit = time_limit;
        self
    }

    /// The same constraints with a different mode.
    pub fn with_mode(mut self, mode: SearchMode) -> SearchConstraints {
        self.mode = mode;
        self
    }

    #[inline]
    pub fn depth_limit(&self) -> i32 {
        self.depth_limit
    }

    /// Configured wall-clock limit; zero means none.
    #[inline]
    pub fn time_limit(&self) -> Duration {
        self.time_limit
    }

    #[inline]
    pub fn mode(&self) -> SearchMode {
        self.mode
    }
}
