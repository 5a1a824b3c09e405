//! Engine error types.

use thiserror::Error;

/// Errors raised by the game model and the search entry points.
///
/// Argument and state errors are programming errors and abort the call
/// immediately; timeouts are not errors and are reported through
/// `SearchResult::timed_out` instead.
#[derive(Debug, Error)]
pub enum SearchError {
    /// A parameter was outside its documented domain.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation is not legal in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A stone was placed on an occupied, blocked or out-of-range cell.
    #[error("invalid move: cell {cell}")]
    InvalidMove { cell: u8 },
}
