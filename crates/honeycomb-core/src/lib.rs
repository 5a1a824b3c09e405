//! Honeycomb engine core.
//!
//! Honeycomb is a two-player perfect-information game on a triangular
//! grid of 55 cells with 30 scoring lines. This crate provides the
//! bitboard game model with incremental scoring, a negamax alpha-beta
//! searcher with iterative deepening, a fork-join parallel variant, and
//! a persistent transposition table keyed by symmetry-canonical
//! positions.

pub mod board;
pub mod error;
pub mod geometry;
pub mod score;
pub mod search;
pub mod state;
pub mod tt;

pub use board::{Board, Player};
pub use error::SearchError;
pub use score::score_delta;
pub use search::{
    SearchConstraints, SearchMode, SearchResult, SearchTelemetry, Searcher, SearcherBuilder,
};
pub use state::GameState;
pub use tt::{PersistenceStatus, TTEntry, TTFlag, TranspositionTable};
