//! Error types of the analysis engine.

use reversi_core::types::Score;
use thiserror::Error;

use crate::search_result::SearchStatus;

/// Errors returned by the public analysis surface.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("invalid search bounds [{lower}, {upper}]: expected odd values with -63 <= lower <= upper <= 63")]
    InvalidBounds { lower: Score, upper: Score },

    #[error("all {0} search slots of this arena epoch are in use")]
    NoFreeSlot(usize),

    #[error("a search is still running on this analyzer")]
    SearchInProgress,

    #[error("search cannot be resumed from status {0:?}")]
    NotResumable(SearchStatus),

    #[error("failed to spawn search thread")]
    Spawn(#[from] std::io::Error),

    #[error(transparent)]
    Arena(#[from] ArenaError),
}

/// Signals that the node arena cannot hold another position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ArenaError {
    #[error("node arena is full ({capacity} nodes)")]
    Full { capacity: usize },
}

/// Invariant violations found while walking a search tree.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TreeError {
    #[error("node {board_hash:#018x} has {actual} children, expected {expected}")]
    WrongChildCount {
        board_hash: u64,
        expected: usize,
        actual: usize,
    },

    #[error("node {board_hash:#018x} has a child that is not a successor")]
    UnexpectedChild { board_hash: u64 },

    #[error("node {board_hash:#018x} has bounds [{lower}, {upper}] and window [{weak_lower}, {weak_upper}]")]
    WindowOutsideBounds {
        board_hash: u64,
        lower: Score,
        upper: Score,
        weak_lower: Score,
        weak_upper: Score,
    },

    #[error("node {board_hash:#018x} has increasing probability at threshold {threshold}")]
    NonMonotonicProbability { board_hash: u64, threshold: Score },

    #[error("node {board_hash:#018x} does not match its children at threshold {threshold}")]
    InconsistentEvaluation { board_hash: u64, threshold: Score },

    #[error("node {board_hash:#018x} has {visits} visits but its fathers recorded {recorded}")]
    VisitLedger {
        board_hash: u64,
        visits: u64,
        recorded: u64,
    },
}
