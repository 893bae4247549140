//! Global constants

use crate::types::Score;

/// Number of squares on the Reversi board.
pub const BOARD_SQUARES: usize = 64;

/// Upper bound on the number of successors of a position.
pub const MAX_MOVES: usize = 64;

/// Maximum possible score (disc difference).
pub const SCORE_MAX: Score = 64;

/// Minimum possible score (disc difference).
pub const SCORE_MIN: Score = -64;

/// Infinity score for search algorithms.
pub const SCORE_INF: Score = 30000;
