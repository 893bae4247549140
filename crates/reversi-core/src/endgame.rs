//! Exact endgame solver.
//!
//! A fail-soft negamax alpha-beta over the full game tree, ordering moves by the
//! opponent's resulting mobility. Every call carries a node budget so callers can
//! bound the cost of a solve and fall back to something cheaper.

use arrayvec::ArrayVec;

use crate::bitboard::CORNER_MASK;
use crate::board::Board;
use crate::constants::{MAX_MOVES, SCORE_MAX, SCORE_MIN};
use crate::types::Score;

/// Positions with fewer empties than this are searched in plain move order.
const ORDERING_MIN_EMPTIES: u32 = 5;

/// Result of a bounded exact solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveOutcome {
    /// The true value lies in `[lower, upper]`.
    ///
    /// The bounds are exact when the value falls strictly inside the requested
    /// window, and one-sided otherwise.
    Bounded {
        lower: Score,
        upper: Score,
        n_nodes: u64,
    },
    /// The node budget ran out before the search finished.
    Exhausted { n_nodes: u64 },
}

impl SolveOutcome {
    /// Number of nodes visited by the solve.
    pub fn n_nodes(&self) -> u64 {
        match *self {
            SolveOutcome::Bounded { n_nodes, .. } | SolveOutcome::Exhausted { n_nodes } => n_nodes,
        }
    }
}

/// Solves `board` within the window `(alpha, beta)` visiting at most `node_budget` nodes.
///
/// # Arguments
///
/// * `board` - Position to solve, from the side to move.
/// * `alpha` - Lower edge of the window (exclusive).
/// * `beta` - Upper edge of the window (exclusive).
/// * `node_budget` - Maximum number of nodes to visit.
///
/// # Returns
///
/// The bounds implied by the fail-soft result, or `Exhausted` if the budget ran out.
pub fn solve(board: &Board, alpha: Score, beta: Score, node_budget: u64) -> SolveOutcome {
    debug_assert!(alpha < beta);
    let mut search = EndgameSearch {
        n_nodes: 0,
        node_budget,
    };
    match search.negamax(board, alpha, beta) {
        Some(score) => SolveOutcome::Bounded {
            lower: if score > alpha { score } else { SCORE_MIN },
            upper: if score < beta { score } else { SCORE_MAX },
            n_nodes: search.n_nodes,
        },
        None => SolveOutcome::Exhausted {
            n_nodes: search.n_nodes,
        },
    }
}

/// Solves `board` exactly without a node budget.
pub fn solve_exact(board: &Board) -> Score {
    let mut search = EndgameSearch {
        n_nodes: 0,
        node_budget: u64::MAX,
    };
    search
        .negamax(board, SCORE_MIN - 1, SCORE_MAX + 1)
        .unwrap_or_default()
}

struct EndgameSearch {
    n_nodes: u64,
    node_budget: u64,
}

impl EndgameSearch {
    /// Returns `None` once the node budget is exceeded.
    fn negamax(&mut self, board: &Board, alpha: Score, beta: Score) -> Option<Score> {
        self.n_nodes += 1;
        if self.n_nodes > self.node_budget {
            return None;
        }

        let moves = board.get_moves();
        if moves.is_empty() {
            let next = board.switch_players();
            if !next.has_legal_moves() {
                return Some(board.final_score());
            }
            return self.negamax(&next, -beta, -alpha).map(|score| -score);
        }

        let mut children: ArrayVec<(u32, Board), MAX_MOVES> = moves
            .iter()
            .map(|sq| {
                let next = board.make_move(sq);
                let corner_bonus = u32::from(sq.bitboard().bits() & CORNER_MASK == 0);
                (next.get_moves().count() * 2 + corner_bonus, next)
            })
            .collect();
        if board.get_empty_count() >= ORDERING_MIN_EMPTIES {
            children.sort_unstable_by_key(|&(key, _)| key);
        }

        let mut best = -SCORE_MAX - 1;
        for (_, next) in &children {
            let score = -self.negamax(next, -beta, -alpha.max(best))?;
            if score > best {
                best = score;
                if best >= beta {
                    break;
                }
            }
        }
        Some(best)
    }
}
