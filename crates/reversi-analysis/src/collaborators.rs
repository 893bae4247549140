//! Services the engine consumes but does not implement.
//!
//! The defaults forward to `reversi-core`. Tests swap in their own
//! implementations to count calls or to force the fallback paths.

use std::sync::Arc;

use reversi_core::board::{Board, Successors};
use reversi_core::endgame::{self, SolveOutcome};
use reversi_core::heuristic::{self, Estimate};
use reversi_core::types::Score;

/// Legal move generation.
pub trait MoveGenerator: Send + Sync {
    /// Positions reachable by one legal move, seen from the opponent.
    fn legal_moves(&self, board: &Board) -> Successors;

    /// Checks if the side to move must pass.
    fn must_pass(&self, board: &Board) -> bool;
}

/// Shallow evaluation used to seed new leaves.
pub trait QuickEvaluator: Send + Sync {
    /// Estimates `board` with a search of about `depth` plies.
    fn estimate(&self, board: &Board, depth: u8) -> Estimate;
}

/// Exact endgame solving under a node budget.
pub trait ExactSolver: Send + Sync {
    /// Solves `board` inside the exclusive window `(alpha, beta)`.
    fn solve(&self, board: &Board, alpha: Score, beta: Score, node_budget: u64) -> SolveOutcome;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BitboardMoveGenerator;

impl MoveGenerator for BitboardMoveGenerator {
    #[inline]
    fn legal_moves(&self, board: &Board) -> Successors {
        board.successors()
    }

    #[inline]
    fn must_pass(&self, board: &Board) -> bool {
        board.must_pass()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEvaluator;

impl QuickEvaluator for HeuristicEvaluator {
    #[inline]
    fn estimate(&self, board: &Board, depth: u8) -> Estimate {
        heuristic::evaluate(board, depth)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AlphaBetaSolver;

impl ExactSolver for AlphaBetaSolver {
    #[inline]
    fn solve(&self, board: &Board, alpha: Score, beta: Score, node_budget: u64) -> SolveOutcome {
        endgame::solve(board, alpha, beta, node_budget)
    }
}

/// The three services bundled for sharing across threads.
#[derive(Clone)]
pub struct Collaborators {
    pub moves: Arc<dyn MoveGenerator>,
    pub evaluator: Arc<dyn QuickEvaluator>,
    pub solver: Arc<dyn ExactSolver>,
}

impl Collaborators {
    #[must_use]
    pub fn with_moves(mut self, moves: impl MoveGenerator + 'static) -> Self {
        self.moves = Arc::new(moves);
        self
    }

    #[must_use]
    pub fn with_evaluator(mut self, evaluator: impl QuickEvaluator + 'static) -> Self {
        self.evaluator = Arc::new(evaluator);
        self
    }

    #[must_use]
    pub fn with_solver(mut self, solver: impl ExactSolver + 'static) -> Self {
        self.solver = Arc::new(solver);
        self
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Collaborators {
            moves: Arc::new(BitboardMoveGenerator),
            evaluator: Arc::new(HeuristicEvaluator),
            solver: Arc::new(AlphaBetaSolver),
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
