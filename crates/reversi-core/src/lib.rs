//! Position representation and the concrete collaborators of the analysis engine:
//! move generation, a shallow heuristic evaluator and an exact endgame solver.

pub mod bitboard;
pub mod board;
pub mod constants;
pub mod disc;
pub mod endgame;
pub mod flip;
pub mod heuristic;
pub mod perft;
pub mod square;
pub mod types;
