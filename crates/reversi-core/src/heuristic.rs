//! Fast heuristic evaluation of midgame positions.
//!
//! The evaluator runs a shallow negamax over a handful of classic features:
//! mobility, potential mobility, corners, X-squares next to empty corners and the
//! disc difference, the latter weighted more heavily as the board fills up.

use crate::bitboard::CORNER_MASK;
use crate::board::Board;
use crate::types::Scoref;

/// Deepest search the evaluator accepts.
pub const MAX_HEURISTIC_DEPTH: u8 = 4;

const MOBILITY_WEIGHT: Scoref = 1.0;
const POTENTIAL_MOBILITY_WEIGHT: Scoref = 0.3;
const CORNER_WEIGHT: Scoref = 4.0;
const X_SQUARE_WEIGHT: Scoref = 2.0;

/// Corner and matching X-square indices.
const CORNER_X_SQUARES: [(u32, u32); 4] = [(0, 9), (7, 14), (56, 49), (63, 54)];

/// A heuristic score together with the depth it was computed at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    /// Expected final disc difference for the side to move.
    pub score: Scoref,
    /// Search depth behind the score; deeper estimates are more reliable.
    pub depth: u8,
}

/// Evaluates `board` with a negamax search of the given depth.
///
/// # Arguments
///
/// * `board` - Position to evaluate, from the side to move.
/// * `depth` - Search depth, clamped to `1..=MAX_HEURISTIC_DEPTH`.
pub fn evaluate(board: &Board, depth: u8) -> Estimate {
    let depth = depth.clamp(1, MAX_HEURISTIC_DEPTH);
    let score = negamax(board, depth, -Scoref::INFINITY, Scoref::INFINITY);
    Estimate {
        score: score.clamp(-64.0, 64.0),
        depth,
    }
}

fn negamax(board: &Board, depth: u8, alpha: Scoref, beta: Scoref) -> Scoref {
    let moves = board.get_moves();
    if moves.is_empty() {
        let next = board.switch_players();
        if !next.has_legal_moves() {
            return board.final_score() as Scoref;
        }
        if depth == 0 {
            return static_eval(board);
        }
        return -negamax(&next, depth - 1, -beta, -alpha);
    }
    if depth == 0 {
        return static_eval(board);
    }

    let mut best = -Scoref::INFINITY;
    let mut alpha = alpha;
    for sq in moves {
        let score = -negamax(&board.make_move(sq), depth - 1, -beta, -alpha);
        if score > best {
            best = score;
            if best >= beta {
                break;
            }
            alpha = alpha.max(best);
        }
    }
    best
}

/// Static evaluation in discs, from the side to move.
fn static_eval(board: &Board) -> Scoref {
    let p = board.player.bits();
    let o = board.opponent.bits();
    let empty = board.get_empty().bits();

    let mobility =
        board.get_moves().count() as Scoref - board.switch_players().get_moves().count() as Scoref;
    let potential = board.player.get_potential_moves(board.opponent).count() as Scoref
        - board.opponent.get_potential_moves(board.player).count() as Scoref;
    let corners = (p & CORNER_MASK).count_ones() as Scoref - (o & CORNER_MASK).count_ones() as Scoref;

    let mut risky = 0u64;
    for (corner, x) in CORNER_X_SQUARES {
        if empty & (1 << corner) != 0 {
            risky |= 1 << x;
        }
    }
    let x_squares = (p & risky).count_ones() as Scoref - (o & risky).count_ones() as Scoref;

    let filled = 1.0 - board.get_empty_count() as Scoref / 64.0;
    let discs = board.get_player_count() as Scoref - board.get_opponent_count() as Scoref;

    MOBILITY_WEIGHT * mobility + POTENTIAL_MOBILITY_WEIGHT * potential + CORNER_WEIGHT * corners
        - X_SQUARE_WEIGHT * x_squares
        + filled * filled * discs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::square::Square;

    #[test]
    fn test_initial_position_is_balanced() {
        let estimate = evaluate(&Board::new(), 2);
        assert!(estimate.score.abs() < 8.0, "{}", estimate.score);
        assert_eq!(estimate.depth, 2);
    }

    #[test]
    fn test_depth_is_clamped() {
        assert_eq!(evaluate(&Board::new(), 0).depth, 1);
        assert_eq!(evaluate(&Board::new(), 10).depth, MAX_HEURISTIC_DEPTH);
    }

    #[test]
    fn test_finished_game_is_exact() {
        let board = Board::from_bitboards(u64::MAX >> 1, 0u64);
        assert_eq!(evaluate(&board, 3).score, 64.0);
    }

    #[test]
    fn test_symmetric_positions_score_alike() {
        let board = Board::new().make_move(Square::F5).make_move(Square::F6);
        let score = evaluate(&board, 2).score;
        for image in board.symmetries() {
            assert!((evaluate(&image, 2).score - score).abs() < 1e-4);
        }
    }

    #[test]
    fn test_corner_owner_is_favoured() {
        let base = Board::new();
        let with_corner = Board::from_bitboards(base.player | Square::A1.bitboard(), base.opponent);
        assert!(static_eval(&with_corner) > static_eval(&base));
        assert!(static_eval(&with_corner.switch_players()) < static_eval(&base.switch_players()));
    }
}
