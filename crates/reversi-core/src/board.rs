//! Reversi board representation using bitboards.

use std::fmt;

use arrayvec::ArrayVec;

use crate::bitboard::Bitboard;
use crate::constants::MAX_MOVES;
use crate::disc::Disc;
use crate::flip;
use crate::square::Square;
use crate::types::Score;

/// Successor positions of a board, in move order.
pub type Successors = ArrayVec<Board, MAX_MOVES>;

/// A Reversi position seen from the side to move.
///
/// `player` holds the discs of the side to move, `opponent` those of the other side.
/// The colour of the side to move is not stored: two positions that differ only in
/// colours are the same position.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Board {
    /// Bitboard representing the player's discs.
    pub player: Bitboard,
    /// Bitboard representing the opponent's discs.
    pub opponent: Bitboard,
}

impl Default for Board {
    /// Creates a board with the standard starting position, Black to move.
    fn default() -> Self {
        Board {
            player: Square::D5.bitboard() | Square::E4.bitboard(),
            opponent: Square::D4.bitboard() | Square::E5.bitboard(),
        }
    }
}

impl Board {
    /// Creates a new `Board` with the initial Reversi setup.
    pub fn new() -> Board {
        Default::default()
    }

    /// Creates a `Board` from given bitboards.
    ///
    /// # Arguments
    /// * `player` - Bitboard representing the player's discs.
    /// * `opponent` - Bitboard representing the opponent's discs.
    pub fn from_bitboards(player: impl Into<Bitboard>, opponent: impl Into<Bitboard>) -> Board {
        Board {
            player: player.into(),
            opponent: opponent.into(),
        }
    }

    /// Creates a `Board` from a string representation.
    ///
    /// The string holds 64 characters for the squares A1 to H8. The character of
    /// `current_player` marks the side to move, `'-'` marks an empty square, and any
    /// other character marks an opponent disc.
    ///
    /// # Arguments
    /// * `board_string` - A string representing the board.
    /// * `current_player` - The colour of the side to move.
    pub fn from_string(board_string: &str, current_player: Disc) -> Board {
        let mut player = Bitboard::new(0);
        let mut opponent = Bitboard::new(0);
        for (index, c) in board_string.chars().take(64).enumerate() {
            let sq = Square::from_usize_unchecked(index);
            if c == current_player.to_char() {
                player = player.set(sq);
            } else if c != '-' {
                opponent = opponent.set(sq);
            }
        }
        Board { player, opponent }
    }

    /// Returns the empty squares.
    #[inline]
    pub fn get_empty(&self) -> Bitboard {
        !(self.player | self.opponent)
    }

    /// Returns the number of the player's discs.
    #[inline]
    pub fn get_player_count(&self) -> u32 {
        self.player.count()
    }

    /// Returns the number of the opponent's discs.
    #[inline]
    pub fn get_opponent_count(&self) -> u32 {
        self.opponent.count()
    }

    /// Returns the number of empty squares.
    #[inline]
    pub fn get_empty_count(&self) -> u32 {
        self.get_empty().count()
    }

    /// Returns the same position with the side to move switched (a pass).
    #[inline]
    pub fn switch_players(&self) -> Board {
        Board {
            player: self.opponent,
            opponent: self.player,
        }
    }

    /// Returns the legal moves of the side to move.
    #[inline]
    pub fn get_moves(&self) -> Bitboard {
        self.player.get_moves(self.opponent)
    }

    /// Checks if the side to move has any legal move.
    #[inline]
    pub fn has_legal_moves(&self) -> bool {
        !self.get_moves().is_empty()
    }

    /// Checks if the side to move has no move but the opponent has one.
    #[inline]
    pub fn must_pass(&self) -> bool {
        !self.has_legal_moves() && self.switch_players().has_legal_moves()
    }

    /// Checks if the game is over (neither player can make a move).
    #[inline]
    pub fn is_game_over(&self) -> bool {
        !self.has_legal_moves() && !self.switch_players().has_legal_moves()
    }

    /// Plays a move, returning `None` if it flips nothing or the square is occupied.
    ///
    /// The returned board is seen from the opponent's side.
    pub fn try_make_move(&self, sq: Square) -> Option<Board> {
        if !self.get_empty().contains(sq) {
            return None;
        }
        let flipped = flip::flip(sq, self.player, self.opponent);
        if flipped.is_empty() {
            return None;
        }
        Some(self.make_move_with_flipped(flipped, sq))
    }

    /// Plays a move known to be legal.
    ///
    /// The returned board is seen from the opponent's side.
    #[inline]
    pub fn make_move(&self, sq: Square) -> Board {
        let flipped = flip::flip(sq, self.player, self.opponent);
        debug_assert!(!flipped.is_empty(), "illegal move {sq}");
        self.make_move_with_flipped(flipped, sq)
    }

    #[inline]
    fn make_move_with_flipped(&self, flipped: Bitboard, sq: Square) -> Board {
        Board {
            player: self.opponent ^ flipped,
            opponent: self.player ^ flipped ^ sq.bitboard(),
        }
    }

    /// Returns the positions reachable by one legal move, in square order.
    ///
    /// A position without legal moves has no successors; use [`Board::must_pass`]
    /// to tell a pass from the end of the game.
    pub fn successors(&self) -> Successors {
        self.get_moves().iter().map(|sq| self.make_move(sq)).collect()
    }

    /// Returns the final disc difference of a finished game for the side to move.
    ///
    /// Empty squares are awarded to the winner.
    pub fn final_score(&self) -> Score {
        let p = self.get_player_count() as Score;
        let o = self.get_opponent_count() as Score;
        let empties = self.get_empty_count() as Score;
        match p.cmp(&o) {
            std::cmp::Ordering::Greater => p - o + empties,
            std::cmp::Ordering::Less => p - o - empties,
            std::cmp::Ordering::Equal => 0,
        }
    }

    /// Calculates a hash of the position.
    #[inline]
    pub fn hash(&self) -> u64 {
        use rapidhash::v3;
        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(&self.player.bits().to_le_bytes());
        bytes[8..].copy_from_slice(&self.opponent.bits().to_le_bytes());
        v3::rapidhash_v3_nano_inline::<true, false>(&bytes, &v3::DEFAULT_RAPID_SECRETS)
    }

    /// Applies the same bitboard transform to both sides.
    #[inline]
    fn transform(&self, f: impl Fn(Bitboard) -> Bitboard) -> Board {
        Board {
            player: f(self.player),
            opponent: f(self.opponent),
        }
    }

    /// Returns the eight images of the position under the board's symmetry group.
    ///
    /// The identity comes first.
    pub fn symmetries(&self) -> [Board; 8] {
        [
            *self,
            self.transform(Bitboard::rotate_90_clockwise),
            self.transform(Bitboard::rotate_180_clockwise),
            self.transform(Bitboard::rotate_270_clockwise),
            self.transform(Bitboard::flip_vertical),
            self.transform(Bitboard::flip_horizontal),
            self.transform(Bitboard::flip_diag_a1h8),
            self.transform(Bitboard::flip_diag_a8h1),
        ]
    }

    /// Returns the canonical representative of the position's symmetry class.
    ///
    /// All rotations and reflections of a position map to the same board: the one
    /// with the smallest `(player, opponent)` pair.
    pub fn unique(&self) -> Board {
        let mut best = *self;
        for b in self.symmetries() {
            if (b.player, b.opponent) < (best.player, best.opponent) {
                best = b;
            }
        }
        best
    }

    /// Renders the board as 64 characters, A1 to H8.
    ///
    /// # Arguments
    /// * `current_player` - The colour of the side to move.
    pub fn to_string_as_board(&self, current_player: Disc) -> String {
        Square::iter()
            .map(|sq| {
                if self.player.contains(sq) {
                    current_player.to_char()
                } else if self.opponent.contains(sq) {
                    current_player.opposite().to_char()
                } else {
                    Disc::Empty.to_char()
                }
            })
            .collect()
    }
}

impl fmt::Display for Board {
    /// Formats the board as an 8x8 grid, showing the side to move as Black.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.to_string_as_board(Disc::Black);
        writeln!(f, "  a b c d e f g h")?;
        for (rank, row) in s.as_bytes().chunks(8).enumerate() {
            write!(f, "{}", rank + 1)?;
            for &c in row {
                write!(f, " {}", c as char)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_board() {
        let board = Board::default();
        assert_eq!(board.get_player_count(), 2);
        assert_eq!(board.get_opponent_count(), 2);
        assert_eq!(board.get_empty_count(), 60);
        assert_eq!(board, Board::new());
    }

    #[test]
    fn test_from_string_round_trip() {
        let s = "--O--O----OOOOO-XOOOOOOOXXOOXOOOXXXXXOXXXOXXOOXXXXXXOXOXXOOOOOOX";
        let board = Board::from_string(s, Disc::Black);
        assert_eq!(board.to_string_as_board(Disc::Black), s);
        assert_eq!(board.get_empty_count(), 9);
    }

    #[test]
    fn test_make_move() {
        let board = Board::new();
        let next = board.make_move(Square::D3);
        // Seen from White: one White disc left, four Black discs.
        assert_eq!(next.get_player_count(), 1);
        assert_eq!(next.get_opponent_count(), 4);
        assert!(next.opponent.contains(Square::D3));
        assert!(next.opponent.contains(Square::D4));
    }

    #[test]
    fn test_try_make_move_illegal() {
        let board = Board::new();
        assert!(board.try_make_move(Square::A1).is_none());
        assert!(board.try_make_move(Square::D4).is_none());
        assert!(board.try_make_move(Square::F5).is_some());
    }

    #[test]
    fn test_successors_initial() {
        let board = Board::new();
        let successors = board.successors();
        assert_eq!(successors.len(), 4);
        // The four opening moves are symmetric to each other.
        let first = successors[0].unique();
        assert!(successors.iter().all(|b| b.unique() == first));
    }

    #[test]
    fn test_pass_and_game_over() {
        // Black owns everything except one empty corner that White cannot take.
        let mut s = "X".repeat(63);
        s.push('-');
        let board = Board::from_string(&s, Disc::White);
        assert!(!board.has_legal_moves());
        assert!(board.is_game_over());
        assert!(!board.must_pass());
        assert_eq!(board.final_score(), -64);

        let mut s = "X".repeat(62);
        s.push_str("O-");
        let board = Board::from_string(&s, Disc::White);
        // White cannot move, Black can play H8 capturing G8.
        assert!(!board.has_legal_moves());
        assert!(board.must_pass());
        assert!(!board.is_game_over());
    }

    #[test]
    fn test_final_score_gives_empties_to_winner() {
        let board = Board::from_bitboards(0b111u64, 0b1000u64);
        assert_eq!(board.final_score(), 3 - 1 + 60);
        assert_eq!(board.switch_players().final_score(), -(3 - 1 + 60));
        let draw = Board::from_bitboards(0b1u64, 0b10u64);
        assert_eq!(draw.final_score(), 0);
    }

    #[test]
    fn test_unique_is_symmetry_invariant() {
        let board = Board::new().make_move(Square::F5).make_move(Square::D6);
        let canonical = board.unique();
        for image in board.symmetries() {
            assert_eq!(image.unique(), canonical);
        }
        assert_eq!(canonical.unique(), canonical);
    }

    #[test]
    fn test_hash_differs_on_side_to_move() {
        let board = Board::new().make_move(Square::F5);
        assert_ne!(board.hash(), board.switch_players().hash());
        assert_eq!(board.hash(), board.hash());
    }
}
