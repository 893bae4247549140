//! Board squares in algebraic notation.

use std::fmt;
use std::str::FromStr;

use crate::bitboard::Bitboard;

/// Number of files and ranks on the board.
pub const BOARD_SIZE: usize = 8;

/// Number of squares on the board.
pub const TOTAL_SQUARES: usize = BOARD_SIZE * BOARD_SIZE;

/// A square on the board, from A1 to H8.
///
/// Squares are indexed rank by rank:
///
/// ```text
///   A  B  C  D  E  F  G  H
/// 1 00 01 02 03 04 05 06 07
/// 2 08 09 10 11 12 13 14 15
/// ...
/// 8 56 57 58 59 60 61 62 63
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
#[rustfmt::skip]
pub enum Square {
    A1, B1, C1, D1, E1, F1, G1, H1,
    A2, B2, C2, D2, E2, F2, G2, H2,
    A3, B3, C3, D3, E3, F3, G3, H3,
    A4, B4, C4, D4, E4, F4, G4, H4,
    A5, B5, C5, D5, E5, F5, G5, H5,
    A6, B6, C6, D6, E6, F6, G6, H6,
    A7, B7, C7, D7, E7, F7, G7, H7,
    A8, B8, C8, D8, E8, F8, G8, H8,
}

impl Square {
    /// Returns a bitboard with only this square set.
    #[inline(always)]
    pub const fn bitboard(self) -> Bitboard {
        Bitboard::from_square(self)
    }

    /// Returns the index of the square (0-63).
    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Converts an index into a `Square` without bounds checking.
    ///
    /// # Arguments
    ///
    /// * `index` - Square index; must be below 64.
    #[inline(always)]
    pub fn from_usize_unchecked(index: usize) -> Square {
        debug_assert!(index < TOTAL_SQUARES, "square index out of range: {index}");
        // SAFETY: `Square` is `repr(u8)` with 64 contiguous variants starting at zero.
        unsafe { std::mem::transmute::<u8, Square>(index as u8) }
    }

    /// Converts an index into a `Square`.
    ///
    /// # Returns
    ///
    /// `None` when `index` is 64 or larger.
    #[inline]
    pub fn from_usize(index: usize) -> Option<Square> {
        (index < TOTAL_SQUARES).then(|| Square::from_usize_unchecked(index))
    }

    /// Builds a square from a file (0 = A) and a rank (0 = 1).
    #[inline]
    pub fn from_file_rank(file: usize, rank: usize) -> Option<Square> {
        (file < BOARD_SIZE && rank < BOARD_SIZE)
            .then(|| Square::from_usize_unchecked(rank * BOARD_SIZE + file))
    }

    /// Returns the file of the square (0 = A).
    #[inline]
    pub const fn file(self) -> usize {
        self as usize % BOARD_SIZE
    }

    /// Returns the rank of the square (0 = rank 1).
    #[inline]
    pub const fn rank(self) -> usize {
        self as usize / BOARD_SIZE
    }

    /// Iterates over all 64 squares in index order.
    pub fn iter() -> impl Iterator<Item = Square> {
        (0..TOTAL_SQUARES).map(Square::from_usize_unchecked)
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let file = (b'a' + self.file() as u8) as char;
        write!(f, "{}{}", file, self.rank() + 1)
    }
}

/// Error returned when a square name cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSquareError(String);

impl fmt::Display for ParseSquareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid square: {:?}", self.0)
    }
}

impl std::error::Error for ParseSquareError {}

impl FromStr for Square {
    type Err = ParseSquareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 2 {
            return Err(ParseSquareError(s.to_string()));
        }
        let file = bytes[0].to_ascii_lowercase().wrapping_sub(b'a') as usize;
        let rank = bytes[1].wrapping_sub(b'1') as usize;
        Square::from_file_rank(file, rank).ok_or_else(|| ParseSquareError(s.to_string()))
    }
}
