//! Bitboard newtype, board symmetries, and legal-move masks.

use crate::square::Square;

/// Bitboard mask of the four corner squares (A1, H1, A8, H8).
pub const CORNER_MASK: u64 = 0x8100000000000081;

/// Bitboard mask of the X-squares diagonally adjacent to the corners.
pub const X_SQUARE_MASK: u64 = 0x0042000000004200;

/// A set of squares, one bit per square with A1 as the least significant bit.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Bitboard(u64);

impl Bitboard {
    /// Creates a new bitboard from raw bits.
    #[inline(always)]
    pub const fn new(bits: u64) -> Self {
        Bitboard(bits)
    }

    /// Returns the raw 64-bit value.
    #[inline(always)]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Creates a bitboard with a single bit set at the given square.
    #[inline(always)]
    pub const fn from_square(sq: Square) -> Self {
        Bitboard(1 << sq as u8)
    }

    /// Returns a new bitboard with the bit at the given square set.
    #[inline(always)]
    pub fn set(self, sq: Square) -> Self {
        Bitboard(self.0 | Bitboard::from_square(sq).0)
    }

    /// Checks if the bitboard contains the given square.
    #[inline(always)]
    pub fn contains(self, sq: Square) -> bool {
        self.0 & Bitboard::from_square(sq).0 != 0
    }

    /// Checks if no bits are set.
    #[inline(always)]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns the number of set bits.
    #[inline(always)]
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Returns the lowest set square together with the remaining bits.
    ///
    /// # Returns
    ///
    /// `None` when the bitboard is empty.
    #[inline(always)]
    pub fn pop_lsb(self) -> Option<(Square, Self)> {
        if self.0 == 0 {
            return None;
        }
        let sq = Square::from_usize_unchecked(self.0.trailing_zeros() as usize);
        Some((sq, Bitboard(self.0 & self.0.wrapping_sub(1))))
    }

    /// Mirrors ranks (rank 1 ↔ rank 8).
    #[inline(always)]
    pub fn flip_vertical(self) -> Self {
        Bitboard(self.0.swap_bytes())
    }

    /// Mirrors files (file A ↔ file H).
    #[inline(always)]
    pub fn flip_horizontal(self) -> Self {
        const MASK1: u64 = 0x5555555555555555;
        const MASK2: u64 = 0x3333333333333333;
        const MASK3: u64 = 0x0f0f0f0f0f0f0f0f;

        let mut b = self.0;
        b = ((b >> 1) & MASK1) | ((b & MASK1) << 1);
        b = ((b >> 2) & MASK2) | ((b & MASK2) << 2);
        b = ((b >> 4) & MASK3) | ((b & MASK3) << 4);
        Bitboard(b)
    }

    /// Transposes along the A1-H8 diagonal.
    #[inline(always)]
    pub fn flip_diag_a1h8(self) -> Self {
        let mut bits = self.0;
        bits = delta_swap(bits, 0x0f0f0f0f00000000, 28);
        bits = delta_swap(bits, 0x3333000033330000, 14);
        bits = delta_swap(bits, 0x5500550055005500, 7);
        Bitboard(bits)
    }

    /// Transposes along the A8-H1 diagonal.
    #[inline(always)]
    pub fn flip_diag_a8h1(self) -> Self {
        let mut bits = self.0;
        bits = delta_swap(bits, 0xf0f0f0f000000000, 36);
        bits = delta_swap(bits, 0xcccc0000cccc0000, 18);
        bits = delta_swap(bits, 0xaa00aa00aa00aa00, 9);
        Bitboard(bits)
    }

    /// Rotates 90 degrees clockwise.
    #[inline(always)]
    pub fn rotate_90_clockwise(self) -> Self {
        self.flip_diag_a8h1().flip_vertical()
    }

    /// Rotates 180 degrees.
    #[inline(always)]
    pub fn rotate_180_clockwise(self) -> Self {
        Bitboard(self.0.reverse_bits())
    }

    /// Rotates 270 degrees clockwise.
    #[inline(always)]
    pub fn rotate_270_clockwise(self) -> Self {
        self.flip_diag_a1h8().flip_vertical()
    }

    /// Returns an iterator over all set squares, lowest index first.
    #[inline(always)]
    pub fn iter(self) -> BitboardIterator {
        BitboardIterator { bitboard: self }
    }

    /// Gets the legal moves of the owner of `self` against `opponent`.
    #[inline(always)]
    pub fn get_moves(self, opponent: Bitboard) -> Bitboard {
        Bitboard(get_moves(self.0, opponent.0))
    }

    /// Gets the empty squares adjacent to at least one `opponent` disc.
    ///
    /// Used as a cheap estimate of future mobility.
    #[inline(always)]
    pub fn get_potential_moves(self, opponent: Bitboard) -> Bitboard {
        let o = opponent.0;
        let spread = |b: u64, dir: u32| (b << dir) | (b >> dir);
        let h = spread(o & 0x7E7E7E7E7E7E7E7E, 1);
        let v = spread(o & 0x00FFFFFFFFFFFF00, 8);
        let d1 = spread(o & 0x007E7E7E7E7E7E00, 7);
        let d2 = spread(o & 0x007E7E7E7E7E7E00, 9);
        Bitboard((h | v | d1 | d2) & !(self.0 | o))
    }
}

impl std::ops::BitAnd for Bitboard {
    type Output = Self;

    #[inline(always)]
    fn bitand(self, rhs: Self) -> Self {
        Bitboard(self.0 & rhs.0)
    }
}

impl std::ops::BitOr for Bitboard {
    type Output = Self;

    #[inline(always)]
    fn bitor(self, rhs: Self) -> Self {
        Bitboard(self.0 | rhs.0)
    }
}

impl std::ops::BitXor for Bitboard {
    type Output = Self;

    #[inline(always)]
    fn bitxor(self, rhs: Self) -> Self {
        Bitboard(self.0 ^ rhs.0)
    }
}

impl std::ops::Not for Bitboard {
    type Output = Self;

    #[inline(always)]
    fn not(self) -> Self {
        Bitboard(!self.0)
    }
}

impl std::ops::BitOrAssign for Bitboard {
    #[inline(always)]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl From<u64> for Bitboard {
    #[inline(always)]
    fn from(bits: u64) -> Self {
        Bitboard(bits)
    }
}

impl From<Bitboard> for u64 {
    #[inline(always)]
    fn from(b: Bitboard) -> Self {
        b.0
    }
}

impl IntoIterator for Bitboard {
    type Item = Square;
    type IntoIter = BitboardIterator;

    #[inline(always)]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Gets the legal moves for `player`.
///
/// Reference: <https://github.com/abulmo/edax-reversi/blob/14f048c05ddfa385b6bf954a9c2905bbe677e9d3/src/board.c#L822>
#[inline(always)]
fn get_moves(player: u64, opponent: u64) -> u64 {
    let empty = !(player | opponent);
    (get_some_moves(player, opponent & 0x007E7E7E7E7E7E00, 7)
        | get_some_moves(player, opponent & 0x007E7E7E7E7E7E00, 9)
        | get_some_moves(player, opponent & 0x7E7E7E7E7E7E7E7E, 1)
        | get_some_moves(player, opponent & 0x00FFFFFFFFFFFF00, 8))
        & empty
}

/// Propagates runs of masked opponent discs along one direction, both ways.
#[inline(always)]
fn get_some_moves(b: u64, mask: u64, dir: u32) -> u64 {
    let mut flip = ((b << dir) | (b >> dir)) & mask;
    for _ in 0..5 {
        flip |= ((flip << dir) | (flip >> dir)) & mask;
    }
    (flip << dir) | (flip >> dir)
}

/// Swaps the bit pairs selected by `mask` with the bits `delta` positions above them.
#[inline(always)]
fn delta_swap(bits: u64, mask: u64, delta: u32) -> u64 {
    let tmp = mask & (bits ^ (bits << delta));
    bits ^ tmp ^ (tmp >> delta)
}

/// Yields each set square of a bitboard.
pub struct BitboardIterator {
    bitboard: Bitboard,
}

impl Iterator for BitboardIterator {
    type Item = Square;

    #[inline(always)]
    fn next(&mut self) -> Option<Self::Item> {
        let (sq, rest) = self.bitboard.pop_lsb()?;
        self.bitboard = rest;
        Some(sq)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.bitboard.count() as usize;
        (n, Some(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_contains() {
        let board = Bitboard::new(0).set(Square::A1).set(Square::H8);
        assert!(board.contains(Square::A1));
        assert!(board.contains(Square::H8));
        assert!(!board.contains(Square::D4));
        assert_eq!(board.count(), 2);
    }

    #[test]
    fn test_get_moves_initial_position() {
        let player = Square::D5.bitboard() | Square::E4.bitboard();
        let opponent = Square::D4.bitboard() | Square::E5.bitboard();
        let moves = player.get_moves(opponent);

        assert!(moves.contains(Square::C4));
        assert!(moves.contains(Square::F5));
        assert!(moves.contains(Square::D3));
        assert!(moves.contains(Square::E6));
        assert_eq!(moves.count(), 4);
    }

    #[test]
    fn test_get_moves_no_wrap_around() {
        // H1 owned, G1 opponent: the move at F1 is legal, nothing wraps to A2.
        let player = Square::H1.bitboard();
        let opponent = Square::G1.bitboard();
        let moves = player.get_moves(opponent);
        assert_eq!(moves, Square::F1.bitboard());
    }

    #[test]
    fn test_iter_order() {
        let board = Square::C3.bitboard() | Square::A1.bitboard() | Square::H8.bitboard();
        let squares: Vec<Square> = board.iter().collect();
        assert_eq!(squares, vec![Square::A1, Square::C3, Square::H8]);
    }

    #[test]
    fn test_symmetries() {
        let b = Square::B1.bitboard();
        assert_eq!(b.flip_vertical(), Square::B8.bitboard());
        assert_eq!(b.flip_horizontal(), Square::G1.bitboard());
        assert_eq!(b.flip_diag_a1h8(), Square::A2.bitboard());
        assert_eq!(b.flip_diag_a8h1(), Square::H7.bitboard());
        assert_eq!(b.rotate_180_clockwise(), Square::G8.bitboard());
        assert_eq!(
            b.rotate_90_clockwise().rotate_270_clockwise(),
            b,
            "rotations must compose to the identity"
        );
    }

    #[test]
    fn test_potential_moves() {
        let player = Square::D5.bitboard();
        let opponent = Square::D4.bitboard();
        let potential = player.get_potential_moves(opponent);
        assert_eq!(potential.count(), 7);
        assert!(potential.contains(Square::C3));
        assert!(potential.contains(Square::E5));
        assert!(!potential.contains(Square::D5));
    }
}
