//! Disc flip calculation for move execution.

use crate::bitboard::Bitboard;
use crate::square::Square;

/// Shift amount and wrap-around mask for each of the eight ray directions.
///
/// Positive shifts move towards H8, negative shifts towards A1.
const DIRECTIONS: [(i32, u64); 8] = [
    (1, 0xfefefefefefefefe),
    (-1, 0x7f7f7f7f7f7f7f7f),
    (8, 0xffffffffffffffff),
    (-8, 0xffffffffffffffff),
    (9, 0xfefefefefefefefe),
    (-9, 0x7f7f7f7f7f7f7f7f),
    (7, 0x7f7f7f7f7f7f7f7f),
    (-7, 0xfefefefefefefefe),
];

#[inline(always)]
fn shift(b: u64, dir: i32) -> u64 {
    if dir > 0 { b << dir } else { b >> -dir }
}

/// Calculates which opponent discs would be flipped by placing a disc at `sq`.
///
/// # Arguments
///
/// * `sq` - The square where the disc is being placed
/// * `p` - Bitboard of the current player's discs
/// * `o` - Bitboard of the opponent's discs
///
/// # Returns
///
/// The opponent discs flipped by this move, or an empty bitboard if the move is illegal.
#[inline]
pub fn flip(sq: Square, p: Bitboard, o: Bitboard) -> Bitboard {
    let (p, o) = (p.bits(), o.bits());
    let x = sq.bitboard().bits();
    let mut flipped = 0;

    for &(dir, mask) in &DIRECTIONS {
        let mut line = 0;
        let mut cur = shift(x, dir) & mask;
        while cur & o != 0 {
            line |= cur;
            cur = shift(cur, dir) & mask;
        }
        if cur & p != 0 {
            flipped |= line;
        }
    }
    Bitboard::new(flipped)
}
