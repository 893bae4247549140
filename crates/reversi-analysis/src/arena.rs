//! Bulk node storage with a lock-free transposition index.
//!
//! Nodes live in one preallocated slice and are handed out by a bump cursor.
//! The index is an open-addressing table of `AtomicU64` slots, each packing
//! the epoch it was written in and a tag:
//!
//! - Bits 32-63: epoch
//! - Bits 0-31: 0 for empty, `u32::MAX` while a writer is filling the node,
//!   otherwise node id + 1
//!
//! A slot from an older epoch reads as empty, so [`NodeArena::reset`] only
//! bumps the epoch and rewinds the cursor.

use std::hint::spin_loop;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};

use aligned_vec::{AVec, ConstAlign};
use reversi_core::board::Board;
use reversi_core::types::Depth;

use crate::error::ArenaError;
use crate::node::{NodeId, SearchNode};

const TAG_EMPTY: u32 = 0;
const TAG_RESERVED: u32 = u32::MAX;
const SLOT_MIX: u64 = 0x9E37_79B9_7F4A_7C15;
const INDEX_ALIGN: usize = 64;

/// Identity of a node: the canonical position and the search slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeKey {
    board: Board,
    slot: u8,
}

impl NodeKey {
    /// Builds the key of `board`, reduced over the board symmetries.
    pub fn new(board: &Board, slot: u8) -> NodeKey {
        NodeKey {
            board: board.unique(),
            slot,
        }
    }

    /// Canonical position of the key.
    #[inline]
    pub fn board(&self) -> &Board {
        &self.board
    }

    #[inline]
    pub fn slot(&self) -> u8 {
        self.slot
    }

    #[inline]
    fn hash(&self) -> u64 {
        self.board.hash() ^ (self.slot as u64 + 1).wrapping_mul(SLOT_MIX)
    }
}

#[inline]
fn pack(epoch: u32, tag: u32) -> u64 {
    ((epoch as u64) << 32) | tag as u64
}

#[inline]
fn unpack(value: u64) -> (u32, u32) {
    ((value >> 32) as u32, value as u32)
}

/// Owner of every node of every search slot.
pub struct NodeArena {
    nodes: Box<[SearchNode]>,
    index: AVec<AtomicU64, ConstAlign<INDEX_ALIGN>>,
    mask: usize,
    cursor: AtomicUsize,
    epoch: AtomicU32,
}

impl NodeArena {
    /// Allocates room for `capacity` nodes and an index twice as large.
    pub fn new(capacity: usize) -> NodeArena {
        let capacity = capacity.max(1);
        let index_size = (capacity * 2).next_power_of_two();
        NodeArena {
            nodes: (0..capacity).map(|_| SearchNode::default()).collect(),
            index: AVec::from_iter(INDEX_ALIGN, (0..index_size).map(|_| AtomicU64::new(0))),
            mask: index_size - 1,
            cursor: AtomicUsize::new(0),
            epoch: AtomicU32::new(1),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    /// Number of nodes created in the current epoch.
    #[inline]
    pub fn len(&self) -> usize {
        self.cursor.load(Ordering::Relaxed).min(self.capacity())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn epoch(&self) -> u32 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Node `id` of the current epoch.
    #[inline]
    pub fn node(&self, id: NodeId) -> &SearchNode {
        &self.nodes[id as usize]
    }

    /// Node `id`, provided `epoch` is still current.
    pub fn get(&self, id: NodeId, epoch: u32) -> Option<&SearchNode> {
        if epoch != self.epoch() || id as usize >= self.len() {
            return None;
        }
        Some(&self.nodes[id as usize])
    }

    /// Finds the node of `key`, provided `epoch` is still current.
    pub fn lookup(&self, key: &NodeKey, epoch: u32) -> Option<NodeId> {
        if epoch != self.epoch() {
            return None;
        }
        let mut pos = key.hash() as usize & self.mask;
        loop {
            let (slot_epoch, tag) = unpack(self.index[pos].load(Ordering::Acquire));
            if slot_epoch != epoch || tag == TAG_EMPTY {
                return None;
            }
            if tag == TAG_RESERVED {
                spin_loop();
                continue;
            }
            let id = tag - 1;
            if self.is_node_of(id, key) {
                return Some(id);
            }
            pos = (pos + 1) & self.mask;
        }
    }

    /// Returns the node of `key`, creating it at `depth` if it does not exist.
    ///
    /// The flag is true when the node was created by this call.
    pub fn get_or_create(&self, key: &NodeKey, depth: Depth) -> Result<(NodeId, bool), ArenaError> {
        let epoch = self.epoch();
        let mut pos = key.hash() as usize & self.mask;
        loop {
            let slot = &self.index[pos];
            let value = slot.load(Ordering::Acquire);
            let (slot_epoch, tag) = unpack(value);

            if slot_epoch != epoch || tag == TAG_EMPTY {
                let reserved = pack(epoch, TAG_RESERVED);
                if slot
                    .compare_exchange(value, reserved, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
                {
                    continue;
                }
                let id = self.cursor.fetch_add(1, Ordering::Relaxed);
                if id >= self.capacity() {
                    slot.store(pack(epoch, TAG_EMPTY), Ordering::Release);
                    return Err(ArenaError::Full {
                        capacity: self.capacity(),
                    });
                }
                self.nodes[id].reset(key.board, depth, key.slot);
                slot.store(pack(epoch, id as u32 + 1), Ordering::Release);
                return Ok((id as NodeId, true));
            }

            if tag == TAG_RESERVED {
                spin_loop();
                continue;
            }
            let id = tag - 1;
            if self.is_node_of(id, key) {
                return Ok((id, false));
            }
            pos = (pos + 1) & self.mask;
        }
    }

    #[inline]
    fn is_node_of(&self, id: NodeId, key: &NodeKey) -> bool {
        self.nodes[id as usize].has_key(key.board.player.bits(), key.board.opponent.bits(), key.slot)
    }

    /// Invalidates every node in O(1).
    ///
    /// No worker may be running on the arena.
    pub fn reset(&self) {
        let next = self.epoch.load(Ordering::Relaxed).wrapping_add(1);
        if next == 0 {
            for slot in self.index.iter() {
                slot.store(0, Ordering::Relaxed);
            }
            self.epoch.store(1, Ordering::Release);
        } else {
            self.epoch.store(next, Ordering::Release);
        }
        self.cursor.store(0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reversi_core::square::Square;

    #[test]
    fn test_transposition_resolves_to_same_node() {
        let arena = NodeArena::new(16);
        let play = |moves: &[Square]| moves.iter().fold(Board::new(), |b, &sq| b.make_move(sq));
        let a = play(&[Square::F5, Square::D6, Square::C3, Square::D3, Square::C4]);
        let b = play(&[Square::F5, Square::D6, Square::C4, Square::D3, Square::C3]);
        assert_eq!(a, b);

        let (id_a, created_a) = arena.get_or_create(&NodeKey::new(&a, 0), 5).unwrap();
        let (id_b, created_b) = arena.get_or_create(&NodeKey::new(&b, 0), 5).unwrap();
        assert!(created_a);
        assert!(!created_b);
        assert_eq!(id_a, id_b);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_symmetric_positions_share_a_node() {
        let arena = NodeArena::new(16);
        let board = Board::new().make_move(Square::F5);
        let mut ids: Vec<NodeId> = board
            .symmetries()
            .iter()
            .map(|image| arena.get_or_create(&NodeKey::new(image, 0), 1).unwrap().0)
            .collect();
        ids.dedup();
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn test_slots_are_separate() {
        let arena = NodeArena::new(16);
        let board = Board::new();
        let (first, _) = arena.get_or_create(&NodeKey::new(&board, 0), 0).unwrap();
        let (second, created) = arena.get_or_create(&NodeKey::new(&board, 1), 0).unwrap();
        assert!(created);
        assert_ne!(first, second);
    }

    #[test]
    fn test_full_arena_is_an_error() {
        let arena = NodeArena::new(2);
        let board = Board::new();
        let mut keys = board.successors().into_iter().map(|b| NodeKey::new(&b, 0));
        assert!(arena.get_or_create(&keys.next().unwrap(), 1).is_ok());
        assert!(arena.get_or_create(&NodeKey::new(&board, 0), 0).is_ok());
        let third = NodeKey::new(&board.make_move(Square::F5).make_move(Square::F6), 0);
        assert_eq!(
            arena.get_or_create(&third, 2),
            Err(ArenaError::Full { capacity: 2 })
        );
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn test_reset_invalidates_old_epoch() {
        let arena = NodeArena::new(4);
        let key = NodeKey::new(&Board::new(), 0);
        let (id, _) = arena.get_or_create(&key, 0).unwrap();
        let old_epoch = arena.epoch();
        assert_eq!(arena.lookup(&key, old_epoch), Some(id));
        assert!(arena.get(id, old_epoch).is_some());

        arena.reset();
        assert!(arena.is_empty());
        assert_ne!(arena.epoch(), old_epoch);
        assert_eq!(arena.lookup(&key, old_epoch), None);
        assert!(arena.get(id, old_epoch).is_none());
        assert_eq!(arena.lookup(&key, arena.epoch()), None);

        let (_, created) = arena.get_or_create(&key, 0).unwrap();
        assert!(created);
    }

    #[test]
    fn test_reset_after_full() {
        let arena = NodeArena::new(1);
        let board = Board::new();
        arena.get_or_create(&NodeKey::new(&board, 0), 0).unwrap();
        assert!(arena.get_or_create(&NodeKey::new(&board, 1), 0).is_err());
        arena.reset();
        assert!(arena.get_or_create(&NodeKey::new(&board, 1), 0).is_ok());
    }

    #[test]
    fn test_concurrent_inserts_deduplicate() {
        let arena = NodeArena::new(1024);
        let mut boards = Vec::new();
        for first in Board::new().successors() {
            for second in first.successors() {
                boards.push(second);
            }
        }
        let ids: Vec<Vec<NodeId>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    s.spawn(|| {
                        boards
                            .iter()
                            .map(|b| arena.get_or_create(&NodeKey::new(b, 0), 2).unwrap().0)
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for other in &ids[1..] {
            assert_eq!(other, &ids[0]);
        }
        let mut unique: Vec<Board> = boards.iter().map(|b| b.unique()).collect();
        unique.sort();
        unique.dedup();
        assert_eq!(arena.len(), unique.len());
    }
}
