use crate::board::Board;

/// Executes a perft run starting from the standard initial position.
///
/// # Arguments
///
/// * `depth` - Number of plies to expand from the initial position. A depth of
///   `1` counts the immediate legal moves; larger values walk the tree
///   recursively.
///
/// # Returns
///
/// The total node count the search visits from the initial position.
pub fn perft_root(depth: u32) -> u64 {
    perft(&Board::new(), depth)
}

/// Counts the leaves of the move tree below `board`.
///
/// A pass does not consume depth; a finished game counts as one leaf.
pub fn perft(board: &Board, depth: u32) -> u64 {
    let successors = board.successors();

    if successors.is_empty() {
        let next = board.switch_players();
        return if next.has_legal_moves() {
            perft(&next, depth)
        } else {
            1
        };
    }

    if depth <= 1 {
        return successors.len() as u64;
    }
    successors.iter().map(|next| perft(next, depth - 1)).sum()
}
