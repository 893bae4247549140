//! Descent from the root to one claimed leaf, and the way back up.

use reversi_core::types::Score;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::arena::NodeArena;
use crate::constants::{LAST_GOAL_SOLVE_PROB, THRESHOLD_MAX, THRESHOLD_MIN};
use crate::evaluation::Evaluation;
use crate::node::{FatherTracking, Lockable, NodeData, NodeId, NodeState};

/// Probability above which a father no longer needs its children's help.
const NEARLY_PROVED: f64 = 0.99;

/// A leaf owned by one worker, together with the path that reached it.
///
/// Every node on the path counts this worker in its worker counter until the
/// value is dropped.
pub struct LeafToUpdate<'a> {
    arena: &'a NodeArena,
    leaf: NodeId,
    parents: Vec<NodeId>,
    root_goal: Score,
    eval_goal: Score,
    alpha: Score,
    beta: Score,
    claimed: bool,
}

impl<'a> LeafToUpdate<'a> {
    fn new(arena: &'a NodeArena, root: NodeId, goal: Score, alpha: Score, beta: Score) -> Self {
        LeafToUpdate {
            arena,
            leaf: root,
            parents: Vec::new(),
            root_goal: goal,
            eval_goal: goal,
            alpha,
            beta,
            claimed: false,
        }
    }

    #[inline]
    pub fn leaf(&self) -> NodeId {
        self.leaf
    }

    /// Goal chosen at the root for this descent.
    #[inline]
    pub fn root_goal(&self) -> Score {
        self.root_goal
    }

    /// Goal at the leaf, from the leaf's side to move.
    #[inline]
    pub fn eval_goal(&self) -> Score {
        self.eval_goal
    }

    #[inline]
    pub fn alpha(&self) -> Score {
        self.alpha
    }

    #[inline]
    pub fn beta(&self) -> Score {
        self.beta
    }

    /// Number of plies between the root and the leaf.
    #[inline]
    pub fn path_len(&self) -> usize {
        self.parents.len()
    }

    fn to_child(&mut self, child: NodeId) {
        self.arena.node(self.leaf).increase_threads_working();
        self.parents.push(self.leaf);
        self.leaf = child;
        self.eval_goal = -self.eval_goal;
        let (alpha, beta) = (-self.beta, -self.alpha);
        let state = self.arena.node(child).lock();
        (self.alpha, self.beta) = state.data.update_alpha_beta(self.eval_goal, alpha, beta);
    }

    /// Publishes the work done on the leaf and releases the path.
    ///
    /// Every ancestor of the leaf, through any father, is recomputed once and
    /// only after all of its affected children.
    pub fn finalize(self, n_visited: u64) {
        update_ancestors(self.arena, self.leaf);

        let mut child = self.leaf;
        for &father in self.parents.iter().rev() {
            self.arena.node(child).record_visits(father, n_visited);
            child = father;
        }
        self.arena.node(self.leaf).add_descendants(n_visited);
        for &id in &self.parents {
            self.arena.node(id).add_descendants(n_visited);
        }
    }
}

impl Drop for LeafToUpdate<'_> {
    fn drop(&mut self) {
        if self.claimed {
            self.arena.node(self.leaf).decrease_threads_working();
        }
        for &id in &self.parents {
            self.arena.node(id).decrease_threads_working();
        }
    }
}

enum Choice {
    Leaf,
    Child(NodeId),
    Nothing,
}

/// Picks a goal at the root and descends to the most promising unclaimed leaf.
///
/// Returns `None` when nothing is worth searching or another worker got to
/// the leaf first; the caller starts again from the root.
pub fn best_descendant<'a>(
    arena: &'a NodeArena,
    root: NodeId,
    multiplier: f64,
    last_goal: Option<Score>,
) -> Option<LeafToUpdate<'a>> {
    let (goal, alpha, beta) = {
        let state = arena.node(root).lock();
        let data = &state.data;
        let last_goal = if data.solve_probability(THRESHOLD_MIN, THRESHOLD_MAX) > LAST_GOAL_SOLVE_PROB {
            None
        } else {
            last_goal
        };
        let goal = data.next_eval_goal(0.0, 1.0, last_goal)?;
        let (alpha, beta) = data.update_alpha_beta(goal, THRESHOLD_MIN, THRESHOLD_MAX);
        (goal, alpha, beta)
    };

    let mut leaf = LeafToUpdate::new(arena, root, goal, alpha, beta);
    loop {
        match best_child(arena, leaf.leaf, leaf.eval_goal, multiplier) {
            Choice::Child(child) => leaf.to_child(child),
            Choice::Leaf => {
                if !arena.node(leaf.leaf).try_claim_leaf(leaf.alpha, leaf.beta) {
                    return None;
                }
                leaf.claimed = true;
                return Some(leaf);
            }
            Choice::Nothing => return None,
        }
    }
}

fn best_child(arena: &NodeArena, id: NodeId, goal: Score, multiplier: f64) -> Choice {
    let state = arena.node(id).lock();
    let data = &state.data;
    if data.is_leaf() {
        return Choice::Leaf;
    }
    if !data.has_evaluation(goal) || data.is_solved(goal, goal, false) {
        return Choice::Nothing;
    }
    let father_eval = *data.evaluation(goal);
    let child_goal = -goal;

    let mut best = Choice::Nothing;
    let mut best_value = f64::MIN;
    for &child_id in &state.children {
        let child = arena.node(child_id);
        let child_data = child.lock_data();
        if !child_data.has_evaluation(child_goal) {
            continue;
        }
        let value = selection_value(
            &child_data,
            &father_eval,
            child_goal,
            multiplier,
            child.n_threads_working(),
        );
        if value > best_value {
            best_value = value;
            best = Choice::Child(child_id);
        }
    }
    best
}

/// Priority of expanding `child` at `child_goal`; higher is better.
///
/// While the father is undecided the child's log-derivative leads. Once the
/// father is nearly proved, the cheapest refutation of the child wins. Both
/// are lowered by the workers already below the child.
pub fn selection_value(
    child: &NodeData,
    father_eval: &Evaluation,
    child_goal: Score,
    multiplier: f64,
    n_threads_working: u32,
) -> f64 {
    let eval = child.evaluation(child_goal);
    let penalty = multiplier * n_threads_working as f64 * father_eval.prob_lower_cubed();
    let leaf_eval = child.leaf_eval() as f64;
    if father_eval.prob_greater_equal() < NEARLY_PROVED {
        eval.log_derivative(father_eval) as f64 - leaf_eval / 128.0 - penalty
    } else {
        -4.4 * (eval.disproof_number() as f64).ln() - 0.4 * leaf_eval - penalty
    }
}

/// Recomputes `node` from its children under its own lock.
///
/// Returns the fathers linked at the moment the new cells were published. A
/// father linked later reads the new cells itself.
pub(crate) fn update_node(arena: &NodeArena, id: NodeId) -> Vec<NodeId> {
    let mut state = arena.node(id).lock();
    let NodeState { data, children, fathers } = &mut *state;
    data.update_from_children(children.iter().map(|&child| arena.node(child).lock_data()));
    fathers.iter().map(|link| link.father).collect()
}

/// Updates every ancestor of `leaf` in topological order.
fn update_ancestors(arena: &NodeArena, leaf: NodeId) {
    let mut late = propagate(arena, &[leaf], Some(leaf));
    while !late.is_empty() {
        late = propagate(arena, &late, None);
    }
}

/// Updates `nodes` and all of their ancestors, each after its children.
pub(crate) fn update_with_ancestors(arena: &NodeArena, nodes: &[NodeId]) {
    let mut late = propagate(arena, nodes, None);
    while !late.is_empty() {
        late = propagate(arena, &late, None);
    }
}

/// One topological pass over the ancestors of `starts`. `skip` is already up to date.
fn propagate(arena: &NodeArena, starts: &[NodeId], skip: Option<NodeId>) -> Vec<NodeId> {
    AncestorGraph::collect(arena, starts).update(arena, skip)
}

/// Fathers of every ancestor of some start nodes, as seen when collected.
struct AncestorGraph {
    starts: Vec<NodeId>,
    fathers: FxHashMap<NodeId, Vec<NodeId>>,
    pending: FxHashMap<NodeId, u32>,
}

impl AncestorGraph {
    fn collect(arena: &NodeArena, starts: &[NodeId]) -> Self {
        let mut fathers: FxHashMap<NodeId, Vec<NodeId>> = FxHashMap::default();
        let mut pending: FxHashMap<NodeId, u32> = FxHashMap::default();
        let mut seen: FxHashSet<NodeId> = FxHashSet::default();
        let starts: Vec<NodeId> = starts.iter().copied().filter(|&id| seen.insert(id)).collect();
        let mut stack = starts.clone();
        while let Some(id) = stack.pop() {
            let links = arena.node(id).fathers();
            for &father in &links {
                *pending.entry(father).or_default() += 1;
                if seen.insert(father) {
                    stack.push(father);
                }
            }
            fathers.insert(id, links);
        }
        AncestorGraph {
            starts,
            fathers,
            pending,
        }
    }

    /// Updates the nodes in topological order.
    ///
    /// Fathers linked to a node after the graph was collected may have merged
    /// its old cells; they are returned for another pass.
    fn update(mut self, arena: &NodeArena, skip: Option<NodeId>) -> Vec<NodeId> {
        let mut late = Vec::new();
        let mut late_seen: FxHashSet<NodeId> = FxHashSet::default();
        let mut ready: Vec<NodeId> = self
            .starts
            .iter()
            .copied()
            .filter(|id| !self.pending.contains_key(id))
            .collect();
        while let Some(id) = ready.pop() {
            let known = self.fathers.get(&id).map(Vec::as_slice).unwrap_or_default();
            if Some(id) != skip {
                for father in update_node(arena, id) {
                    if !known.contains(&father) && late_seen.insert(father) {
                        late.push(father);
                    }
                }
            }
            for &father in known {
                if let Some(count) = self.pending.get_mut(&father) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push(father);
                    }
                }
            }
        }
        late
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::NodeKey;
    use reversi_core::board::Board;
    use reversi_core::square::Square;

    /// Root after F5 D6 C3 with its four children attached.
    fn expanded_root(arena: &NodeArena, estimates: [f32; 4]) -> (NodeId, Vec<NodeId>) {
        let board = Board::new()
            .make_move(Square::F5)
            .make_move(Square::D6)
            .make_move(Square::C3);
        let (root, _) = arena.get_or_create(&NodeKey::new(&board, 0), 0).unwrap();
        let window = (-63, 63);
        {
            let mut state = arena.node(root).lock();
            state.data.set_leaf_estimate(0.0, 2);
            state.data.set_window(window.0, window.1);
        }
        let mut children = Vec::new();
        for (next, estimate) in board.successors().into_iter().zip(estimates) {
            let (child, _) = arena.get_or_create(&NodeKey::new(&next, 0), 1).unwrap();
            let mut state = arena.node(child).lock();
            state.data.set_leaf_estimate(estimate, 2);
            state.data.set_window(-window.1, -window.0);
            state.fathers.push(crate::node::FatherLink { father: root, visits: 0 });
            children.push(child);
        }
        {
            let mut state = arena.node(root).lock();
            state.children = children.clone();
            state.data.mark_internal();
        }
        let _ = update_node(arena, root);
        (root, children)
    }

    #[test]
    fn test_descends_to_a_claimed_leaf() {
        let arena = NodeArena::new(64);
        let (root, children) = expanded_root(&arena, [0.0, 0.0, 0.0, 0.0]);
        let leaf = best_descendant(&arena, root, 0.0, None).unwrap();
        assert!(children.contains(&leaf.leaf()));
        assert_eq!(leaf.path_len(), 1);
        assert_eq!(leaf.eval_goal(), -leaf.root_goal());
        assert!(leaf.alpha() <= leaf.eval_goal() && leaf.eval_goal() <= leaf.beta());
        assert_eq!(arena.node(leaf.leaf()).n_threads_working(), 1);
        assert_eq!(arena.node(root).n_threads_working(), 1);

        let id = leaf.leaf();
        drop(leaf);
        assert_eq!(arena.node(id).n_threads_working(), 0);
        assert_eq!(arena.node(root).n_threads_working(), 0);
    }

    #[test]
    fn test_claimed_leaf_is_not_selected_twice() {
        let arena = NodeArena::new(64);
        let (root, _) = expanded_root(&arena, [0.0, 0.0, 0.0, 0.0]);
        let first = best_descendant(&arena, root, 0.0, None).unwrap();
        // Without a penalty the same child wins again, and the claim fails.
        assert!(best_descendant(&arena, root, 0.0, None).is_none());
        // A large penalty steers the descent elsewhere.
        let second = best_descendant(&arena, root, 1e9, None).unwrap();
        assert_ne!(first.leaf(), second.leaf());
    }

    #[test]
    fn test_unclaimed_root_leaf() {
        let arena = NodeArena::new(4);
        let (root, _) = arena.get_or_create(&NodeKey::new(&Board::new(), 0), 0).unwrap();
        {
            let mut state = arena.node(root).lock();
            state.data.set_leaf_estimate(0.0, 2);
            state.data.set_window(-5, 5);
        }
        let leaf = best_descendant(&arena, root, 0.0, None).unwrap();
        assert_eq!(leaf.leaf(), root);
        assert_eq!(leaf.path_len(), 0);
        assert!(best_descendant(&arena, root, 0.0, None).is_none());
    }

    #[test]
    fn test_solved_root_has_nothing_to_select() {
        let arena = NodeArena::new(4);
        let (root, _) = arena.get_or_create(&NodeKey::new(&Board::new(), 0), 0).unwrap();
        {
            let mut state = arena.node(root).lock();
            state.data.set_leaf_estimate(0.0, 2);
            state.data.set_window(-5, 5);
            state.data.set_solved(0, 0);
        }
        assert!(best_descendant(&arena, root, 0.0, None).is_none());
    }

    #[test]
    fn test_selection_prefers_undecided_child() {
        let arena = NodeArena::new(64);
        let (root, children) = expanded_root(&arena, [0.0, 40.0, 40.0, 40.0]);
        let leaf = best_descendant(&arena, root, 0.0, None).unwrap();
        assert_eq!(leaf.leaf(), children[0]);
    }

    #[test]
    fn test_finalize_propagates_and_counts() {
        let arena = NodeArena::new(64);
        let (root, _) = expanded_root(&arena, [0.0, 0.0, 0.0, 0.0]);
        let before = arena.node(root).snapshot();
        let leaf = best_descendant(&arena, root, 0.0, None).unwrap();
        let id = leaf.leaf();
        arena.node(id).lock().data.set_solved(-64, -20);
        leaf.finalize(7);

        let after = arena.node(root).snapshot();
        assert_eq!(after.lower(), 20);
        assert!(after.get_eval() > before.get_eval());
        assert_eq!(arena.node(root).descendants(), 7);
        assert_eq!(arena.node(id).descendants(), 7);
        assert_eq!(arena.node(id).lock().fathers[0].visits, 7);
        assert_eq!(arena.node(id).n_threads_working(), 0);
        assert_eq!(arena.node(root).n_threads_working(), 0);
    }

    #[test]
    fn test_update_reaches_every_father() {
        // Two fathers share one child through a transposition.
        let arena = NodeArena::new(64);
        let play = |moves: &[Square]| moves.iter().fold(Board::new(), |b, &sq| b.make_move(sq));
        let shared = play(&[Square::F5, Square::D6, Square::C3, Square::D3, Square::C4]);
        let father_a = play(&[Square::F5, Square::D6, Square::C3, Square::D3]);
        let father_b = play(&[Square::F5, Square::D6, Square::C4, Square::D3]);

        let (child, _) = arena.get_or_create(&NodeKey::new(&shared, 0), 5).unwrap();
        arena.node(child).lock().data.set_leaf_estimate(0.0, 2);
        arena.node(child).lock().data.set_window(-63, 63);
        let mut fathers = Vec::new();
        for board in [father_a, father_b] {
            let (father, _) = arena.get_or_create(&NodeKey::new(&board, 0), 4).unwrap();
            {
                let mut state = arena.node(father).lock();
                state.data.set_leaf_estimate(0.0, 2);
                state.data.set_window(-63, 63);
                state.children = vec![child];
                state.data.mark_internal();
            }
            arena.node(child).add_father(father);
            let _ = update_node(&arena, father);
            fathers.push(father);
        }

        arena.node(child).lock().data.set_solved(10, 10);
        update_ancestors(&arena, child);
        for father in fathers {
            let data = arena.node(father).snapshot();
            assert_eq!(data.lower(), -10);
            assert_eq!(data.upper(), -10);
        }
    }

    #[test]
    fn test_father_linked_during_update_is_refreshed() {
        let arena = NodeArena::new(64);
        let play = |moves: &[Square]| moves.iter().fold(Board::new(), |b, &sq| b.make_move(sq));
        let boards = [
            play(&[Square::F5, Square::D6, Square::C3, Square::D3, Square::C4]),
            play(&[Square::F5, Square::D6, Square::C3, Square::D3]),
            play(&[Square::F5, Square::D6, Square::C3]),
        ];
        let ids: Vec<NodeId> = boards
            .iter()
            .enumerate()
            .map(|(depth, board)| {
                let (id, _) = arena.get_or_create(&NodeKey::new(board, 0), 5 - depth as u32).unwrap();
                let mut state = arena.node(id).lock();
                state.data.set_leaf_estimate(0.0, 2);
                state.data.set_window(-63, 63);
                id
            })
            .collect();
        let (leaf, father, grandfather) = (ids[0], ids[1], ids[2]);
        {
            let mut state = arena.node(father).lock();
            state.children = vec![leaf];
            state.data.mark_internal();
        }
        arena.node(leaf).add_father(father);
        let _ = update_node(&arena, father);

        arena.node(leaf).lock().data.set_solved(10, 10);
        let graph = AncestorGraph::collect(&arena, &[leaf]);

        // Another worker links the grandfather and merges the stale father.
        {
            let mut state = arena.node(grandfather).lock();
            state.children = vec![father];
            state.data.mark_internal();
        }
        arena.node(father).add_father(grandfather);
        let _ = update_node(&arena, grandfather);

        let late = graph.update(&arena, Some(leaf));
        assert_eq!(late, vec![grandfather]);
        let father_data = arena.node(father).snapshot();
        assert_eq!((father_data.lower(), father_data.upper()), (-10, -10));
        assert!(arena.node(grandfather).snapshot().check_merge([&father_data]).is_err());

        update_with_ancestors(&arena, &late);
        let grandfather_data = arena.node(grandfather).snapshot();
        assert!(grandfather_data.check_merge([&father_data]).is_ok());
        assert_eq!((grandfather_data.lower(), grandfather_data.upper()), (10, 10));
    }
}
