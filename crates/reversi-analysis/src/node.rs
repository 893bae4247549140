//! Search tree nodes.
//!
//! [`NodeData`] is the plain per-position record: solved bounds, the weak
//! window and one [`Evaluation`] per odd threshold inside it. [`SearchNode`]
//! decorates it with a spin lock, child and father links and the atomic
//! counters the workers share.
//!
//! Locks are only ever nested father -> child. The game graph is acyclic, so
//! this order cannot deadlock.

use std::ops::Deref;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use reversi_core::board::Board;
use reversi_core::types::{Depth, Score};

use crate::constants::{
    APPROX_SOLVE_PROB, MIN_PROB_EVAL_GOAL, PROB_FOR_ENDGAME_ALPHA_BETA, SCORE_MAX, SCORE_MIN,
    SOLVE_WORK_BASE, SOLVE_WORK_CAP, SOLVE_WORK_PER_DISC, THRESHOLD_MAX, THRESHOLD_MIN,
    VISITS_PER_TREE_NODE, ZERO_PERC_FOR_WEAK,
};
use crate::error::TreeError;
use crate::evaluation::{Evaluation, LeafFeatures};
use crate::prob::LOG_DERIVATIVE_MINUS_INF;
use crate::util::spinlock::{MappedSpinMutexGuard, SpinMutex, SpinMutexGuard};

/// Index of a node inside the arena.
pub type NodeId = u32;

/// Search state of one position, without any synchronization.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeData {
    board: Board,
    depth: Depth,
    n_empties: u32,
    player_moves: u32,
    opponent_moves: u32,
    lower: Score,
    upper: Score,
    // Raw window. It may reach outside [lower, upper]; accessors clamp it.
    weak_lower: Score,
    weak_upper: Score,
    min_evaluation: Score,
    evaluations: Vec<Evaluation>,
    leaf_eval: f32,
    eval_depth: u8,
    has_leaf_eval: bool,
    is_leaf: bool,
    descendants: u64,
}

impl NodeData {
    /// Creates an unsolved leaf without estimate or window.
    pub fn new(board: Board, depth: Depth) -> NodeData {
        let mut data = NodeData {
            board,
            depth,
            n_empties: 0,
            player_moves: 0,
            opponent_moves: 0,
            lower: SCORE_MIN,
            upper: SCORE_MAX,
            weak_lower: THRESHOLD_MAX + 2,
            weak_upper: THRESHOLD_MIN - 2,
            min_evaluation: THRESHOLD_MIN,
            evaluations: Vec::new(),
            leaf_eval: 0.0,
            eval_depth: 0,
            has_leaf_eval: false,
            is_leaf: true,
            descendants: 0,
        };
        data.reset(board, depth);
        data
    }

    /// Turns this record into a fresh leaf, keeping allocations.
    pub fn reset(&mut self, board: Board, depth: Depth) {
        self.board = board;
        self.depth = depth;
        self.n_empties = board.get_empty_count();
        self.player_moves = board.get_moves().count();
        self.opponent_moves = board.switch_players().get_moves().count();
        self.lower = SCORE_MIN;
        self.upper = SCORE_MAX;
        self.weak_lower = THRESHOLD_MAX + 2;
        self.weak_upper = THRESHOLD_MIN - 2;
        self.min_evaluation = THRESHOLD_MIN;
        self.evaluations.clear();
        self.leaf_eval = 0.0;
        self.eval_depth = 0;
        self.has_leaf_eval = false;
        self.is_leaf = true;
        self.descendants = 0;
    }

    #[inline]
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Number of plies from the root at first visit.
    #[inline]
    pub fn depth(&self) -> Depth {
        self.depth
    }

    #[inline]
    pub fn n_empties(&self) -> u32 {
        self.n_empties
    }

    /// Proven lower bound of the value.
    #[inline]
    pub fn lower(&self) -> Score {
        self.lower
    }

    /// Proven upper bound of the value.
    #[inline]
    pub fn upper(&self) -> Score {
        self.upper
    }

    /// Lower end of the weak window, clamped into the solved bounds.
    #[inline]
    pub fn weak_lower(&self) -> Score {
        self.weak_lower.clamp(self.lower, self.upper)
    }

    /// Upper end of the weak window, clamped into the solved bounds.
    #[inline]
    pub fn weak_upper(&self) -> Score {
        self.weak_upper.clamp(self.lower, self.upper)
    }

    #[inline]
    pub fn has_window(&self) -> bool {
        self.weak_lower <= self.weak_upper
    }

    /// Unclamped window, possibly empty.
    #[inline]
    pub(crate) fn raw_window(&self) -> (Score, Score) {
        (self.weak_lower, self.weak_upper)
    }

    /// Checks whether the raw window contains `[weak_lower, weak_upper]`.
    #[inline]
    pub(crate) fn covers_window(&self, weak_lower: Score, weak_upper: Score) -> bool {
        self.has_window() && self.weak_lower <= weak_lower && weak_upper <= self.weak_upper
    }

    /// Heuristic estimate of the value in discs, kept inside the solved bounds.
    #[inline]
    pub fn leaf_eval(&self) -> f32 {
        self.leaf_eval
    }

    #[inline]
    pub fn eval_depth(&self) -> u8 {
        self.eval_depth
    }

    #[inline]
    pub fn has_leaf_eval(&self) -> bool {
        self.has_leaf_eval
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.is_leaf
    }

    /// Visits below this node when the snapshot was taken.
    #[inline]
    pub fn descendants(&self) -> u64 {
        self.descendants
    }

    /// First and last threshold with a live evaluation cell.
    ///
    /// The range is empty when `first > last`.
    #[inline]
    pub fn eval_range(&self) -> (Score, Score) {
        (
            (self.lower + 1).max(self.weak_lower),
            (self.upper - 1).min(self.weak_upper),
        )
    }

    /// Checks whether `goal` has a live evaluation cell.
    #[inline]
    pub fn has_evaluation(&self, goal: Score) -> bool {
        let (first, last) = self.eval_range();
        first <= goal && goal <= last
    }

    /// Evaluation cell of threshold `goal`, which must be inside [`Self::eval_range`].
    #[inline]
    pub fn evaluation(&self, goal: Score) -> &Evaluation {
        debug_assert!(self.has_evaluation(goal), "threshold {goal} outside {:?}", self.eval_range());
        &self.evaluations[self.evaluation_index(goal)]
    }

    #[inline]
    fn evaluation_mut(&mut self, goal: Score) -> &mut Evaluation {
        let index = self.evaluation_index(goal);
        &mut self.evaluations[index]
    }

    #[inline]
    fn evaluation_index(&self, goal: Score) -> usize {
        debug_assert!((goal - THRESHOLD_MIN) % 2 == 0);
        ((goal - self.min_evaluation) / 2) as usize
    }

    /// Probability that the value is at least `goal`.
    #[inline]
    pub fn prob_greater_equal(&self, goal: Score) -> f64 {
        self.evaluation(goal).prob_greater_equal()
    }

    /// Sets the heuristic estimate of a leaf.
    ///
    /// Only the first call on a leaf has an effect; returns whether it did.
    pub fn set_leaf_estimate(&mut self, estimate: f32, eval_depth: u8) -> bool {
        if self.has_leaf_eval || !self.is_leaf {
            return false;
        }
        self.leaf_eval = estimate.clamp(self.lower as f32, self.upper as f32);
        self.eval_depth = eval_depth.max(1);
        self.has_leaf_eval = true;
        true
    }

    /// Widens the window of a leaf and recomputes its cells from the estimate.
    ///
    /// A window already covered by the current one leaves the node untouched.
    pub fn set_window(&mut self, weak_lower: Score, weak_upper: Score) {
        debug_assert!(self.is_leaf);
        debug_assert!(self.has_leaf_eval);
        if self.widen_window(weak_lower, weak_upper) {
            self.update_leaf_evaluations();
        }
    }

    /// Grows the raw window to cover `[weak_lower, weak_upper]`.
    ///
    /// Cell contents are undefined after a change until they are recomputed.
    pub(crate) fn widen_window(&mut self, weak_lower: Score, weak_upper: Score) -> bool {
        debug_assert!(weak_lower <= weak_upper);
        debug_assert!((weak_lower - THRESHOLD_MIN) % 2 == 0);
        debug_assert!((weak_upper - THRESHOLD_MIN) % 2 == 0);
        let (weak_lower, weak_upper) = if self.has_window() {
            if self.weak_lower <= weak_lower && weak_upper <= self.weak_upper {
                return false;
            }
            (weak_lower.min(self.weak_lower), weak_upper.max(self.weak_upper))
        } else {
            (weak_lower, weak_upper)
        };
        self.weak_lower = weak_lower;
        self.weak_upper = weak_upper;
        self.min_evaluation = weak_lower;
        let len = ((weak_upper - weak_lower) / 2 + 1) as usize;
        self.evaluations.clear();
        self.evaluations.resize(len, Evaluation::default());
        true
    }

    /// Marks a leaf as proven within `[lower, upper]` and refreshes its cells.
    pub fn set_solved(&mut self, lower: Score, upper: Score) {
        debug_assert!(self.is_leaf);
        self.lower = self.lower.max(lower);
        self.upper = self.upper.min(upper);
        debug_assert!(self.lower <= self.upper, "[{}, {}]", self.lower, self.upper);
        self.leaf_eval = self.leaf_eval.clamp(self.lower as f32, self.upper as f32);
        self.has_leaf_eval = true;
        self.eval_depth = self.eval_depth.max(1);
        if self.has_window() {
            self.update_leaf_evaluations();
        }
    }

    fn leaf_features(&self) -> LeafFeatures {
        LeafFeatures {
            estimate: self.leaf_eval,
            depth: self.eval_depth,
            n_empties: self.n_empties,
            player_moves: self.player_moves,
            opponent_moves: self.opponent_moves,
        }
    }

    fn update_leaf_evaluations(&mut self) {
        let features = self.leaf_features();
        let (first, last) = self.eval_range();
        for goal in (first..=last).step_by(2) {
            self.evaluation_mut(goal).set_leaf(goal, &features);
        }
    }

    /// Turns a leaf into an internal node. Cells are stale until the next update.
    pub(crate) fn mark_internal(&mut self) {
        self.is_leaf = false;
    }

    /// Recomputes bounds, window and cells as the negamax of `children`.
    pub fn update_from_children<C>(&mut self, children: impl IntoIterator<Item = C>)
    where
        C: Deref<Target = NodeData>,
    {
        debug_assert!(!self.is_leaf);
        let mut new_upper = self.lower;
        self.leaf_eval = self.lower as f32;
        let (first, last) = self.eval_range();
        for goal in (first..=last).step_by(2) {
            self.evaluation_mut(goal).initialize();
        }
        for child in children {
            self.update_with_child(&child);
            new_upper = new_upper.max(-child.lower);
        }
        self.upper = self.upper.min(new_upper);
        self.leaf_eval = self.leaf_eval.min(self.upper as f32);
        let (first, last) = self.eval_range();
        for goal in (first..=last).step_by(2) {
            self.evaluation_mut(goal).finalize();
        }
        debug_assert!(self.lower <= self.upper);
    }

    fn update_with_child(&mut self, child: &NodeData) {
        self.lower = self.lower.max(-child.upper);
        self.leaf_eval = self.leaf_eval.max(-child.leaf_eval);
        self.weak_lower = self.weak_lower.max(-child.weak_upper);
        self.weak_upper = self.weak_upper.min(-child.weak_lower);
        let (first, last) = self.eval_range();
        for goal in (first..=last).step_by(2) {
            // The child already proved it reaches -goal.
            if -goal < child.lower {
                continue;
            }
            let child_eval = *child.evaluation(-goal);
            self.evaluation_mut(goal).update_father_with_child(&child_eval);
        }
    }

    /// Expected value: `(first - 1) + 2 * Σ P(value >= i)`.
    pub fn get_eval(&self) -> f64 {
        let (first, last) = self.eval_range();
        let mut eval = (first - 1) as f64;
        for goal in (first..=last).step_by(2) {
            eval += 2.0 * self.prob_greater_equal(goal);
        }
        eval
    }

    /// Last threshold whose probability exceeds `p`.
    pub fn percentile_upper(&self, p: f64) -> Score {
        let (first, last) = self.eval_range();
        let mut goal = last;
        while goal >= first {
            if self.prob_greater_equal(goal) > p {
                return goal;
            }
            goal -= 2;
        }
        first - 2
    }

    /// First threshold whose probability is below `1 - p`.
    pub fn percentile_lower(&self, p: f64) -> Score {
        let (first, last) = self.eval_range();
        for goal in (first..=last).step_by(2) {
            if self.prob_greater_equal(goal) < 1.0 - p {
                return goal;
            }
        }
        last + 2
    }

    /// Probability that searching settles the value against `[lower, upper]`.
    pub fn solve_probability(&self, lower: Score, upper: Score) -> f64 {
        self.solve_probability_upper(upper)
            .max(self.solve_probability_lower(lower))
    }

    fn solve_probability_upper(&self, upper: Score) -> f64 {
        let goal = self.percentile_lower(0.5).min(upper);
        if goal > self.upper || goal < self.lower {
            return 0.0;
        }
        if !self.has_evaluation(goal) {
            return 0.5;
        }
        self.prob_greater_equal(goal)
    }

    fn solve_probability_lower(&self, lower: Score) -> f64 {
        let goal = self.percentile_upper(0.5).max(lower);
        if goal < self.lower || goal > self.upper {
            return 0.0;
        }
        if !self.has_evaluation(goal) {
            return 0.5;
        }
        1.0 - self.prob_greater_equal(goal)
    }

    /// Checks whether the value is settled with respect to `[lower, upper]`.
    ///
    /// With `approx`, a node that is very unlikely to change the answer counts as solved.
    pub fn is_solved(&self, lower: Score, upper: Score, approx: bool) -> bool {
        self.upper <= lower
            || self.lower >= upper
            || self.lower == self.upper
            || (approx && self.solve_probability(lower, upper) < APPROX_SOLVE_PROB)
    }

    /// Estimated effort to settle the value against `[lower, upper]`.
    pub fn remaining_work(&self, lower: Score, upper: Score) -> f64 {
        if self.is_solved(lower, upper, false) {
            return 0.0;
        }
        let (first, last) = self.eval_range();
        if first > last {
            return f64::INFINITY;
        }
        let lower = lower.max(first);
        let upper = upper.min(last);
        let disproof = self.percentile_lower(0.5);
        let proof = disproof - 2;

        if disproof <= lower {
            self.evaluation(lower.min(last)).disproof_number() as f64
        } else if proof >= upper {
            self.evaluation(upper.max(first)).proof_number() as f64
        } else {
            self.evaluation(proof).proof_number() as f64
                + self.evaluation(disproof).disproof_number() as f64
        }
    }

    /// Progress towards settling the node; lower is further along.
    pub fn advancement(&self) -> f64 {
        let (first, last) = self.eval_range();
        let mut result = f64::MIN;
        for goal in (first..=last).step_by(2) {
            result = result.max(self.evaluation(goal).max_log_derivative() as f64);
        }
        if result == LOG_DERIVATIVE_MINUS_INF as f64 {
            result += self.remaining_work(first, last).ln() - 1e5;
        }
        result
    }

    /// Threshold to search next, or `None` when every threshold is settled.
    ///
    /// Thresholds next to nearly certain ones are skipped, and `last_goal`
    /// is only picked again when nothing else qualifies.
    pub fn next_eval_goal(&self, prob_min: f64, prob_max: f64, last_goal: Option<Score>) -> Option<Score> {
        let (first, last) = self.eval_range();
        let mut best_goal = None;
        let mut best_value = f64::MIN;
        for goal in (first..=last).step_by(2) {
            let eval = self.evaluation(goal);
            let p = eval.prob_greater_equal();
            if p < prob_min
                || p > prob_max
                || eval.proof_number() == 0.0
                || eval.disproof_number() == 0.0
                || (goal + 2 < self.upper
                    && goal < self.weak_upper
                    && self.prob_greater_equal(goal + 2) > 1.0 - MIN_PROB_EVAL_GOAL)
                || (goal - 2 > self.lower
                    && goal > self.weak_lower
                    && self.prob_greater_equal(goal - 2) < MIN_PROB_EVAL_GOAL)
            {
                continue;
            }
            let value = if Some(goal) == last_goal {
                2.0 * LOG_DERIVATIVE_MINUS_INF as f64
            } else {
                eval.max_log_derivative() as f64
            };
            if value > best_value {
                best_value = value;
                best_goal = Some(goal);
            }
        }
        best_goal
    }

    /// Window the root should have next: grows by one step at each end that
    /// still carries probability mass and shrinks past nearly certain thresholds.
    pub fn expected_weak_window(&self) -> (Score, Score) {
        let (first, last) = self.eval_range();
        let mut weak_lower = (self.upper - 1).min((self.lower + 1).max(self.weak_lower));
        let mut weak_upper = (self.lower + 1).max((self.upper - 1).min(self.weak_upper));

        if weak_lower - 2 > self.lower
            && self.has_evaluation(weak_lower)
            && self.prob_greater_equal(weak_lower) < 1.0 - ZERO_PERC_FOR_WEAK
        {
            weak_lower -= 2;
        } else {
            let mut goal = weak_lower + 2;
            while goal <= last {
                if self.prob_greater_equal(goal) < 0.99 {
                    weak_lower = goal - 2;
                    break;
                }
                goal += 2;
            }
        }
        if weak_upper + 2 < self.upper
            && self.has_evaluation(weak_upper)
            && self.prob_greater_equal(weak_upper) > ZERO_PERC_FOR_WEAK
        {
            weak_upper += 2;
        } else {
            let mut goal = weak_upper - 2;
            while goal >= first {
                if self.prob_greater_equal(goal) > 0.01 {
                    weak_upper = goal + 2;
                    break;
                }
                goal -= 2;
            }
        }
        (weak_lower, weak_upper)
    }

    /// Decides whether a leaf is cheap enough to hand to the exact solver.
    ///
    /// Early in a search, while the tree is small compared to the visits, the
    /// threshold shrinks so that solving does not crowd out expansion.
    pub fn to_be_solved(&self, lower: Score, upper: Score, n_tree_nodes: u64, n_visited: u64) -> bool {
        let remaining_work = self.remaining_work(lower, upper);
        let delta = (lower as f32 - self.leaf_eval)
            .max(self.leaf_eval - upper as f32)
            .max(0.0) as f64;
        let frac = n_tree_nodes as f64 * VISITS_PER_TREE_NODE / n_visited.max(1) as f64;
        let mult = if frac < 1.0 { 5.0 * (frac - 0.8) } else { 1.0 };
        remaining_work < mult * SOLVE_WORK_CAP.min(SOLVE_WORK_BASE + delta * SOLVE_WORK_PER_DISC)
    }

    /// Narrows a selection bracket with the tails of this node's distribution,
    /// never past `goal`.
    pub fn update_alpha_beta(&self, goal: Score, alpha: Score, beta: Score) -> (Score, Score) {
        let alpha = goal.min(alpha.max(self.percentile_lower(PROB_FOR_ENDGAME_ALPHA_BETA)));
        let beta = goal.max(beta.min(self.percentile_upper(PROB_FOR_ENDGAME_ALPHA_BETA)));
        (alpha, beta)
    }

    /// Checks `lower <= upper` and that the stored window is non-empty and
    /// backed by cells.
    ///
    /// The stored window may reach past the bounds; the exposed one is clamped
    /// into them.
    pub fn check_window(&self) -> Result<(), TreeError> {
        if self.lower <= self.upper
            && self.has_window()
            && self.min_evaluation <= self.weak_lower
            && (((self.weak_upper - self.min_evaluation) / 2) as usize) < self.evaluations.len()
        {
            return Ok(());
        }
        Err(TreeError::WindowOutsideBounds {
            board_hash: self.board.hash(),
            lower: self.lower,
            upper: self.upper,
            weak_lower: self.weak_lower,
            weak_upper: self.weak_upper,
        })
    }

    /// Checks that probabilities do not increase with the threshold.
    pub fn check_monotone(&self) -> Result<(), TreeError> {
        let (first, last) = self.eval_range();
        let mut goal = first + 2;
        while goal <= last {
            if self.evaluation(goal).prob_byte() > self.evaluation(goal - 2).prob_byte() {
                return Err(TreeError::NonMonotonicProbability {
                    board_hash: self.board.hash(),
                    threshold: goal,
                });
            }
            goal += 2;
        }
        Ok(())
    }

    /// Checks that the cells equal a fresh merge of `children`.
    pub fn check_merge<C>(&self, children: impl IntoIterator<Item = C>) -> Result<(), TreeError>
    where
        C: Deref<Target = NodeData>,
    {
        let mut expected = self.clone();
        expected.update_from_children(children);
        let (first, last) = self.eval_range();
        for goal in (first..=last).step_by(2) {
            if !expected.has_evaluation(goal) || expected.evaluation(goal) != self.evaluation(goal) {
                return Err(TreeError::InconsistentEvaluation {
                    board_hash: self.board.hash(),
                    threshold: goal,
                });
            }
        }
        Ok(())
    }
}

/// A father of a node and the visits that reached the node through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FatherLink {
    pub father: NodeId,
    pub visits: u64,
}

/// Lock-protected part of a [`SearchNode`].
#[derive(Debug)]
pub struct NodeState {
    pub data: NodeData,
    pub children: Vec<NodeId>,
    pub fathers: Vec<FatherLink>,
}

/// Capability of exclusive access to a node's state.
pub trait Lockable {
    type State;

    fn lock(&self) -> SpinMutexGuard<'_, Self::State>;
}

/// Capability of recording the fathers a node was reached from.
pub trait FatherTracking {
    /// Links `father`. Returns false if it was already linked.
    fn add_father(&self, father: NodeId) -> bool;

    fn fathers(&self) -> Vec<NodeId>;

    /// Credits `visits` to the link with `father`.
    fn record_visits(&self, father: NodeId, visits: u64);
}

/// A node shared by all workers of the arena.
pub struct SearchNode {
    state: SpinMutex<NodeState>,
    player: AtomicU64,
    opponent: AtomicU64,
    slot: AtomicU32,
    descendants: AtomicU64,
    n_threads_working: AtomicU32,
    extension_mark: AtomicU32,
}

impl Default for SearchNode {
    fn default() -> Self {
        SearchNode {
            state: SpinMutex::new(NodeState {
                data: NodeData::new(Board::from_bitboards(0u64, 0u64), 0),
                children: Vec::new(),
                fathers: Vec::new(),
            }),
            player: AtomicU64::new(0),
            opponent: AtomicU64::new(0),
            slot: AtomicU32::new(u32::MAX),
            descendants: AtomicU64::new(0),
            n_threads_working: AtomicU32::new(0),
            extension_mark: AtomicU32::new(0),
        }
    }
}

impl SearchNode {
    /// Reinitializes the node for `board` in search slot `slot`.
    ///
    /// Must only be called by the arena before the node is published.
    pub(crate) fn reset(&self, board: Board, depth: Depth, slot: u8) {
        let mut state = self.state.lock();
        state.data.reset(board, depth);
        state.children.clear();
        state.fathers.clear();
        self.player.store(board.player.bits(), Ordering::Relaxed);
        self.opponent.store(board.opponent.bits(), Ordering::Relaxed);
        self.slot.store(slot as u32, Ordering::Relaxed);
        self.descendants.store(0, Ordering::Relaxed);
        self.n_threads_working.store(0, Ordering::Relaxed);
        self.extension_mark.store(0, Ordering::Relaxed);
    }

    /// Checks the key without taking the lock.
    #[inline]
    pub(crate) fn has_key(&self, player: u64, opponent: u64, slot: u8) -> bool {
        self.player.load(Ordering::Relaxed) == player
            && self.opponent.load(Ordering::Relaxed) == opponent
            && self.slot.load(Ordering::Relaxed) == slot as u32
    }

    /// Locks the node and exposes only its data.
    #[inline]
    pub fn lock_data(&self) -> MappedSpinMutexGuard<'_, NodeData> {
        SpinMutexGuard::map(self.state.lock(), |state| &mut state.data)
    }

    /// Copy of the node data with the current visit count.
    pub fn snapshot(&self) -> NodeData {
        let mut data = self.state.lock().data.clone();
        data.descendants = self.descendants();
        data
    }

    #[inline]
    pub fn descendants(&self) -> u64 {
        self.descendants.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn add_descendants(&self, n: u64) {
        self.descendants.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn n_threads_working(&self) -> u32 {
        self.n_threads_working.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn increase_threads_working(&self) {
        self.n_threads_working.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn decrease_threads_working(&self) {
        let previous = self.n_threads_working.fetch_sub(1, Ordering::Relaxed);
        debug_assert!(previous > 0);
    }

    /// Claims an unsolved leaf for the calling worker (0 -> 1 on the worker counter).
    pub fn try_claim_leaf(&self, lower: Score, upper: Score) -> bool {
        let state = self.state.lock();
        if !state.data.is_leaf() || state.data.is_solved(lower, upper, false) {
            return false;
        }
        self.n_threads_working
            .compare_exchange(0, 1, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Stamps the node with extension pass `mark`. Returns the previous stamp.
    #[inline]
    pub(crate) fn swap_extension_mark(&self, mark: u32) -> u32 {
        self.extension_mark.swap(mark, Ordering::AcqRel)
    }

    #[inline]
    pub(crate) fn extension_mark(&self) -> u32 {
        self.extension_mark.load(Ordering::Acquire)
    }
}

impl Lockable for SearchNode {
    type State = NodeState;

    #[inline]
    fn lock(&self) -> SpinMutexGuard<'_, NodeState> {
        self.state.lock()
    }
}

impl FatherTracking for SearchNode {
    fn add_father(&self, father: NodeId) -> bool {
        let mut state = self.state.lock();
        if state.fathers.iter().any(|link| link.father == father) {
            return false;
        }
        state.fathers.push(FatherLink { father, visits: 0 });
        true
    }

    fn fathers(&self) -> Vec<NodeId> {
        self.state.lock().fathers.iter().map(|link| link.father).collect()
    }

    fn record_visits(&self, father: NodeId, visits: u64) {
        let mut state = self.state.lock();
        if let Some(link) = state.fathers.iter_mut().find(|link| link.father == father) {
            link.visits += visits;
        }
    }
}
