//! One search thread: select a leaf, expand or solve it, publish the result.

use std::panic::{self, AssertUnwindSafe};

use reversi_core::board::Board;
use reversi_core::endgame::SolveOutcome;
use reversi_core::heuristic::{Estimate, MAX_HEURISTIC_DEPTH};
use reversi_core::types::Score;
use tracing::{trace, warn};

use crate::arena::NodeKey;
use crate::constants::{CLOSE_TO_GOAL, DEEP_EVAL_WORK, MEDIUM_EVAL_WORK, MIN_SOLVER_BUDGET, QUICK_EVAL_DEPTH};
use crate::coordinator::SearchCoordinator;
use crate::error::ArenaError;
use crate::node::{FatherTracking, Lockable, NodeId, NodeState, SearchNode};
use crate::search_result::{SearchStatus, WorkerStats};
use crate::selector::{LeafToUpdate, best_descendant};

/// Depth of the quick evaluation of a new child.
///
/// Children of expensive leaves, and children whose shallow estimate lies
/// close to the goal, are worth a deeper look.
pub fn quick_eval_depth(remaining_work: f64, delta: f32) -> u8 {
    if remaining_work > DEEP_EVAL_WORK
        || (delta < 2.0 * CLOSE_TO_GOAL && remaining_work > DEEP_EVAL_WORK / 2.0)
        || (delta < CLOSE_TO_GOAL && remaining_work > DEEP_EVAL_WORK / 10.0)
    {
        MAX_HEURISTIC_DEPTH
    } else if remaining_work > MEDIUM_EVAL_WORK
        || (delta < 2.0 * CLOSE_TO_GOAL && remaining_work > MEDIUM_EVAL_WORK / 2.0)
        || delta < CLOSE_TO_GOAL
    {
        QUICK_EVAL_DEPTH + 1
    } else {
        QUICK_EVAL_DEPTH
    }
}

/// Gives a new leaf its first estimate and counts the visit.
///
/// Two workers may race to estimate the same transposition; only the one
/// whose estimate lands counts. Returns whether it did.
fn seed_leaf(child: &SearchNode, estimate: Estimate) -> bool {
    let seeded = child.lock_data().set_leaf_estimate(estimate.score, estimate.depth);
    if seeded {
        child.add_descendants(1);
    }
    seeded
}

pub(crate) struct Worker<'a> {
    search: &'a SearchCoordinator,
    stats: WorkerStats,
    last_goal: Option<Score>,
}

impl<'a> Worker<'a> {
    pub(crate) fn new(search: &'a SearchCoordinator) -> Self {
        Worker {
            search,
            stats: WorkerStats::default(),
            last_goal: None,
        }
    }

    /// Runs rounds until the search stops. A panic marks the search failed.
    pub(crate) fn run(mut self) -> WorkerStats {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.run_rounds()));
        if result.is_err() {
            warn!(slot = self.search.slot(), "worker panicked, search is unusable");
            self.search.stop(SearchStatus::Failed);
        }
        self.stats
    }

    fn run_rounds(&mut self) {
        let search = self.search;
        while !search.check_finished() {
            search.update_weak_window();

            let Some(leaf) = best_descendant(
                search.arena(),
                search.root(),
                search.multiplier(),
                self.last_goal,
            ) else {
                self.stats.selection_failures += 1;
                search.on_selection(false);
                continue;
            };
            self.stats.selection_successes += 1;
            search.on_selection(true);
            self.last_goal = Some(leaf.root_goal());

            match self.process(&leaf) {
                Ok(n_visited) => {
                    leaf.finalize(n_visited);
                    search.clear_just_started();
                }
                Err(err) => {
                    warn!(slot = search.slot(), %err, "arena exhausted during expansion");
                    search.stop(SearchStatus::StoppedResources);
                }
            }
        }
    }

    /// Expands or solves the leaf. Returns the positions visited.
    fn process(&mut self, leaf: &LeafToUpdate<'_>) -> Result<u64, ArenaError> {
        let search = self.search;
        let node = search.arena().node(leaf.leaf());
        let (to_solve, remaining_work) = {
            let data = node.lock_data();
            let n_visited = search.arena().node(search.root()).descendants();
            (
                data.to_be_solved(leaf.alpha(), leaf.beta(), search.n_tree_nodes(), n_visited),
                data.remaining_work(leaf.alpha(), leaf.beta()),
            )
        };
        trace!(
            leaf = leaf.leaf(),
            goal = leaf.eval_goal(),
            alpha = leaf.alpha(),
            beta = leaf.beta(),
            remaining_work,
            to_solve,
            "leaf selected"
        );
        if to_solve {
            self.solve(leaf, remaining_work)
        } else {
            self.add_children(leaf, remaining_work)
        }
    }

    fn solve(&mut self, leaf: &LeafToUpdate<'_>, remaining_work: f64) -> Result<u64, ArenaError> {
        let node = self.search.arena().node(leaf.leaf());
        let board = *node.lock_data().board();
        let budget = (remaining_work as u64).max(MIN_SOLVER_BUDGET);
        let outcome = self.search.collaborators().solver.solve(
            &board,
            leaf.alpha() - 1,
            leaf.beta() + 1,
            budget,
        );
        self.stats.solver_nodes += outcome.n_nodes();

        match outcome {
            SolveOutcome::Bounded { lower, upper, n_nodes } => {
                self.stats.solves += 1;
                trace!(leaf = leaf.leaf(), lower, upper, n_nodes, "leaf solved");
                node.lock_data().set_solved(lower, upper);
                Ok(n_nodes.max(1))
            }
            SolveOutcome::Exhausted { n_nodes } => {
                self.stats.solver_exhausted += 1;
                trace!(leaf = leaf.leaf(), n_nodes, budget, "solver budget exhausted, expanding");
                Ok(n_nodes + self.add_children(leaf, remaining_work)?)
            }
        }
    }

    fn add_children(&mut self, leaf: &LeafToUpdate<'_>, remaining_work: f64) -> Result<u64, ArenaError> {
        let search = self.search;
        let arena = search.arena();
        let node = arena.node(leaf.leaf());
        let (board, depth) = {
            let data = node.lock_data();
            (*data.board(), data.depth())
        };
        self.stats.expansions += 1;

        let moves = &search.collaborators().moves;
        let mut successors = moves.legal_moves(&board);
        if successors.is_empty() {
            if !moves.must_pass(&board) {
                let score = board.final_score();
                node.lock_data().set_solved(score, score);
                return Ok(1);
            }
            successors.push(board.switch_players());
        }

        let child_goal = -leaf.eval_goal();
        let mut children: Vec<NodeId> = Vec::with_capacity(successors.len());
        let mut n_visited = 1;
        for next in &successors {
            let (child_id, created) = arena.get_or_create(&NodeKey::new(next, search.slot()), depth + 1)?;
            if created {
                search.record_tree_node();
            }
            if children.contains(&child_id) {
                continue;
            }
            let child = arena.node(child_id);
            if created || !child.lock_data().has_leaf_eval() {
                let estimate = self.estimate(next, child_goal, remaining_work);
                if seed_leaf(child, estimate) {
                    n_visited += 1;
                }
            }
            children.push(child_id);
        }
        self.attach_children(leaf, &children);
        Ok(n_visited)
    }

    fn estimate(&mut self, board: &Board, goal: Score, remaining_work: f64) -> Estimate {
        let evaluator = &self.search.collaborators().evaluator;
        let quick = evaluator.estimate(board, 1);
        self.stats.evaluations += 1;
        let depth = quick_eval_depth(remaining_work, (quick.score - goal as f32).abs());
        if depth <= quick.depth {
            return quick;
        }
        self.stats.evaluations += 1;
        evaluator.estimate(board, depth)
    }

    /// Links the children under the leaf and turns it into an internal node.
    fn attach_children(&self, leaf: &LeafToUpdate<'_>, children: &[NodeId]) {
        let arena = self.search.arena();
        let id = leaf.leaf();
        let mut state = arena.node(id).lock();

        // The leaf needs at least the search window, seen from its side to move.
        let (weak_lower, weak_upper) = self.search.weak_window();
        let (mut lower, mut upper) = if leaf.path_len() % 2 == 0 {
            (weak_lower, weak_upper)
        } else {
            (-weak_upper, -weak_lower)
        };
        if state.data.has_window() {
            let (raw_lower, raw_upper) = state.data.raw_window();
            lower = lower.min(raw_lower);
            upper = upper.max(raw_upper);
        }

        for &child_id in children {
            let child = arena.node(child_id);
            child.add_father(id);
            let mut child_data = child.lock_data();
            if child_data.is_leaf() {
                child_data.set_window(-upper, -lower);
            } else if !child_data.covers_window(-upper, -lower) {
                self.search.report_extension_failure();
            }
        }

        state.children.extend_from_slice(children);
        state.data.mark_internal();
        let NodeState { data, children, .. } = &mut *state;
        data.update_from_children(children.iter().map(|&child| arena.node(child).lock_data()));
    }
}
