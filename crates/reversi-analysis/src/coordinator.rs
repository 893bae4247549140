//! One logical search: its root, its window, its stop conditions and its
//! worker pool.
//!
//! The coordinator is shared by the driver thread, the workers and the
//! caller's handle. Everything a worker touches between rounds is atomic; the
//! budget bookkeeping sits behind a small spin lock.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU8, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use reversi_core::board::Board;
use reversi_core::types::Score;
use rustc_hash::FxHashSet;
use tracing::{debug, info, warn};

use crate::arena::{NodeArena, NodeKey};
use crate::collaborators::Collaborators;
use crate::constants::{
    ARENA_MARGIN_PER_THREAD, HYSTERESIS_START, MULTIPLIER_CAP, MULTIPLIER_FAILURE_STEP, MULTIPLIER_FLOOR,
    MULTIPLIER_INIT, MULTIPLIER_SUCCESS_STEP, QUICK_EVAL_DEPTH, SCORE_MAX, SCORE_MIN,
};
use crate::error::{ArenaError, TreeError};
use crate::node::{Lockable, NodeData, NodeId, NodeState, SearchNode};
use crate::selector::update_with_ancestors;
use crate::options::SearchRequest;
use crate::search_result::{SearchSnapshot, SearchStatus, WorkerStats};
use crate::util::spinlock::SpinMutex;
use crate::worker::Worker;

struct Budget {
    max_nodes: Option<u64>,
    max_time: Option<Duration>,
    run_start: Instant,
    in_run: bool,
    start_visited: u64,
    elapsed_before_run: Duration,
    best_advancement: Option<f64>,
}

impl Budget {
    fn elapsed(&self) -> Duration {
        if self.in_run {
            self.elapsed_before_run + self.run_start.elapsed()
        } else {
            self.elapsed_before_run
        }
    }
}

/// Counts a driver thread as running until it exits, even by panic.
struct RunningGuard<'a>(&'a AtomicUsize);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

pub(crate) struct SearchCoordinator {
    arena: Arc<NodeArena>,
    collaborators: Collaborators,
    root: NodeId,
    slot: u8,
    epoch: u32,
    lower: Score,
    upper: Score,
    approx: bool,
    n_threads: AtomicUsize,
    status: AtomicU8,
    cancel_generation: AtomicU64,
    run_generation: AtomicU64,
    weak_lower: AtomicI32,
    weak_upper: AtomicI32,
    updating_window: AtomicBool,
    extension_failed: AtomicBool,
    extension_pass: AtomicU32,
    /// Contention multiplier, x1000.
    multiplier: AtomicU64,
    n_tree_nodes: AtomicU64,
    just_started: AtomicBool,
    budget: SpinMutex<Budget>,
    stats: SpinMutex<WorkerStats>,
    last_snapshot: SpinMutex<SearchSnapshot>,
    running_searches: Arc<AtomicUsize>,
}

impl SearchCoordinator {
    /// Creates the root of a new search in `slot` and sizes its first window.
    pub(crate) fn new(
        arena: Arc<NodeArena>,
        collaborators: Collaborators,
        board: &Board,
        slot: u8,
        request: &SearchRequest,
        running_searches: Arc<AtomicUsize>,
    ) -> Result<SearchCoordinator, ArenaError> {
        let epoch = arena.epoch();
        let (root, _) = arena.get_or_create(&NodeKey::new(board, slot), 0)?;
        let estimate = collaborators.evaluator.estimate(board, QUICK_EVAL_DEPTH);

        let (weak_lower, weak_upper) = {
            let mut data = arena.node(root).lock_data();
            data.set_leaf_estimate(estimate.score, estimate.depth);
            let mut probe = data.clone();
            probe.set_window(request.lower, request.upper);
            let (expected_lower, expected_upper) = probe.expected_weak_window();
            let weak_lower = expected_lower.clamp(request.lower, request.upper);
            let weak_upper = expected_upper.clamp(request.lower, request.upper).max(weak_lower);
            data.set_window(weak_lower, weak_upper);
            (weak_lower, weak_upper)
        };
        arena.node(root).add_descendants(1);

        let coordinator = SearchCoordinator {
            arena,
            collaborators,
            root,
            slot,
            epoch,
            lower: request.lower,
            upper: request.upper,
            approx: request.approx,
            n_threads: AtomicUsize::new(1),
            status: AtomicU8::new(SearchStatus::StoppedNodes as u8),
            cancel_generation: AtomicU64::new(0),
            run_generation: AtomicU64::new(0),
            weak_lower: AtomicI32::new(weak_lower),
            weak_upper: AtomicI32::new(weak_upper),
            updating_window: AtomicBool::new(false),
            extension_failed: AtomicBool::new(false),
            extension_pass: AtomicU32::new(0),
            multiplier: AtomicU64::new(MULTIPLIER_INIT),
            n_tree_nodes: AtomicU64::new(1),
            just_started: AtomicBool::new(true),
            budget: SpinMutex::new(Budget {
                max_nodes: request.max_nodes,
                max_time: request.max_time,
                run_start: Instant::now(),
                in_run: false,
                start_visited: 0,
                elapsed_before_run: Duration::ZERO,
                best_advancement: None,
            }),
            stats: SpinMutex::new(WorkerStats::default()),
            last_snapshot: SpinMutex::new(SearchSnapshot {
                eval: estimate.score as f64,
                lower: SCORE_MIN,
                upper: SCORE_MAX,
                weak_lower,
                weak_upper,
                n_visited: 1,
                n_tree_nodes: 1,
                elapsed: Duration::ZERO,
                status: SearchStatus::Running,
            }),
            running_searches,
        };
        *coordinator.last_snapshot.lock() = coordinator.snapshot();
        Ok(coordinator)
    }

    #[inline]
    pub(crate) fn arena(&self) -> &NodeArena {
        &self.arena
    }

    #[inline]
    pub(crate) fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    #[inline]
    pub(crate) fn root(&self) -> NodeId {
        self.root
    }

    #[inline]
    pub(crate) fn slot(&self) -> u8 {
        self.slot
    }

    #[inline]
    fn root_node(&self) -> &SearchNode {
        self.arena.node(self.root)
    }

    /// Checks that the arena has not been reset since the search started.
    #[inline]
    pub(crate) fn is_current(&self) -> bool {
        self.arena.epoch() == self.epoch
    }

    #[inline]
    pub(crate) fn status(&self) -> SearchStatus {
        SearchStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Moves a running search to `status`. Only the first stop counts.
    pub(crate) fn stop(&self, status: SearchStatus) -> bool {
        self.status
            .compare_exchange(
                SearchStatus::Running as u8,
                status as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub(crate) fn restore_status(&self, status: SearchStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    /// Marks the search unusable after a broken invariant, whatever its status.
    fn fail(&self, err: &TreeError) {
        warn!(slot = self.slot, %err, "search tree is inconsistent, search failed");
        self.restore_status(SearchStatus::Failed);
    }

    /// Cheap end-of-run check of the root, kept in release builds.
    fn check_root(&self) {
        let result = {
            let root = self.root_node().lock_data();
            root.check_window().and_then(|()| root.check_monotone())
        };
        if let Err(err) = result {
            self.fail(&err);
        }
    }

    pub(crate) fn cancel(&self) {
        self.cancel_generation.fetch_add(1, Ordering::AcqRel);
    }

    #[inline]
    pub(crate) fn weak_window(&self) -> (Score, Score) {
        (
            self.weak_lower.load(Ordering::Acquire),
            self.weak_upper.load(Ordering::Acquire),
        )
    }

    #[inline]
    pub(crate) fn n_tree_nodes(&self) -> u64 {
        self.n_tree_nodes.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn record_tree_node(&self) {
        self.n_tree_nodes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn clear_just_started(&self) {
        self.just_started.store(false, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn report_extension_failure(&self) {
        self.extension_failed.store(true, Ordering::Release);
    }

    pub(crate) fn stats(&self) -> WorkerStats {
        *self.stats.lock()
    }

    /// Arms a new run with a fresh budget. The status becomes `Running`.
    pub(crate) fn prepare_run(&self, max_nodes: Option<u64>, max_time: Option<Duration>, n_threads: usize) {
        let mut budget = self.budget.lock();
        budget.max_nodes = max_nodes;
        budget.max_time = max_time;
        budget.run_start = Instant::now();
        budget.in_run = true;
        budget.start_visited = self.root_node().descendants();
        budget.best_advancement = None;
        drop(budget);

        let n = n_threads as u64;
        self.n_threads.store(n_threads, Ordering::Relaxed);
        self.multiplier.store(MULTIPLIER_INIT * n * n, Ordering::Relaxed);
        self.just_started.store(true, Ordering::Relaxed);
        self.run_generation
            .store(self.cancel_generation.load(Ordering::Acquire), Ordering::Release);
        self.status.store(SearchStatus::Running as u8, Ordering::Release);
    }

    /// Starts the driver thread of a prepared run.
    pub(crate) fn spawn(self: &Arc<Self>) -> io::Result<JoinHandle<()>> {
        self.running_searches.fetch_add(1, Ordering::AcqRel);
        let search = Arc::clone(self);
        let result = thread::Builder::new()
            .name(format!("analysis-{}", self.slot))
            .spawn(move || search.run());
        if result.is_err() {
            self.running_searches.fetch_sub(1, Ordering::AcqRel);
        }
        result
    }

    fn run(&self) {
        let _running = RunningGuard(&self.running_searches);
        let n_threads = self.n_threads.load(Ordering::Relaxed);
        info!(
            slot = self.slot,
            lower = self.lower,
            upper = self.upper,
            n_threads,
            "search run started"
        );

        let run_stats = thread::scope(|scope| {
            let handles: Vec<_> = (0..n_threads)
                .filter_map(|i| {
                    thread::Builder::new()
                        .name(format!("analysis-{}-{i}", self.slot))
                        .spawn_scoped(scope, || Worker::new(self).run())
                        .inspect_err(|err| warn!(slot = self.slot, %err, "failed to spawn worker"))
                        .ok()
                })
                .collect();
            if handles.is_empty() {
                self.stop(SearchStatus::Failed);
            }
            let mut total = WorkerStats::default();
            for handle in handles {
                if let Ok(stats) = handle.join() {
                    total += stats;
                }
            }
            total
        });

        if self.status() != SearchStatus::Failed && self.is_current() {
            self.update_weak_window();
            self.check_root();
        }
        *self.stats.lock() += run_stats;
        {
            let mut budget = self.budget.lock();
            let ran = budget.run_start.elapsed();
            budget.elapsed_before_run += ran;
            budget.in_run = false;
        }
        let snapshot = self.snapshot();
        *self.last_snapshot.lock() = snapshot;

        debug!(
            slot = self.slot,
            selection_successes = run_stats.selection_successes,
            selection_failures = run_stats.selection_failures,
            expansions = run_stats.expansions,
            solves = run_stats.solves,
            solver_exhausted = run_stats.solver_exhausted,
            solver_nodes = run_stats.solver_nodes,
            "worker statistics"
        );
        info!(
            slot = self.slot,
            status = ?snapshot.status,
            eval = snapshot.eval,
            lower = snapshot.lower,
            upper = snapshot.upper,
            n_visited = snapshot.n_visited,
            n_tree_nodes = snapshot.n_tree_nodes,
            elapsed_ms = snapshot.elapsed.as_millis() as u64,
            "search run stopped"
        );
    }

    /// Evaluates every stop condition; true once the run must end.
    pub(crate) fn check_finished(&self) -> bool {
        if !self.status().is_running() {
            return true;
        }
        if !self.is_current() {
            self.stop(SearchStatus::Cancelled);
            return true;
        }
        if self.cancel_generation.load(Ordering::Acquire) != self.run_generation.load(Ordering::Acquire) {
            self.stop(SearchStatus::Cancelled);
            return true;
        }
        let root = self.root_node();
        if root.lock_data().is_solved(self.lower, self.upper, self.approx) {
            self.stop(SearchStatus::Solved);
            return true;
        }
        let margin = ARENA_MARGIN_PER_THREAD * self.n_threads.load(Ordering::Relaxed);
        if self.arena.len() + margin >= self.arena.capacity() {
            warn!(
                slot = self.slot,
                capacity = self.arena.capacity(),
                "node arena nearly full, stopping"
            );
            self.stop(SearchStatus::StoppedResources);
            return true;
        }

        let mut budget = self.budget.lock();
        let time_used = budget.max_time.map_or(0.0, |max_time| {
            budget.run_start.elapsed().as_secs_f64() / max_time.as_secs_f64().max(1e-9)
        });
        let nodes_used = if self.just_started.load(Ordering::Relaxed) {
            0.0
        } else {
            budget.max_nodes.map_or(0.0, |max_nodes| {
                root.descendants().saturating_sub(budget.start_visited) as f64 / max_nodes.max(1) as f64
            })
        };
        let used = time_used.max(nodes_used);
        if used < HYSTERESIS_START {
            return false;
        }
        let status = if time_used >= nodes_used {
            SearchStatus::StoppedTime
        } else {
            SearchStatus::StoppedNodes
        };
        let stop = if used >= 1.0 {
            true
        } else {
            let advancement = root.lock_data().advancement();
            let best_advancement = budget.best_advancement;
            match best_advancement {
                None => {
                    budget.best_advancement = Some(advancement);
                    false
                }
                Some(best) => advancement <= best,
            }
        };
        drop(budget);
        if stop {
            self.stop(status);
        }
        stop
    }

    #[inline]
    pub(crate) fn multiplier(&self) -> f64 {
        self.multiplier.load(Ordering::Relaxed) as f64 / 1000.0
    }

    /// Lowers the contention penalty after a successful selection and raises
    /// it after a failed one.
    pub(crate) fn on_selection(&self, success: bool) {
        let n = self.n_threads.load(Ordering::Relaxed) as u64;
        let _ = self.multiplier.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |m| {
            if success {
                (m > MULTIPLIER_FLOOR * n).then(|| m - MULTIPLIER_SUCCESS_STEP * n)
            } else {
                (m + MULTIPLIER_FAILURE_STEP * n <= MULTIPLIER_CAP).then(|| m + MULTIPLIER_FAILURE_STEP * n)
            }
        });
    }

    /// Moves the search window towards what the root distribution expects.
    ///
    /// The window widens one side at a time, each time followed by a tree
    /// extension. Only one thread updates the window at once; the others go on.
    pub(crate) fn update_weak_window(&self) {
        if self.updating_window.swap(true, Ordering::Acquire) {
            return;
        }
        loop {
            let (expected_lower, expected_upper) = self.root_node().lock_data().expected_weak_window();
            let new_lower = expected_lower.clamp(self.lower, self.upper);
            let new_upper = expected_upper.clamp(self.lower, self.upper).max(new_lower);
            let (weak_lower, weak_upper) = self.weak_window();
            let (target_lower, target_upper, widened) = if new_lower < weak_lower {
                (new_lower, weak_upper, true)
            } else if new_upper > weak_upper {
                (weak_lower, new_upper, true)
            } else {
                (new_lower, new_upper, false)
            };
            self.weak_lower.store(target_lower, Ordering::Release);
            self.weak_upper.store(target_upper, Ordering::Release);
            if widened {
                debug!(
                    slot = self.slot,
                    weak_lower = target_lower,
                    weak_upper = target_upper,
                    "search window widened"
                );
            }

            let covered = self.root_node().lock_data().covers_window(target_lower, target_upper);
            let failed = self.extension_failed.swap(false, Ordering::AcqRel);
            if !widened && covered && !failed {
                break;
            }
            self.extend_root(target_lower, target_upper);
        }
        self.updating_window.store(false, Ordering::Release);
    }

    /// Extends the tree until the root covers the window, retrying while
    /// concurrent expansions get in the way.
    fn extend_root(&self, weak_lower: Score, weak_upper: Score) {
        let mut retries = 0u32;
        loop {
            self.extension_failed.store(false, Ordering::Release);
            let pass = self.extension_pass.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
            let mut late = FxHashSet::default();
            self.extend(self.root, None, weak_lower, weak_upper, pass, &mut late);
            if !late.is_empty() {
                let late: Vec<NodeId> = late.into_iter().collect();
                update_with_ancestors(&self.arena, &late);
            }
            if !self.extension_failed.load(Ordering::Acquire) {
                break;
            }
            retries += 1;
            debug!(slot = self.slot, retries, "window extension raced an expansion, retrying");
        }
    }

    /// Widens `id` and everything below it, children first.
    ///
    /// Fathers other than `from` that this pass already left behind, including
    /// fathers linked while the node was being widened, are added to `late`.
    fn extend(
        &self,
        id: NodeId,
        from: Option<NodeId>,
        weak_lower: Score,
        weak_upper: Score,
        pass: u32,
        late: &mut FxHashSet<NodeId>,
    ) {
        let node = self.arena.node(id);
        let previous = node.swap_extension_mark(pass);
        let (lower, upper, children) = {
            let mut state = node.lock();
            if previous == pass && state.data.covers_window(weak_lower, weak_upper) {
                return;
            }
            if state.data.is_leaf() {
                state.data.set_window(weak_lower, weak_upper);
                self.collect_late_fathers(&state, from, pass, late);
                return;
            }
            let (lower, upper) = if state.data.has_window() {
                let (raw_lower, raw_upper) = state.data.raw_window();
                (raw_lower.min(weak_lower), raw_upper.max(weak_upper))
            } else {
                (weak_lower, weak_upper)
            };
            (lower, upper, state.children.clone())
        };

        for child in children {
            self.extend(child, Some(id), -upper, -lower, pass, late);
        }

        let mut state = node.lock();
        state.data.widen_window(lower, upper);
        let NodeState { data, children, .. } = &mut *state;
        data.update_from_children(children.iter().map(|&child| self.arena.node(child).lock_data()));
        self.collect_late_fathers(&state, from, pass, late);
    }

    fn collect_late_fathers(&self, state: &NodeState, from: Option<NodeId>, pass: u32, late: &mut FxHashSet<NodeId>) {
        for link in &state.fathers {
            if Some(link.father) != from && self.arena.node(link.father).extension_mark() == pass {
                late.insert(link.father);
            }
        }
    }

    /// Current root state, or the last recorded one once the arena moved on.
    pub(crate) fn snapshot(&self) -> SearchSnapshot {
        if !self.is_current() {
            return *self.last_snapshot.lock();
        }
        let root = self.root_node().snapshot();
        let (weak_lower, weak_upper) = self.weak_window();
        SearchSnapshot {
            eval: root.get_eval(),
            lower: root.lower(),
            upper: root.upper(),
            weak_lower,
            weak_upper,
            n_visited: root.descendants(),
            n_tree_nodes: self.n_tree_nodes(),
            elapsed: self.budget.lock().elapsed(),
            status: self.status(),
        }
    }

    pub(crate) fn root_data(&self) -> Option<NodeData> {
        self.arena.get(self.root, self.epoch).map(SearchNode::snapshot)
    }

    pub(crate) fn root_children(&self) -> Vec<NodeData> {
        let Some(root) = self.arena.get(self.root, self.epoch) else {
            return Vec::new();
        };
        let children = root.lock().children.clone();
        children
            .into_iter()
            .map(|child| self.arena.node(child).snapshot())
            .collect()
    }

    /// Walks the tree of this search and checks every node.
    ///
    /// A stopped search with a broken tree becomes [`SearchStatus::Failed`].
    pub(crate) fn verify(&self) -> Result<(), TreeError> {
        if !self.is_current() {
            return Ok(());
        }
        let result = self.check_tree();
        if let Err(err) = &result {
            if !self.status().is_running() {
                self.fail(err);
            }
        }
        result
    }

    fn check_tree(&self) -> Result<(), TreeError> {
        let mut seen = FxHashSet::default();
        let mut stack = vec![self.root];
        seen.insert(self.root);
        while let Some(id) = stack.pop() {
            let node = self.arena.node(id);
            let (data, children, recorded) = {
                let state = node.lock();
                let recorded: u64 = state.fathers.iter().map(|link| link.visits).sum();
                (state.data.clone(), state.children.clone(), recorded)
            };
            data.check_window()?;
            data.check_monotone()?;
            let visits = node.descendants();
            if recorded > visits {
                return Err(TreeError::VisitLedger {
                    board_hash: data.board().hash(),
                    visits,
                    recorded,
                });
            }
            if data.is_leaf() {
                continue;
            }

            self.check_children(&data, &children)?;
            let snapshots: Vec<NodeData> = children
                .iter()
                .map(|&child| self.arena.node(child).snapshot())
                .collect();
            data.check_merge(snapshots.iter())?;
            for child in children {
                if seen.insert(child) {
                    stack.push(child);
                }
            }
        }
        Ok(())
    }

    /// Checks that `children` are exactly the distinct successors of the node.
    fn check_children(&self, data: &NodeData, children: &[NodeId]) -> Result<(), TreeError> {
        let board = data.board();
        let moves = &self.collaborators.moves;
        let mut expected: Vec<Board> = moves.legal_moves(board).iter().map(Board::unique).collect();
        if expected.is_empty() && moves.must_pass(board) {
            expected.push(board.switch_players().unique());
        }
        expected.sort_unstable();
        expected.dedup();

        let board_hash = board.hash();
        if expected.len() != children.len() {
            return Err(TreeError::WrongChildCount {
                board_hash,
                expected: expected.len(),
                actual: children.len(),
            });
        }
        for &child in children {
            let child_board = *self.arena.node(child).lock_data().board();
            if expected.binary_search(&child_board).is_err() {
                return Err(TreeError::UnexpectedChild { board_hash });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reversi_core::heuristic::{self, Estimate};

    use crate::collaborators::QuickEvaluator;

    struct Shallow;

    impl QuickEvaluator for Shallow {
        fn estimate(&self, board: &Board, _depth: u8) -> Estimate {
            heuristic::evaluate(board, 1)
        }
    }

    fn coordinator(board: &Board, request: &SearchRequest) -> SearchCoordinator {
        SearchCoordinator::new(
            Arc::new(NodeArena::new(1 << 14)),
            Collaborators::default().with_evaluator(Shallow),
            board,
            0,
            request,
            Arc::new(AtomicUsize::new(0)),
        )
        .unwrap()
    }

    #[test]
    fn test_initial_window_inside_request() {
        let request = SearchRequest::new(-5, 9);
        let search = coordinator(&Board::new(), &request);
        let (weak_lower, weak_upper) = search.weak_window();
        assert!(-5 <= weak_lower && weak_lower <= weak_upper && weak_upper <= 9);
        assert!(search.root_node().lock_data().covers_window(weak_lower, weak_upper));
        assert_eq!(search.snapshot().n_visited, 1);
    }

    #[test]
    fn test_first_stop_wins() {
        let search = coordinator(&Board::new(), &SearchRequest::default());
        search.prepare_run(None, None, 1);
        assert!(search.status().is_running());
        assert!(search.stop(SearchStatus::StoppedTime));
        assert!(!search.stop(SearchStatus::Cancelled));
        assert_eq!(search.status(), SearchStatus::StoppedTime);
    }

    #[test]
    fn test_cancel_is_seen_by_next_check() {
        let search = coordinator(&Board::new(), &SearchRequest::default());
        search.prepare_run(None, None, 1);
        assert!(!search.check_finished());
        search.cancel();
        assert!(search.check_finished());
        assert_eq!(search.status(), SearchStatus::Cancelled);

        // A new run forgets earlier cancellations.
        search.prepare_run(None, None, 1);
        assert!(!search.check_finished());
    }

    #[test]
    fn test_multiplier_stays_within_bounds() {
        let search = coordinator(&Board::new(), &SearchRequest::default());
        search.prepare_run(None, None, 4);
        let start = search.multiplier();
        for _ in 0..10 {
            search.on_selection(false);
        }
        assert!(search.multiplier() > start);
        for _ in 0..100_000 {
            search.on_selection(true);
        }
        let floor = (MULTIPLIER_FLOOR * 4) as f64 / 1000.0;
        assert!(search.multiplier() <= floor);
        assert!(search.multiplier() > floor - (MULTIPLIER_SUCCESS_STEP * 4) as f64 / 1000.0 - 1e-9);
        for _ in 0..100_000 {
            search.on_selection(false);
        }
        assert!(search.multiplier() <= MULTIPLIER_CAP as f64 / 1000.0);
    }

    #[test]
    fn test_extension_covers_a_wider_window() {
        let search = coordinator(&Board::new(), &SearchRequest::default());
        search.prepare_run(Some(400), None, 1);
        let stats = Worker::new(&search).run();
        assert!(stats.expansions > 0);
        assert_eq!(search.status(), SearchStatus::StoppedNodes);

        search.extend_root(-41, 41);
        assert!(search.root_node().lock_data().covers_window(-41, 41));
        search.verify().unwrap();
    }

    #[test]
    fn test_snapshot_is_frozen_after_reset() {
        let search = Arc::new(coordinator(&Board::new(), &SearchRequest::default()));
        search.prepare_run(Some(200), None, 1);
        search.spawn().unwrap().join().unwrap();
        let before = search.snapshot();
        assert_eq!(before.status, SearchStatus::StoppedNodes);

        search.arena().reset();
        assert!(!search.is_current());
        assert_eq!(search.snapshot(), before);
        assert!(search.root_data().is_none());
        assert!(search.verify().is_ok());
    }

    #[test]
    fn test_reset_arena_stops_the_run() {
        let search = coordinator(&Board::new(), &SearchRequest::default());
        search.prepare_run(None, None, 1);
        assert!(!search.check_finished());
        search.arena().reset();
        assert!(search.check_finished());
        assert_eq!(search.status(), SearchStatus::Cancelled);
    }

    #[test]
    fn test_broken_tree_fails_the_search() {
        let search = Arc::new(coordinator(&Board::new(), &SearchRequest::default()));
        search.prepare_run(Some(300), None, 2);
        search.spawn().unwrap().join().unwrap();
        assert_eq!(search.status(), SearchStatus::StoppedNodes);
        search.verify().unwrap();

        search.arena().node(search.root()).lock().children.pop();
        assert!(matches!(search.verify(), Err(TreeError::WrongChildCount { .. })));
        assert_eq!(search.status(), SearchStatus::Failed);
        assert!(!search.status().is_resumable());
    }
}
