//! Tuning constants of the analysis engine.
//!
//! None of these values is load-bearing for correctness: they shape how the
//! search spends its effort, not what it proves.

use reversi_core::types::Score;

/// Lowest possible game value.
pub const SCORE_MIN: Score = -64;

/// Highest possible game value.
pub const SCORE_MAX: Score = 64;

/// Lowest odd threshold a cell can be attached to.
pub const THRESHOLD_MIN: Score = -63;

/// Highest odd threshold a cell can be attached to.
pub const THRESHOLD_MAX: Score = 63;

/// Maximum number of worker threads per search.
pub const MAX_THREADS: usize = 64;

/// Number of independent searches that can share one arena between resets.
pub const MAX_SEARCH_SLOTS: usize = 256;

/// Tail probability ignored when choosing the root window.
pub const ZERO_PERC_FOR_WEAK: f64 = 0.05;

/// Thresholds whose neighbours are this close to certain are not worth a goal.
pub const MIN_PROB_EVAL_GOAL: f64 = 0.03;

/// Tail probability used to narrow the alpha-beta bracket during descent.
pub const PROB_FOR_ENDGAME_ALPHA_BETA: f64 = 0.05;

/// Solve probability below which a search in approximate mode counts as done.
pub const APPROX_SOLVE_PROB: f64 = 0.05;

/// Root solve probability above which the previous goal is not repeated.
pub const LAST_GOAL_SOLVE_PROB: f64 = 0.05;

/// Smallest node budget handed to the exact solver.
pub const MIN_SOLVER_BUDGET: u64 = 50_000;

/// Remaining-work cap under which a leaf is always solved exactly.
pub const SOLVE_WORK_CAP: f64 = 70_000.0;

/// Remaining-work allowance for a leaf whose estimate sits on the bracket.
pub const SOLVE_WORK_BASE: f64 = 10_000.0;

/// Extra allowance per disc the leaf estimate lies outside the bracket.
pub const SOLVE_WORK_PER_DISC: f64 = 2_000.0;

/// Target ratio of visited positions per tree node once the search is mature.
pub const VISITS_PER_TREE_NODE: f64 = 2_000.0;

/// Fraction of the budget after which stop hysteresis is checked.
pub const HYSTERESIS_START: f64 = 0.8;

/// Nodes kept free in the arena for in-flight expansions, per worker.
pub const ARENA_MARGIN_PER_THREAD: usize = 64;

/// Initial contention multiplier per squared thread count (stored x1000).
pub const MULTIPLIER_INIT: u64 = 10_000;

/// Contention multiplier floor per thread (stored x1000).
pub const MULTIPLIER_FLOOR: u64 = 40_000;

/// Contention multiplier decrease per thread after a successful selection.
pub const MULTIPLIER_SUCCESS_STEP: u64 = 2_000;

/// Contention multiplier increase per thread after a failed selection.
pub const MULTIPLIER_FAILURE_STEP: u64 = 4_000;

/// Contention multiplier ceiling (stored x1000).
pub const MULTIPLIER_CAP: u64 = 40_000_000_000;

/// Depth of the quick evaluation used to seed new leaves.
pub const QUICK_EVAL_DEPTH: u8 = 2;

/// Parent remaining work above which new leaves get the deepest quick evaluation.
pub const DEEP_EVAL_WORK: f64 = 2e7;

/// Parent remaining work above which new leaves get a deeper quick evaluation.
pub const MEDIUM_EVAL_WORK: f64 = 4e6;

/// Distance in discs between a shallow estimate and the goal that counts as close.
pub const CLOSE_TO_GOAL: f32 = 8.0;
