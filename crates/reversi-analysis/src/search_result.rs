//! What a search reports back to its caller.

use std::ops::AddAssign;
use std::time::Duration;

use reversi_core::types::Score;

/// Lifecycle of a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SearchStatus {
    Running = 0,
    /// The root value is settled against the requested bounds.
    Solved = 1,
    StoppedTime = 2,
    StoppedNodes = 3,
    /// The arena ran out of nodes.
    StoppedResources = 4,
    Cancelled = 5,
    /// An invariant broke; the search must be discarded.
    Failed = 6,
}

impl SearchStatus {
    pub(crate) fn from_u8(value: u8) -> SearchStatus {
        match value {
            0 => SearchStatus::Running,
            1 => SearchStatus::Solved,
            2 => SearchStatus::StoppedTime,
            3 => SearchStatus::StoppedNodes,
            4 => SearchStatus::StoppedResources,
            5 => SearchStatus::Cancelled,
            _ => SearchStatus::Failed,
        }
    }

    #[inline]
    pub fn is_running(self) -> bool {
        self == SearchStatus::Running
    }

    /// Checks whether [`crate::SearchHandle::resume`] accepts this status.
    #[inline]
    pub fn is_resumable(self) -> bool {
        matches!(self, SearchStatus::StoppedTime | SearchStatus::StoppedNodes)
    }
}

/// Root state of a search at one point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchSnapshot {
    /// Expected value of the root in discs.
    pub eval: f64,
    pub lower: Score,
    pub upper: Score,
    pub weak_lower: Score,
    pub weak_upper: Score,
    /// Positions visited below the root, solver nodes included.
    pub n_visited: u64,
    /// Nodes this search created in the arena.
    pub n_tree_nodes: u64,
    pub elapsed: Duration,
    pub status: SearchStatus,
}

/// Counters accumulated by the workers of a search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub selection_successes: u64,
    pub selection_failures: u64,
    pub expansions: u64,
    pub solves: u64,
    pub solver_exhausted: u64,
    pub solver_nodes: u64,
    pub evaluations: u64,
}

impl AddAssign for WorkerStats {
    fn add_assign(&mut self, other: WorkerStats) {
        self.selection_successes += other.selection_successes;
        self.selection_failures += other.selection_failures;
        self.expansions += other.expansions;
        self.solves += other.solves;
        self.solver_exhausted += other.solver_exhausted;
        self.solver_nodes += other.solver_nodes;
        self.evaluations += other.evaluations;
    }
}
