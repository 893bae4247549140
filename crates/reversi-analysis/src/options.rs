use std::time::Duration;

use reversi_core::types::Score;

use crate::constants::{MAX_THREADS, THRESHOLD_MAX, THRESHOLD_MIN};
use crate::error::AnalyzeError;

/// Default number of nodes the arena can hold.
pub const DEFAULT_ARENA_CAPACITY: usize = 1 << 18;

/// Engine-wide settings, fixed for the lifetime of an [`crate::Analyzer`].
#[derive(Debug, Clone)]
pub struct AnalyzerOptions {
    pub arena_capacity: usize,
    pub n_threads: usize,
}

impl AnalyzerOptions {
    /// Create options with the given arena capacity, relying on defaults for
    /// the thread count.
    #[must_use]
    pub fn new(arena_capacity: usize) -> Self {
        AnalyzerOptions {
            arena_capacity,
            ..Default::default()
        }
    }

    /// Override the default number of worker threads per search.
    #[must_use]
    pub fn with_threads(mut self, n_threads: Option<usize>) -> Self {
        if let Some(value) = n_threads {
            self.n_threads = value;
        }
        self
    }
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        AnalyzerOptions {
            arena_capacity: DEFAULT_ARENA_CAPACITY,
            n_threads: num_cpus::get(),
        }
    }
}

/// Parameters of one search.
///
/// `lower` and `upper` are odd thresholds: the search stops once the root value
/// is known to be below `lower`, above `upper`, or exactly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchRequest {
    pub lower: Score,
    pub upper: Score,
    pub max_nodes: Option<u64>,
    pub max_time: Option<Duration>,
    pub n_threads: Option<usize>,
    /// Accept a root that is very unlikely to change the answer as solved.
    pub approx: bool,
}

impl Default for SearchRequest {
    fn default() -> Self {
        SearchRequest {
            lower: THRESHOLD_MIN,
            upper: THRESHOLD_MAX,
            max_nodes: None,
            max_time: None,
            n_threads: None,
            approx: false,
        }
    }
}

impl SearchRequest {
    /// Create a request distinguishing values below `lower`, above `upper`
    /// and everything in between.
    #[must_use]
    pub fn new(lower: Score, upper: Score) -> Self {
        SearchRequest {
            lower,
            upper,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_max_nodes(mut self, max_nodes: u64) -> Self {
        self.max_nodes = Some(max_nodes);
        self
    }

    #[must_use]
    pub fn with_max_time(mut self, max_time: Duration) -> Self {
        self.max_time = Some(max_time);
        self
    }

    /// Override the analyzer's thread count for this search only.
    #[must_use]
    pub fn with_threads(mut self, n_threads: Option<usize>) -> Self {
        if n_threads.is_some() {
            self.n_threads = n_threads;
        }
        self
    }

    #[must_use]
    pub fn with_approx(mut self, approx: bool) -> Self {
        self.approx = approx;
        self
    }

    /// Checks that both bounds are odd thresholds in order.
    pub fn validate(&self) -> Result<(), AnalyzeError> {
        let is_threshold = |v: Score| v.rem_euclid(2) == 1 && (THRESHOLD_MIN..=THRESHOLD_MAX).contains(&v);
        if is_threshold(self.lower) && is_threshold(self.upper) && self.lower <= self.upper {
            Ok(())
        } else {
            Err(AnalyzeError::InvalidBounds {
                lower: self.lower,
                upper: self.upper,
            })
        }
    }

    /// Number of workers, given the analyzer default.
    pub(crate) fn threads(&self, default: usize) -> usize {
        self.n_threads.unwrap_or(default).clamp(1, MAX_THREADS)
    }
}
