//! Concurrent best-first probabilistic analysis of Othello positions.
//!
//! Each node of the search tree carries, for every odd threshold in its
//! window, the probability that the game value reaches the threshold along
//! with proof and disproof numbers. Workers repeatedly pick the leaf whose
//! resolution would move the root the most, expand or solve it, and push the
//! result back up through every father.

mod analyzer;
pub mod arena;
pub mod collaborators;
pub mod constants;
mod coordinator;
pub mod error;
pub mod evaluation;
pub mod node;
pub mod options;
pub mod prob;
pub mod search_result;
pub mod selector;
mod util;
mod worker;

pub use analyzer::{Analyzer, SearchHandle};
pub use collaborators::{Collaborators, ExactSolver, MoveGenerator, QuickEvaluator};
pub use error::{AnalyzeError, ArenaError, TreeError};
pub use node::NodeData;
pub use options::{AnalyzerOptions, SearchRequest};
pub use search_result::{SearchSnapshot, SearchStatus, WorkerStats};
pub use worker::quick_eval_depth;
