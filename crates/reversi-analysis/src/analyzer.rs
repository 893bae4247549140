//! Public entry points: start, poll, cancel, resume.

use std::sync::{Arc, Mutex, PoisonError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use reversi_core::board::Board;
use tracing::info;

use crate::arena::NodeArena;
use crate::collaborators::Collaborators;
use crate::constants::MAX_SEARCH_SLOTS;
use crate::coordinator::SearchCoordinator;
use crate::error::{AnalyzeError, TreeError};
use crate::node::NodeData;
use crate::options::{AnalyzerOptions, SearchRequest};
use crate::search_result::{SearchSnapshot, SearchStatus, WorkerStats};

/// Owner of the node arena and factory of searches.
///
/// Searches started from one analyzer share its arena, each in its own slot,
/// until [`Analyzer::reset`] empties it.
pub struct Analyzer {
    arena: Arc<NodeArena>,
    options: AnalyzerOptions,
    collaborators: Collaborators,
    next_slot: usize,
    running_searches: Arc<AtomicUsize>,
    /// Held while checking for running searches and acting on the answer.
    lifecycle: Arc<Mutex<()>>,
}

impl Analyzer {
    pub fn new(options: AnalyzerOptions) -> Analyzer {
        Analyzer::with_collaborators(options, Collaborators::default())
    }

    /// Creates an analyzer that uses the given move generator, evaluator and solver.
    pub fn with_collaborators(options: AnalyzerOptions, collaborators: Collaborators) -> Analyzer {
        Analyzer {
            arena: Arc::new(NodeArena::new(options.arena_capacity)),
            options,
            collaborators,
            next_slot: 0,
            running_searches: Arc::new(AtomicUsize::new(0)),
            lifecycle: Arc::new(Mutex::new(())),
        }
    }

    pub fn options(&self) -> &AnalyzerOptions {
        &self.options
    }

    pub fn arena(&self) -> &NodeArena {
        &self.arena
    }

    /// Checks whether any search of this analyzer still has running threads.
    pub fn is_searching(&self) -> bool {
        self.running_searches.load(Ordering::Acquire) > 0
    }

    /// Starts searching `board` in the background.
    ///
    /// # Arguments
    ///
    /// * `board` - Root position, from the side to move.
    /// * `request` - Bounds and budgets of the search.
    ///
    /// # Returns
    ///
    /// A handle to poll, cancel or resume the search.
    pub fn start(&mut self, board: &Board, request: SearchRequest) -> Result<SearchHandle, AnalyzeError> {
        request.validate()?;
        if self.next_slot >= MAX_SEARCH_SLOTS {
            return Err(AnalyzeError::NoFreeSlot(MAX_SEARCH_SLOTS));
        }
        let slot = self.next_slot as u8;
        self.next_slot += 1;

        let n_threads = request.threads(self.options.n_threads);
        let search = Arc::new(SearchCoordinator::new(
            Arc::clone(&self.arena),
            self.collaborators.clone(),
            board,
            slot,
            &request,
            Arc::clone(&self.running_searches),
        )?);
        search.prepare_run(request.max_nodes, request.max_time, n_threads);
        info!(
            slot,
            lower = request.lower,
            upper = request.upper,
            n_threads,
            max_nodes = ?request.max_nodes,
            max_time = ?request.max_time,
            "search started"
        );
        let driver = search.spawn()?;
        Ok(SearchHandle {
            search,
            driver: Some(driver),
            n_threads,
            lifecycle: Arc::clone(&self.lifecycle),
        })
    }

    /// Empties the arena in O(1) and frees every slot.
    ///
    /// Handles of earlier searches keep answering [`SearchHandle::poll`] with
    /// their final state.
    pub fn reset(&mut self) -> Result<(), AnalyzeError> {
        let _lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_searching() {
            return Err(AnalyzeError::SearchInProgress);
        }
        self.arena.reset();
        self.next_slot = 0;
        Ok(())
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Analyzer::new(AnalyzerOptions::default())
    }
}

/// Caller's side of a running or finished search.
///
/// Dropping the handle cancels the search and waits for its threads.
pub struct SearchHandle {
    search: Arc<SearchCoordinator>,
    driver: Option<JoinHandle<()>>,
    n_threads: usize,
    lifecycle: Arc<Mutex<()>>,
}

impl SearchHandle {
    /// Current root state.
    pub fn poll(&self) -> SearchSnapshot {
        self.search.snapshot()
    }

    pub fn status(&self) -> SearchStatus {
        self.search.status()
    }

    #[inline]
    pub fn slot(&self) -> u8 {
        self.search.slot()
    }

    /// Checks whether the search threads have exited.
    pub fn is_finished(&self) -> bool {
        self.driver.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Asks the workers to stop after their current leaf.
    pub fn cancel(&self) {
        self.search.cancel();
    }

    /// Blocks until the search stops and returns its final state.
    pub fn wait(&mut self) -> SearchSnapshot {
        if let Some(driver) = self.driver.take() {
            if driver.join().is_err() {
                self.search.stop(SearchStatus::Failed);
            }
        }
        self.poll()
    }

    /// Continues a search stopped on time or nodes with a fresh budget.
    pub fn resume(&mut self, max_nodes: Option<u64>, max_time: Option<Duration>) -> Result<(), AnalyzeError> {
        if !self.is_finished() {
            return Err(AnalyzeError::SearchInProgress);
        }
        self.wait();
        let _lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        let status = self.status();
        if !status.is_resumable() || !self.search.is_current() {
            return Err(AnalyzeError::NotResumable(status));
        }

        self.search.prepare_run(max_nodes, max_time, self.n_threads);
        info!(
            slot = self.slot(),
            max_nodes = ?max_nodes,
            max_time = ?max_time,
            "search resumed"
        );
        match self.search.spawn() {
            Ok(driver) => {
                self.driver = Some(driver);
                Ok(())
            }
            Err(err) => {
                self.search.restore_status(status);
                Err(err.into())
            }
        }
    }

    /// Worker counters summed over every finished run.
    pub fn stats(&self) -> WorkerStats {
        self.search.stats()
    }

    /// Copy of the root node, unless the arena was reset since.
    pub fn root(&self) -> Option<NodeData> {
        self.search.root_data()
    }

    /// Copies of the root's children; empty before the first expansion or after a reset.
    pub fn root_children(&self) -> Vec<NodeData> {
        self.search.root_children()
    }

    /// Walks the whole tree of this search and checks its invariants.
    ///
    /// Only meaningful once the search has stopped.
    pub fn verify(&self) -> Result<(), TreeError> {
        self.search.verify()
    }
}

impl Drop for SearchHandle {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            self.search.cancel();
            let _ = driver.join();
        }
    }
}
