//! Search machinery shared by both engines.
//!
//! A search strategy consumes a [`SearchContext`] (knowledge source, learning
//! problem, metric, retrieval cache, budgets, cancellation) and runs to one of
//! the terminal [`SearchState`]s, producing a [`SearchOutcome`] with the
//! best-found hypotheses and run statistics. The two engines —
//! [`refinement_search::RefinementSearch`] and [`crate::evo::EvoSearch`] —
//! are alternative implementations of [`SearchStrategy`] behind the learner
//! facade.

pub mod heuristic;
pub mod node;
pub mod refinement_search;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::RetrievalCache;
use crate::error::KheperResult;
use crate::expr::ConceptExpr;
use crate::kb::KnowledgeSource;
use crate::problem::LearningProblem;
use crate::quality::QualityMetric;
use crate::vocab::{IndividualId, IndividualSet};

/// Lifecycle of a search run.
///
/// `Idle → Running → {Converged, BudgetExhausted, Cancelled}`. The three
/// terminal states all leave a valid best-found set behind; only an adapter
/// failure (which surfaces as an error, not a state) discards results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchState {
    /// No search has run yet.
    Idle,
    /// A search is in progress.
    Running,
    /// A hypothesis reached the configured quality threshold.
    Converged,
    /// Wall-clock or step budget ran out.
    BudgetExhausted,
    /// An external stop request was observed at a step boundary.
    Cancelled,
}

impl std::fmt::Display for SearchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchState::Idle => write!(f, "idle"),
            SearchState::Running => write!(f, "running"),
            SearchState::Converged => write!(f, "converged"),
            SearchState::BudgetExhausted => write!(f, "budget-exhausted"),
            SearchState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A scored candidate concept, as returned by `best_hypotheses`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hypothesis {
    /// The concept expression, in normal form.
    pub expr: ConceptExpr,
    /// Quality score in `[0, 1]` under the run's metric.
    pub quality: f64,
    /// Structural length (the tie-breaker: shorter is better).
    pub length: usize,
    /// The retrieved instance set backing the score.
    pub instances: Arc<IndividualSet>,
}

impl Hypothesis {
    /// Whether this hypothesis covers the given individual.
    pub fn covers(&self, individual: &IndividualId) -> bool {
        self.instances.contains(individual)
    }
}

impl std::fmt::Display for Hypothesis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (quality {:.4}, length {})", self.expr, self.quality, self.length)
    }
}

/// Bounded best-found set: top-k by quality, ties broken by shorter length,
/// deduplicated by normal form.
///
/// Both engines feed every evaluated candidate through
/// [`BestHypotheses::maybe_add`]; entries are never removed, so the best-ever
/// hypothesis is monotone over a run even when the underlying population
/// regresses.
#[derive(Debug, Clone)]
pub struct BestHypotheses {
    capacity: usize,
    items: Vec<Hypothesis>,
}

impl BestHypotheses {
    /// Create an empty set with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: Vec::with_capacity(capacity.min(64)),
        }
    }

    /// Insert if the candidate ranks within capacity and is not already
    /// present. Returns whether it was inserted.
    pub fn maybe_add(&mut self, candidate: Hypothesis) -> bool {
        if self.capacity == 0 {
            return false;
        }
        if self.items.iter().any(|held| held.expr == candidate.expr) {
            return false;
        }
        let position = self.items.partition_point(|held| {
            held.quality > candidate.quality
                || (held.quality == candidate.quality && held.length <= candidate.length)
        });
        if position == self.items.len() && self.items.len() >= self.capacity {
            return false;
        }
        self.items.insert(position, candidate);
        self.items.truncate(self.capacity);
        true
    }

    /// The best hypothesis found so far.
    pub fn best(&self) -> Option<&Hypothesis> {
        self.items.first()
    }

    /// The top `n` hypotheses, best first.
    pub fn top(&self, n: usize) -> Vec<Hypothesis> {
        self.items.iter().take(n).cloned().collect()
    }

    /// Number of held hypotheses.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether no hypothesis has been recorded.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Clonable cancellation flag, observed by engines at step boundaries only
/// (between frontier pops, between generations) — an in-flight expansion or
/// generation always completes.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    /// Create a fresh, unset handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the running search.
    pub fn request_stop(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Clear the flag for a new run.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }
}

/// Run statistics reported alongside the best-found set.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SearchStats {
    /// Frontier expansions (best-first engine).
    pub expansions: usize,
    /// Distinct concept evaluations requested (both engines).
    pub concepts_tested: usize,
    /// Completed generations (evolutionary engine).
    pub generations: usize,
    /// Minimum horizontal expansion among expanded nodes.
    pub min_horizontal_expansion: usize,
    /// Maximum horizontal expansion among expanded nodes.
    pub max_horizontal_expansion: usize,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

/// Everything a strategy needs for one run.
///
/// All borrowed pieces are `Sync`, so strategies may fan evaluation out
/// across rayon workers.
pub struct SearchContext<'a> {
    pub kb: &'a dyn KnowledgeSource,
    pub problem: &'a LearningProblem,
    pub metric: QualityMetric,
    pub cache: &'a RetrievalCache,
    pub stop: StopHandle,
    pub max_runtime: Option<Duration>,
    pub quality_threshold: f64,
    pub max_results: usize,
}

/// Result of a completed (terminal) search run.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// The terminal state the run ended in.
    pub state: SearchState,
    /// Best hypotheses discovered over the whole run.
    pub best: BestHypotheses,
    /// Run statistics.
    pub stats: SearchStats,
}

/// A concept-learning search engine.
///
/// Strategies are interchangeable behind the learner facade; each runs a
/// single search to a terminal state on the calling thread.
pub trait SearchStrategy {
    fn run(&mut self, ctx: &SearchContext<'_>) -> KheperResult<SearchOutcome>;
}
