//! Learner facade: the top-level API for concept learning.
//!
//! A [`Learner`] binds a knowledge source, a quality metric, and one search
//! strategy. `fit` runs the strategy to a terminal state on the calling
//! thread; `best_hypotheses` reads the ranked results afterwards. The facade
//! holds no search logic of its own — strategies are interchangeable variants
//! selected by [`StrategyKind`].

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::{CacheStats, RetrievalCache};
use crate::error::{KbError, KheperResult, SearchError};
use crate::evo::{EvoConfig, EvoSearch};
use crate::kb::KnowledgeSource;
use crate::problem::LearningProblem;
use crate::quality::QualityMetric;
use crate::search::refinement_search::{RefinementSearch, RefinementSearchConfig};
use crate::search::{
    Hypothesis, SearchContext, SearchOutcome, SearchState, SearchStats, SearchStrategy, StopHandle,
};
use crate::vocab::IndividualId;

/// Which search engine drives the learner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyKind {
    /// Heuristic best-first refinement search (CELOE/OCEL style).
    #[default]
    Refinement,
    /// Population-based evolutionary search (EvoLearner style).
    Evolutionary,
}

/// Full learner configuration: metric, strategy, budgets, and the per-engine
/// sub-configurations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerConfig {
    /// Search engine to run.
    pub strategy: StrategyKind,
    /// Quality metric scoring hypotheses.
    pub metric: QualityMetric,
    /// Wall-clock budget for one fit (`None` = unbounded).
    pub max_runtime: Option<Duration>,
    /// Quality at which the search counts as converged.
    pub quality_threshold: f64,
    /// Capacity of the best-found set.
    pub max_results: usize,
    /// Best-first engine configuration.
    pub refinement: RefinementSearchConfig,
    /// Evolutionary engine configuration.
    pub evolution: EvoConfig,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            metric: QualityMetric::default(),
            max_runtime: None,
            quality_threshold: 1.0,
            max_results: 10,
            refinement: RefinementSearchConfig::default(),
            evolution: EvoConfig::default(),
        }
    }
}

/// State retained from a completed fit.
#[derive(Debug, Clone)]
struct FitResult {
    outcome: SearchOutcome,
    cache_stats: CacheStats,
    problem: LearningProblem,
}

/// Concept learner bound to a knowledge source.
pub struct Learner<K> {
    kb: Arc<K>,
    config: LearnerConfig,
    stop: StopHandle,
    fitted: Option<FitResult>,
}

impl<K: KnowledgeSource> Learner<K> {
    /// Create a learner over a knowledge source.
    pub fn new(kb: Arc<K>, config: LearnerConfig) -> Self {
        Self {
            kb,
            config,
            stop: StopHandle::new(),
            fitted: None,
        }
    }

    /// Run the configured search strategy on a learning problem.
    ///
    /// The problem's invariants (non-empty, disjoint example sets) are
    /// guaranteed by [`LearningProblem`]'s constructor. The knowledge source
    /// is probed before the search starts; an unreachable adapter surfaces as
    /// [`KbError::Unavailable`] and the learner stays unfitted. Results of a
    /// previous fit are discarded when a new fit begins.
    pub fn fit(&mut self, problem: LearningProblem) -> KheperResult<&mut Self> {
        self.fitted = None;
        self.stop.reset();

        // Probe retrieval up front so a dead adapter fails the fit before
        // any search state is built.
        self.kb.all_individuals().map_err(|err| KbError::Unavailable {
            message: err.to_string(),
        })?;

        let cache = RetrievalCache::new();
        let ctx = SearchContext {
            kb: &*self.kb,
            problem: &problem,
            metric: self.config.metric,
            cache: &cache,
            stop: self.stop.clone(),
            max_runtime: self.config.max_runtime,
            quality_threshold: self.config.quality_threshold,
            max_results: self.config.max_results,
        };

        tracing::info!(
            strategy = ?self.config.strategy,
            metric = %self.config.metric,
            positives = problem.positives().len(),
            negatives = problem.negatives().len(),
            "fitting concept learner"
        );

        let outcome = match self.config.strategy {
            StrategyKind::Refinement => {
                RefinementSearch::new(self.config.refinement.clone()).run(&ctx)?
            }
            StrategyKind::Evolutionary => EvoSearch::new(self.config.evolution.clone()).run(&ctx)?,
        };

        self.fitted = Some(FitResult {
            outcome,
            cache_stats: cache.stats(),
            problem,
        });
        Ok(self)
    }

    /// The top `n` hypotheses of the last fit, ordered by descending quality
    /// then ascending length. Valid after cancellation or budget exhaustion;
    /// fails with [`SearchError::NotFitted`] before the first fit.
    pub fn best_hypotheses(&self, n: usize) -> KheperResult<Vec<Hypothesis>> {
        let fitted = self.fitted.as_ref().ok_or(SearchError::NotFitted)?;
        Ok(fitted.outcome.best.top(n))
    }

    /// Label individuals with the best fitted hypothesis (true = covered).
    pub fn classify(
        &self,
        individuals: &[IndividualId],
    ) -> KheperResult<Vec<(IndividualId, bool)>> {
        let fitted = self.fitted.as_ref().ok_or(SearchError::NotFitted)?;
        let best = fitted.outcome.best.best();
        Ok(individuals
            .iter()
            .map(|individual| {
                let covered = best.is_some_and(|h| h.covers(individual));
                (individual.clone(), covered)
            })
            .collect())
    }

    /// Current lifecycle state: `Idle` before the first fit, the terminal
    /// state of the last run afterwards.
    pub fn state(&self) -> SearchState {
        self.fitted
            .as_ref()
            .map(|fitted| fitted.outcome.state)
            .unwrap_or(SearchState::Idle)
    }

    /// Statistics of the last run, if any.
    pub fn stats(&self) -> Option<&SearchStats> {
        self.fitted.as_ref().map(|fitted| &fitted.outcome.stats)
    }

    /// Retrieval-cache counters of the last run, if any.
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.fitted.as_ref().map(|fitted| fitted.cache_stats)
    }

    /// The learning problem of the last fit, if any.
    pub fn problem(&self) -> Option<&LearningProblem> {
        self.fitted.as_ref().map(|fitted| &fitted.problem)
    }

    /// Request cancellation of a running search; observed at the next step
    /// boundary.
    pub fn stop(&self) {
        self.stop.request_stop();
    }

    /// A clonable handle for requesting cancellation from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// The bound knowledge source.
    pub fn kb(&self) -> &Arc<K> {
        &self.kb
    }

    /// The learner configuration.
    pub fn config(&self) -> &LearnerConfig {
        &self.config
    }
}
