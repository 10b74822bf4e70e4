//! Population-based evolutionary search (EvoLearner style).
//!
//! A fixed-size population of concept expressions evolves under tournament
//! selection, subtree crossover, and subtree mutation. Fitness is the quality
//! score of the configured metric, evaluated through the shared retrieval
//! cache — and in
//! parallel across rayon workers, since sibling evaluations are independent.
//! Elites pass unchanged between generations, and the best-ever set is
//! tracked across the whole run because evolutionary search is free to
//! regress.
//!
//! Cancellation and budgets are observed at generation boundaries only; a
//! generation in flight always completes.

pub mod genetic;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{KbResult, KheperResult, SearchError};
use crate::expr::ConceptExpr;
use crate::search::{
    BestHypotheses, Hypothesis, SearchContext, SearchOutcome, SearchState, SearchStats,
    SearchStrategy,
};
use crate::vocab::IndividualSet;

use genetic::ExpressionSampler;

/// Configuration of the evolutionary engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvoConfig {
    /// Number of individuals per generation.
    pub population_size: usize,
    /// Generation budget.
    pub num_generations: usize,
    /// Per-child probability of mutation.
    pub mutation_probability: f64,
    /// Per-pair probability of crossover (otherwise parents are cloned).
    pub crossover_probability: f64,
    /// Individuals drawn per tournament.
    pub tournament_size: usize,
    /// Number of top individuals preserved unchanged each generation.
    pub elitism: usize,
    /// Depth bound for randomly constructed expressions.
    pub max_initial_depth: usize,
    /// Length cap for individuals (crossover/mutation products beyond it are
    /// rejected and retried).
    pub max_length: usize,
    /// Retry bound for invalid crossover/mutation products.
    pub max_retries: usize,
    /// RNG seed; a fixed seed reproduces a run exactly.
    pub seed: u64,
    /// Stop as soon as an individual reaches the quality threshold.
    pub terminate_on_goal: bool,
    /// Sample negated atomics.
    pub use_negation: bool,
    /// Sample universal restrictions.
    pub use_universal: bool,
}

impl Default for EvoConfig {
    fn default() -> Self {
        Self {
            population_size: 100,
            num_generations: 200,
            mutation_probability: 0.15,
            crossover_probability: 0.9,
            tournament_size: 7,
            elitism: 2,
            max_initial_depth: 4,
            max_length: 12,
            max_retries: 5,
            seed: 0,
            terminate_on_goal: true,
            use_negation: true,
            use_universal: true,
        }
    }
}

/// One evaluated member of the population.
#[derive(Debug, Clone)]
struct Evaluated {
    expr: ConceptExpr,
    fitness: f64,
    length: usize,
    instances: Arc<IndividualSet>,
}

impl Evaluated {
    fn hypothesis(&self) -> Hypothesis {
        Hypothesis {
            expr: self.expr.clone(),
            quality: self.fitness,
            length: self.length,
            instances: Arc::clone(&self.instances),
        }
    }

    /// Fitter, or equally fit and shorter.
    fn beats(&self, other: &Evaluated) -> bool {
        self.fitness > other.fitness
            || (self.fitness == other.fitness && self.length < other.length)
    }
}

/// Evolutionary search engine.
pub struct EvoSearch {
    config: EvoConfig,
}

impl EvoSearch {
    /// Create an engine with the given configuration.
    pub fn new(config: EvoConfig) -> Self {
        Self { config }
    }

    fn validate(&self) -> Result<(), SearchError> {
        let c = &self.config;
        if c.population_size < 2 {
            return Err(SearchError::InvalidConfig {
                message: "population_size must be at least 2".into(),
            });
        }
        if c.tournament_size == 0 {
            return Err(SearchError::InvalidConfig {
                message: "tournament_size must be at least 1".into(),
            });
        }
        if c.elitism >= c.population_size {
            return Err(SearchError::InvalidConfig {
                message: "elitism must be smaller than population_size".into(),
            });
        }
        for (name, p) in [
            ("mutation_probability", c.mutation_probability),
            ("crossover_probability", c.crossover_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(SearchError::InvalidConfig {
                    message: format!("{name} must be within [0, 1], got {p}"),
                });
            }
        }
        if c.max_length == 0 || c.max_initial_depth == 0 {
            return Err(SearchError::InvalidConfig {
                message: "max_length and max_initial_depth must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Evaluate a batch of expressions in parallel. Order is preserved, so
    /// results are deterministic regardless of worker scheduling.
    fn evaluate_all(
        exprs: &[ConceptExpr],
        ctx: &SearchContext<'_>,
    ) -> KheperResult<Vec<Evaluated>> {
        let evaluated = exprs
            .par_iter()
            .map(|expr| {
                let instances = ctx.cache.retrieve(expr, ctx.kb)?;
                let fitness = ctx.metric.evaluate(&instances, ctx.problem);
                Ok(Evaluated {
                    expr: expr.clone(),
                    fitness,
                    length: expr.length(),
                    instances,
                })
            })
            .collect::<KbResult<Vec<Evaluated>>>()?;
        Ok(evaluated)
    }

    /// Sample the initial population: distinct (by normal form), satisfiable,
    /// within the length cap. When the retry bound runs dry the remainder is
    /// filled with plain leaves, duplicates permitted.
    fn initial_population(
        &self,
        rng: &mut StdRng,
        sampler: &ExpressionSampler,
        ctx: &SearchContext<'_>,
    ) -> KheperResult<Vec<ConceptExpr>> {
        let target = self.config.population_size;
        let mut exprs = Vec::with_capacity(target);
        let mut seen = BTreeSet::new();
        let mut attempts = 0usize;
        let max_attempts = target.saturating_mul(20);

        while exprs.len() < target && attempts < max_attempts {
            attempts += 1;
            let depth = rng.gen_range(1..=self.config.max_initial_depth);
            let candidate = sampler.random_expr(rng, depth).normal_form();
            if candidate.length() > self.config.max_length {
                continue;
            }
            if !seen.insert(candidate.clone()) {
                continue;
            }
            if !ctx.kb.is_satisfiable(&candidate)? {
                continue;
            }
            exprs.push(candidate);
        }
        while exprs.len() < target {
            exprs.push(sampler.random_expr(rng, 1).normal_form());
        }
        Ok(exprs)
    }

    fn tournament<'p>(&self, rng: &mut StdRng, population: &'p [Evaluated]) -> &'p Evaluated {
        let mut winner: Option<&Evaluated> = None;
        for _ in 0..self.config.tournament_size {
            let contender = &population[rng.gen_range(0..population.len())];
            winner = Some(match winner {
                Some(current) if !contender.beats(current) => current,
                _ => contender,
            });
        }
        winner.expect("tournament_size >= 1")
    }

    /// Crossover with bounded retries; falls back to cloning the parents.
    fn crossover_pair(
        &self,
        rng: &mut StdRng,
        a: &ConceptExpr,
        b: &ConceptExpr,
        ctx: &SearchContext<'_>,
    ) -> KheperResult<(ConceptExpr, ConceptExpr)> {
        for _ in 0..self.config.max_retries {
            let Some((c1, c2)) = genetic::crossover(rng, a, b) else {
                break;
            };
            let c1 = c1.normal_form();
            let c2 = c2.normal_form();
            if c1.length() > self.config.max_length || c2.length() > self.config.max_length {
                continue;
            }
            if !ctx.kb.is_satisfiable(&c1)? || !ctx.kb.is_satisfiable(&c2)? {
                continue;
            }
            return Ok((c1, c2));
        }
        Ok((a.clone(), b.clone()))
    }

    /// Mutation with bounded retries; falls back to the unmutated individual.
    fn mutate_one(
        &self,
        rng: &mut StdRng,
        sampler: &ExpressionSampler,
        expr: &ConceptExpr,
        ctx: &SearchContext<'_>,
    ) -> KheperResult<ConceptExpr> {
        for _ in 0..self.config.max_retries {
            let mutated = genetic::mutate(rng, sampler, expr, 3).normal_form();
            if mutated == *expr || mutated.length() > self.config.max_length {
                continue;
            }
            if !ctx.kb.is_satisfiable(&mutated)? {
                continue;
            }
            return Ok(mutated);
        }
        Ok(expr.clone())
    }
}

impl SearchStrategy for EvoSearch {
    fn run(&mut self, ctx: &SearchContext<'_>) -> KheperResult<SearchOutcome> {
        self.validate()?;

        let started = Instant::now();
        let deadline = ctx.max_runtime.map(|budget| started + budget);
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let sampler =
            ExpressionSampler::from_kb(ctx.kb, self.config.use_negation, self.config.use_universal);

        tracing::debug!(
            population = self.config.population_size,
            generations = self.config.num_generations,
            seed = self.config.seed,
            "starting evolutionary search"
        );

        let exprs = self.initial_population(&mut rng, &sampler, ctx)?;
        let mut population = Self::evaluate_all(&exprs, ctx)?;
        let mut stats = SearchStats::default();
        stats.concepts_tested += population.len();

        let mut best = BestHypotheses::new(ctx.max_results);
        for individual in &population {
            best.maybe_add(individual.hypothesis());
        }

        let mut state = SearchState::Running;
        if self.config.terminate_on_goal
            && best
                .best()
                .is_some_and(|h| h.quality >= ctx.quality_threshold)
        {
            state = SearchState::Converged;
        }

        while state == SearchState::Running {
            // Generation boundary: the only place budgets and cancellation
            // are observed.
            if ctx.stop.is_stop_requested() {
                state = SearchState::Cancelled;
                break;
            }
            if deadline.is_some_and(|at| Instant::now() >= at) {
                state = SearchState::BudgetExhausted;
                break;
            }
            if stats.generations >= self.config.num_generations {
                state = SearchState::BudgetExhausted;
                break;
            }

            // Rank for elitism: fitness desc, shorter first, canonical order
            // last so the sort is total and runs reproduce exactly.
            population.sort_by(|a, b| {
                b.fitness
                    .total_cmp(&a.fitness)
                    .then_with(|| a.length.cmp(&b.length))
                    .then_with(|| a.expr.cmp(&b.expr))
            });
            let elites: Vec<Evaluated> = population[..self.config.elitism].to_vec();

            let offspring_target = self.config.population_size - elites.len();
            let mut child_exprs: Vec<ConceptExpr> = Vec::with_capacity(offspring_target);
            while child_exprs.len() < offspring_target {
                let parent_a = self.tournament(&mut rng, &population).expr.clone();
                let parent_b = self.tournament(&mut rng, &population).expr.clone();
                let (mut child_a, mut child_b) =
                    if rng.gen_bool(self.config.crossover_probability) {
                        self.crossover_pair(&mut rng, &parent_a, &parent_b, ctx)?
                    } else {
                        (parent_a, parent_b)
                    };
                if rng.gen_bool(self.config.mutation_probability) {
                    child_a = self.mutate_one(&mut rng, &sampler, &child_a, ctx)?;
                }
                if rng.gen_bool(self.config.mutation_probability) {
                    child_b = self.mutate_one(&mut rng, &sampler, &child_b, ctx)?;
                }
                child_exprs.push(child_a);
                if child_exprs.len() < offspring_target {
                    child_exprs.push(child_b);
                }
            }

            let children = Self::evaluate_all(&child_exprs, ctx)?;
            stats.concepts_tested += children.len();
            for child in &children {
                best.maybe_add(child.hypothesis());
            }

            population = elites;
            population.extend(children);
            stats.generations += 1;

            if let Some(top) = best.best() {
                tracing::trace!(
                    generation = stats.generations,
                    best_fitness = top.quality,
                    "generation complete"
                );
                if self.config.terminate_on_goal && top.quality >= ctx.quality_threshold {
                    state = SearchState::Converged;
                }
            }
        }

        stats.elapsed = started.elapsed();
        tracing::info!(state = %state, generations = stats.generations,
            tested = stats.concepts_tested, "evolutionary search finished");

        Ok(SearchOutcome { state, best, stats })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::RetrievalCache;
    use crate::kb::MemoryKnowledgeBase;
    use crate::problem::LearningProblem;
    use crate::quality::QualityMetric;
    use crate::search::StopHandle;
    use std::time::Duration;

    fn family_kb() -> MemoryKnowledgeBase {
        let mut kb = MemoryKnowledgeBase::new();
        kb.declare_subclass("Male", "Person");
        kb.declare_subclass("Female", "Person");
        kb.declare_subclass("Parent", "Person");
        for name in ["anna", "carla"] {
            kb.assert_class(name, "Female");
            kb.assert_class(name, "Parent");
        }
        kb.assert_class("eve", "Female");
        kb.assert_class("bruno", "Male");
        kb.assert_class("diego", "Male");
        kb.assert_relation("anna", "hasChild", "eve");
        kb.assert_relation("carla", "hasChild", "diego");
        kb
    }

    fn small_config(seed: u64) -> EvoConfig {
        EvoConfig {
            population_size: 30,
            num_generations: 25,
            seed,
            ..Default::default()
        }
    }

    fn run_once(
        kb: &MemoryKnowledgeBase,
        problem: &LearningProblem,
        config: EvoConfig,
        max_runtime: Option<Duration>,
        stop: StopHandle,
    ) -> SearchOutcome {
        let cache = RetrievalCache::new();
        let ctx = SearchContext {
            kb,
            problem,
            metric: QualityMetric::F1,
            cache: &cache,
            stop,
            max_runtime,
            quality_threshold: 1.0,
            max_results: 10,
        };
        EvoSearch::new(config).run(&ctx).unwrap()
    }

    #[test]
    fn evolves_a_separating_concept() {
        let kb = family_kb();
        let problem =
            LearningProblem::from_examples(&["anna", "carla", "eve"], &["bruno", "diego"]).unwrap();
        let outcome = run_once(&kb, &problem, small_config(7), None, StopHandle::new());
        // `Female` separates perfectly and is a single sampled leaf away.
        assert_eq!(outcome.state, SearchState::Converged);
        assert_eq!(outcome.best.best().unwrap().quality, 1.0);
    }

    #[test]
    fn reproducible_under_a_fixed_seed() {
        let kb = family_kb();
        let problem =
            LearningProblem::from_examples(&["anna", "carla"], &["bruno", "diego", "eve"])
                .unwrap();
        let first = run_once(&kb, &problem, small_config(11), None, StopHandle::new());
        let second = run_once(&kb, &problem, small_config(11), None, StopHandle::new());
        let first_exprs: Vec<_> = first.best.top(10).into_iter().map(|h| h.expr).collect();
        let second_exprs: Vec<_> = second.best.top(10).into_iter().map(|h| h.expr).collect();
        assert_eq!(first_exprs, second_exprs);
        assert_eq!(first.stats.generations, second.stats.generations);
    }

    #[test]
    fn generation_budget_is_respected() {
        let kb = family_kb();
        // An adversarial threshold: nothing reaches quality 2.
        let problem = LearningProblem::from_examples(&["anna"], &["bruno"]).unwrap();
        let cache = RetrievalCache::new();
        let ctx = SearchContext {
            kb: &kb,
            problem: &problem,
            metric: QualityMetric::F1,
            cache: &cache,
            stop: StopHandle::new(),
            max_runtime: None,
            quality_threshold: 2.0,
            max_results: 10,
        };
        let config = EvoConfig {
            num_generations: 5,
            ..small_config(3)
        };
        let outcome = EvoSearch::new(config).run(&ctx).unwrap();
        assert_eq!(outcome.state, SearchState::BudgetExhausted);
        assert_eq!(outcome.stats.generations, 5);
        assert!(!outcome.best.is_empty());
    }

    #[test]
    fn cancellation_is_observed_at_generation_boundary() {
        let kb = family_kb();
        let problem = LearningProblem::from_examples(&["anna"], &["bruno"]).unwrap();
        let stop = StopHandle::new();
        stop.request_stop();
        let cache = RetrievalCache::new();
        let ctx = SearchContext {
            kb: &kb,
            problem: &problem,
            metric: QualityMetric::F1,
            cache: &cache,
            stop,
            max_runtime: None,
            quality_threshold: 2.0,
            max_results: 10,
        };
        let outcome = EvoSearch::new(small_config(5)).run(&ctx).unwrap();
        assert_eq!(outcome.state, SearchState::Cancelled);
        // The initial population was still evaluated and reported.
        assert!(!outcome.best.is_empty());
    }

    #[test]
    fn best_ever_is_monotone_across_generations() {
        let kb = family_kb();
        let problem =
            LearningProblem::from_examples(&["anna", "carla"], &["bruno", "diego", "eve"])
                .unwrap();
        // Run the same seed with increasing generation budgets; the best
        // fitness must never decrease as the run is allowed to go longer.
        let mut previous_best = 0.0f64;
        for generations in [1, 3, 6, 12] {
            let config = EvoConfig {
                num_generations: generations,
                terminate_on_goal: false,
                ..small_config(13)
            };
            let outcome = run_once(&kb, &problem, config, None, StopHandle::new());
            let best_now = outcome.best.best().unwrap().quality;
            assert!(
                best_now >= previous_best,
                "best fitness regressed: {best_now} < {previous_best}"
            );
            previous_best = best_now;
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let kb = family_kb();
        let problem = LearningProblem::from_examples(&["anna"], &["bruno"]).unwrap();
        let cache = RetrievalCache::new();
        let ctx = SearchContext {
            kb: &kb,
            problem: &problem,
            metric: QualityMetric::F1,
            cache: &cache,
            stop: StopHandle::new(),
            max_runtime: None,
            quality_threshold: 1.0,
            max_results: 10,
        };
        for config in [
            EvoConfig {
                population_size: 1,
                ..Default::default()
            },
            EvoConfig {
                tournament_size: 0,
                ..Default::default()
            },
            EvoConfig {
                elitism: 100,
                population_size: 100,
                ..Default::default()
            },
            EvoConfig {
                mutation_probability: 1.5,
                ..Default::default()
            },
        ] {
            assert!(EvoSearch::new(config).run(&ctx).is_err());
        }
    }

    #[test]
    fn individuals_respect_the_length_cap() {
        let kb = family_kb();
        let problem =
            LearningProblem::from_examples(&["anna", "carla"], &["bruno", "diego", "eve"])
                .unwrap();
        let config = EvoConfig {
            max_length: 5,
            terminate_on_goal: false,
            num_generations: 8,
            ..small_config(17)
        };
        let outcome = run_once(&kb, &problem, config, None, StopHandle::new());
        for hypothesis in outcome.best.top(10) {
            assert!(hypothesis.length <= 5, "{} too long", hypothesis.expr);
        }
    }
}
