//! Heuristic best-first refinement search (CELOE/OCEL style).
//!
//! The engine grows a search tree downward from ⊤. Each step pops the
//! frontier node with the highest heuristic score, asks the refinement
//! operator for specializations at exactly the node's current horizontal
//! expansion length, evaluates the children, and reinserts the (penalized)
//! node. Horizontal expansion makes long refinements of a node available
//! gradually, one length unit per visit, which is what keeps the frontier
//! from drowning in long expressions early.
//!
//! Determinism: frontier ties break by insertion order, refinement output
//! order is deterministic, and no randomness is involved — two runs with the
//! same configuration and adapter answers expand identical node sequences.

use std::collections::{BinaryHeap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::{KheperResult, SearchError};
use crate::expr::ConceptExpr;
use crate::refine::{RefinementConfig, RefinementOperator};
use crate::search::heuristic::HeuristicWeights;
use crate::search::node::{NodeArena, NodeId, SearchNode};
use crate::search::{
    BestHypotheses, Hypothesis, SearchContext, SearchOutcome, SearchState, SearchStats,
    SearchStrategy,
};

/// Configuration of the best-first engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefinementSearchConfig {
    /// Heuristic component weights.
    pub weights: HeuristicWeights,
    /// Refinement operator policy.
    pub refinement: RefinementConfig,
    /// Cap on frontier expansions (`None` = unbounded).
    pub max_expansions: Option<usize>,
    /// Cap on concept evaluations (`None` = unbounded).
    pub max_concepts_tested: Option<usize>,
    /// Stop as soon as a hypothesis reaches the quality threshold.
    pub terminate_on_goal: bool,
}

impl Default for RefinementSearchConfig {
    fn default() -> Self {
        Self {
            weights: HeuristicWeights::default(),
            refinement: RefinementConfig::default(),
            max_expansions: Some(10_000),
            max_concepts_tested: None,
            terminate_on_goal: true,
        }
    }
}

/// Best-first refinement search engine.
pub struct RefinementSearch {
    config: RefinementSearchConfig,
}

/// Frontier entry: heuristic-ordered, FIFO on ties, lazily invalidated.
///
/// When a node's heuristic changes after an expansion a fresh entry is
/// pushed; stale entries are recognized on pop by comparing their recorded
/// heuristic against the node's current one.
struct FrontierEntry {
    heuristic: f64,
    seq: u64,
    node: NodeId,
}

impl PartialEq for FrontierEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for FrontierEntry {}

impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Max-heap: higher heuristic wins; on ties the earlier insertion wins.
        self.heuristic
            .total_cmp(&other.heuristic)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl RefinementSearch {
    /// Create an engine with the given configuration.
    pub fn new(config: RefinementSearchConfig) -> Self {
        Self { config }
    }

    fn hypothesis_of(node: &SearchNode) -> Hypothesis {
        Hypothesis {
            expr: node.expr.clone(),
            quality: node.quality,
            length: node.length,
            instances: Arc::clone(&node.instances),
        }
    }

    /// Pop frontier entries until a live one surfaces. Nodes at quality 1.0
    /// are dropped rather than re-expanded: every specialization of a
    /// perfect concept can only lose recall.
    fn pop_live(frontier: &mut BinaryHeap<FrontierEntry>, arena: &NodeArena) -> Option<NodeId> {
        while let Some(entry) = frontier.pop() {
            let node = arena.get(entry.node);
            if node.heuristic != entry.heuristic {
                continue; // superseded by a later reinsertion
            }
            if node.quality >= 1.0 {
                continue;
            }
            return Some(entry.node);
        }
        None
    }
}

impl SearchStrategy for RefinementSearch {
    fn run(&mut self, ctx: &SearchContext<'_>) -> KheperResult<SearchOutcome> {
        if self.config.refinement.max_child_length == 0 {
            return Err(SearchError::InvalidConfig {
                message: "max_child_length must be at least 1".into(),
            }
            .into());
        }

        let started = Instant::now();
        let deadline = ctx.max_runtime.map(|budget| started + budget);
        let operator = RefinementOperator::new(self.config.refinement.clone());
        let weights = self.config.weights;

        let mut arena = NodeArena::new();
        let mut frontier: BinaryHeap<FrontierEntry> = BinaryHeap::new();
        let mut seen: HashSet<ConceptExpr> = HashSet::new();
        let mut best = BestHypotheses::new(ctx.max_results);
        let mut stats = SearchStats::default();
        let mut min_h_exp = usize::MAX;
        let mut seq: u64 = 0;

        tracing::debug!(metric = %ctx.metric, threshold = ctx.quality_threshold,
            "starting best-first refinement search");

        // Root: ⊤ wraps the whole individual set.
        let root_expr = ConceptExpr::Top;
        let root_instances = ctx.cache.retrieve(&root_expr, ctx.kb)?;
        stats.concepts_tested += 1;
        let root_quality = ctx.metric.evaluate(&root_instances, ctx.problem);
        let root_length = root_expr.length();
        let root_heuristic = weights.score(root_quality, None, root_length, 0);
        let root = arena.alloc(SearchNode {
            expr: root_expr.clone(),
            length: root_length,
            parent: None,
            quality: root_quality,
            heuristic: root_heuristic,
            h_exp: root_length,
            refinement_count: 0,
            instances: root_instances,
        });
        seen.insert(root_expr);
        seq += 1;
        frontier.push(FrontierEntry {
            heuristic: root_heuristic,
            seq,
            node: root,
        });
        best.maybe_add(Self::hypothesis_of(arena.get(root)));

        let mut state = SearchState::Running;
        if self.config.terminate_on_goal && root_quality >= ctx.quality_threshold {
            state = SearchState::Converged;
        }

        while state == SearchState::Running {
            // Cancellation and budgets are observed here, between expansions,
            // so each expansion is atomic.
            if ctx.stop.is_stop_requested() {
                state = SearchState::Cancelled;
                break;
            }
            if deadline.is_some_and(|at| Instant::now() >= at) {
                state = SearchState::BudgetExhausted;
                break;
            }
            if self
                .config
                .max_expansions
                .is_some_and(|cap| stats.expansions >= cap)
            {
                state = SearchState::BudgetExhausted;
                break;
            }
            if self
                .config
                .max_concepts_tested
                .is_some_and(|cap| stats.concepts_tested >= cap)
            {
                state = SearchState::BudgetExhausted;
                break;
            }

            let Some(node_id) = Self::pop_live(&mut frontier, &arena) else {
                // Every reachable concept within the length cap has been
                // expanded; treat a fully explored space as a budget limit
                // unless the threshold was already met.
                let reached_goal = best
                    .best()
                    .is_some_and(|h| h.quality >= ctx.quality_threshold);
                state = if reached_goal {
                    SearchState::Converged
                } else {
                    SearchState::BudgetExhausted
                };
                break;
            };

            let (node_expr, node_h_exp, node_quality) = {
                let node = arena.get(node_id);
                (node.expr.clone(), node.h_exp, node.quality)
            };
            tracing::trace!(expr = %node_expr, h_exp = node_h_exp, "expanding");

            let refinements = operator.refine(&node_expr, ctx.kb, node_h_exp)?;
            stats.expansions += 1;

            let mut goal_found = false;
            for refinement in &refinements {
                // Shorter refinements were already available at an earlier
                // horizontal expansion of this node.
                if refinement.length() < node_h_exp {
                    continue;
                }
                if !seen.insert(refinement.clone()) {
                    continue;
                }
                let instances = ctx.cache.retrieve(refinement, ctx.kb)?;
                stats.concepts_tested += 1;
                let quality = ctx.metric.evaluate(&instances, ctx.problem);
                if quality == 0.0 {
                    continue; // too weak to ever contribute
                }
                let length = refinement.length();
                let heuristic = weights.score(quality, Some(node_quality), length, 0);
                let child = arena.alloc(SearchNode {
                    expr: refinement.clone(),
                    length,
                    parent: Some(node_id),
                    quality,
                    heuristic,
                    h_exp: length,
                    refinement_count: 0,
                    instances,
                });
                seq += 1;
                frontier.push(FrontierEntry {
                    heuristic,
                    seq,
                    node: child,
                });
                if best.maybe_add(Self::hypothesis_of(arena.get(child))) {
                    tracing::debug!(expr = %refinement, quality, "better description found");
                }
                if self.config.terminate_on_goal && quality >= ctx.quality_threshold {
                    goal_found = true;
                    break;
                }
            }

            // Penalize and reinsert the expanded node.
            let parent_quality = arena
                .get(node_id)
                .parent
                .map(|parent| arena.get(parent).quality);
            let node = arena.get_mut(node_id);
            node.h_exp += 1;
            node.refinement_count = refinements.len();
            node.heuristic =
                weights.score(node.quality, parent_quality, node.h_exp, node.refinement_count);
            min_h_exp = min_h_exp.min(node.h_exp);
            stats.max_horizontal_expansion = stats.max_horizontal_expansion.max(node.h_exp);
            // Beyond the operator's length cap no new refinement can appear.
            if node.h_exp <= operator.config().max_child_length {
                let heuristic = node.heuristic;
                seq += 1;
                frontier.push(FrontierEntry {
                    heuristic,
                    seq,
                    node: node_id,
                });
            }

            if goal_found {
                state = SearchState::Converged;
            }
        }

        stats.min_horizontal_expansion = if min_h_exp == usize::MAX { 0 } else { min_h_exp };
        stats.elapsed = started.elapsed();
        tracing::info!(state = %state, expansions = stats.expansions,
            tested = stats.concepts_tested, nodes = arena.len(),
            "refinement search finished");

        Ok(SearchOutcome { state, best, stats })
    }
}
