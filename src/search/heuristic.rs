//! Node-promise heuristic for the best-first engine.
//!
//! The score rewards quality and quality gained over the parent, and applies
//! two monotone penalties: one for length (horizontal expansion starts at the
//! node's length) and one for how often the node has already been refined.
//! Together these keep shallow-but-promising nodes competitive and prevent a
//! single node from starving the rest of the frontier.

use serde::{Deserialize, Serialize};

/// Weights of the heuristic's components. All defaults follow the classic
/// OCEL/CELOE settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HeuristicWeights {
    /// Bonus applied to the root node (which has no parent to gain over).
    pub start_node_bonus: f64,
    /// Multiplier for the quality gained relative to the parent node.
    pub gain_bonus: f64,
    /// Penalty per unit of horizontal expansion (monotone in length).
    pub expansion_penalty: f64,
    /// Penalty per refinement already produced from the node.
    pub refinement_penalty: f64,
}

impl Default for HeuristicWeights {
    fn default() -> Self {
        Self {
            start_node_bonus: 0.1,
            gain_bonus: 0.3,
            expansion_penalty: 0.1,
            refinement_penalty: 0.001,
        }
    }
}

impl HeuristicWeights {
    /// Score a node's promise. `parent_quality` is `None` for the root.
    pub fn score(
        &self,
        quality: f64,
        parent_quality: Option<f64>,
        h_exp: usize,
        refinement_count: usize,
    ) -> f64 {
        let mut score = quality;
        match parent_quality {
            None => score += self.start_node_bonus,
            Some(parent) => score += self.gain_bonus * (quality - parent),
        }
        score -= self.refinement_penalty * refinement_count as f64;
        score -= self.expansion_penalty * h_exp as f64;
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_gain_is_rewarded() {
        let weights = HeuristicWeights::default();
        let improved = weights.score(0.8, Some(0.5), 3, 0);
        let regressed = weights.score(0.8, Some(0.9), 3, 0);
        assert!(improved > regressed);
    }

    #[test]
    fn expansion_penalty_is_monotone() {
        let weights = HeuristicWeights::default();
        let mut previous = f64::INFINITY;
        for h_exp in 1..10 {
            let score = weights.score(0.7, Some(0.5), h_exp, 0);
            assert!(score < previous, "penalty must grow with h_exp");
            previous = score;
        }
    }

    #[test]
    fn refinement_penalty_is_monotone() {
        let weights = HeuristicWeights::default();
        let fresh = weights.score(0.7, Some(0.5), 3, 0);
        let worked = weights.score(0.7, Some(0.5), 3, 50);
        assert!(worked < fresh);
    }

    #[test]
    fn root_receives_start_bonus() {
        let weights = HeuristicWeights::default();
        let root = weights.score(0.5, None, 1, 0);
        let non_root_no_gain = weights.score(0.5, Some(0.5), 1, 0);
        assert!(root > non_root_no_gain);
    }
}
