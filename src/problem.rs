//! Learning problems: labeled positive/negative example individuals.

use serde::{Deserialize, Serialize};

use crate::error::ProblemError;
use crate::vocab::{IndividualId, IndividualSet};

/// A standard positive/negative learning problem.
///
/// The constructor enforces the well-formedness invariants — both sets
/// non-empty and disjoint — so a `LearningProblem` value is always valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningProblem {
    positives: IndividualSet,
    negatives: IndividualSet,
}

impl LearningProblem {
    /// Create a learning problem, validating its invariants.
    pub fn new(
        positives: IndividualSet,
        negatives: IndividualSet,
    ) -> Result<Self, ProblemError> {
        if positives.is_empty() {
            return Err(ProblemError::EmptyPositives);
        }
        if negatives.is_empty() {
            return Err(ProblemError::EmptyNegatives);
        }
        let overlap = positives.intersection(&negatives).count();
        if overlap > 0 {
            return Err(ProblemError::OverlappingExamples { count: overlap });
        }
        Ok(Self {
            positives,
            negatives,
        })
    }

    /// Convenience constructor from name slices.
    pub fn from_examples(positives: &[&str], negatives: &[&str]) -> Result<Self, ProblemError> {
        Self::new(
            positives.iter().map(|name| IndividualId::new(*name)).collect(),
            negatives.iter().map(|name| IndividualId::new(*name)).collect(),
        )
    }

    /// The positive example individuals.
    pub fn positives(&self) -> &IndividualSet {
        &self.positives
    }

    /// The negative example individuals.
    pub fn negatives(&self) -> &IndividualSet {
        &self.negatives
    }

    /// Number of labeled examples.
    pub fn len(&self) -> usize {
        self.positives.len() + self.negatives.len()
    }

    /// Always false: a valid problem has examples on both sides.
    pub fn is_empty(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_problem_constructs() {
        let lp = LearningProblem::from_examples(&["anna", "carla"], &["bruno"]).unwrap();
        assert_eq!(lp.positives().len(), 2);
        assert_eq!(lp.negatives().len(), 1);
        assert_eq!(lp.len(), 3);
    }

    #[test]
    fn empty_positives_rejected() {
        let err = LearningProblem::from_examples(&[], &["bruno"]).unwrap_err();
        assert!(matches!(err, ProblemError::EmptyPositives));
    }

    #[test]
    fn empty_negatives_rejected() {
        let err = LearningProblem::from_examples(&["anna"], &[]).unwrap_err();
        assert!(matches!(err, ProblemError::EmptyNegatives));
    }

    #[test]
    fn overlapping_examples_rejected() {
        let err =
            LearningProblem::from_examples(&["anna", "bruno"], &["bruno", "carla"]).unwrap_err();
        assert!(matches!(err, ProblemError::OverlappingExamples { count: 1 }));
    }
}
