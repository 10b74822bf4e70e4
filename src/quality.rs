//! Quality functions: scoring a concept's retrieval against a learning problem.
//!
//! A quality function reduces a retrieved instance set to a value in `[0, 1]`
//! via a confusion matrix over the labeled examples. All metrics treat a zero
//! denominator as a score of 0 — never a division error.

use serde::{Deserialize, Serialize};

use crate::problem::LearningProblem;
use crate::vocab::IndividualSet;

/// Confusion matrix of a retrieval against a learning problem.
///
/// Unlabeled individuals in the retrieval are ignored: only the problem's
/// positives and negatives are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfusionCounts {
    pub true_pos: usize,
    pub false_pos: usize,
    pub false_neg: usize,
    pub true_neg: usize,
}

impl ConfusionCounts {
    /// Count a retrieved instance set against the problem's labels.
    pub fn from_retrieval(retrieved: &IndividualSet, problem: &LearningProblem) -> Self {
        let true_pos = problem
            .positives()
            .iter()
            .filter(|individual| retrieved.contains(*individual))
            .count();
        let false_pos = problem
            .negatives()
            .iter()
            .filter(|individual| retrieved.contains(*individual))
            .count();
        Self {
            true_pos,
            false_pos,
            false_neg: problem.positives().len() - true_pos,
            true_neg: problem.negatives().len() - false_pos,
        }
    }
}

/// Division with the 0/0 → 0 convention shared by all metrics.
fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Pluggable quality metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityMetric {
    /// Harmonic mean of precision and recall.
    #[default]
    F1,
    /// Fraction of labeled examples classified correctly.
    Accuracy,
    /// tp / (tp + fp).
    Precision,
    /// tp / (tp + fn).
    Recall,
}

impl QualityMetric {
    /// Score a confusion matrix. Always in `[0, 1]`.
    pub fn score(&self, counts: &ConfusionCounts) -> f64 {
        let tp = counts.true_pos as f64;
        let precision = ratio(tp, (counts.true_pos + counts.false_pos) as f64);
        let recall = ratio(tp, (counts.true_pos + counts.false_neg) as f64);
        match self {
            QualityMetric::F1 => ratio(2.0 * precision * recall, precision + recall),
            QualityMetric::Accuracy => ratio(
                (counts.true_pos + counts.true_neg) as f64,
                (counts.true_pos + counts.false_pos + counts.false_neg + counts.true_neg) as f64,
            ),
            QualityMetric::Precision => precision,
            QualityMetric::Recall => recall,
        }
    }

    /// Score a retrieved instance set directly.
    pub fn evaluate(&self, retrieved: &IndividualSet, problem: &LearningProblem) -> f64 {
        self.score(&ConfusionCounts::from_retrieval(retrieved, problem))
    }
}

impl std::fmt::Display for QualityMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QualityMetric::F1 => write!(f, "f1"),
            QualityMetric::Accuracy => write!(f, "accuracy"),
            QualityMetric::Precision => write!(f, "precision"),
            QualityMetric::Recall => write!(f, "recall"),
        }
    }
}
