//! Rich diagnostic error types for the kheper engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text so users know exactly what went wrong and
//! how to fix it. Pruned search candidates (unsatisfiable refinements, rejected
//! mutations) are never errors — only invariant violations and adapter failures
//! surface here.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the kheper engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum KheperError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Expr(#[from] ExprError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Problem(#[from] ProblemError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Kb(#[from] KbError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Search(#[from] SearchError),
}

// ---------------------------------------------------------------------------
// Expression errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ExprError {
    #[error("{constructor} requires at least 2 operands, got {count}")]
    #[diagnostic(
        code(kheper::expr::too_few_operands),
        help(
            "Conjunctions and disjunctions are n-ary with n >= 2. \
             For a single operand, use the operand itself; for zero operands, \
             use Top (conjunction identity) or Bottom (disjunction identity)."
        )
    )]
    TooFewOperands {
        constructor: &'static str,
        count: usize,
    },
}

// ---------------------------------------------------------------------------
// Learning problem errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ProblemError {
    #[error("learning problem has no positive examples")]
    #[diagnostic(
        code(kheper::problem::empty_positives),
        help(
            "A learning problem needs at least one positive example individual. \
             Without positives there is no target concept to describe."
        )
    )]
    EmptyPositives,

    #[error("learning problem has no negative examples")]
    #[diagnostic(
        code(kheper::problem::empty_negatives),
        help(
            "A learning problem needs at least one negative example individual. \
             Without negatives every concept covering the positives is a perfect \
             (and useless) solution — Top included."
        )
    )]
    EmptyNegatives,

    #[error("{count} individual(s) appear in both the positive and negative sets")]
    #[diagnostic(
        code(kheper::problem::overlapping_examples),
        help(
            "Positive and negative example sets must be disjoint. \
             Remove the shared individuals from one of the two sets."
        )
    )]
    OverlappingExamples { count: usize },
}

// ---------------------------------------------------------------------------
// Knowledge source errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum KbError {
    #[error("knowledge source unavailable: {message}")]
    #[diagnostic(
        code(kheper::kb::unavailable),
        help(
            "An instance-retrieval query failed or timed out. The current search \
             run is aborted and its partial results are discarded, since they may \
             be built on inconsistent retrieval answers. Check the backing store \
             or reasoner and fit again."
        )
    )]
    Unavailable { message: String },

    #[error("unknown class: {name}")]
    #[diagnostic(
        code(kheper::kb::unknown_class),
        help("The class has not been declared. Declare it first with `declare_class`.")
    )]
    UnknownClass { name: String },
}

// ---------------------------------------------------------------------------
// Search errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SearchError {
    #[error("learner has not been fitted: call fit() first")]
    #[diagnostic(
        code(kheper::search::not_fitted),
        help(
            "best_hypotheses() and classify() are only valid after a successful \
             fit(). Note that a cancelled or budget-exhausted run still counts as \
             fitted — only a run aborted by a knowledge-source failure does not."
        )
    )]
    NotFitted,

    #[error("invalid search configuration: {message}")]
    #[diagnostic(
        code(kheper::search::invalid_config),
        help("Check the engine configuration fields. {message}")
    )]
    InvalidConfig { message: String },
}

/// Convenience alias for functions returning kheper results.
pub type KheperResult<T> = std::result::Result<T, KheperError>;

/// Convenience alias for knowledge-source query results.
pub type KbResult<T> = std::result::Result<T, KbError>;
