//! Description-logic concept expressions.
//!
//! A [`ConceptExpr`] is an immutable, finite tree of class constructors:
//! atomic classes, boolean connectives, and property restrictions. All
//! transformations (normalization, refinement, genetic operators) build new
//! trees; nothing mutates in place. Structural size ([`ConceptExpr::length`])
//! is the parsimony measure used for tie-breaking throughout the search
//! engines.

pub mod normal;

use serde::{Deserialize, Serialize};

use crate::error::ExprError;
use crate::vocab::{ClassId, PropertyId};

/// Comparator of a cardinality restriction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CardinalityBound {
    /// `>= n` successors in the filler.
    AtLeast,
    /// `<= n` successors in the filler.
    AtMost,
    /// Exactly `n` successors in the filler.
    Exactly,
}

impl std::fmt::Display for CardinalityBound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CardinalityBound::AtLeast => write!(f, "≥"),
            CardinalityBound::AtMost => write!(f, "≤"),
            CardinalityBound::Exactly => write!(f, "="),
        }
    }
}

/// A description-logic class expression.
///
/// The derived `Ord` is the canonical ordering: variants rank in declaration
/// order, names lexicographically, operand lists element-wise. Commutative
/// constructors (`And`, `Or`) are sorted by this ordering during
/// normalization, so two expressions are semantically comparable by comparing
/// their [normal forms](ConceptExpr::normal_form).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConceptExpr {
    /// The universal concept ⊤ (every individual).
    Top,
    /// The empty concept ⊥ (no individual).
    Bottom,
    /// A named class, e.g. `Female`.
    Atomic(ClassId),
    /// Complement ¬C.
    Not(Box<ConceptExpr>),
    /// Conjunction C₁ ⊓ … ⊓ Cₙ, n >= 2.
    And(Vec<ConceptExpr>),
    /// Disjunction C₁ ⊔ … ⊔ Cₙ, n >= 2.
    Or(Vec<ConceptExpr>),
    /// Existential restriction ∃ p.C.
    Some {
        property: PropertyId,
        filler: Box<ConceptExpr>,
    },
    /// Universal restriction ∀ p.C.
    All {
        property: PropertyId,
        filler: Box<ConceptExpr>,
    },
    /// Qualified cardinality restriction, e.g. ≥ 2 p.C.
    Card {
        property: PropertyId,
        bound: CardinalityBound,
        n: u32,
        filler: Box<ConceptExpr>,
    },
}

impl ConceptExpr {
    /// A named class expression.
    pub fn atomic(name: impl Into<ClassId>) -> Self {
        ConceptExpr::Atomic(name.into())
    }

    /// The complement ¬C.
    pub fn not(operand: ConceptExpr) -> Self {
        ConceptExpr::Not(Box::new(operand))
    }

    /// An n-ary conjunction.
    ///
    /// Fails with [`ExprError::TooFewOperands`] for fewer than 2 operands —
    /// the structural invariant of the data model.
    pub fn and(operands: Vec<ConceptExpr>) -> Result<Self, ExprError> {
        if operands.len() < 2 {
            return Err(ExprError::TooFewOperands {
                constructor: "conjunction",
                count: operands.len(),
            });
        }
        Ok(ConceptExpr::And(operands))
    }

    /// An n-ary disjunction.
    ///
    /// Fails with [`ExprError::TooFewOperands`] for fewer than 2 operands.
    pub fn or(operands: Vec<ConceptExpr>) -> Result<Self, ExprError> {
        if operands.len() < 2 {
            return Err(ExprError::TooFewOperands {
                constructor: "disjunction",
                count: operands.len(),
            });
        }
        Ok(ConceptExpr::Or(operands))
    }

    /// The conjunction of two expressions, flattening nested conjunctions.
    ///
    /// Unlike [`ConceptExpr::and`] this cannot fail; it is the workhorse of
    /// the refinement operator, which specializes expressions by adding
    /// conjuncts one at a time.
    pub fn conjoin(self, other: ConceptExpr) -> Self {
        let mut operands = match self {
            ConceptExpr::And(ops) => ops,
            single => vec![single],
        };
        match other {
            ConceptExpr::And(ops) => operands.extend(ops),
            single => operands.push(single),
        }
        ConceptExpr::And(operands)
    }

    /// The existential restriction ∃ p.filler.
    pub fn some(property: impl Into<PropertyId>, filler: ConceptExpr) -> Self {
        ConceptExpr::Some {
            property: property.into(),
            filler: Box::new(filler),
        }
    }

    /// The universal restriction ∀ p.filler.
    pub fn all(property: impl Into<PropertyId>, filler: ConceptExpr) -> Self {
        ConceptExpr::All {
            property: property.into(),
            filler: Box::new(filler),
        }
    }

    /// The qualified cardinality restriction ≥ n p.filler.
    pub fn at_least(n: u32, property: impl Into<PropertyId>, filler: ConceptExpr) -> Self {
        ConceptExpr::Card {
            property: property.into(),
            bound: CardinalityBound::AtLeast,
            n,
            filler: Box::new(filler),
        }
    }

    /// The qualified cardinality restriction ≤ n p.filler.
    pub fn at_most(n: u32, property: impl Into<PropertyId>, filler: ConceptExpr) -> Self {
        ConceptExpr::Card {
            property: property.into(),
            bound: CardinalityBound::AtMost,
            n,
            filler: Box::new(filler),
        }
    }

    /// Structural size: the number of constructors plus named entities.
    ///
    /// Atomic classes, ⊤, and ⊥ count 1. ¬ adds 1. An n-ary conjunction or
    /// disjunction adds n−1 (its binary-constructor count). A quantified
    /// restriction adds 2 (quantifier + property), a cardinality restriction
    /// adds 3. This is the standard DL length metric used for the
    /// parsimony penalty.
    pub fn length(&self) -> usize {
        match self {
            ConceptExpr::Top | ConceptExpr::Bottom | ConceptExpr::Atomic(_) => 1,
            ConceptExpr::Not(operand) => 1 + operand.length(),
            ConceptExpr::And(operands) | ConceptExpr::Or(operands) => {
                operands.iter().map(ConceptExpr::length).sum::<usize>() + operands.len() - 1
            }
            ConceptExpr::Some { filler, .. } | ConceptExpr::All { filler, .. } => {
                2 + filler.length()
            }
            ConceptExpr::Card { filler, .. } => 3 + filler.length(),
        }
    }

    /// Tree depth: 1 for leaves, 1 + deepest child otherwise.
    pub fn depth(&self) -> usize {
        match self {
            ConceptExpr::Top | ConceptExpr::Bottom | ConceptExpr::Atomic(_) => 1,
            ConceptExpr::Not(operand) => 1 + operand.depth(),
            ConceptExpr::And(operands) | ConceptExpr::Or(operands) => {
                1 + operands.iter().map(ConceptExpr::depth).max().unwrap_or(0)
            }
            ConceptExpr::Some { filler, .. }
            | ConceptExpr::All { filler, .. }
            | ConceptExpr::Card { filler, .. } => 1 + filler.depth(),
        }
    }

    /// Whether this is ⊤, ⊥, or a named class (rendered without parentheses).
    fn is_simple(&self) -> bool {
        matches!(
            self,
            ConceptExpr::Top | ConceptExpr::Bottom | ConceptExpr::Atomic(_)
        )
    }
}

/// Render an operand, parenthesizing anything that is not a bare name.
fn fmt_operand(expr: &ConceptExpr, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    if expr.is_simple() {
        write!(f, "{expr}")
    } else {
        write!(f, "({expr})")
    }
}

impl std::fmt::Display for ConceptExpr {
    /// Renders description-logic syntax, e.g. `Female ⊓ (∃ hasChild.Person)`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConceptExpr::Top => write!(f, "⊤"),
            ConceptExpr::Bottom => write!(f, "⊥"),
            ConceptExpr::Atomic(class) => write!(f, "{class}"),
            ConceptExpr::Not(operand) => {
                write!(f, "¬")?;
                fmt_operand(operand, f)
            }
            ConceptExpr::And(operands) => {
                for (i, operand) in operands.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ⊓ ")?;
                    }
                    fmt_operand(operand, f)?;
                }
                Ok(())
            }
            ConceptExpr::Or(operands) => {
                for (i, operand) in operands.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ⊔ ")?;
                    }
                    fmt_operand(operand, f)?;
                }
                Ok(())
            }
            ConceptExpr::Some { property, filler } => {
                write!(f, "∃ {property}.")?;
                fmt_operand(filler, f)
            }
            ConceptExpr::All { property, filler } => {
                write!(f, "∀ {property}.")?;
                fmt_operand(filler, f)
            }
            ConceptExpr::Card {
                property,
                bound,
                n,
                filler,
            } => {
                write!(f, "{bound} {n} {property}.")?;
                fmt_operand(filler, f)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conjunction_requires_two_operands() {
        let err = ConceptExpr::and(vec![ConceptExpr::atomic("Female")]).unwrap_err();
        assert!(matches!(err, ExprError::TooFewOperands { count: 1, .. }));
        assert!(ConceptExpr::or(vec![]).is_err());
        assert!(
            ConceptExpr::and(vec![ConceptExpr::atomic("A"), ConceptExpr::atomic("B")]).is_ok()
        );
    }

    #[test]
    fn length_counts_constructors_and_names() {
        let female = ConceptExpr::atomic("Female");
        assert_eq!(female.length(), 1);
        assert_eq!(ConceptExpr::Top.length(), 1);
        assert_eq!(ConceptExpr::not(female.clone()).length(), 2);

        // A ⊓ B: two names + one binary constructor.
        let and = ConceptExpr::and(vec![female.clone(), ConceptExpr::atomic("Parent")]).unwrap();
        assert_eq!(and.length(), 3);

        // A ⊓ B ⊓ C counts like the binary nesting (A ⊓ B) ⊓ C.
        let and3 = ConceptExpr::and(vec![
            female.clone(),
            ConceptExpr::atomic("Parent"),
            ConceptExpr::atomic("Person"),
        ])
        .unwrap();
        assert_eq!(and3.length(), 5);

        // ∃ hasChild.Female: quantifier + property + name.
        assert_eq!(ConceptExpr::some("hasChild", female.clone()).length(), 3);
        assert_eq!(ConceptExpr::at_least(2, "hasChild", female).length(), 4);
    }

    #[test]
    fn depth_is_structural() {
        let leaf = ConceptExpr::atomic("Person");
        assert_eq!(leaf.depth(), 1);
        let nested = ConceptExpr::some("hasChild", ConceptExpr::some("hasChild", leaf));
        assert_eq!(nested.depth(), 3);
    }

    #[test]
    fn conjoin_flattens() {
        let a = ConceptExpr::atomic("A");
        let b = ConceptExpr::atomic("B");
        let c = ConceptExpr::atomic("C");
        let ab = a.conjoin(b);
        let abc = ab.conjoin(c);
        match &abc {
            ConceptExpr::And(ops) => assert_eq!(ops.len(), 3),
            other => panic!("expected flat conjunction, got {other:?}"),
        }
    }

    #[test]
    fn renders_dl_syntax() {
        let expr = ConceptExpr::atomic("Female")
            .conjoin(ConceptExpr::some("hasChild", ConceptExpr::atomic("Person")));
        assert_eq!(expr.to_string(), "Female ⊓ (∃ hasChild.Person)");
        assert_eq!(
            ConceptExpr::not(ConceptExpr::atomic("Male")).to_string(),
            "¬Male"
        );
        assert_eq!(
            ConceptExpr::at_most(1, "hasChild", ConceptExpr::Top).to_string(),
            "≤ 1 hasChild.⊤"
        );
    }
}
