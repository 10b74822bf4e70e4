//! Canonical normal form for concept expressions.
//!
//! Normalization flattens nested conjunctions/disjunctions of the same kind,
//! removes boolean identities, absorbs annihilators, sorts and deduplicates
//! commutative operands by the canonical ordering, eliminates double
//! negation, and detects direct complement clashes (`C ⊓ ¬C → ⊥`,
//! `C ⊔ ¬C → ⊤`). The result is the key under which expressions are
//! deduplicated everywhere: refinement output, search-tree membership, the
//! retrieval cache, and the best-hypotheses set.
//!
//! This is canonicalization, not full negation normal form: negations stay
//! where they are (over their normalized operand) rather than being pushed
//! through quantifiers.

use super::ConceptExpr;

impl ConceptExpr {
    /// Compute the canonical normal form of this expression.
    ///
    /// Idempotent: `e.normal_form().normal_form() == e.normal_form()`.
    pub fn normal_form(&self) -> ConceptExpr {
        match self {
            ConceptExpr::Top => ConceptExpr::Top,
            ConceptExpr::Bottom => ConceptExpr::Bottom,
            ConceptExpr::Atomic(class) => ConceptExpr::Atomic(class.clone()),
            ConceptExpr::Not(operand) => match operand.normal_form() {
                ConceptExpr::Top => ConceptExpr::Bottom,
                ConceptExpr::Bottom => ConceptExpr::Top,
                ConceptExpr::Not(inner) => *inner,
                normalized => ConceptExpr::Not(Box::new(normalized)),
            },
            ConceptExpr::And(operands) => normalize_boolean(operands, BooleanKind::And),
            ConceptExpr::Or(operands) => normalize_boolean(operands, BooleanKind::Or),
            ConceptExpr::Some { property, filler } => ConceptExpr::Some {
                property: property.clone(),
                filler: Box::new(filler.normal_form()),
            },
            ConceptExpr::All { property, filler } => ConceptExpr::All {
                property: property.clone(),
                filler: Box::new(filler.normal_form()),
            },
            ConceptExpr::Card {
                property,
                bound,
                n,
                filler,
            } => ConceptExpr::Card {
                property: property.clone(),
                bound: *bound,
                n: *n,
                filler: Box::new(filler.normal_form()),
            },
        }
    }

    /// Structural equality: equality of normal forms.
    ///
    /// This is the equality the search engines deduplicate by —
    /// `A ⊓ B` equals `B ⊓ A`, and `A ⊓ (B ⊓ C)` equals `A ⊓ B ⊓ C`.
    pub fn structural_eq(&self, other: &ConceptExpr) -> bool {
        self.normal_form() == other.normal_form()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum BooleanKind {
    And,
    Or,
}

/// Normalize an n-ary conjunction or disjunction.
///
/// The two connectives are exact duals: ⊤ is the identity of ⊓ and the
/// annihilator of ⊔, ⊥ the other way around.
fn normalize_boolean(operands: &[ConceptExpr], kind: BooleanKind) -> ConceptExpr {
    let mut flat: Vec<ConceptExpr> = Vec::with_capacity(operands.len());

    for operand in operands {
        match (operand.normal_form(), kind) {
            (ConceptExpr::And(inner), BooleanKind::And) => flat.extend(inner),
            (ConceptExpr::Or(inner), BooleanKind::Or) => flat.extend(inner),
            (ConceptExpr::Top, BooleanKind::And) => {}
            (ConceptExpr::Bottom, BooleanKind::Or) => {}
            (ConceptExpr::Bottom, BooleanKind::And) => return ConceptExpr::Bottom,
            (ConceptExpr::Top, BooleanKind::Or) => return ConceptExpr::Top,
            (normalized, _) => flat.push(normalized),
        }
    }

    flat.sort();
    flat.dedup();

    // Direct complement clash: X together with ¬X.
    let clash = flat.iter().any(|member| {
        if let ConceptExpr::Not(inner) = member {
            flat.binary_search(inner).is_ok()
        } else {
            false
        }
    });
    if clash {
        return match kind {
            BooleanKind::And => ConceptExpr::Bottom,
            BooleanKind::Or => ConceptExpr::Top,
        };
    }

    match flat.len() {
        0 => match kind {
            BooleanKind::And => ConceptExpr::Top,
            BooleanKind::Or => ConceptExpr::Bottom,
        },
        1 => flat.pop().expect("length checked"),
        _ => match kind {
            BooleanKind::And => ConceptExpr::And(flat),
            BooleanKind::Or => ConceptExpr::Or(flat),
        },
    }
}
