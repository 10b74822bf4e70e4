//! Downward refinement operator over concept expressions.
//!
//! `refine` maps a concept to a set of *proper specializations*: every result
//! retrieves a subset of the input's instances, and no result is structurally
//! equal to the input. The operator is the sole producer of the best-first
//! engine's search space, so its output order must be deterministic — it
//! follows the knowledge source's (sorted) vocabulary order and the rule
//! order below.
//!
//! Candidates that exceed the length cap or are unsatisfiable are silently
//! pruned: an empty result means "no further candidates here", never an
//! error.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::KbResult;
use crate::expr::{CardinalityBound, ConceptExpr};
use crate::kb::KnowledgeSource;

/// Policy knobs of the refinement operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefinementConfig {
    /// Hard cap on the length of emitted refinements.
    pub max_child_length: usize,
    /// Emit negated atomic classes (from ⊤ and as new conjuncts).
    pub use_negation: bool,
    /// Emit universal restrictions alongside existentials.
    pub use_universal: bool,
    /// Tighten existentials to qualified cardinality restrictions.
    pub use_cardinality: bool,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            max_child_length: 12,
            use_negation: true,
            use_universal: true,
            use_cardinality: true,
        }
    }
}

/// Downward refinement operator.
pub struct RefinementOperator {
    config: RefinementConfig,
}

impl RefinementOperator {
    /// Create an operator with the given policy.
    pub fn new(config: RefinementConfig) -> Self {
        Self { config }
    }

    /// The operator's configuration.
    pub fn config(&self) -> &RefinementConfig {
        &self.config
    }

    /// Produce the proper specializations of `expr` with length at most
    /// `max_length` (further capped by `max_child_length`).
    ///
    /// Results are normalized, deduplicated by normal form, satisfiable, and
    /// never structurally equal to the input.
    pub fn refine<K: KnowledgeSource + ?Sized>(
        &self,
        expr: &ConceptExpr,
        kb: &K,
        max_length: usize,
    ) -> KbResult<Vec<ConceptExpr>> {
        let cap = max_length.min(self.config.max_child_length);
        let mut raw = Vec::new();
        self.candidates(expr, kb, &mut raw)?;

        let input = expr.normal_form();
        let mut seen = BTreeSet::new();
        let mut refinements = Vec::new();
        for candidate in raw {
            if candidate.length() > cap {
                continue;
            }
            let normalized = candidate.normal_form();
            if normalized == input {
                continue;
            }
            if !seen.insert(normalized.clone()) {
                continue;
            }
            if !kb.is_satisfiable(&normalized)? {
                continue;
            }
            refinements.push(normalized);
        }
        Ok(refinements)
    }

    /// Atomic-level refinements of ⊤: named classes and (optionally) their
    /// complements. These double as the conjuncts appended when specializing
    /// conjunctions.
    fn top_atoms<K: KnowledgeSource + ?Sized>(&self, kb: &K) -> Vec<ConceptExpr> {
        let mut atoms = Vec::new();
        for class in kb.atomic_classes() {
            atoms.push(ConceptExpr::Atomic(class));
        }
        if self.config.use_negation {
            for class in kb.atomic_classes() {
                atoms.push(ConceptExpr::not(ConceptExpr::Atomic(class)));
            }
        }
        atoms
    }

    fn candidates<K: KnowledgeSource + ?Sized>(
        &self,
        expr: &ConceptExpr,
        kb: &K,
        out: &mut Vec<ConceptExpr>,
    ) -> KbResult<()> {
        match expr {
            ConceptExpr::Top => {
                out.extend(self.top_atoms(kb));
                for property in kb.properties() {
                    out.push(ConceptExpr::some(property.clone(), ConceptExpr::Top));
                    if self.config.use_universal {
                        out.push(ConceptExpr::all(property, ConceptExpr::Top));
                    }
                }
            }
            // ⊥ has no specializations.
            ConceptExpr::Bottom => {}
            ConceptExpr::Atomic(class) => {
                for sub in kb.direct_subclasses(class) {
                    out.push(ConceptExpr::Atomic(sub));
                }
                for atom in self.top_atoms(kb) {
                    out.push(expr.clone().conjoin(atom));
                }
                for property in kb.properties_with_domain(expr)? {
                    out.push(
                        expr.clone()
                            .conjoin(ConceptExpr::some(property.clone(), ConceptExpr::Top)),
                    );
                    if self.config.use_universal {
                        out.push(
                            expr.clone()
                                .conjoin(ConceptExpr::all(property, ConceptExpr::Top)),
                        );
                    }
                }
            }
            // ¬C specializes as C generalizes, so only hierarchy steps
            // upward are sound: ¬A → ¬B for superclasses B of A.
            ConceptExpr::Not(operand) => {
                if let ConceptExpr::Atomic(class) = operand.as_ref() {
                    for sup in kb.direct_superclasses(class) {
                        out.push(ConceptExpr::not(ConceptExpr::Atomic(sup)));
                    }
                }
            }
            ConceptExpr::And(operands) => {
                self.refine_one_operand(operands, kb, out, |ops| ConceptExpr::And(ops))?;
                for atom in self.top_atoms(kb) {
                    let mut extended = operands.clone();
                    extended.push(atom);
                    out.push(ConceptExpr::And(extended));
                }
            }
            ConceptExpr::Or(operands) => {
                self.refine_one_operand(operands, kb, out, |ops| ConceptExpr::Or(ops))?;
                // Appending a disjunct would generalize; the sound analogue
                // is conjoining the whole disjunction with a new atom.
                for atom in self.top_atoms(kb) {
                    out.push(expr.clone().conjoin(atom));
                }
            }
            ConceptExpr::Some { property, filler } => {
                let mut filler_refs = Vec::new();
                self.candidates(filler, kb, &mut filler_refs)?;
                for refined in filler_refs {
                    out.push(ConceptExpr::Some {
                        property: property.clone(),
                        filler: Box::new(refined),
                    });
                }
                // ∃p.C is ≥1 p.C; a second witness is a proper tightening
                // unless the property admits only one successor.
                if self.config.use_cardinality && !kb.is_functional(property) {
                    out.push(ConceptExpr::Card {
                        property: property.clone(),
                        bound: CardinalityBound::AtLeast,
                        n: 2,
                        filler: filler.clone(),
                    });
                }
            }
            ConceptExpr::All { property, filler } => {
                let mut filler_refs = Vec::new();
                self.candidates(filler, kb, &mut filler_refs)?;
                for refined in filler_refs {
                    out.push(ConceptExpr::All {
                        property: property.clone(),
                        filler: Box::new(refined),
                    });
                }
            }
            ConceptExpr::Card {
                property,
                bound,
                n,
                filler,
            } => match bound {
                CardinalityBound::AtLeast => {
                    let mut filler_refs = Vec::new();
                    self.candidates(filler, kb, &mut filler_refs)?;
                    for refined in filler_refs {
                        out.push(ConceptExpr::Card {
                            property: property.clone(),
                            bound: CardinalityBound::AtLeast,
                            n: *n,
                            filler: Box::new(refined),
                        });
                    }
                    out.push(ConceptExpr::Card {
                        property: property.clone(),
                        bound: CardinalityBound::AtLeast,
                        n: n + 1,
                        filler: filler.clone(),
                    });
                }
                // Refining the filler of ≤ would widen the extension;
                // only lowering the bound specializes.
                CardinalityBound::AtMost => {
                    if *n > 0 {
                        out.push(ConceptExpr::Card {
                            property: property.clone(),
                            bound: CardinalityBound::AtMost,
                            n: n - 1,
                            filler: filler.clone(),
                        });
                    }
                }
                CardinalityBound::Exactly => {}
            },
        }
        Ok(())
    }

    /// Refine exactly one operand of a commutative constructor, leaving the
    /// others fixed.
    fn refine_one_operand<K: KnowledgeSource + ?Sized>(
        &self,
        operands: &[ConceptExpr],
        kb: &K,
        out: &mut Vec<ConceptExpr>,
        rebuild: impl Fn(Vec<ConceptExpr>) -> ConceptExpr,
    ) -> KbResult<()> {
        for index in 0..operands.len() {
            let mut operand_refs = Vec::new();
            self.candidates(&operands[index], kb, &mut operand_refs)?;
            for refined in operand_refs {
                let mut rebuilt = operands.to_vec();
                rebuilt[index] = refined;
                out.push(rebuild(rebuilt));
            }
        }
        Ok(())
    }
}
