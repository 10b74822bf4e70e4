//! Genetic operators over concept expression trees.
//!
//! Expressions are immutable, so every operator works by path: a subtree is
//! addressed by the sequence of child indices from the root, and replacement
//! rebuilds the spine while sharing everything else. The operators here are
//! the raw, unvalidated building blocks — the engine wraps them in bounded
//! retry loops that enforce length caps and satisfiability.
//!
//! All randomness flows through the caller's seeded RNG; nothing here touches
//! ambient random state, so a fixed seed reproduces a run exactly.

use rand::Rng;

use crate::expr::ConceptExpr;
use crate::kb::KnowledgeSource;
use crate::vocab::{ClassId, PropertyId};

/// Randomized top-down construction of concept expressions from a knowledge
/// base's vocabulary.
pub struct ExpressionSampler {
    classes: Vec<ClassId>,
    properties: Vec<PropertyId>,
    use_negation: bool,
    use_universal: bool,
}

impl ExpressionSampler {
    /// Build a sampler over the knowledge base's declared vocabulary.
    pub fn from_kb<K: KnowledgeSource + ?Sized>(
        kb: &K,
        use_negation: bool,
        use_universal: bool,
    ) -> Self {
        Self {
            classes: kb.atomic_classes(),
            properties: kb.properties(),
            use_negation,
            use_universal,
        }
    }

    /// Sample a random expression with tree depth at most `depth`.
    pub fn random_expr<R: Rng>(&self, rng: &mut R, depth: usize) -> ConceptExpr {
        if self.classes.is_empty() {
            return ConceptExpr::Top;
        }
        if depth <= 1 {
            return self.random_leaf(rng);
        }
        match rng.gen_range(0..10u32) {
            0..=3 => self.random_leaf(rng),
            4 => {
                if self.use_negation {
                    ConceptExpr::not(self.random_leaf(rng))
                } else {
                    self.random_leaf(rng)
                }
            }
            5 | 6 => ConceptExpr::And(vec![
                self.random_expr(rng, depth - 1),
                self.random_expr(rng, depth - 1),
            ]),
            7 => ConceptExpr::Or(vec![
                self.random_expr(rng, depth - 1),
                self.random_expr(rng, depth - 1),
            ]),
            _ => {
                let Some(property) = self.random_property(rng) else {
                    return self.random_leaf(rng);
                };
                let filler = self.random_expr(rng, depth - 1);
                if self.use_universal && rng.gen_bool(0.3) {
                    ConceptExpr::all(property, filler)
                } else {
                    ConceptExpr::some(property, filler)
                }
            }
        }
    }

    fn random_leaf<R: Rng>(&self, rng: &mut R) -> ConceptExpr {
        let class = self.classes[rng.gen_range(0..self.classes.len())].clone();
        ConceptExpr::Atomic(class)
    }

    fn random_property<R: Rng>(&self, rng: &mut R) -> Option<PropertyId> {
        if self.properties.is_empty() {
            return None;
        }
        Some(self.properties[rng.gen_range(0..self.properties.len())].clone())
    }
}

/// All subtree positions of an expression, as root-relative child-index
/// paths, in preorder. The root is the empty path.
pub fn subtree_paths(expr: &ConceptExpr) -> Vec<Vec<usize>> {
    let mut paths = Vec::new();
    collect_paths(expr, &mut Vec::new(), &mut paths);
    paths
}

fn collect_paths(expr: &ConceptExpr, prefix: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
    out.push(prefix.clone());
    match expr {
        ConceptExpr::Top | ConceptExpr::Bottom | ConceptExpr::Atomic(_) => {}
        ConceptExpr::Not(operand) => {
            prefix.push(0);
            collect_paths(operand, prefix, out);
            prefix.pop();
        }
        ConceptExpr::And(operands) | ConceptExpr::Or(operands) => {
            for (index, operand) in operands.iter().enumerate() {
                prefix.push(index);
                collect_paths(operand, prefix, out);
                prefix.pop();
            }
        }
        ConceptExpr::Some { filler, .. }
        | ConceptExpr::All { filler, .. }
        | ConceptExpr::Card { filler, .. } => {
            prefix.push(0);
            collect_paths(filler, prefix, out);
            prefix.pop();
        }
    }
}

/// The subtree at `path`, if the path is valid.
pub fn subtree_at<'e>(expr: &'e ConceptExpr, path: &[usize]) -> Option<&'e ConceptExpr> {
    let Some((&step, rest)) = path.split_first() else {
        return Some(expr);
    };
    match expr {
        ConceptExpr::Top | ConceptExpr::Bottom | ConceptExpr::Atomic(_) => None,
        ConceptExpr::Not(operand) => (step == 0).then(|| subtree_at(operand, rest)).flatten(),
        ConceptExpr::And(operands) | ConceptExpr::Or(operands) => {
            operands.get(step).and_then(|child| subtree_at(child, rest))
        }
        ConceptExpr::Some { filler, .. }
        | ConceptExpr::All { filler, .. }
        | ConceptExpr::Card { filler, .. } => {
            (step == 0).then(|| subtree_at(filler, rest)).flatten()
        }
    }
}

/// A copy of `expr` with the subtree at `path` replaced. An invalid path
/// returns the expression unchanged.
pub fn replace_subtree(
    expr: &ConceptExpr,
    path: &[usize],
    replacement: ConceptExpr,
) -> ConceptExpr {
    let Some((&step, rest)) = path.split_first() else {
        return replacement;
    };
    match expr {
        ConceptExpr::Top | ConceptExpr::Bottom | ConceptExpr::Atomic(_) => expr.clone(),
        ConceptExpr::Not(operand) => {
            if step == 0 {
                ConceptExpr::Not(Box::new(replace_subtree(operand, rest, replacement)))
            } else {
                expr.clone()
            }
        }
        ConceptExpr::And(operands) | ConceptExpr::Or(operands) => {
            let mut rebuilt = operands.clone();
            if let Some(child) = rebuilt.get_mut(step) {
                *child = replace_subtree(child, rest, replacement);
            }
            match expr {
                ConceptExpr::And(_) => ConceptExpr::And(rebuilt),
                _ => ConceptExpr::Or(rebuilt),
            }
        }
        ConceptExpr::Some { property, filler } => {
            if step == 0 {
                ConceptExpr::Some {
                    property: property.clone(),
                    filler: Box::new(replace_subtree(filler, rest, replacement)),
                }
            } else {
                expr.clone()
            }
        }
        ConceptExpr::All { property, filler } => {
            if step == 0 {
                ConceptExpr::All {
                    property: property.clone(),
                    filler: Box::new(replace_subtree(filler, rest, replacement)),
                }
            } else {
                expr.clone()
            }
        }
        ConceptExpr::Card {
            property,
            bound,
            n,
            filler,
        } => {
            if step == 0 {
                ConceptExpr::Card {
                    property: property.clone(),
                    bound: *bound,
                    n: *n,
                    filler: Box::new(replace_subtree(filler, rest, replacement)),
                }
            } else {
                expr.clone()
            }
        }
    }
}

/// Swap a random proper subtree of `a` with one of `b`, producing two
/// children. Whole-root swaps are excluded — they would merely duplicate the
/// parents. Returns `None` when either parent is a single leaf.
pub fn crossover<R: Rng>(
    rng: &mut R,
    a: &ConceptExpr,
    b: &ConceptExpr,
) -> Option<(ConceptExpr, ConceptExpr)> {
    let paths_a: Vec<Vec<usize>> = subtree_paths(a)
        .into_iter()
        .filter(|path| !path.is_empty())
        .collect();
    let paths_b: Vec<Vec<usize>> = subtree_paths(b)
        .into_iter()
        .filter(|path| !path.is_empty())
        .collect();
    if paths_a.is_empty() || paths_b.is_empty() {
        return None;
    }
    let path_a = &paths_a[rng.gen_range(0..paths_a.len())];
    let path_b = &paths_b[rng.gen_range(0..paths_b.len())];
    let sub_a = subtree_at(a, path_a)?.clone();
    let sub_b = subtree_at(b, path_b)?.clone();
    Some((
        replace_subtree(a, path_a, sub_b),
        replace_subtree(b, path_b, sub_a),
    ))
}

/// Mutate an expression: flip the quantifier of a random restriction, or
/// replace a random subtree with a freshly sampled one of bounded depth.
pub fn mutate<R: Rng>(
    rng: &mut R,
    sampler: &ExpressionSampler,
    expr: &ConceptExpr,
    replacement_depth: usize,
) -> ConceptExpr {
    let paths = subtree_paths(expr);

    // Quantifier flip, when a restriction exists to flip.
    let restriction_paths: Vec<&Vec<usize>> = paths
        .iter()
        .filter(|path| {
            matches!(
                subtree_at(expr, path),
                Some(ConceptExpr::Some { .. }) | Some(ConceptExpr::All { .. })
            )
        })
        .collect();
    if !restriction_paths.is_empty() && rng.gen_bool(0.3) {
        let path = restriction_paths[rng.gen_range(0..restriction_paths.len())];
        let flipped = match subtree_at(expr, path) {
            Some(ConceptExpr::Some { property, filler }) => ConceptExpr::All {
                property: property.clone(),
                filler: filler.clone(),
            },
            Some(ConceptExpr::All { property, filler }) => ConceptExpr::Some {
                property: property.clone(),
                filler: filler.clone(),
            },
            _ => unreachable!("filtered to restrictions above"),
        };
        return replace_subtree(expr, path, flipped);
    }

    let path = &paths[rng.gen_range(0..paths.len())];
    let replacement = sampler.random_expr(rng, replacement_depth);
    replace_subtree(expr, path, replacement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kb::MemoryKnowledgeBase;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn sampler() -> ExpressionSampler {
        let mut kb = MemoryKnowledgeBase::new();
        kb.declare_subclass("Male", "Person");
        kb.declare_subclass("Female", "Person");
        kb.assert_relation("anna", "hasChild", "eve");
        ExpressionSampler::from_kb(&kb, true, true)
    }

    fn seeded() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn sampled_expressions_respect_depth() {
        let sampler = sampler();
        let mut rng = seeded();
        for depth in 1..5 {
            for _ in 0..50 {
                let expr = sampler.random_expr(&mut rng, depth);
                assert!(expr.depth() <= depth, "{expr} exceeds depth {depth}");
            }
        }
    }

    #[test]
    fn sampling_is_reproducible_under_a_fixed_seed() {
        let sampler = sampler();
        let mut rng_a = seeded();
        let mut rng_b = seeded();
        for _ in 0..20 {
            assert_eq!(
                sampler.random_expr(&mut rng_a, 4),
                sampler.random_expr(&mut rng_b, 4)
            );
        }
    }

    #[test]
    fn paths_address_every_subtree() {
        let expr = ConceptExpr::and(vec![
            ConceptExpr::atomic("Female"),
            ConceptExpr::some("hasChild", ConceptExpr::atomic("Person")),
        ])
        .unwrap();
        let paths = subtree_paths(&expr);
        // Root, two operands, and the filler.
        assert_eq!(paths.len(), 4);
        for path in &paths {
            assert!(subtree_at(&expr, path).is_some());
        }
        assert_eq!(
            subtree_at(&expr, &[1, 0]),
            Some(&ConceptExpr::atomic("Person"))
        );
    }

    #[test]
    fn replace_rebuilds_without_mutating() {
        let expr = ConceptExpr::some("hasChild", ConceptExpr::atomic("Person"));
        let replaced = replace_subtree(&expr, &[0], ConceptExpr::atomic("Female"));
        assert_eq!(
            replaced,
            ConceptExpr::some("hasChild", ConceptExpr::atomic("Female"))
        );
        // The original is untouched.
        assert_eq!(expr, ConceptExpr::some("hasChild", ConceptExpr::atomic("Person")));
    }

    #[test]
    fn crossover_swaps_proper_subtrees() {
        let mut rng = seeded();
        let a = ConceptExpr::and(vec![
            ConceptExpr::atomic("Female"),
            ConceptExpr::atomic("Parent"),
        ])
        .unwrap();
        let b = ConceptExpr::some("hasChild", ConceptExpr::atomic("Male"));
        let (c1, c2) = crossover(&mut rng, &a, &b).unwrap();
        // Children differ from the parents but are built from their pieces.
        assert_ne!(c1, a);
        assert_ne!(c2, b);
    }

    #[test]
    fn crossover_of_leaves_is_rejected() {
        let mut rng = seeded();
        let a = ConceptExpr::atomic("Female");
        let b = ConceptExpr::atomic("Male");
        assert!(crossover(&mut rng, &a, &b).is_none());
    }

    #[test]
    fn mutation_always_yields_a_well_formed_tree() {
        let sampler = sampler();
        let mut rng = seeded();
        let mut expr = ConceptExpr::and(vec![
            ConceptExpr::atomic("Female"),
            ConceptExpr::some("hasChild", ConceptExpr::atomic("Person")),
        ])
        .unwrap();
        for _ in 0..100 {
            expr = mutate(&mut rng, &sampler, &expr, 3);
            // Normalization would reject malformed n-ary constructors by
            // construction; exercising it here is the structural check.
            let _ = expr.normal_form();
            assert!(expr.length() > 0);
        }
    }
}
