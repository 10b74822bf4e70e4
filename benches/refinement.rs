//! Benchmarks for expression normalization and refinement.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use kheper::expr::ConceptExpr;
use kheper::kb::MemoryKnowledgeBase;
use kheper::refine::{RefinementConfig, RefinementOperator};

fn family_kb() -> MemoryKnowledgeBase {
    let mut kb = MemoryKnowledgeBase::new();
    kb.declare_subclass("Male", "Person");
    kb.declare_subclass("Female", "Person");
    kb.declare_subclass("Parent", "Person");
    for i in 0..50 {
        let name = format!("f{i}");
        kb.assert_class(name.as_str(), "Female");
        if i % 2 == 0 {
            kb.assert_class(name.as_str(), "Parent");
            kb.assert_relation(name.as_str(), "hasChild", format!("m{i}").as_str());
        }
    }
    for i in 0..50 {
        kb.assert_class(format!("m{i}").as_str(), "Male");
    }
    kb
}

fn nested_expr() -> ConceptExpr {
    ConceptExpr::and(vec![
        ConceptExpr::atomic("Female"),
        ConceptExpr::or(vec![
            ConceptExpr::atomic("Parent"),
            ConceptExpr::not(ConceptExpr::not(ConceptExpr::atomic("Male"))),
        ])
        .unwrap(),
        ConceptExpr::some(
            "hasChild",
            ConceptExpr::and(vec![
                ConceptExpr::atomic("Person"),
                ConceptExpr::Top,
                ConceptExpr::atomic("Female"),
            ])
            .unwrap(),
        ),
    ])
    .unwrap()
}

fn bench_normal_form(c: &mut Criterion) {
    let expr = nested_expr();
    c.bench_function("normal_form_nested", |bench| {
        bench.iter(|| black_box(expr.normal_form()))
    });
}

fn bench_refine_top(c: &mut Criterion) {
    let kb = family_kb();
    let operator = RefinementOperator::new(RefinementConfig::default());
    c.bench_function("refine_top", |bench| {
        bench.iter(|| black_box(operator.refine(&ConceptExpr::Top, &kb, 12).unwrap()))
    });
}

fn bench_refine_conjunction(c: &mut Criterion) {
    let kb = family_kb();
    let operator = RefinementOperator::new(RefinementConfig::default());
    let expr = ConceptExpr::atomic("Female").conjoin(ConceptExpr::atomic("Parent"));
    c.bench_function("refine_conjunction", |bench| {
        bench.iter(|| black_box(operator.refine(&expr, &kb, 12).unwrap()))
    });
}

criterion_group!(
    benches,
    bench_normal_form,
    bench_refine_top,
    bench_refine_conjunction
);
criterion_main!(benches);
