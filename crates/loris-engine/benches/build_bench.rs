use criterion::{black_box, criterion_group, criterion_main, Criterion};

use loris_dft::model::{Dft, DftBuilder, GateKind};
use loris_dft::properties::Property;
use loris_dft::relevance::compute_relevant_events;
use loris_engine::builder::{BuilderOptions, ExplicitBuilder};
use loris_engine::pipeline::{analyze, AnalysisOptions};

fn wide_vote(n: usize) -> Dft {
    let mut b = DftBuilder::new();
    let names: Vec<String> = (0..n).map(|i| format!("be{i}")).collect();
    for name in &names {
        b.exponential(name, 1.0, 1.0).unwrap();
    }
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    b.gate("top", GateKind::Vote { threshold: n / 2 + 1 }, &refs)
        .unwrap();
    b.build("top").unwrap()
}

fn bench_build(c: &mut Criterion) {
    let dft = wide_vote(10);
    c.bench_function("build_vote_10_exact", |bencher| {
        bencher.iter(|| {
            let mut builder = ExplicitBuilder::new(&dft, BuilderOptions::exact(&dft));
            black_box(builder.build().unwrap())
        })
    });

    c.bench_function("analyze_vote_10_pruned", |bencher| {
        let properties = [Property::tree_mttf()];
        let relevant = compute_relevant_events(&dft, &properties, &[]).unwrap();
        let options = AnalysisOptions::default();
        bencher.iter(|| {
            black_box(analyze(&dft, &properties, Some(relevant.clone()), &options).unwrap())
        })
    });
}

criterion_group!(benches, bench_build);
criterion_main!(benches);
