use criterion::{Criterion, black_box, criterion_group, criterion_main};
use stagefreight_core::pattern::{compile_patterns, matches};
use stagefreight_core::{decompose, tag_newer};
use std::collections::HashMap;

fn bench_decompose(c: &mut Criterion) {
    c.bench_function("decompose tag with alpine suffix", |b| {
        b.iter(|| decompose(black_box("v1.25.3-alpine3.19")))
    });
}

fn bench_tag_newer(c: &mut Criterion) {
    let a = decompose("1.26.0-alpine");
    let b = decompose("1.25.1-alpine");
    c.bench_function("tag_newer comparison", |bench| {
        bench.iter(|| tag_newer(black_box(&a), black_box(&b)))
    });
}

fn bench_pattern_matching(c: &mut Criterion) {
    let policies = HashMap::new();
    let (compiled, _) = compile_patterns(
        &["^v\\d+\\.\\d+\\.\\d+$".to_string(), "!.*-rc.*".to_string()],
        &policies,
    );
    c.bench_function("pattern match against compiled rules", |b| {
        b.iter(|| matches(black_box(&compiled), black_box("v1.2.3")))
    });
}

criterion_group!(benches, bench_decompose, bench_tag_newer, bench_pattern_matching);
criterion_main!(benches);
