use criterion::{Criterion, black_box, criterion_group, criterion_main};
use stagefreight_freshness::ecosystems::cargo::CargoEcosystem;
use stagefreight_freshness::ecosystems::{EndpointConfig, Parser};
use std::path::Path;

const MANIFEST: &str = r#"
[package]
name = "bench-target"
version = "0.1.0"

[dependencies]
serde = "1.0"
tokio = { version = "1.35", features = ["full"] }
reqwest = { version = "0.11", features = ["json"] }

[dev-dependencies]
criterion = "0.5"
"#;

fn bench_cargo_parse(c: &mut Criterion) {
    let eco = CargoEcosystem::new(EndpointConfig::default());
    c.bench_function("cargo_parse_manifest", |b| {
        b.iter(|| eco.parse(Path::new(black_box("Cargo.toml")), black_box(MANIFEST)).unwrap())
    });
}

fn bench_ignore_glob(c: &mut Criterion) {
    let ignore = vec!["left-*".to_string(), "@internal/*".to_string()];
    c.bench_function("rules_is_ignored", |b| {
        b.iter(|| stagefreight_freshness::rules::is_ignored(black_box(&ignore), black_box("left-pad")))
    });
}

criterion_group!(benches, bench_cargo_parse, bench_ignore_glob);
criterion_main!(benches);
