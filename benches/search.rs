//! This bench test exercises the linear-scan search path over a large
//! registry.

#![allow(missing_docs)]

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use pipenet::{AuditLog, Registry};
use tempfile::TempDir;

/// Builds a registry with `count` pipes, auditing into the given directory.
fn preseed_registry(tmp: &TempDir, count: u64) -> Registry {
    let mut registry = Registry::new(AuditLog::new(tmp.path().join("actions.log")));
    for i in 0..count {
        registry.add_pipe(&format!("segment-{i}"), 500.0, i % 7 == 0);
    }
    registry
}

fn search_by_name(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    let registry = preseed_registry(&tmp, 10_000);

    c.bench_function("pipes_by_name over 10k records", |b| {
        b.iter(|| registry.pipes_by_name("segment-99"));
    });
}

fn add_many(c: &mut Criterion) {
    c.bench_function("add 1k pipes", |b| {
        b.iter_batched(
            || TempDir::new().unwrap(),
            |tmp| preseed_registry(&tmp, 1_000),
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, search_by_name, add_many);
criterion_main!(benches);
