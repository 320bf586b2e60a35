//! Benchmarks for the begin/end hot path and scoped dispatch.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use flowtrack::prelude::*;
use std::sync::Arc;

fn completion_benchmark(c: &mut Criterion) {
    let registry = CompletionRegistry::new();
    let identity = StageIdentity::new("bench-id", "bench", "function");

    c.bench_function("begin_end_cycle", |b| {
        let msg = Message::with_id("m1").with_payload("foo");
        b.iter(|| {
            registry.begin(black_box(&identity), black_box(&msg));
            registry.end(&identity.id, msg.id(), CompletionOutcome::Success);
        });
    });

    c.bench_function("scoped_dispatch", |b| {
        let registry = CompletionRegistry::new();
        ScopeDispatcher::subscribe(
            DispatcherConfig::new("success").with_scope(["bench-id"]),
            &registry,
            Arc::new(NoOpForwarder),
        );
        let msg = Message::with_id("m1").with_payload("foo").with_topic("bar");
        b.iter(|| {
            registry.begin(black_box(&identity), black_box(&msg));
            registry.end(&identity.id, msg.id(), CompletionOutcome::Success);
        });
    });
}

criterion_group!(benches, completion_benchmark);
criterion_main!(benches);
