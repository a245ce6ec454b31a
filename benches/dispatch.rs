//! Benchmarks for batch dispatch
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pipeflow::{deep, CancelToken, Flow, Node, Pipe, Value, When};
use serde_json::json;

const SOUND: &str = r#"
    fn main(nodes, next) {
        for node in nodes {
            node.meta = #{ sound: "meow" };
        }
        next.call(nodes)
    }
"#;

fn batch(size: usize) -> Vec<Node> {
    (0..size)
        .map(|i| Node::new().with_kind(if i % 4 == 3 { "dog" } else { "cat" }))
        .collect()
}

fn flow() -> Flow {
    Flow::new([
        Pipe::random()
            .with_name("cats")
            .with_when(When::kind(["cat"]))
            .with_code(SOUND),
        Pipe::random()
            .with_name("dogs")
            .with_when(When::kind(["dog"])),
    ])
}

fn bench_work(c: &mut Criterion) {
    let mut group = c.benchmark_group("work");
    let flow = flow();
    let token = CancelToken::new();

    for size in [10, 100, 1_000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::new("batch", size), size, |b, &size| {
            b.iter_batched(
                || batch(size),
                |mut nodes| {
                    flow.work(&token, &mut nodes).unwrap();
                    black_box(nodes)
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_interpreter_spawn(c: &mut Criterion) {
    c.bench_function("first_run", |b| {
        b.iter_batched(
            || (flow(), batch(1)),
            |(flow, mut nodes)| {
                flow.work(&CancelToken::new(), &mut nodes).unwrap();
                black_box(nodes)
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

fn bench_deep(c: &mut Criterion) {
    let mut group = c.benchmark_group("deep");
    let value = Value::from(json!({
        "a": {"b": {"c": [1, 2, 3], "d": "x"}},
        "e": {"f": true, "g": null},
    }));
    let patch = Value::from(json!({"a": {"b": {"d": "y"}}, "h": 1}));
    let pattern = Value::from(json!({"a": {"b": {"d": "x"}}}));

    group.bench_function("with", |b| {
        b.iter(|| black_box(deep::deep_with(value.clone(), patch.clone(), true)))
    });
    group.bench_function("have", |b| {
        b.iter(|| black_box(deep::deep_have(&value, &pattern)))
    });

    group.finish();
}

criterion_group!(benches, bench_work, bench_interpreter_spawn, bench_deep);
criterion_main!(benches);
