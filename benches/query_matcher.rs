use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use vcrwrap::matching::json_query_eq;

fn params(count: usize, pretty: bool) -> Vec<(String, String)> {
    (0..count)
        .map(|i| {
            let value = if pretty {
                format!(r#"{{ "page": {i}, "tags": [ "a", "b" ], "id": "item-{i}" }}"#)
            } else {
                format!(r#"{{"id":"item-{i}","page":{i},"tags":["a","b"]}}"#)
            };
            (format!("p{i}"), value)
        })
        .collect()
}

fn bench_json_query_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("json_query");

    for count in [1, 10, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let recorded = params(count, false);
            let live = params(count, true);

            b.iter(|| json_query_eq(black_box(&recorded), black_box(&live)));
        });
    }

    group.finish();
}

fn bench_plain_values(c: &mut Criterion) {
    let recorded: Vec<(String, String)> = (0..10)
        .map(|i| (format!("k{i}"), format!("value-{i}")))
        .collect();
    let live = recorded.clone();

    c.bench_function("plain_query_10", |b| {
        b.iter(|| json_query_eq(black_box(&recorded), black_box(&live)));
    });
}

criterion_group!(benches, bench_json_query_sizes, bench_plain_values);
criterion_main!(benches);
