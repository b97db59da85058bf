use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use msgstream_encoder::{Encoder, EncoderConfig, encode_message};
use msgstream_tests::{nested_list, point, point_instances, records, schema};
use msgstream_types::{Graph, Schema};

fn bench_encode_small(c: &mut Criterion) {
    let schema = Schema::new();
    let message = nested_list();

    c.bench_function("encode_small", |b| {
        b.iter(|| encode_message(&schema, &message.graph, message.root).unwrap());
    });
}

fn bench_encode_records(c: &mut Criterion) {
    let schema = Schema::new();
    let mut group = c.benchmark_group("encode_records");

    for n in [10, 100, 1_000] {
        let message = records(n);
        let size = encode_message(&schema, &message.graph, message.root)
            .unwrap()
            .len();
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &message, |b, message| {
            b.iter(|| encode_message(&schema, &message.graph, message.root).unwrap());
        });
    }
    group.finish();
}

fn bench_encode_anchorless(c: &mut Criterion) {
    let schema = Schema::new();
    let message = records(100);
    let encoder = Encoder::new(&schema).with_config(EncoderConfig {
        anchorless: true,
        ..EncoderConfig::default()
    });

    c.bench_function("encode_anchorless", |b| {
        b.iter(|| encoder.encode(&message.graph, message.root).unwrap());
    });
}

fn bench_encode_instances(c: &mut Criterion) {
    let generic = point_instances(1_000);
    let empty = Schema::new();

    let schema = schema();
    let mut graph = Graph::new();
    let natives: Vec<_> = (0..1_000).map(|i| point(&mut graph, i, -i)).collect();
    let root = graph.list(natives);

    let mut group = c.benchmark_group("encode_instances");
    group.bench_function("generic", |b| {
        b.iter(|| encode_message(&empty, &generic.graph, generic.root).unwrap());
    });
    group.bench_function("native", |b| {
        b.iter(|| encode_message(&schema, &graph, root).unwrap());
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_encode_small,
    bench_encode_records,
    bench_encode_anchorless,
    bench_encode_instances
);
criterion_main!(benches);
