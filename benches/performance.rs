//! Performance benchmarks for the event registry and envelope codec.

use connector_events::{
    Alert, Envelope, EventMetadata, EventRegistry, PublishOptions, Severity, State,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// Benchmark publishing into a registry already holding `streams` records
fn bench_alert_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("alert_publish");

    for streams in [10, 1000, 10000] {
        group.bench_with_input(BenchmarkId::new("streams", streams), &streams, |b, &n| {
            let mut registry = EventRegistry::new();
            let alert = Alert::new("lag", "consumer lagging", Severity::Warning, State::Unhealthy);
            registry.register_alert(&alert);

            for i in 0..n {
                alert
                    .publish(PublishOptions::new().with_stream_id(format!("s{}", i)))
                    .unwrap();
            }

            let mut i = 0u64;
            b.iter(|| {
                i += 1;
                let options = PublishOptions::new()
                    .with_stream_id(format!("s{}", i % n as u64))
                    .with_metadata(EventMetadata::new().with_extra("seq", i as i64));
                alert.publish(black_box(options)).unwrap();
            });
        });
    }

    group.finish();
}

/// Benchmark scraping a snapshot of the registry
fn bench_list_events(c: &mut Criterion) {
    let mut group = c.benchmark_group("list_events");

    for streams in [10, 1000, 10000] {
        group.bench_with_input(BenchmarkId::new("streams", streams), &streams, |b, &n| {
            let mut registry = EventRegistry::new();
            let alert = Alert::new("lag", "consumer lagging", Severity::Warning, State::Unhealthy);
            registry.register_alert(&alert);
            for i in 0..n {
                alert
                    .publish(PublishOptions::new().with_stream_id(format!("s{}", i)))
                    .unwrap();
            }

            b.iter(|| black_box(registry.list_events()));
        });
    }

    group.finish();
}

/// Benchmark envelope encode/decode with varying batch sizes
fn bench_envelope_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("envelope_codec");

    for batch in [1, 16, 256] {
        let payloads: Vec<Vec<u8>> = (0..batch).map(|i| vec![i as u8; 256]).collect();
        let envelope = Envelope::new(payloads);
        let bytes = envelope.encode().unwrap();

        group.bench_with_input(BenchmarkId::new("encode", batch), &envelope, |b, env| {
            b.iter(|| black_box(env.encode().unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("decode", batch), &bytes, |b, data| {
            b.iter(|| black_box(Envelope::decode(data).unwrap()))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_alert_publish,
    bench_list_events,
    bench_envelope_codec,
);

criterion_main!(benches);
