//! Latency benchmarks for tidepool.
//!
//! These benchmarks focus on the per-command work a handler does.

use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::Instant;
use tidepool_core::{validate_topic_name, Message, TopicStore};
use tidepool_protocol::{decode_line_from, Command, Response};

/// Benchmark one full PUBLISH as the handler performs it.
fn bench_publish_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish_path");

    group.bench_function("existing_topic", |b| {
        let store = TopicStore::new();
        store.get_or_create("orders").unwrap();

        b.iter_custom(|iters| {
            let mut buf = BytesMut::with_capacity(1024);
            let start = Instant::now();
            for _ in 0..iters {
                buf.extend_from_slice(b"PUBLISH\norders\nurgent\n");
                let command = decode_line_from(&mut buf).unwrap().unwrap();
                black_box(Command::parse(&command));
                let topic = decode_line_from(&mut buf).unwrap().unwrap();
                let content = decode_line_from(&mut buf).unwrap().unwrap();
                store
                    .get_or_create(&topic)
                    .unwrap()
                    .append(Message::new(content));
            }
            start.elapsed()
        });
    });

    group.finish();
}

/// Benchmark topic lookup against a populated store.
fn bench_topic_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("topic_lookup");

    let store = TopicStore::new();
    for i in 0..1000 {
        store.get_or_create(&format!("topic:{i}")).unwrap();
    }

    group.bench_function("get_existing", |b| {
        let mut i = 0;
        b.iter(|| {
            let name = format!("topic:{}", i % 1000);
            i += 1;
            store.get(black_box(&name)).is_ok()
        });
    });

    group.bench_function("get_missing", |b| {
        b.iter(|| store.get(black_box("no-such-topic")).is_err());
    });

    group.bench_function("get_or_create_existing", |b| {
        b.iter(|| store.get_or_create(black_box("topic:500")).is_ok());
    });

    group.bench_function("validate_name", |b| {
        b.iter(|| validate_topic_name(black_box("   orders   ")).is_ok());
    });

    group.finish();
}

/// Benchmark encoding the fixed single-line replies.
fn bench_response_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("response_encoding");
    let mut buf = BytesMut::with_capacity(256);

    group.bench_function("published", |b| {
        b.iter(|| {
            buf.clear();
            black_box(&Response::Published).encode_into(&mut buf);
        });
    });

    group.bench_function("unknown_command", |b| {
        let response = Response::UnknownCommand("SUBSCRIBE".to_string());
        b.iter(|| {
            buf.clear();
            black_box(&response).encode_into(&mut buf);
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_publish_path,
    bench_topic_lookup,
    bench_response_encoding,
);
criterion_main!(benches);
