//! Codec benchmarks for tidepool-protocol.

use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use tidepool_protocol::{codec, Response};

fn bench_encode_listing(c: &mut Criterion) {
    let messages: Vec<String> = (0..100).map(|i| format!("message-{i:04}")).collect();
    let response = Response::Messages(messages);
    let size = response.to_bytes().len() as u64;

    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Bytes(size));
    group.bench_function("listing_100", |b| {
        b.iter(|| {
            let mut buf = BytesMut::with_capacity(size as usize);
            black_box(&response).encode_into(&mut buf);
            buf
        })
    });
    group.finish();
}

fn bench_decode_lines(c: &mut Criterion) {
    let mut encoded = BytesMut::new();
    for i in 0..100 {
        codec::encode_line(&format!("line-{i:04}"), &mut encoded);
    }
    let encoded = encoded.freeze();

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(encoded.len() as u64));
    group.bench_function("lines_100", |b| {
        b.iter(|| {
            let mut buf = BytesMut::from(&encoded[..]);
            let mut count = 0;
            while let Ok(Some(_line)) = codec::decode_line_from(black_box(&mut buf)) {
                count += 1;
            }
            count
        })
    });
    group.finish();
}

criterion_group!(benches, bench_encode_listing, bench_decode_lines);
criterion_main!(benches);
