//! Criterion benchmarks for the token wire codec.
//!
//! Run with:
//! ```bash
//! cargo bench --package cubelink-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use cubelink_core::{decode_token, encode_token, TokenId};

fn bench_encode(c: &mut Criterion) {
    let short = TokenId::from("cube_1");
    let long = TokenId::new("cube_".repeat(64));

    c.bench_function("encode_token/short", |b| {
        b.iter(|| encode_token(black_box(&short)).unwrap())
    });
    c.bench_function("encode_token/long", |b| {
        b.iter(|| encode_token(black_box(&long)).unwrap())
    });
}

fn bench_decode(c: &mut Criterion) {
    let short = encode_token(&TokenId::from("cube_1")).unwrap();
    let long = encode_token(&TokenId::new("cube_".repeat(64))).unwrap();

    c.bench_function("decode_token/short", |b| {
        b.iter(|| decode_token(black_box(&short)).unwrap())
    });
    c.bench_function("decode_token/long", |b| {
        b.iter(|| decode_token(black_box(&long)).unwrap())
    });
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
