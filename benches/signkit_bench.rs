#![allow(clippy::expect_used)]

use criterion::{criterion_group, criterion_main, Criterion};
use serde_json::json;

use signkit::serializer::Serializer;
use signkit::signer::Signer;

fn bench_signer(c: &mut Criterion) {
    let signer = Signer::new("bench-secret-key").expect("signer");
    let token = signer.sign(b"benchmark payload value");

    c.bench_function("signer_sign", |b| {
        b.iter(|| signer.sign(b"benchmark payload value"));
    });
    c.bench_function("signer_unsign", |b| {
        b.iter(|| signer.unsign(&token).expect("unsign"));
    });
}

fn bench_serializer(c: &mut Criterion) {
    let serializer = Serializer::new("bench-secret-key").expect("serializer");
    let value = json!({"user": "alice", "scopes": ["read", "write"], "n": 42});
    let token = serializer.dumps(&value).expect("dumps");
    let urlsafe = serializer.urlsafe_dumps(&value).expect("dumps");

    c.bench_function("serializer_dumps", |b| {
        b.iter(|| serializer.dumps(&value).expect("dumps"));
    });
    c.bench_function("serializer_loads", |b| {
        b.iter(|| serializer.loads(&token).expect("loads"));
    });
    c.bench_function("serializer_urlsafe_loads", |b| {
        b.iter(|| serializer.urlsafe_loads(&urlsafe).expect("loads"));
    });
}

criterion_group!(benches, bench_signer, bench_serializer);
criterion_main!(benches);
