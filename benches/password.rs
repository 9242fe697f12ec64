//! Argon2 密码哈希与 webhook 签名性能基准测试

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use seohub::utils::password::{hash_password, verify_password};
use seohub::utils::signature;

fn bench_hash_password(c: &mut Criterion) {
    c.bench_function("password/hash", |b| {
        b.iter(|| {
            let _ = hash_password("test_password_123");
        });
    });
}

fn bench_verify_password(c: &mut Criterion) {
    let password = "correct_password_456";
    let hash = hash_password(password).expect("hash should succeed");

    let mut group = c.benchmark_group("password/verify");
    group.bench_function("correct", |b| {
        b.iter(|| {
            let result = verify_password(password, &hash).expect("verify should succeed");
            assert!(result);
        });
    });
    group.bench_function("wrong", |b| {
        b.iter(|| {
            let result = verify_password("wrong_password", &hash).expect("verify should succeed");
            assert!(!result);
        });
    });
    group.finish();
}

fn bench_webhook_signature(c: &mut Criterion) {
    let mut group = c.benchmark_group("signature/verify");

    for size in [256usize, 4 * 1024, 64 * 1024] {
        let body = vec![b'x'; size];
        let header = signature::sign("whsec_bench", &body);
        group.bench_with_input(BenchmarkId::from_parameter(size), &body, |b, body| {
            b.iter(|| assert!(signature::verify("whsec_bench", body, &header)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_hash_password,
    bench_verify_password,
    bench_webhook_signature,
);
criterion_main!(benches);
