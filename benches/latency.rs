//! Latency benchmarks for hot-path security operations.
//!
//! Run with: `cargo bench --bench latency`

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use security::{
    anonymize_data, hash_data, sanitize_input, AuditAction, AuditActor, AuditFilter, AuditLog,
    AuditLogEntry, RateLimiter, SessionCipher,
};
use serde_json::json;
use std::time::Duration;

fn entry(i: usize) -> AuditLogEntry {
    AuditLogEntry {
        timestamp: Utc::now(),
        action: if i % 3 == 0 {
            AuditAction::LoginFailed
        } else {
            AuditAction::SuspiciousActivity
        },
        user: AuditActor::Anonymous,
        details: json!({ "sensorId": format!("s-{}", i) }),
    }
}

/// Benchmark rate-limit checks over a growing set of identifiers.
fn bench_rate_limit(c: &mut Criterion) {
    let mut group = c.benchmark_group("rate_limit");
    let window = Duration::from_secs(60);

    for identifiers in [1usize, 100, 10_000].iter() {
        let limiter = RateLimiter::new();
        let keys: Vec<String> = (0..*identifiers).map(|i| format!("sensor_{}", i)).collect();
        let mut next = 0usize;

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::new("check", identifiers),
            &keys,
            |b, keys| {
                b.iter(|| {
                    let key = &keys[next % keys.len()];
                    next = next.wrapping_add(1);
                    black_box(limiter.check(black_box(key), 10, window, Utc::now()))
                })
            },
        );
    }

    group.finish();
}

/// Benchmark audit appends at capacity and filtered queries.
fn bench_audit_log(c: &mut Criterion) {
    let mut group = c.benchmark_group("audit_log");

    let log = AuditLog::new(1000);
    for i in 0..1000 {
        log.append(entry(i));
    }

    group.throughput(Throughput::Elements(1));
    group.bench_function("append_at_capacity", |b| {
        let mut i = 0usize;
        b.iter(|| {
            i += 1;
            log.append(black_box(entry(i)))
        })
    });

    let filter = AuditFilter::new().action(AuditAction::LoginFailed).limit(50);
    group.bench_function("query_by_action", |b| {
        b.iter(|| black_box(log.query(black_box(&filter))))
    });

    group.bench_function("recent_50", |b| b.iter(|| black_box(log.recent(50))));

    group.finish();
}

/// Benchmark session blob encryption.
fn bench_session_cipher(c: &mut Criterion) {
    let mut group = c.benchmark_group("session_cipher");
    let cipher = SessionCipher::generate();
    let plain = json!({
        "token": "a".repeat(64),
        "refreshToken": "b".repeat(64),
        "expiresAt": 1_700_000_000_000i64,
    })
    .to_string();
    let blob = cipher.encrypt(&plain).unwrap_or_default();

    group.throughput(Throughput::Bytes(plain.len() as u64));
    group.bench_function("encrypt", |b| b.iter(|| black_box(cipher.encrypt(black_box(&plain)))));
    group.bench_function("decrypt", |b| b.iter(|| black_box(cipher.decrypt(black_box(&blob)))));

    group.finish();
}

/// Benchmark privacy helpers.
fn bench_privacy(c: &mut Criterion) {
    let mut group = c.benchmark_group("privacy");

    let record = json!({
        "sensorId": "s-1",
        "userId": "u-1",
        "deviceId": "d-1",
        "value": 42.5,
        "location": { "lat": 37.774929, "lng": -122.419416 },
    });
    group.bench_function("anonymize_data", |b| {
        b.iter(|| black_box(anonymize_data(black_box(&record))))
    });

    let input = "<img src=x onerror=alert(1)> javascript:void(0) River Trust";
    group.bench_function("sanitize_input", |b| {
        b.iter(|| black_box(sanitize_input(black_box(input))))
    });

    group.bench_function("hash_data", |b| {
        b.iter(|| black_box(hash_data(black_box("sensor-s-1:42.5"))))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_rate_limit,
    bench_audit_log,
    bench_session_cipher,
    bench_privacy,
);

criterion_main!(benches);
