//! Cron 表达式解析与下次触发时间计算基准测试

use chrono::{TimeZone, Utc};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use seohub::scheduler::CronSchedule;

const EXPRESSIONS: &[(&str, &str)] = &[
    ("every_minute", "* * * * *"),
    ("daily", "@daily"),
    ("weekday_mornings", "30 8 * * 1-5"),
    ("stepped", "*/15 9-17 * * *"),
    ("monthly_list", "0 6 1,15 * *"),
];

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("cron/parse");

    for (name, expr) in EXPRESSIONS {
        group.bench_with_input(BenchmarkId::from_parameter(name), expr, |b, expr| {
            b.iter(|| CronSchedule::parse(expr).expect("valid expression"));
        });
    }

    group.bench_function("invalid", |b| {
        b.iter(|| assert!(CronSchedule::parse("61 * * * *").is_err()));
    });

    group.finish();
}

fn bench_next_after(c: &mut Criterion) {
    let mut group = c.benchmark_group("cron/next_after");
    let start = Utc.with_ymd_and_hms(2026, 3, 14, 15, 9, 26).unwrap();

    for (name, expr) in EXPRESSIONS {
        let schedule = CronSchedule::parse(expr).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(name), &schedule, |b, s| {
            b.iter(|| s.next_after(start).expect("has next"));
        });
    }

    // 一年只触发一次，最坏情况
    let yearly = CronSchedule::parse("0 0 29 2 *").unwrap();
    group.bench_function("leap_day", |b| {
        b.iter(|| yearly.next_after(start).expect("has next"));
    });

    group.finish();
}

fn bench_upcoming(c: &mut Criterion) {
    let mut group = c.benchmark_group("cron/upcoming");
    let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let schedule = CronSchedule::parse("*/15 9-17 * * 1-5").unwrap();

    for count in [5usize, 50, 500] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let runs = schedule.upcoming(start, count);
                assert_eq!(runs.len(), count);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parse, bench_next_after, bench_upcoming);
criterion_main!(benches);
