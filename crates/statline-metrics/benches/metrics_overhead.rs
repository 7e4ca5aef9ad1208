//! Benchmark metrics recording and export overhead
//!
//! Compares hot-path recording against an uninstrumented baseline and measures
//! how export cost grows with the number of registered metrics.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use statline_metrics::{MetricsRegistry, SummaryConfig};
use std::hint::black_box;
use std::time::{Duration, Instant};

/// Loop without any recording
fn baseline(iterations: u64) -> Duration {
    let start = Instant::now();

    for i in 0..iterations {
        black_box(i % 10_000);
    }

    start.elapsed()
}

/// Counter looked up by name on every iteration
fn counter_lookup(iterations: u64, registry: &MetricsRegistry) -> Duration {
    let start = Instant::now();

    for i in 0..iterations {
        if let Ok(counter) = registry.counter("requests") {
            counter.inc();
        }
        black_box(i);
    }

    start.elapsed()
}

/// Counter handle resolved once and reused
fn counter_handle(iterations: u64, registry: &MetricsRegistry) -> Duration {
    let start = Instant::now();

    if let Ok(counter) = registry.counter("requests_cached") {
        for i in 0..iterations {
            counter.inc();
            black_box(i);
        }
    }

    start.elapsed()
}

/// Histogram observations, with and without an aging window
fn histogram_observe(iterations: u64, registry: &MetricsRegistry, name: &str) -> Duration {
    let start = Instant::now();

    if let Ok(histogram) = registry.histogram(name) {
        for i in 0..iterations {
            histogram.observe((i % 10_000) as f64);
        }
    }

    start.elapsed()
}

fn bench_counter_overhead(c: &mut Criterion) {
    let registry = MetricsRegistry::new();
    let mut group = c.benchmark_group("counter_overhead");

    for iterations in [1_000, 10_000, 100_000] {
        group.bench_with_input(
            BenchmarkId::new("baseline", iterations),
            &iterations,
            |b, &iterations| {
                b.iter(|| baseline(iterations));
            },
        );

        group.bench_with_input(
            BenchmarkId::new("lookup", iterations),
            &iterations,
            |b, &iterations| {
                b.iter(|| counter_lookup(iterations, &registry));
            },
        );

        group.bench_with_input(
            BenchmarkId::new("handle", iterations),
            &iterations,
            |b, &iterations| {
                b.iter(|| counter_handle(iterations, &registry));
            },
        );
    }

    group.finish();
}

fn bench_histogram_overhead(c: &mut Criterion) {
    let registry = MetricsRegistry::new();
    registry
        .histogram_with("windowed", SummaryConfig::windowed(600))
        .ok();
    let mut group = c.benchmark_group("histogram_overhead");

    for iterations in [1_000, 10_000, 100_000] {
        group.bench_with_input(
            BenchmarkId::new("cumulative", iterations),
            &iterations,
            |b, &iterations| {
                b.iter(|| histogram_observe(iterations, &registry, "cumulative"));
            },
        );

        // Windowed summaries write into every age bucket
        group.bench_with_input(
            BenchmarkId::new("windowed", iterations),
            &iterations,
            |b, &iterations| {
                b.iter(|| histogram_observe(iterations, &registry, "windowed"));
            },
        );
    }

    group.finish();
}

fn bench_timer(c: &mut Criterion) {
    let registry = MetricsRegistry::new();

    c.bench_function("timer_time_closure", |b| {
        b.iter(|| {
            registry
                .timer("op")
                .map(|timer| timer.time(|| black_box(21) * 2))
        });
    });

    c.bench_function("timer_guard", |b| {
        b.iter(|| {
            if let Ok(timer) = registry.timer("guarded") {
                let guard = timer.start();
                black_box(guard.stop());
            }
        });
    });
}

fn bench_export(c: &mut Criterion) {
    let mut group = c.benchmark_group("export");

    for metrics in [10, 100, 1_000] {
        let registry = MetricsRegistry::new();
        registry.set_project_name("bench");
        registry.set_static_labels([("env", "bench")]).unwrap();
        for i in 0..metrics {
            if let Ok(counter) = registry.counter(&format!("requests_{}", i)) {
                counter.inc();
            }
            if let Ok(timer) = registry.timer(&format!("op_{}", i)) {
                timer.observe_duration(Duration::from_micros(i as u64 + 1));
            }
            registry.gauge(&format!("depth_{}", i), move || i).unwrap();
        }

        group.bench_with_input(
            BenchmarkId::new("prometheus", metrics),
            &registry,
            |b, registry| {
                b.iter(|| black_box(registry.to_prometheus()));
            },
        );

        group.bench_with_input(
            BenchmarkId::new("json", metrics),
            &registry,
            |b, registry| {
                b.iter(|| black_box(registry.to_json()));
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_counter_overhead,
    bench_histogram_overhead,
    bench_timer,
    bench_export
);
criterion_main!(benches);
