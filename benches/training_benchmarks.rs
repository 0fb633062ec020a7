use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use habitrs::{simulate_history, Engine, FeatureBuilder, PredictionInput, SimulationParams};

/// Training throughput benchmarks
///
/// Histories of increasing length show how the full fit pass scales.

fn params(days: i64) -> SimulationParams {
    SimulationParams {
        history_days: days,
        seed: Some(42),
        end_date: NaiveDate::from_ymd_opt(2024, 12, 31),
        ..SimulationParams::default()
    }
}

fn bench_simulation(c: &mut Criterion) {
    let mut group = c.benchmark_group("Simulation");

    for &days in &[30i64, 90, 365, 1000] {
        group.throughput(Throughput::Elements(days as u64));
        group.bench_with_input(BenchmarkId::new("simulate_history", days), &days, |b, &days| {
            b.iter(|| simulate_history(black_box(&params(days))));
        });
    }

    group.finish();
}

fn bench_feature_building(c: &mut Criterion) {
    let mut group = c.benchmark_group("Feature Building");
    let builder = FeatureBuilder::new();

    for &days in &[90i64, 365, 1000] {
        let history = match simulate_history(&params(days)) {
            Ok(history) => history,
            Err(_) => continue,
        };
        group.throughput(Throughput::Elements(days as u64));
        group.bench_with_input(BenchmarkId::new("build", days), &history, |b, history| {
            b.iter(|| builder.build(black_box(history)));
        });
    }

    group.finish();
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("Training");
    group.sample_size(10);

    for &days in &[90i64, 365, 1000] {
        group.throughput(Throughput::Elements(days as u64));
        group.bench_with_input(BenchmarkId::new("simulate_train", days), &days, |b, &days| {
            let engine = Engine::default();
            b.iter(|| engine.simulate_train(black_box(&params(days))));
        });
    }

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let engine = Engine::default();
    if engine.simulate_train(&params(365)).is_err() {
        return;
    }
    let input = PredictionInput {
        steps: 7200,
        sleep_hours: 6.5,
        exercise_minutes: 0,
    };

    c.bench_function("predict_after_365_days", |b| {
        b.iter(|| engine.predict(black_box(&input)));
    });
}

criterion_group!(
    benches,
    bench_simulation,
    bench_feature_building,
    bench_training,
    bench_prediction
);
criterion_main!(benches);
