use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use sono_core::{
    AnalyzerConfig, BioacousticAnalyzer, ChirpSource, FlatSpectrogram, FormsComputer, PhasePoint,
    SweepParams, compute_persistent_homology,
};

fn cloud(n: usize, seed: u64) -> Vec<PhasePoint> {
    let mut rng = SmallRng::seed_from_u64(seed);
    (0..n)
        .map(|_| PhasePoint::new(rng.random_range(0.0..4.0), rng.random_range(0.0..40.0)))
        .collect()
}

fn bench_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("persistence_sweep");
    for n in [32, 128, 256] {
        let points = cloud(n, 42);
        group.bench_with_input(BenchmarkId::from_parameter(n), &points, |b, pts| {
            b.iter(|| compute_persistent_homology(black_box(pts), SweepParams::default()))
        });
    }
    group.finish();
}

fn bench_forms(c: &mut Criterion) {
    let mut rng = SmallRng::seed_from_u64(7);
    let data: Vec<f32> = (0..100 * 128).map(|_| rng.random_range(0.0..1.0)).collect();
    let spectrogram = FlatSpectrogram::new(data, 100, 128);
    let mut computer = FormsComputer::new(44_100.0);
    c.bench_function("forms_100x128", |b| {
        b.iter(|| computer.compute_forms_from_spectrogram(black_box(&spectrogram)))
    });
}

fn bench_tick(c: &mut Criterion) {
    let mut analyzer = BioacousticAnalyzer::new(AnalyzerConfig::default());
    analyzer.connect(Box::new(ChirpSource::songbird(44_100.0)));
    for _ in 0..analyzer.config().warmup_frames {
        analyzer.process_frame();
    }
    c.bench_function("analysis_tick", |b| {
        b.iter(|| {
            analyzer.process_frame();
            // Keep the current list from growing across iterations.
            analyzer.integrator_mut().clear();
        })
    });
}

criterion_group!(benches, bench_sweep, bench_forms, bench_tick);
criterion_main!(benches);
