use criterion::{black_box, criterion_group, criterion_main, Criterion};
use faa::filter::condition;
use faa::spectral::band_power;
use faa::{fit_ica, preprocess, ExcludeNone, PipelineConfig, Recording};
use ndarray::Array2;
use std::f64::consts::PI;

fn synthetic(n_ch: usize, n_t: usize, sfreq: f64) -> Recording {
    let data = Array2::from_shape_fn((n_ch, n_t), |(c, t)| {
        let x = t as f64 / sfreq;
        (1.0 + 0.1 * c as f64) * (2.0 * PI * 10.0 * x).sin()
            + 0.3 * (2.0 * PI * (20.0 + c as f64) * x).sin()
            + 0.1 * ((c * 7919 + t * 104_729) % 1000) as f64 / 1000.0
    });
    let names = (0..n_ch).map(|c| format!("E{c}")).collect();
    Recording::new(names, sfreq, data).expect("valid synthetic recording")
}

fn bench_condition(c: &mut Criterion) {
    let rec = synthetic(32, 250 * 60, 250.0);
    let cfg = PipelineConfig::default();
    c.bench_function("condition 32ch × 60s", |b| {
        b.iter(|| condition(black_box(&rec), &cfg).unwrap())
    });
}

fn bench_ica(c: &mut Criterion) {
    let cfg = PipelineConfig::default();
    let rec = condition(&synthetic(16, 250 * 30, 250.0), &cfg).unwrap();
    c.bench_function("fit_ica 16ch × 30s", |b| b.iter(|| fit_ica(black_box(&rec), &cfg).unwrap()));
}

fn bench_welch(c: &mut Criterion) {
    let rec = synthetic(1, 250 * 300, 250.0);
    let x = rec.data().row(0).to_vec();
    c.bench_function("band_power 300s", |b| {
        b.iter(|| band_power(black_box(&x), 250.0, (8.0, 13.0), 2048).unwrap())
    });
}

fn bench_preprocess(c: &mut Criterion) {
    let rec = synthetic(8, 250 * 30, 250.0);
    let cfg = PipelineConfig::default();
    let mut group = c.benchmark_group("preprocess");
    group.sample_size(10);
    group.bench_function("8ch × 30s", |b| {
        b.iter(|| preprocess(black_box(&rec), None, &cfg, &ExcludeNone, "bench").unwrap())
    });
    group.finish();
}

criterion_group!(benches, bench_condition, bench_ica, bench_welch, bench_preprocess);
criterion_main!(benches);
