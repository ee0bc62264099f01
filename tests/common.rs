/// Shared helpers: synthetic EEG-like signals.
use faa::{Recording, SpatialLayout};
use ndarray::Array2;
use std::f64::consts::PI;

#[allow(unused)]
/// `amp · sin(2π f t)` sampled at `sfreq`.
pub fn sine(amp: f64, freq: f64, sfreq: f64, n: usize) -> Vec<f64> {
    (0..n).map(|i| amp * (2.0 * PI * freq * i as f64 / sfreq).sin()).collect()
}

#[allow(unused)]
/// Deterministic pseudo-noise in [-1, 1) (xorshift64*).
pub fn noise(seed: u64, n: usize) -> Vec<f64> {
    let mut s = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
    (0..n)
        .map(|_| {
            s ^= s >> 12;
            s ^= s << 25;
            s ^= s >> 27;
            let v = s.wrapping_mul(0x2545_F491_4F6C_DD1D) >> 11;
            v as f64 / (1u64 << 52) as f64 - 1.0
        })
        .collect()
}

#[allow(unused)]
/// Build a recording from named rows.
pub fn recording(sfreq: f64, rows: Vec<(&str, Vec<f64>)>) -> Recording {
    let n_t = rows[0].1.len();
    let names: Vec<String> = rows.iter().map(|(n, _)| n.to_string()).collect();
    let flat: Vec<f64> = rows.into_iter().flat_map(|(_, r)| r).collect();
    let data = Array2::from_shape_vec((names.len(), n_t), flat).unwrap();
    Recording::new(names, sfreq, data).unwrap()
}

#[allow(unused)]
/// The F3/F4 pair: equal-frequency alpha tones with the given amplitudes.
pub fn alpha_pair(left_amp: f64, right_amp: f64, sfreq: f64, n: usize) -> Recording {
    recording(
        sfreq,
        vec![("F3", sine(left_amp, 10.0, sfreq, n)), ("F4", sine(right_amp, 10.0, sfreq, n))],
    )
}

#[allow(unused)]
/// Eight-channel 10-20 montage with alpha, noise and a per-channel mix.
/// Returns the recording and its 2-D layout.
pub fn montage(sfreq: f64, n: usize) -> (Recording, SpatialLayout) {
    let sites: [(&str, [f64; 2]); 8] = [
        ("Fp1", [-0.3, 0.9]),
        ("Fp2", [0.3, 0.9]),
        ("F3", [-0.5, 0.5]),
        ("F4", [0.5, 0.5]),
        ("C3", [-0.6, 0.0]),
        ("C4", [0.6, 0.0]),
        ("P3", [-0.5, -0.5]),
        ("P4", [0.5, -0.5]),
    ];
    let mut layout = SpatialLayout::new();
    let rows = sites
        .iter()
        .enumerate()
        .map(|(i, (name, pos))| {
            layout.insert_2d(*name, *pos);
            let alpha = sine(1.0 + 0.1 * i as f64, 10.0, sfreq, n);
            let beta = sine(0.3, 21.0 + i as f64, sfreq, n);
            let hiss = noise(i as u64 + 1, n);
            let row = alpha
                .iter()
                .zip(&beta)
                .zip(&hiss)
                .map(|((a, b), h)| a + b + 0.2 * h)
                .collect();
            (*name, row)
        })
        .collect();
    (recording(sfreq, rows), layout)
}

#[allow(unused)]
/// Maximum absolute difference between two slices.
pub fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).fold(0.0, f64::max)
}

#[allow(unused)]
/// Population standard deviation.
pub fn std(a: &[f64]) -> f64 {
    let n = a.len() as f64;
    let mean = a.iter().sum::<f64>() / n;
    (a.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}
