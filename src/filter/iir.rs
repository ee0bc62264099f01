//! IIR notch filtering.
//!
//! Each notch is a second-order section (RBJ biquad) in Direct Form II
//! Transposed.  The cascade is run forward and then backward over a
//! reflect-limited padded copy of the signal, which cancels the phase
//! response and squares the magnitude response (zero-phase, like
//! `scipy.signal.filtfilt` behind `raw.notch_filter(method='iir')`).
use std::f64::consts::PI;

use ndarray::{Array2, ArrayView1};

use super::apply::reflect_limited_pad;

/// Biquad coefficients, normalised so that `a0 = 1`.
///
/// `H(z) = (b0 + b1 z⁻¹ + b2 z⁻²) / (1 + a1 z⁻¹ + a2 z⁻²)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl Biquad {
    /// Notch at `freq` Hz with quality factor `q` (centre / bandwidth).
    pub fn notch(freq: f64, sfreq: f64, q: f64) -> Self {
        let w0 = 2.0 * PI * freq / sfreq;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);
        let a0 = 1.0 + alpha;
        Self {
            b0: 1.0 / a0,
            b1: -2.0 * cos_w0 / a0,
            b2: 1.0 / a0,
            a1: -2.0 * cos_w0 / a0,
            a2: (1.0 - alpha) / a0,
        }
    }

    /// Single-pass magnitude response at `freq` Hz.
    pub fn gain(&self, freq: f64, sfreq: f64) -> f64 {
        let w = 2.0 * PI * freq / sfreq;
        let (c1, s1, c2, s2) = (w.cos(), w.sin(), (2.0 * w).cos(), (2.0 * w).sin());
        let num_re = self.b0 + self.b1 * c1 + self.b2 * c2;
        let num_im = -(self.b1 * s1 + self.b2 * s2);
        let den_re = 1.0 + self.a1 * c1 + self.a2 * c2;
        let den_im = -(self.a1 * s1 + self.a2 * s2);
        ((num_re * num_re + num_im * num_im) / (den_re * den_re + den_im * den_im)).sqrt()
    }

    fn run(&self, x: &mut [f64]) {
        let (mut z1, mut z2) = (0.0, 0.0);
        for v in x.iter_mut() {
            let input = *v;
            let out = self.b0 * input + z1;
            z1 = self.b1 * input - self.a1 * out + z2;
            z2 = self.b2 * input - self.a2 * out;
            *v = out;
        }
    }
}

/// Notch sections for `fundamental` and its multiples up to `n_harmonics`,
/// skipping any at or above Nyquist.
pub fn design_notch(fundamental: f64, n_harmonics: usize, q: f64, sfreq: f64) -> Vec<Biquad> {
    let nyq = sfreq / 2.0;
    (1..=n_harmonics)
        .map(|k| fundamental * k as f64)
        .filter(|&f| {
            let keep = f < nyq;
            if !keep {
                log::debug!("notch at {f} Hz skipped (Nyquist {nyq} Hz)");
            }
            keep
        })
        .map(|f| Biquad::notch(f, sfreq, q))
        .collect()
}

/// Number of padding samples needed for the notch transient to die out.
///
/// The pole radius is `1 - alpha`, so the envelope decays by `e` every
/// `~1/alpha` samples; pad for eight time constants.
fn settle_len(sections: &[Biquad]) -> usize {
    sections
        .iter()
        .map(|s| {
            let r = s.a2.max(0.0).sqrt();
            if r >= 1.0 { 0 } else { (8.0 / (1.0 - r)).ceil() as usize }
        })
        .max()
        .unwrap_or(0)
}

/// Zero-phase (forward-backward) application of a biquad cascade to one
/// series.
pub fn filtfilt(x: &[f64], sections: &[Biquad]) -> Vec<f64> {
    let n = x.len();
    if n == 0 || sections.is_empty() {
        return x.to_vec();
    }
    let pad = settle_len(sections).min(n - 1);
    let mut ext = reflect_limited_pad(x, pad, pad);

    for s in sections {
        s.run(&mut ext);
    }
    ext.reverse();
    for s in sections {
        s.run(&mut ext);
    }
    ext.reverse();

    ext[pad..pad + n].to_vec()
}

/// Apply [`filtfilt`] to every channel of `data` ([C, T]) in-place.
pub fn apply_iir_zero_phase(data: &mut Array2<f64>, sections: &[Biquad]) {
    if sections.is_empty() {
        return;
    }
    for mut row in data.rows_mut() {
        let y = filtfilt(&row.to_vec(), sections);
        row.assign(&ArrayView1::from(&y));
    }
}
