//! Welch power spectral density and band power.
//!
//! Segments of `seg_len` samples with 50 % overlap are mean-removed,
//! Hamming-windowed and transformed; their one-sided periodograms (density
//! scaling, V²/Hz) are averaged.  Band power is the arithmetic mean of the
//! PSD bins inside `[f_min, f_max]`, as in
//! `psd_array_welch(x, sfreq, fmin, fmax, n_fft).mean()`.
//!
//! A series shorter than `seg_len` is analysed with a single segment of the
//! series' own length rather than rejected.
use std::cell::RefCell;

use rustfft::{num_complex::Complex, FftPlanner};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::filter::hamming;

thread_local! {
    static FFT_PLANNER: RefCell<FftPlanner<f64>> = RefCell::new(FftPlanner::new());
}

/// One-sided power spectral density.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Psd {
    /// Bin centre frequencies in Hz, `k · sfreq / n_per_seg`.
    pub freqs: Vec<f64>,
    /// Power density per bin.
    pub psd: Vec<f64>,
    /// Segment length actually used.
    pub n_per_seg: usize,
    /// Number of averaged segments.
    pub n_segments: usize,
}

impl Psd {
    /// Mean density over bins with `f_min ≤ f ≤ f_max`.
    pub fn band_mean(&self, f_min: f64, f_max: f64) -> Option<f64> {
        let (sum, count) = self
            .freqs
            .iter()
            .zip(&self.psd)
            .filter(|(f, _)| (f_min..=f_max).contains(*f))
            .fold((0.0, 0usize), |(s, c), (_, &p)| (s + p, c + 1));
        (count > 0).then(|| sum / count as f64)
    }
}

/// Welch PSD of `x` sampled at `sfreq`.
pub fn welch_psd(x: &[f64], sfreq: f64, seg_len: usize) -> Result<Psd> {
    let n = x.len();
    if n == 0 {
        return Err(Error::InsufficientSamples("empty series".into()));
    }
    if seg_len == 0 {
        return Err(Error::InvalidConfiguration("Welch segment length is zero".into()));
    }
    let n_per_seg = seg_len.min(n);
    if n_per_seg < seg_len {
        log::debug!("Welch: {n} samples < segment {seg_len}, using one {n}-sample segment");
    }
    let step = (n_per_seg - n_per_seg / 2).max(1);

    let window = hamming(n_per_seg);
    let scale = 1.0 / (sfreq * window.iter().map(|w| w * w).sum::<f64>());
    let n_freqs = n_per_seg / 2 + 1;
    // Bins that appear twice in the full spectrum (everything but DC and,
    // for even lengths, Nyquist).
    let doubled_end = if n_per_seg % 2 == 0 { n_freqs - 1 } else { n_freqs };

    let fft = FFT_PLANNER.with(|p| p.borrow_mut().plan_fft_forward(n_per_seg));
    let mut acc = vec![0.0_f64; n_freqs];
    let mut buf = vec![Complex::default(); n_per_seg];
    let mut n_segments = 0usize;

    for start in (0..=n - n_per_seg).step_by(step) {
        let seg = &x[start..start + n_per_seg];
        let mean = seg.iter().sum::<f64>() / n_per_seg as f64;
        for ((b, &v), &w) in buf.iter_mut().zip(seg).zip(&window) {
            *b = Complex { re: (v - mean) * w, im: 0.0 };
        }
        fft.process(&mut buf);
        for (k, a) in acc.iter_mut().enumerate() {
            let mut p = buf[k].norm_sqr() * scale;
            if k > 0 && k < doubled_end {
                p *= 2.0;
            }
            *a += p;
        }
        n_segments += 1;
    }

    let inv = 1.0 / n_segments as f64;
    Ok(Psd {
        freqs: (0..n_freqs).map(|k| k as f64 * sfreq / n_per_seg as f64).collect(),
        psd: acc.into_iter().map(|v| v * inv).collect(),
        n_per_seg,
        n_segments,
    })
}

/// Average Welch power of `x` within `band = (f_min, f_max)` Hz.
pub fn band_power(x: &[f64], sfreq: f64, band: (f64, f64), seg_len: usize) -> Result<f64> {
    let (f_min, f_max) = band;
    let nyq = sfreq / 2.0;
    if !(f_min >= 0.0 && f_max > f_min && f_max <= nyq) {
        return Err(Error::InvalidConfiguration(format!(
            "band {f_min}–{f_max} Hz is not inside [0, {nyq}] Hz"
        )));
    }
    let psd = welch_psd(x, sfreq, seg_len)?;
    psd.band_mean(f_min, f_max).ok_or_else(|| {
        Error::InsufficientSamples(format!(
            "no frequency bin in {f_min}–{f_max} Hz at {:.3} Hz resolution",
            sfreq / psd.n_per_seg as f64
        ))
    })
}
