//! FIR filter design matching MNE / `scipy.signal.firwin`.
//!
//! For a band-pass filter `[l_freq, h_freq]` at sampling rate `sfreq`:
//!   • lower transition bandwidth = min(max(0.25 * l_freq, 2.0), l_freq)
//!   • upper transition bandwidth = min(max(0.25 * h_freq, 2.0), nyq - h_freq)
//!   • filter length N = ceil(3.3 / min(l_tb, h_tb) * sfreq), rounded to odd
//!   • windowed-sinc design (Hamming window): lowpass(h_cut) − lowpass(l_cut)
use std::f64::consts::PI;

use crate::error::{Error, Result};

/// MNE transition bandwidth for a lower (highpass) edge.
///
/// Rule: `min(max(0.25 * l_freq, 2.0), l_freq)`
pub fn auto_trans_bandwidth(l_freq: f64) -> f64 {
    (0.25 * l_freq).max(2.0).min(l_freq)
}

/// MNE transition bandwidth for an upper (lowpass) edge.
///
/// Rule: `min(max(0.25 * h_freq, 2.0), nyq - h_freq)`
pub fn auto_trans_bandwidth_high(h_freq: f64, sfreq: f64) -> f64 {
    (0.25 * h_freq).max(2.0).min(sfreq / 2.0 - h_freq)
}

/// Number of FIR taps for a given transition bandwidth.
/// Returns an odd integer (required for zero-phase linear-phase FIR).
///
/// Formula: `ceil(3.3 / trans_bw * sfreq)` rounded up to odd.
pub fn auto_filter_length(trans_bw: f64, sfreq: f64) -> usize {
    let n_raw = (3.3 / trans_bw * sfreq).ceil() as usize;
    if n_raw % 2 == 0 { n_raw + 1 } else { n_raw }
}

/// Design a zero-phase band-pass FIR filter using Hamming-windowed sincs.
///
/// Equivalent to `mne.filter.create_filter(None, sfreq, l_freq, h_freq,
///   filter_length='auto', fir_window='hamming', fir_design='firwin')`
/// up to the passband normalisation (unit gain at DC of each lowpass).
///
/// Fails with `InvalidConfiguration` unless `0 < l_freq < h_freq < nyq`.
pub fn design_bandpass(l_freq: f64, h_freq: f64, sfreq: f64) -> Result<Vec<f64>> {
    let nyq = sfreq / 2.0;
    if !(l_freq > 0.0 && h_freq > l_freq && h_freq < nyq) {
        return Err(Error::InvalidConfiguration(format!(
            "band-pass {l_freq}–{h_freq} Hz is not inside (0, {nyq}) Hz"
        )));
    }

    let l_tb = auto_trans_bandwidth(l_freq);
    let h_tb = auto_trans_bandwidth_high(h_freq, sfreq);
    let n = auto_filter_length(l_tb.min(h_tb), sfreq);

    // firwin cutoffs sit in the middle of each transition band.
    let l_cut = l_freq - l_tb / 2.0;
    let h_cut = h_freq + h_tb / 2.0;

    let lp_high = firwin(n, h_cut, sfreq, true);
    let lp_low = firwin(n, l_cut, sfreq, true);
    Ok(lp_high.iter().zip(&lp_low).map(|(h, l)| h - l).collect())
}

/// Design a lowpass FIR filter using a Hamming-windowed sinc.
///
/// `pass_zero=true` means the DC component passes (lowpass).
/// `cutoff_hz` is the -6 dB point.
pub fn firwin(n: usize, cutoff_hz: f64, sfreq: f64, pass_zero: bool) -> Vec<f64> {
    debug_assert!(n % 2 == 1, "firwin requires odd N for linear-phase filter");
    let alpha = (n - 1) as f64 / 2.0;
    let fc = cutoff_hz / (sfreq / 2.0); // normalised [0, 1]

    let win = hamming(n);

    let mut h: Vec<f64> = (0..n)
        .map(|i| {
            let x = i as f64 - alpha;
            // f(x) = sin(π·fc·x) / (π·x);  lim_{x→0} f(x) = fc
            let sinc = if x == 0.0 { fc } else { (PI * fc * x).sin() / (PI * x) };
            sinc * win[i]
        })
        .collect();

    // Unit DC gain.
    let s: f64 = h.iter().sum();
    h.iter_mut().for_each(|v| *v /= s);

    if !pass_zero {
        h.iter_mut().for_each(|v| *v = -*v);
        h[n / 2] += 1.0;
    }

    h
}

/// Hamming window of length `n` (symmetric).
pub fn hamming(n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![1.0];
    }
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (n - 1) as f64).cos())
        .collect()
}

/// Magnitude response of an FIR filter at `freq` Hz.
pub fn fir_gain(h: &[f64], freq: f64, sfreq: f64) -> f64 {
    let w = 2.0 * PI * freq / sfreq;
    let (re, im) = h.iter().enumerate().fold((0.0, 0.0), |(re, im), (k, &c)| {
        (re + c * (w * k as f64).cos(), im - c * (w * k as f64).sin())
    });
    (re * re + im * im).sqrt()
}
