//! Statistical bad-channel detection.
//!
//! A channel is flagged when its standard deviation (ddof = 0) exceeds
//! `multiplier × median(per-channel std)`.  With fewer than two channels
//! there is nothing to compare against and nothing is flagged.
use ndarray::{Array2, Axis};

use crate::recording::{BadChannelSet, Recording};

/// Population standard deviation of every channel (`[C]`).
pub fn channel_std(data: &Array2<f64>) -> Vec<f64> {
    data.axis_iter(Axis(0)).map(|row| row.std(0.0)).collect()
}

/// Median of `values`; the mean of the two middle values for even lengths.
/// `None` for an empty slice.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut v = values.to_vec();
    v.sort_by(|a, b| a.total_cmp(b));
    let mid = v.len() / 2;
    Some(if v.len() % 2 == 0 { (v[mid - 1] + v[mid]) / 2.0 } else { v[mid] })
}

/// Flag high-variance channels of a conditioned recording.
pub fn detect_bad_channels(rec: &Recording, multiplier: f64) -> BadChannelSet {
    let mut bads = BadChannelSet::new();
    if rec.n_channels() < 2 {
        return bads;
    }

    let stds = channel_std(rec.data());
    let Some(med) = median(&stds) else {
        return bads;
    };
    let threshold = multiplier * med;

    for (name, &s) in rec.ch_names().iter().zip(&stds) {
        if s > threshold {
            bads.insert(name.clone());
        }
    }

    if bads.is_empty() {
        log::info!("no bad channels (threshold {threshold:.3e})");
    } else {
        let names: Vec<&str> = bads.iter().collect();
        log::info!("bad channels detected: {names:?} (threshold {threshold:.3e})");
    }
    bads
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn rec_from(data: Array2<f64>) -> Recording {
        let names = (0..data.nrows()).map(|i| format!("E{i}")).collect();
        Recording::new(names, 100.0, data).unwrap()
    }

    #[test]
    fn median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn loud_channel_is_flagged() {
        let data = Array2::from_shape_fn((6, 400), |(c, t)| {
            let amp = if c == 4 { 20.0 } else { 1.0 + 0.1 * c as f64 };
            amp * (t as f64 * 0.21 + c as f64).sin()
        });
        let bads = detect_bad_channels(&rec_from(data), 3.0);
        assert_eq!(bads.iter().collect::<Vec<_>>(), vec!["E4"]);
    }

    #[test]
    fn single_channel_never_flagged() {
        let data = Array2::from_shape_fn((1, 100), |(_, t)| 1e6 * (t as f64).sin());
        assert!(detect_bad_channels(&rec_from(data), 3.0).is_empty());
    }

    #[test]
    fn flat_recording_flags_nothing() {
        // median = 0 and every std = 0; `>` keeps them all good.
        let data = Array2::zeros((4, 50));
        assert!(detect_bad_channels(&rec_from(data), 3.0).is_empty());
    }
}
