//! Bad-channel reconstruction from spatial neighbours.
//!
//! With a [`SpatialLayout`], each bad channel is replaced by the
//! inverse-distance-weighted mean of its `k` nearest good, positioned
//! neighbours and its flag is cleared.  Without a layout the recording is
//! returned untouched and the flags stay, which is the expected path for
//! recordings that carry no digitisation.
use ndarray::Array1;

use crate::recording::{BadChannelSet, Recording, SpatialLayout};

/// Outcome of [`interpolate_bads`].
#[derive(Debug, Clone)]
pub struct Reconstruction {
    pub recording: Recording,
    /// Channels that are still flagged after the call.
    pub bads: BadChannelSet,
}

fn distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    a.iter().zip(&b).map(|(x, y)| (x - y) * (x - y)).sum::<f64>().sqrt()
}

/// Replace bad channels by nearest-neighbour interpolation where possible.
///
/// `label` names the recording in diagnostics (subject or file).
pub fn interpolate_bads(
    rec: &Recording,
    bads: &BadChannelSet,
    layout: Option<&SpatialLayout>,
    n_neighbors: usize,
    label: &str,
) -> Reconstruction {
    if bads.is_empty() {
        return Reconstruction { recording: rec.clone(), bads: bads.clone() };
    }

    let Some(layout) = layout else {
        let names: Vec<&str> = bads.iter().collect();
        log::warn!("{label}: no spatial layout, skipping interpolation of {names:?}");
        return Reconstruction { recording: rec.clone(), bads: bads.clone() };
    };

    // Good channels that have a position, as (row, position).
    let donors: Vec<(usize, [f64; 3])> = rec
        .ch_names()
        .iter()
        .enumerate()
        .filter(|(_, n)| !bads.contains(n))
        .filter_map(|(i, n)| layout.position(n).map(|p| (i, p)))
        .collect();

    let mut out = rec.clone();
    let mut still_bad = bads.clone();

    for name in bads.iter() {
        let Some(row) = rec.channel_index(name) else { continue };
        let Some(target) = layout.position(name) else {
            log::warn!("{label}: channel {name} has no position, left flagged");
            continue;
        };

        let mut by_dist: Vec<(f64, usize)> =
            donors.iter().map(|&(i, p)| (distance(target, p), i)).collect();
        by_dist.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        by_dist.truncate(n_neighbors);

        if by_dist.is_empty() {
            log::warn!("{label}: channel {name} has no positioned good neighbour, left flagged");
            continue;
        }

        let replacement: Array1<f64> = if by_dist[0].0 <= f64::EPSILON {
            // Coincident electrode: copy it.
            rec.data().row(by_dist[0].1).to_owned()
        } else {
            let weights: Vec<f64> = by_dist.iter().map(|(d, _)| 1.0 / d).collect();
            let total: f64 = weights.iter().sum();
            let mut acc = Array1::<f64>::zeros(rec.n_samples());
            for (w, &(_, i)) in weights.iter().zip(&by_dist) {
                acc.scaled_add(w / total, &rec.data().row(i));
            }
            acc
        };

        out.data_mut().row_mut(row).assign(&replacement);
        still_bad.remove(name);
        let used: Vec<&str> = by_dist.iter().map(|&(_, i)| rec.ch_names()[i].as_str()).collect();
        log::info!("{label}: interpolated {name} from {used:?}");
    }

    Reconstruction { recording: out, bads: still_bad }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn line_recording() -> (Recording, SpatialLayout) {
        // Four electrodes on a line; channel c carries constant value c.
        let data = Array2::from_shape_fn((4, 8), |(c, _)| c as f64);
        let names: Vec<String> = ["A", "B", "C", "D"].iter().map(|s| s.to_string()).collect();
        let rec = Recording::new(names, 100.0, data).unwrap();
        let mut layout = SpatialLayout::new();
        for (i, n) in ["A", "B", "C", "D"].iter().enumerate() {
            layout.insert(*n, [i as f64, 0.0, 0.0]);
        }
        (rec, layout)
    }

    #[test]
    fn empty_bad_set_is_noop() {
        let (rec, layout) = line_recording();
        let r = interpolate_bads(&rec, &BadChannelSet::new(), Some(&layout), 4, "s");
        assert_eq!(r.recording, rec);
        assert!(r.bads.is_empty());
    }

    #[test]
    fn bad_channel_replaced_by_weighted_neighbours() {
        let (rec, layout) = line_recording();
        let bads = BadChannelSet::from_names(&rec, ["B"]);
        let r = interpolate_bads(&rec, &bads, Some(&layout), 2, "s");
        // Nearest good: A (d=1, value 0) and C (d=1, value 2) → mean 1.
        for &v in r.recording.data().row(1) {
            approx::assert_abs_diff_eq!(v, 1.0, epsilon = 1e-12);
        }
        assert!(r.bads.is_empty());
        // Good channels untouched.
        assert_eq!(r.recording.data().row(3), rec.data().row(3));
    }

    #[test]
    fn unpositioned_bad_channel_stays_flagged() {
        let (rec, _) = line_recording();
        let mut layout = SpatialLayout::new();
        layout.insert("A", [0.0, 0.0, 0.0]);
        let bads = BadChannelSet::from_names(&rec, ["D"]);
        let r = interpolate_bads(&rec, &bads, Some(&layout), 4, "s");
        assert!(r.bads.contains("D"));
        assert_eq!(r.recording, rec);
    }

    #[test]
    fn no_layout_leaves_data_bit_identical() {
        let (rec, _) = line_recording();
        let bads = BadChannelSet::from_names(&rec, ["C"]);
        let r = interpolate_bads(&rec, &bads, None, 4, "s");
        assert_eq!(r.recording.data(), rec.data());
        assert_eq!(r.bads, bads);
    }
}
