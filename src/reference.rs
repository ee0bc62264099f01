//! Common average reference: subtract the mean across channels at each
//! time point.
//!
//! [`Reference::Average`] matches `raw.set_eeg_reference('average',
//! projection=False)`, which averages every EEG channel, bad ones included.
//! [`Reference::AverageOfGood`] builds the mean from unflagged channels only
//! and subtracts it from all of them.
//!
//! `data`: [C, T]  →  `data[c, t] -= mean(data[ref_channels, t])`
use ndarray::{ArrayBase, Axis, DataMut, Ix2};

use crate::config::Reference;
use crate::recording::{BadChannelSet, Recording};

pub fn average_reference_inplace<S: DataMut<Elem = f64>>(data: &mut ArrayBase<S, Ix2>) {
    let Some(means) = data.mean_axis(Axis(0)) else { return };
    for mut row in data.rows_mut() {
        row -= &means;
    }
}

/// Average reference computed from the rows in `ref_rows` only.
pub fn average_reference_from_inplace<S: DataMut<Elem = f64>>(
    data: &mut ArrayBase<S, Ix2>,
    ref_rows: &[usize],
) {
    if ref_rows.is_empty() {
        return;
    }
    let Some(means) = data.select(Axis(0), ref_rows).mean_axis(Axis(0)) else { return };
    for mut row in data.rows_mut() {
        row -= &means;
    }
}

/// Re-reference a recording according to `mode`.
pub fn rereference(rec: &Recording, bads: &BadChannelSet, mode: Reference) -> Recording {
    let mut out = rec.clone();
    match mode {
        Reference::None => {}
        Reference::Average => average_reference_inplace(&mut out.data_mut()),
        Reference::AverageOfGood => {
            let bad_rows = bads.indices(rec);
            let good: Vec<usize> =
                (0..rec.n_channels()).filter(|i| bad_rows.binary_search(i).is_err()).collect();
            if good.is_empty() {
                log::warn!("every channel is flagged; averaging over all of them");
                average_reference_inplace(&mut out.data_mut());
            } else {
                average_reference_from_inplace(&mut out.data_mut(), &good);
            }
        }
    }
    out
}
