//! Signal conditioning: drift removal, line-noise notch and band-pass.
//!
//! - [`design`]: Hamming-windowed sinc band-pass FIR design, matching
//!   `mne.filter.create_filter(fir_window='hamming', phase='zero')`.
//! - [`apply`]: Overlap-add zero-phase convolution, matching MNE's
//!   `_overlap_add_filter` / `_1d_overlap_filter`.
//! - [`iir`]: biquad notch sections run forward-backward.

pub mod apply;
pub mod design;
pub mod iir;

pub use apply::{apply_fir_zero_phase, filter_1d};
pub use design::{
    auto_filter_length, auto_trans_bandwidth, auto_trans_bandwidth_high, design_bandpass,
    fir_gain, firwin, hamming,
};
pub use iir::{apply_iir_zero_phase, design_notch, filtfilt, Biquad};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::normalize::{detrend_linear_inplace, remove_dc_inplace};
use crate::recording::Recording;

/// Condition a recording: DC removal → linear detrend → notch → band-pass.
///
/// The input is left untouched; the conditioned copy has the same channels,
/// sample rate and shape.
pub fn condition(rec: &Recording, cfg: &PipelineConfig) -> Result<Recording> {
    let sfreq = rec.sfreq();
    let mut data = rec.data().clone();

    remove_dc_inplace(&mut data);
    detrend_linear_inplace(&mut data);

    let notch = design_notch(cfg.notch_freq, cfg.notch_harmonics, cfg.notch_q, sfreq);
    log::debug!("notch: {} section(s) from {} Hz", notch.len(), cfg.notch_freq);
    apply_iir_zero_phase(&mut data, &notch);

    let h = design_bandpass(cfg.l_freq, cfg.h_freq, sfreq)?;
    log::debug!("band-pass {}–{} Hz: {} taps", cfg.l_freq, cfg.h_freq, h.len());
    apply_fir_zero_phase(&mut data, &h);

    rec.with_data(data)
}
