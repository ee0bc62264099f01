//! # faa — frontal alpha asymmetry from raw EEG
//!
//! `faa` cleans continuous EEG recordings and scores the hemispheric balance
//! of alpha power at the frontal sites.  The DSP steps follow their
//! [MNE-Python](https://mne.tools) counterparts; everything runs in pure
//! Rust on [`ndarray`] buffers.
//!
//! ## Pipeline overview
//!
//! ```text
//! S001_raw.safetensors
//!   │
//!   ├─ io::read_recording()          [C, T] f64 + names, sfreq, layout
//!   ├─ filter::condition()           DC → detrend → 50 Hz notch → 1–40 Hz FIR
//!   ├─ quality::detect_bad_channels  std > 3 × median(std)
//!   ├─ ica::remove_artifacts()       FastICA, injected component selector
//!   ├─ interpolate::interpolate_bads nearest-neighbour, needs a layout
//!   ├─ reference::rereference()      common average (configurable)
//!   └─ asymmetry::compute_asymmetry  Welch 8–13 Hz at F3/F4
//!        │
//!        └─→ AsymmetryRecord { subject, left_power, right_power, asymmetry }
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use faa::{analyze_subject, ExcludeNone, PipelineConfig};
//! use faa::io::read_recording;
//! use std::path::Path;
//!
//! let input = read_recording(Path::new("data/S001_raw.safetensors")).unwrap();
//! let cfg = PipelineConfig::default();
//! let record = analyze_subject("S001", &input, &cfg, &ExcludeNone).unwrap();
//! println!("{}: {:.3}", record.subject, record.asymmetry);
//! ```
//!
//! For many subjects use [`CohortRun`], which processes them in parallel
//! and returns records in a deterministic order.

pub mod asymmetry;
pub mod config;
pub mod error;
pub mod filter;
pub mod ica;
pub mod interpolate;
pub mod io;
pub mod normalize;
pub mod quality;
pub mod recording;
pub mod reference;
pub mod render;
pub mod spectral;

use std::collections::BTreeSet;

// ── Crate-root re-exports ─────────────────────────────────────────────────

pub use asymmetry::{
    analyze_cohort, analyze_subject, asymmetry_score, compute_asymmetry, AsymmetryRecord,
    CohortResult, CohortRun, SkipNotice, SubjectInput,
};
pub use config::{CohortOrder, PipelineConfig, Reference};
pub use error::{Error, Result};
pub use ica::{
    fit_ica, remove_artifacts, ComponentSelector, CorrelationSelector, Decomposition,
    ExcludeNone, ManualExclusion,
};
pub use interpolate::{interpolate_bads, Reconstruction};
pub use io::{read_recording, write_recording, LoadedRecording, RecordingSource, SafetensorsSource};
pub use quality::detect_bad_channels;
pub use recording::{BadChannelSet, Recording, SpatialLayout};
pub use reference::rereference;
pub use render::{CohortRenderer, JsonRenderer, TableRenderer};
pub use spectral::{band_power, welch_psd, Psd};

/// Output of [`preprocess`].
#[derive(Debug, Clone)]
pub struct Preprocessed {
    /// Cleaned, re-referenced recording.
    pub recording: Recording,
    /// Channels still flagged bad (not interpolated).
    pub bads: BadChannelSet,
    /// ICA components removed.
    pub excluded: BTreeSet<usize>,
}

/// Run the **full preprocessing chain** on one continuous recording.
///
/// 1. Condition: DC removal, linear detrend, notch, band-pass
///    ([`filter::condition`]).
/// 2. Flag channels whose std exceeds `bad_std_multiplier × median`.
/// 3. Fit FastICA and drop the components `selector` picks.
/// 4. Interpolate flagged channels from neighbours when `layout` is given.
/// 5. Re-reference per [`PipelineConfig::reference`].
///
/// `label` identifies the recording in log messages.
///
/// # Errors
///
/// * [`Error::InvalidConfiguration`] if the configuration does not fit this
///   recording (band edges above Nyquist, too many ICA components).
/// * [`Error::DecompositionFailed`] if FastICA does not converge.
pub fn preprocess(
    rec: &Recording,
    layout: Option<&SpatialLayout>,
    cfg: &PipelineConfig,
    selector: &dyn ComponentSelector,
    label: &str,
) -> Result<Preprocessed> {
    cfg.validate_for(rec.sfreq(), rec.n_channels())?;
    log::info!(
        "{label}: {} channels × {} samples @ {} Hz",
        rec.n_channels(),
        rec.n_samples(),
        rec.sfreq()
    );

    let conditioned = filter::condition(rec, cfg)?;
    let flagged = quality::detect_bad_channels(&conditioned, cfg.bad_std_multiplier);
    let (cleaned, excluded) = ica::remove_artifacts(&conditioned, cfg, selector)?;
    let Reconstruction { recording, bads } =
        interpolate::interpolate_bads(&cleaned, &flagged, layout, cfg.interp_neighbors, label);
    let recording = reference::rereference(&recording, &bads, cfg.reference);

    Ok(Preprocessed { recording, bads, excluded })
}
