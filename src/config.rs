//! Pipeline configuration.
//!
//! [`PipelineConfig`] holds every tunable parameter of the preprocessing and
//! asymmetry pipeline.  All fields have defaults that reproduce the lab
//! pipeline (50 Hz notch, 1–40 Hz band-pass, 15 ICA components with seed 97,
//! 3 × median bad-channel rule, 2048-sample Welch segments, F3/F4 alpha).
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Components fitted when [`PipelineConfig::ica_n_components`] is `None`.
pub const DEFAULT_ICA_COMPONENTS: usize = 15;

/// How the common reference is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reference {
    /// Subtract the mean of **all** channels, flagged ones included.
    Average,
    /// Subtract the mean of the channels that are not flagged bad.
    /// Falls back to all channels when every channel is flagged.
    AverageOfGood,
    /// Leave the recording on its original reference.
    ///
    /// Needed for two-channel montages: an average reference over F3/F4
    /// alone makes them exact negatives of each other.
    None,
}

/// Order of records in a [`crate::asymmetry::CohortResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CohortOrder {
    /// Lexicographic by subject identifier.
    SubjectId,
    /// The order subjects were handed to the cohort driver.
    Input,
}

/// Configuration for the full pipeline.
///
/// All fields are `pub` so you can construct one with struct-update syntax:
///
/// ```
/// use faa::{PipelineConfig, Reference};
///
/// let cfg = PipelineConfig {
///     notch_freq: 60.0,          // North American mains
///     reference:  Reference::None,
///     ..PipelineConfig::default()
/// };
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Line frequency removed by the IIR notch, in Hz.
    ///
    /// Default: `50.0` Hz.
    pub notch_freq: f64,

    /// Number of line-frequency multiples to notch (`1` = fundamental only).
    /// Multiples at or above Nyquist are skipped.
    ///
    /// Default: `1`.
    pub notch_harmonics: usize,

    /// Quality factor of each notch section (centre / −3 dB width).
    ///
    /// Default: `30.0`.
    pub notch_q: f64,

    /// Lower band-pass cutoff in Hz.
    ///
    /// Default: `1.0` Hz.
    pub l_freq: f64,

    /// Upper band-pass cutoff in Hz.  Must be below Nyquist.
    ///
    /// Default: `40.0` Hz.
    pub h_freq: f64,

    /// A channel is bad when its std exceeds this multiple of the median
    /// per-channel std.
    ///
    /// Default: `3.0`.
    pub bad_std_multiplier: f64,

    /// Requested number of independent components.
    ///
    /// `None` fits [`DEFAULT_ICA_COMPONENTS`] capped at the channel count.
    /// An explicit `Some(n)` larger than the channel count is a configuration
    /// error.  Either way the count is further limited by the numerical rank
    /// of the data.
    ///
    /// Default: `None`.
    pub ica_n_components: Option<usize>,

    /// Seed for the FastICA initial unmixing matrix.
    ///
    /// Default: `97`.
    pub ica_seed: u64,

    /// FastICA iteration cap.  Hitting it is reported as
    /// `DecompositionFailed`.
    ///
    /// Default: `1000`.
    pub ica_max_iter: usize,

    /// FastICA convergence tolerance.
    ///
    /// Default: `1e-4`.
    pub ica_tol: f64,

    /// Number of nearest good neighbours used to interpolate a bad channel.
    ///
    /// Default: `4`.
    pub interp_neighbors: usize,

    /// Reference scheme applied after interpolation.
    ///
    /// Default: [`Reference::Average`].
    pub reference: Reference,

    /// Welch segment length in samples (shrunk to the series length when the
    /// series is shorter).
    ///
    /// Default: `2048`.
    pub welch_seg_len: usize,

    /// Alpha band `(f_min, f_max)` in Hz, inclusive.
    ///
    /// Default: `(8.0, 13.0)`.
    pub alpha_band: (f64, f64),

    /// Left-frontal channel name.
    ///
    /// Default: `"F3"`.
    pub left_channel: String,

    /// Right-frontal channel name.
    ///
    /// Default: `"F4"`.
    pub right_channel: String,

    /// Ordering of the cohort result.
    ///
    /// Default: [`CohortOrder::SubjectId`].
    pub cohort_order: CohortOrder,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            notch_freq: 50.0,
            notch_harmonics: 1,
            notch_q: 30.0,
            l_freq: 1.0,
            h_freq: 40.0,
            bad_std_multiplier: 3.0,
            ica_n_components: None,
            ica_seed: 97,
            ica_max_iter: 1000,
            ica_tol: 1e-4,
            interp_neighbors: 4,
            reference: Reference::Average,
            welch_seg_len: 2048,
            alpha_band: (8.0, 13.0),
            left_channel: "F3".into(),
            right_channel: "F4".into(),
            cohort_order: CohortOrder::SubjectId,
        }
    }
}

impl PipelineConfig {
    /// Check the recording-independent invariants.
    ///
    /// Anything failing here is a programming or configuration error, so a
    /// cohort run stops before touching the first subject.
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: String| Err(Error::InvalidConfiguration(msg));

        if !(self.notch_freq > 0.0) {
            return bad(format!("notch frequency must be positive, got {}", self.notch_freq));
        }
        if !(self.notch_q > 0.0) {
            return bad(format!("notch Q must be positive, got {}", self.notch_q));
        }
        if !(self.l_freq > 0.0 && self.h_freq > self.l_freq) {
            return bad(format!(
                "band-pass needs 0 < l_freq < h_freq, got {}–{} Hz",
                self.l_freq, self.h_freq
            ));
        }
        let (fmin, fmax) = self.alpha_band;
        if !(fmin > 0.0 && fmax > fmin) {
            return bad(format!("alpha band needs 0 < f_min < f_max, got {fmin}–{fmax} Hz"));
        }
        if !(self.bad_std_multiplier > 0.0) {
            return bad(format!(
                "bad-channel multiplier must be positive, got {}",
                self.bad_std_multiplier
            ));
        }
        if self.ica_n_components == Some(0) {
            return bad("ICA component count must be at least 1".into());
        }
        if self.ica_max_iter == 0 || !(self.ica_tol > 0.0) {
            return bad("ICA needs a positive iteration cap and tolerance".into());
        }
        if self.interp_neighbors == 0 {
            return bad("interpolation needs at least one neighbour".into());
        }
        if self.welch_seg_len == 0 {
            return bad("Welch segment length must be at least 1 sample".into());
        }
        if self.left_channel == self.right_channel {
            return bad(format!(
                "left and right channels are both '{}'",
                self.left_channel
            ));
        }
        Ok(())
    }

    /// Check the parts that depend on a recording's sample rate and
    /// channel count.
    pub fn validate_for(&self, sfreq: f64, n_channels: usize) -> Result<()> {
        self.validate()?;
        let nyq = sfreq / 2.0;
        if self.h_freq >= nyq {
            return Err(Error::InvalidConfiguration(format!(
                "band-pass upper edge {} Hz must be below Nyquist ({nyq} Hz)",
                self.h_freq
            )));
        }
        if self.alpha_band.1 > nyq {
            return Err(Error::InvalidConfiguration(format!(
                "alpha band upper edge {} Hz exceeds Nyquist ({nyq} Hz)",
                self.alpha_band.1
            )));
        }
        if let Some(n) = self.ica_n_components {
            if n > n_channels {
                return Err(Error::InvalidConfiguration(format!(
                    "{n} ICA components requested but only {n_channels} channels"
                )));
            }
        }
        Ok(())
    }

    /// Number of components to fit on a recording with `n_channels`
    /// channels, before the rank limit.
    pub fn ica_components_for(&self, n_channels: usize) -> usize {
        self.ica_n_components
            .unwrap_or_else(|| DEFAULT_ICA_COMPONENTS.min(n_channels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = PipelineConfig::default();
        assert!(cfg.validate().is_ok());
        assert!(cfg.validate_for(250.0, 64).is_ok());
    }

    #[test]
    fn inverted_band_is_rejected() {
        let cfg = PipelineConfig { alpha_band: (13.0, 8.0), ..Default::default() };
        assert!(matches!(cfg.validate(), Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn highpass_above_nyquist_is_rejected() {
        let cfg = PipelineConfig::default();
        // 40 Hz upper edge vs 35 Hz Nyquist.
        assert!(matches!(cfg.validate_for(70.0, 8), Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn explicit_component_count_above_channels_fails() {
        let cfg = PipelineConfig { ica_n_components: Some(15), ..Default::default() };
        assert!(matches!(cfg.validate_for(250.0, 8), Err(Error::InvalidConfiguration(_))));
        assert!(cfg.validate_for(250.0, 15).is_ok());
    }

    #[test]
    fn default_component_count_is_capped() {
        let cfg = PipelineConfig::default();
        assert!(cfg.validate_for(250.0, 2).is_ok());
        assert_eq!(cfg.ica_components_for(2), 2);
        assert_eq!(cfg.ica_components_for(64), 15);
    }

    #[test]
    fn same_left_right_is_rejected() {
        let cfg = PipelineConfig { right_channel: "F3".into(), ..Default::default() };
        assert!(cfg.validate().is_err());
    }
}
