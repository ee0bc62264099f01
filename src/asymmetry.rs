//! Frontal alpha asymmetry, per subject and across a cohort.
//!
//! `asymmetry = ln(P_right) − ln(P_left)` where `P` is the mean Welch power
//! in the alpha band at the configured left/right frontal channels.
//! Positive scores mean relatively less right-hemisphere alpha, i.e.
//! relatively greater left-hemisphere activation.
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{CohortOrder, PipelineConfig};
use crate::error::{Error, Result};
use crate::ica::{ComponentSelector, ExcludeNone};
use crate::io::{LoadedRecording, RecordingSource};
use crate::recording::Recording;
use crate::spectral::band_power;

/// Alpha power at both frontal sites and the resulting score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsymmetryRecord {
    pub subject: String,
    pub left_power: f64,
    pub right_power: f64,
    pub asymmetry: f64,
}

/// A subject that produced no record, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkipNotice {
    pub subject: String,
    pub reason: String,
}

/// Records in the documented order plus every skipped subject.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CohortResult {
    pub records: Vec<AsymmetryRecord>,
    pub skipped: Vec<SkipNotice>,
    /// Set when the run was aborted before every subject was started.
    pub cancelled: bool,
}

impl CohortResult {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn mean_asymmetry(&self) -> Option<f64> {
        (!self.records.is_empty()).then(|| {
            self.records.iter().map(|r| r.asymmetry).sum::<f64>() / self.records.len() as f64
        })
    }
}

/// `ln(right) − ln(left)`; both powers must be positive.
pub fn asymmetry_score(left_power: f64, right_power: f64) -> Result<f64> {
    for (side, p) in [("left", left_power), ("right", right_power)] {
        if !(p > 0.0 && p.is_finite()) {
            return Err(Error::NonPositivePower(format!("{side} alpha power is {p}")));
        }
    }
    Ok(right_power.ln() - left_power.ln())
}

/// Check that both frontal channels exist before any expensive work.
fn require_channels(rec: &Recording, cfg: &PipelineConfig) -> Result<()> {
    for name in [&cfg.left_channel, &cfg.right_channel] {
        if rec.channel_index(name).is_none() {
            return Err(Error::MissingChannel(name.clone()));
        }
    }
    Ok(())
}

/// Score an already preprocessed recording.
pub fn compute_asymmetry(
    subject: &str,
    rec: &Recording,
    cfg: &PipelineConfig,
) -> Result<AsymmetryRecord> {
    let power = |name: &str| -> Result<f64> {
        let x = rec.channel(name)?.to_vec();
        band_power(&x, rec.sfreq(), cfg.alpha_band, cfg.welch_seg_len)
    };
    let left_power = power(&cfg.left_channel)?;
    let right_power = power(&cfg.right_channel)?;
    let asymmetry = asymmetry_score(left_power, right_power)?;
    log::debug!("{subject}: left {left_power:.4e}, right {right_power:.4e}, score {asymmetry:.4}");
    Ok(AsymmetryRecord { subject: subject.to_string(), left_power, right_power, asymmetry })
}

/// Run the full preprocessing chain on a raw recording and score it.
pub fn analyze_subject(
    subject: &str,
    input: &LoadedRecording,
    cfg: &PipelineConfig,
    selector: &dyn ComponentSelector,
) -> Result<AsymmetryRecord> {
    require_channels(&input.recording, cfg)?;
    let pre = crate::preprocess(&input.recording, input.layout.as_ref(), cfg, selector, subject)?;
    compute_asymmetry(subject, &pre.recording, cfg)
}

/// One cohort member: a subject id and where to load it from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectInput {
    pub subject: String,
    pub source: PathBuf,
}

impl SubjectInput {
    pub fn new(subject: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self { subject: subject.into(), source: source.into() }
    }

    /// Subject id derived from the file name.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let source = path.into();
        Self { subject: crate::io::subject_id_from_path(&source), source }
    }
}

enum Outcome {
    Record(AsymmetryRecord),
    Skip(SkipNotice),
    Fatal(Error),
    NotStarted,
}

/// Cohort driver.
///
/// ```no_run
/// use faa::{CohortRun, PipelineConfig, SubjectInput};
/// use faa::io::SafetensorsSource;
///
/// let cfg = PipelineConfig::default();
/// let inputs = vec![SubjectInput::from_path("data/S001_raw.safetensors")];
/// let result = CohortRun::new(&cfg).run(&inputs, &SafetensorsSource).unwrap();
/// for r in &result.records {
///     println!("{} {:.3}", r.subject, r.asymmetry);
/// }
/// ```
pub struct CohortRun<'a> {
    cfg: &'a PipelineConfig,
    selector: &'a dyn ComponentSelector,
    preprocess: bool,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> CohortRun<'a> {
    pub fn new(cfg: &'a PipelineConfig) -> Self {
        Self { cfg, selector: &ExcludeNone, preprocess: true, cancel: None }
    }

    pub fn selector(mut self, selector: &'a dyn ComponentSelector) -> Self {
        self.selector = selector;
        self
    }

    /// `false` when the inputs were already cleaned (e.g. by `preproc`).
    pub fn preprocess(mut self, yes: bool) -> Self {
        self.preprocess = yes;
        self
    }

    /// Subjects not yet started when `flag` becomes true are abandoned.
    pub fn cancel_flag(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel.is_some_and(|f| f.load(Ordering::Relaxed))
    }

    fn process(&self, input: &SubjectInput, source: &dyn RecordingSource) -> Result<AsymmetryRecord> {
        let mut loaded = source.load(&input.source)?;
        loaded.recording.normalize_channel_names();
        if self.preprocess {
            analyze_subject(&input.subject, &loaded, self.cfg, self.selector)
        } else {
            require_channels(&loaded.recording, self.cfg)?;
            compute_asymmetry(&input.subject, &loaded.recording, self.cfg)
        }
    }

    /// Process every subject in parallel and order the results by
    /// [`PipelineConfig::cohort_order`].
    ///
    /// Only [`Error::InvalidConfiguration`] aborts the run; every other
    /// per-subject failure becomes a [`SkipNotice`].
    pub fn run(&self, inputs: &[SubjectInput], source: &dyn RecordingSource) -> Result<CohortResult> {
        self.cfg.validate()?;
        log::info!("cohort: {} subject(s)", inputs.len());

        let outcomes: Vec<Outcome> = inputs
            .par_iter()
            .map(|input| {
                if self.cancelled() {
                    return Outcome::NotStarted;
                }
                match self.process(input, source) {
                    Ok(rec) => {
                        log::info!("{}: asymmetry {:.4}", rec.subject, rec.asymmetry);
                        Outcome::Record(rec)
                    }
                    Err(e) if !e.is_recoverable() => Outcome::Fatal(e),
                    Err(e) => {
                        log::warn!("skipping {}: {e}", input.subject);
                        Outcome::Skip(SkipNotice {
                            subject: input.subject.clone(),
                            reason: e.to_string(),
                        })
                    }
                }
            })
            .collect();

        let mut result = CohortResult::default();
        for outcome in outcomes {
            match outcome {
                Outcome::Record(r) => result.records.push(r),
                Outcome::Skip(s) => result.skipped.push(s),
                Outcome::Fatal(e) => return Err(e),
                Outcome::NotStarted => result.cancelled = true,
            }
        }
        if result.cancelled {
            log::warn!("cohort run cancelled; some subjects were not processed");
        }

        // Collected in input order; stable sorts keep it for equal ids.
        if self.cfg.cohort_order == CohortOrder::SubjectId {
            result.records.sort_by(|a, b| a.subject.cmp(&b.subject));
            result.skipped.sort_by(|a, b| a.subject.cmp(&b.subject));
        }
        log::info!("cohort: {} record(s), {} skipped", result.records.len(), result.skipped.len());
        Ok(result)
    }
}

/// Run a cohort with the default selector and full preprocessing.
pub fn analyze_cohort(
    inputs: &[SubjectInput],
    source: &dyn RecordingSource,
    cfg: &PipelineConfig,
) -> Result<CohortResult> {
    CohortRun::new(cfg).run(inputs, source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::BadChannelSet;
    use ndarray::Array2;
    use std::collections::HashMap;
    use std::f64::consts::PI;
    use std::path::Path;

    fn alpha_pair(names: [&str; 2], amps: [f64; 2]) -> Recording {
        let data = Array2::from_shape_fn((2, 1000), |(c, t)| {
            amps[c] * (2.0 * PI * 10.0 * t as f64 / 250.0).sin()
        });
        Recording::new(names.iter().map(|s| s.to_string()).collect(), 250.0, data).unwrap()
    }

    struct Memory(HashMap<PathBuf, Recording>);

    impl RecordingSource for Memory {
        fn load(&self, path: &Path) -> Result<LoadedRecording> {
            let recording = self
                .0
                .get(path)
                .cloned()
                .ok_or_else(|| Error::Format(format!("no such recording {}", path.display())))?;
            Ok(LoadedRecording { recording, layout: None, bads: BadChannelSet::new() })
        }
    }

    #[test]
    fn swapping_sides_negates_score() {
        let a = asymmetry_score(2.5, 0.7).unwrap();
        let b = asymmetry_score(0.7, 2.5).unwrap();
        assert_eq!(a, -b);
    }

    #[test]
    fn non_positive_power_is_rejected() {
        assert!(matches!(asymmetry_score(0.0, 1.0), Err(Error::NonPositivePower(_))));
        assert!(matches!(asymmetry_score(1.0, f64::NAN), Err(Error::NonPositivePower(_))));
    }

    #[test]
    fn compute_on_clean_recording() {
        let rec = alpha_pair(["F3", "F4"], [1.0, 2.0]);
        let r = compute_asymmetry("S1", &rec, &PipelineConfig::default()).unwrap();
        approx::assert_abs_diff_eq!(r.asymmetry, 4.0_f64.ln(), epsilon = 1e-9);
        assert!(r.right_power > r.left_power);
    }

    #[test]
    fn missing_channel_gives_one_skip_notice() {
        let mut recs = HashMap::new();
        recs.insert(PathBuf::from("a"), alpha_pair(["F3", "F4"], [1.0, 2.0]));
        recs.insert(PathBuf::from("b"), alpha_pair(["F3", "Cz"], [1.0, 2.0]));
        let inputs = vec![SubjectInput::new("A", "a"), SubjectInput::new("B", "b")];
        let cfg = PipelineConfig::default();

        let result = CohortRun::new(&cfg).preprocess(false).run(&inputs, &Memory(recs)).unwrap();
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].subject, "A");
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.skipped[0].subject, "B");
        assert!(result.skipped[0].reason.contains("F4"));
    }

    #[test]
    fn invalid_configuration_aborts() {
        let cfg = PipelineConfig { alpha_band: (13.0, 8.0), ..Default::default() };
        let r = CohortRun::new(&cfg).run(&[SubjectInput::new("A", "a")], &Memory(HashMap::new()));
        assert!(matches!(r, Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn cancelled_before_start_processes_nothing() {
        let flag = AtomicBool::new(true);
        let cfg = PipelineConfig::default();
        let r = CohortRun::new(&cfg)
            .cancel_flag(&flag)
            .run(&[SubjectInput::new("A", "a")], &Memory(HashMap::new()))
            .unwrap();
        assert!(r.cancelled);
        assert!(r.records.is_empty() && r.skipped.is_empty());
    }
}
