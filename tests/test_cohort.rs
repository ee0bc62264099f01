mod common;
use common::{alpha_pair, recording, sine};
use faa::io::{LoadedRecording, RecordingSource};
use faa::{
    BadChannelSet, CohortOrder, CohortRun, Error, PipelineConfig, Recording, Reference, Result,
    SubjectInput,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

/// In-memory recordings keyed by path.
struct Memory(HashMap<PathBuf, Recording>);

impl RecordingSource for Memory {
    fn load(&self, path: &Path) -> Result<LoadedRecording> {
        let recording = self
            .0
            .get(path)
            .cloned()
            .ok_or_else(|| Error::Format(format!("{} does not exist", path.display())))?;
        Ok(LoadedRecording { recording, layout: None, bads: BadChannelSet::new() })
    }
}

fn cohort() -> (Vec<SubjectInput>, Memory) {
    let mut recs = HashMap::new();
    recs.insert(PathBuf::from("c"), alpha_pair(1.0, 3.0, 250.0, 1000));
    recs.insert(PathBuf::from("a"), alpha_pair(1.0, 2.0, 250.0, 1000));
    recs.insert(PathBuf::from("b"), alpha_pair(2.0, 1.0, 250.0, 1000));
    let inputs = vec![
        SubjectInput::new("C", "c"),
        SubjectInput::new("A", "a"),
        SubjectInput::new("B", "b"),
    ];
    (inputs, Memory(recs))
}

fn cfg(order: CohortOrder) -> PipelineConfig {
    PipelineConfig { reference: Reference::None, cohort_order: order, ..Default::default() }
}

fn subjects(r: &faa::CohortResult) -> Vec<&str> {
    r.records.iter().map(|r| r.subject.as_str()).collect()
}

#[test]
fn records_sorted_by_subject_id() {
    let (inputs, source) = cohort();
    let cfg = cfg(CohortOrder::SubjectId);
    // Repeat to exercise different parallel interleavings.
    for _ in 0..5 {
        let r = CohortRun::new(&cfg).run(&inputs, &source).unwrap();
        assert_eq!(subjects(&r), vec!["A", "B", "C"]);
        assert!(r.skipped.is_empty());
    }
}

#[test]
fn records_in_input_order() {
    let (inputs, source) = cohort();
    let r = CohortRun::new(&cfg(CohortOrder::Input)).run(&inputs, &source).unwrap();
    assert_eq!(subjects(&r), vec!["C", "A", "B"]);
    approx::assert_abs_diff_eq!(r.records[0].asymmetry, 9.0_f64.ln(), epsilon = 1e-6);
    approx::assert_abs_diff_eq!(r.records[2].asymmetry, -(4.0_f64.ln()), epsilon = 1e-6);
}

#[test]
fn missing_channel_and_unreadable_file_are_skipped_by_name() {
    let (mut inputs, mut source) = cohort();
    source.0.insert(
        PathBuf::from("d"),
        recording(250.0, vec![("F3", sine(1.0, 10.0, 250.0, 1000)), ("Cz", sine(1.0, 10.0, 250.0, 1000))]),
    );
    inputs.push(SubjectInput::new("D", "d"));
    inputs.push(SubjectInput::new("E", "nowhere"));

    let r = CohortRun::new(&cfg(CohortOrder::SubjectId)).run(&inputs, &source).unwrap();
    assert_eq!(subjects(&r), vec!["A", "B", "C"]);
    let skipped: Vec<&str> = r.skipped.iter().map(|s| s.subject.as_str()).collect();
    assert_eq!(skipped, vec!["D", "E"]);
    assert!(r.skipped[0].reason.contains("F4"));
}

#[test]
fn channel_labels_with_padding_are_normalized() {
    let mut recs = HashMap::new();
    recs.insert(
        PathBuf::from("p"),
        recording(250.0, vec![("F3..", sine(1.0, 10.0, 250.0, 1000)), ("F4..", sine(2.0, 10.0, 250.0, 1000))]),
    );
    let r = CohortRun::new(&cfg(CohortOrder::SubjectId))
        .run(&[SubjectInput::new("P", "p")], &Memory(recs))
        .unwrap();
    assert_eq!(r.records.len(), 1);
}

#[test]
fn too_many_components_stops_the_run() {
    let (inputs, source) = cohort();
    let cfg = PipelineConfig { ica_n_components: Some(5), ..cfg(CohortOrder::SubjectId) };
    let r = CohortRun::new(&cfg).run(&inputs, &source);
    assert!(matches!(r, Err(Error::InvalidConfiguration(_))));
}

#[test]
fn cancelled_run_reports_it() {
    let (inputs, source) = cohort();
    let flag = AtomicBool::new(true);
    let cfg = cfg(CohortOrder::SubjectId);
    let r = CohortRun::new(&cfg).cancel_flag(&flag).run(&inputs, &source).unwrap();
    assert!(r.cancelled);
    assert!(r.records.is_empty());
}
