mod common;
use common::{alpha_pair, montage};
use faa::{
    analyze_subject, preprocess, BadChannelSet, ExcludeNone, LoadedRecording, PipelineConfig,
    Reference,
};

fn loaded(rec: faa::Recording) -> LoadedRecording {
    LoadedRecording { recording: rec, layout: None, bads: BadChannelSet::new() }
}

#[test]
fn two_channel_alpha_gives_ln4() {
    // F4 amplitude 2, F3 amplitude 1 → power ratio 4.
    let input = loaded(alpha_pair(1.0, 2.0, 250.0, 1000));
    let cfg = PipelineConfig { reference: Reference::None, ..Default::default() };
    let r = analyze_subject("S001", &input, &cfg, &ExcludeNone).unwrap();
    approx::assert_abs_diff_eq!(r.asymmetry, 4.0_f64.ln(), epsilon = 1e-3);
    assert!(r.left_power > 0.0);
}

#[test]
fn swapping_left_and_right_negates_the_score() {
    let input = loaded(alpha_pair(1.0, 2.0, 250.0, 1000));
    let cfg = PipelineConfig { reference: Reference::None, ..Default::default() };
    let swapped = PipelineConfig {
        left_channel: "F4".into(),
        right_channel: "F3".into(),
        ..cfg.clone()
    };
    let a = analyze_subject("S001", &input, &cfg, &ExcludeNone).unwrap();
    let b = analyze_subject("S001", &input, &swapped, &ExcludeNone).unwrap();
    assert_eq!(a.asymmetry, -b.asymmetry);
}

#[test]
fn average_reference_on_two_channels_cancels_asymmetry() {
    let input = loaded(alpha_pair(1.0, 2.0, 250.0, 1000));
    let r = analyze_subject("S001", &input, &PipelineConfig::default(), &ExcludeNone).unwrap();
    approx::assert_abs_diff_eq!(r.asymmetry, 0.0, epsilon = 1e-9);
}

#[test]
fn full_montage_with_layout_interpolates_and_references() {
    let (mut rec, layout) = montage(250.0, 5000);
    let p4 = rec.channel_index("P4").unwrap();
    let n = rec.n_samples();
    for (t, v) in rec.data_mut().row_mut(p4).iter_mut().enumerate() {
        *v += 40.0 * (2.0 * std::f64::consts::PI * 13.0 * t as f64 / 250.0).sin() * (t as f64 / n as f64);
    }
    let cfg = PipelineConfig::default();
    let out = preprocess(&rec, Some(&layout), &cfg, &ExcludeNone, "S001").unwrap();

    assert!(out.bads.is_empty(), "P4 should have been interpolated");
    assert!(out.excluded.is_empty());
    let p4_row = out.recording.channel("P4").unwrap();
    assert!(p4_row.iter().all(|v| v.abs() < 10.0));
    for t in (0..n).step_by(97) {
        let s: f64 = out.recording.data().column(t).sum();
        assert!(s.abs() < 1e-9, "sample {t}: channel sum {s:.2e}");
    }
}

#[test]
fn missing_frontal_channel_is_reported() {
    let (rec, _) = montage(250.0, 1000);
    let rec = rec.pick_channels(&["Fp1", "F3", "C3"]).unwrap();
    let err = analyze_subject("S009", &loaded(rec), &PipelineConfig::default(), &ExcludeNone)
        .unwrap_err();
    assert!(matches!(err, faa::Error::MissingChannel(ref c) if c == "F4"));
}
