/// pipeline_steps: read a recording, run each preprocessing step, write every
/// intermediate array to a safetensors file for inspection.
///
/// Output keys:
///   raw         [C, T]   f64  input samples
///   dc          [C, T]   f64  after DC removal
///   detrend     [C, T]   f64  after linear detrend
///   notch       [C, T]   f64  after notch
///   bandpass    [C, T]   f64  after band-pass FIR
///   ica         [C, T]   f64  after artifact removal
///   interp      [C, T]   f64  after bad-channel interpolation
///   ref         [C, T]   f64  after re-referencing
///   ica_mixing  [C, N]   f64
///   ica_sources [N, T]   f64
///   psd_left    [F]      f64  Welch PSD at the left channel
///   psd_right   [F]      f64  Welch PSD at the right channel
///   psd_freqs   [F]      f64
///   ch_names, bads       U8   newline-joined names
use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

use faa::{
    filter::{apply_fir_zero_phase, apply_iir_zero_phase, design_bandpass, design_notch},
    ica::{fit_ica, ExcludeNone},
    interpolate::interpolate_bads,
    io::{read_recording, LoadedRecording, StWriter},
    normalize::{detrend_linear_inplace, remove_dc_inplace},
    quality::detect_bad_channels,
    reference::rereference,
    spectral::welch_psd,
    ComponentSelector, PipelineConfig,
};

#[derive(Parser, Debug)]
#[command(name = "pipeline_steps")]
struct Args {
    /// Input recording (.safetensors).
    #[arg(long)]
    input: PathBuf,

    /// Output safetensors path.
    #[arg(long)]
    output: PathBuf,

    /// Optional JSON file with a PipelineConfig.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg: PipelineConfig = match &args.config {
        Some(p) => serde_json::from_str(
            &std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?,
        )
        .with_context(|| format!("parsing {}", p.display()))?,
        None => PipelineConfig::default(),
    };

    // ── 1. Read ────────────────────────────────────────────────────────────
    let t_read = now();
    let loaded = load(&args.input)?;
    let raw = loaded.recording;
    let sfreq = raw.sfreq();
    cfg.validate_for(sfreq, raw.n_channels())?;
    let ms_read = t_read.elapsed().as_secs_f64() * 1000.0;

    // ── 2. DC + detrend ────────────────────────────────────────────────────
    let t_dc = now();
    let mut data_dc = raw.data().clone();
    remove_dc_inplace(&mut data_dc);
    let mut data_detrend = data_dc.clone();
    detrend_linear_inplace(&mut data_detrend);
    let ms_dc = t_dc.elapsed().as_secs_f64() * 1000.0;

    // ── 3. Notch ───────────────────────────────────────────────────────────
    let t_notch = now();
    let mut data_notch = data_detrend.clone();
    let sections = design_notch(cfg.notch_freq, cfg.notch_harmonics, cfg.notch_q, sfreq);
    apply_iir_zero_phase(&mut data_notch, &sections);
    let ms_notch = t_notch.elapsed().as_secs_f64() * 1000.0;

    // ── 4. Band-pass ───────────────────────────────────────────────────────
    let t_bp = now();
    let mut data_bp = data_notch.clone();
    let h = design_bandpass(cfg.l_freq, cfg.h_freq, sfreq)?;
    apply_fir_zero_phase(&mut data_bp, &h);
    let conditioned = raw.with_data(data_bp)?;
    let ms_bp = t_bp.elapsed().as_secs_f64() * 1000.0;

    // ── 5. Bad channels + ICA ──────────────────────────────────────────────
    let t_ica = now();
    let flagged = detect_bad_channels(&conditioned, cfg.bad_std_multiplier);
    let decomposition = fit_ica(&conditioned, &cfg)?;
    let mixing = decomposition.mixing().clone();
    let sources = decomposition.sources().clone();
    let exclude = ExcludeNone.select(&decomposition);
    let cleaned = decomposition.apply(&exclude)?;
    let ms_ica = t_ica.elapsed().as_secs_f64() * 1000.0;

    // ── 6. Interpolate + reference ─────────────────────────────────────────
    let t_ref = now();
    let label = faa::io::subject_id_from_path(&args.input);
    let recon = interpolate_bads(
        &cleaned,
        &flagged,
        loaded.layout.as_ref(),
        cfg.interp_neighbors,
        &label,
    );
    let referenced = rereference(&recon.recording, &recon.bads, cfg.reference);
    let ms_ref = t_ref.elapsed().as_secs_f64() * 1000.0;

    // ── 7. Spectra ─────────────────────────────────────────────────────────
    let t_psd = now();
    let psd_left = welch_psd(&referenced.channel(&cfg.left_channel)?.to_vec(), sfreq, cfg.welch_seg_len)?;
    let psd_right = welch_psd(&referenced.channel(&cfg.right_channel)?.to_vec(), sfreq, cfg.welch_seg_len)?;
    let ms_psd = t_psd.elapsed().as_secs_f64() * 1000.0;

    eprintln!(
        "TIMING read={ms_read:.4}ms dc={ms_dc:.4}ms notch={ms_notch:.4}ms bandpass={ms_bp:.4}ms \
         ica={ms_ica:.4}ms ref={ms_ref:.4}ms psd={ms_psd:.4}ms",
    );
    eprintln!(
        "  {} ch  sfreq={sfreq} Hz  {} taps  {} components  {} flagged",
        raw.n_channels(),
        h.len(),
        mixing.ncols(),
        flagged.len()
    );

    // ── 8. Write output ────────────────────────────────────────────────────
    eprintln!("Writing → {}", args.output.display());
    let mut w = StWriter::new();
    w.add_f64_arr2("raw", raw.data());
    w.add_f64_arr2("dc", &data_dc);
    w.add_f64_arr2("detrend", &data_detrend);
    w.add_f64_arr2("notch", &data_notch);
    w.add_f64_arr2("bandpass", conditioned.data());
    w.add_f64_arr2("ica", cleaned.data());
    w.add_f64_arr2("interp", recon.recording.data());
    w.add_f64_arr2("ref", referenced.data());
    w.add_f64_arr2("ica_mixing", &mixing);
    w.add_f64_arr2("ica_sources", &sources);
    w.add_f64("psd_freqs", &psd_left.freqs, &[psd_left.freqs.len()]);
    w.add_f64("psd_left", &psd_left.psd, &[psd_left.psd.len()]);
    w.add_f64("psd_right", &psd_right.psd, &[psd_right.psd.len()]);
    w.add_lines("ch_names", raw.ch_names());
    let bads: Vec<&str> = recon.bads.iter().collect();
    w.add_lines("bads", &bads);
    w.write(&args.output)?;

    eprintln!("Done.");
    Ok(())
}

/// Read a recording with EDF name padding stripped, as the cohort driver does.
fn load(path: &Path) -> Result<LoadedRecording> {
    let mut loaded =
        read_recording(path).with_context(|| format!("reading {}", path.display()))?;
    loaded.recording.normalize_channel_names();
    Ok(loaded)
}

/// Return `std::time::Instant::now()` (used for internal timing).
#[inline(always)]
fn now() -> std::time::Instant { std::time::Instant::now() }

#[cfg(test)]
mod tests {
    use super::*;
    use faa::{io::write_recording, BadChannelSet, Recording};
    use ndarray::Array2;

    #[test]
    fn padded_names_are_stripped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("S001_raw.safetensors");
        let names = ["F3..", "F4..", "Cz.."].iter().map(|s| s.to_string()).collect();
        let rec = Recording::new(names, 160.0, Array2::zeros((3, 16))).unwrap();
        write_recording(&rec, None, &BadChannelSet::new(), &path).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.recording.ch_names(), ["F3", "F4", "Cz"]);
        assert!(loaded.recording.channel("F4").is_ok());
    }
}
