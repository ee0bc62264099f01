use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use faa::{
    io::{read_recording, write_recording},
    preprocess, ManualExclusion, PipelineConfig, Reference,
};

#[derive(Parser)]
#[command(name = "preproc", about = "Clean one EEG recording for asymmetry analysis")]
struct Args {
    /// Raw recording (.safetensors)
    #[arg(long)]
    input: PathBuf,

    /// Cleaned recording output path
    #[arg(long)]
    output: PathBuf,

    /// ICA component indices to remove (comma-separated)
    #[arg(long, default_value = "")]
    exclude: String,

    /// Build the average reference from good channels only
    #[arg(long)]
    bads_ref: bool,

    /// Skip re-referencing entirely
    #[arg(long, conflicts_with = "bads_ref")]
    no_ref: bool,

    /// Line-noise frequency in Hz
    #[arg(long, default_value_t = 50.0)]
    notch: f64,

    /// Band-pass lower edge in Hz
    #[arg(long, default_value_t = 1.0)]
    l_freq: f64,

    /// Band-pass upper edge in Hz
    #[arg(long, default_value_t = 40.0)]
    h_freq: f64,

    /// ICA components to fit (default: 15, capped at the channel count)
    #[arg(long)]
    n_components: Option<usize>,

    /// ICA random seed
    #[arg(long, default_value_t = 97)]
    seed: u64,
}

fn parse_indices(s: &str) -> Result<Vec<usize>> {
    s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| t.parse::<usize>().with_context(|| format!("bad component index '{t}'")))
        .collect()
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut loaded = read_recording(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    loaded.recording.normalize_channel_names();
    let rec = &loaded.recording;
    println!("Loaded {} ch × {} samples @ {} Hz", rec.n_channels(), rec.n_samples(), rec.sfreq());

    let reference = if args.no_ref {
        Reference::None
    } else if args.bads_ref {
        Reference::AverageOfGood
    } else {
        Reference::Average
    };
    let cfg = PipelineConfig {
        notch_freq: args.notch,
        l_freq: args.l_freq,
        h_freq: args.h_freq,
        ica_n_components: args.n_components,
        ica_seed: args.seed,
        reference,
        ..PipelineConfig::default()
    };

    let selector = ManualExclusion::new(parse_indices(&args.exclude)?);
    let label = faa::io::subject_id_from_path(&args.input);
    let out = preprocess(rec, loaded.layout.as_ref(), &cfg, &selector, &label)?;
    println!(
        "Excluded components {:?}; {} channel(s) still flagged",
        out.excluded,
        out.bads.len()
    );

    write_recording(&out.recording, loaded.layout.as_ref(), &out.bads, &args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;
    println!("Written → {}", args.output.display());

    Ok(())
}
