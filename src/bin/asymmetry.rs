use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use faa::{
    io::{discover, SafetensorsSource},
    CohortOrder, CohortRenderer, CohortRun, JsonRenderer, PipelineConfig, Reference,
    SubjectInput, TableRenderer,
};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Format {
    Table,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Order {
    Subject,
    Input,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum RefMode {
    Average,
    Good,
    None,
}

#[derive(Parser, Debug)]
#[command(name = "asymmetry", about = "Frontal alpha asymmetry for a cohort of recordings")]
struct Args {
    /// Glob pattern selecting recordings, e.g. "data/*/*_raw.safetensors"
    pattern: String,

    /// Inputs are already cleaned (output of `preproc`); only score them
    #[arg(long)]
    preprocessed: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Table)]
    format: Format,

    /// Record order [default: subject]
    #[arg(long, value_enum)]
    order: Option<Order>,

    /// Re-referencing mode [default: average]
    #[arg(long = "ref", value_enum)]
    reference: Option<RefMode>,

    /// Left frontal channel [default: F3]
    #[arg(long)]
    left: Option<String>,

    /// Right frontal channel [default: F4]
    #[arg(long)]
    right: Option<String>,

    /// Welch segment length in samples [default: 2048]
    #[arg(long)]
    seg_len: Option<usize>,

    /// Worker threads (default: all cores)
    #[arg(long)]
    jobs: Option<usize>,

    /// Optional JSON file with a PipelineConfig; flags given above override it
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Args {
    /// Layer the flags that were actually passed over `cfg`.
    fn apply_overrides(&self, mut cfg: PipelineConfig) -> PipelineConfig {
        if let Some(left) = &self.left {
            cfg.left_channel = left.clone();
        }
        if let Some(right) = &self.right {
            cfg.right_channel = right.clone();
        }
        if let Some(seg_len) = self.seg_len {
            cfg.welch_seg_len = seg_len;
        }
        if let Some(mode) = self.reference {
            cfg.reference = match mode {
                RefMode::Average => Reference::Average,
                RefMode::Good => Reference::AverageOfGood,
                RefMode::None => Reference::None,
            };
        }
        if let Some(order) = self.order {
            cfg.cohort_order = match order {
                Order::Subject => CohortOrder::SubjectId,
                Order::Input => CohortOrder::Input,
            };
        }
        cfg
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if let Some(jobs) = args.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .context("configuring worker pool")?;
    }

    let base: PipelineConfig = match &args.config {
        Some(p) => serde_json::from_str(
            &std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?,
        )
        .with_context(|| format!("parsing {}", p.display()))?,
        None => PipelineConfig::default(),
    };
    let cfg = args.apply_overrides(base);

    let paths = discover(&args.pattern)?;
    if paths.is_empty() {
        bail!("no files match '{}'", args.pattern);
    }
    let inputs: Vec<SubjectInput> = paths.into_iter().map(SubjectInput::from_path).collect();

    let t = std::time::Instant::now();
    let result = CohortRun::new(&cfg)
        .preprocess(!args.preprocessed)
        .run(&inputs, &SafetensorsSource)?;
    eprintln!(
        "{} subject(s) in {:.2} s: {} record(s), {} skipped",
        inputs.len(),
        t.elapsed().as_secs_f64(),
        result.records.len(),
        result.skipped.len()
    );

    let renderer: Box<dyn CohortRenderer> = match args.format {
        Format::Table => Box::new(TableRenderer::default()),
        Format::Json => Box::new(JsonRenderer),
    };
    let stdout = std::io::stdout();
    renderer.render(&result, &mut stdout.lock())?;
    Ok(())
}
