use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use mod_rate::config::AnalysisConfig;
use mod_rate::parsers::gene_table_parser::load_database;
use mod_rate::quantification::dataset::{build_sample_dataset, SampleDataset};
use mod_rate::quantification::regression::regress_all;
use mod_rate::report::{log_regression_summary, write_all};

/// Command-line arguments parser
#[derive(Parser, Debug)]
#[command(about = "Relate RNA modification rates to expression across transcript regions")]
struct Args {
    /// Directory with one gene table per gene (.tsv, .txt, .csv or .json)
    #[arg(short, long, default_value = "database")]
    database_dir: PathBuf,

    /// Output directory
    #[arg(short, long, default_value = "output")]
    output_dir: PathBuf,

    /// Optional JSON file with analysis settings. Flags override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Label of the first replicate, e.g. MR01_1
    #[arg(long)]
    rep1_label: Option<String>,

    /// Label of the second replicate, e.g. MR01_2
    #[arg(long)]
    rep2_label: Option<String>,

    /// Also analyse both replicates pooled together
    #[arg(long)]
    pooled: bool,

    /// Worker threads for gene aggregation (0 = all cores)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Log debug messages
    #[arg(short, long)]
    verbose: bool,
}

/// Merge the config file (if any) with command-line overrides
fn resolve_config(args: &Args) -> Result<AnalysisConfig> {
    let mut config = match &args.config {
        Some(path) => AnalysisConfig::from_json_file(path)?,
        None => AnalysisConfig::default(),
    };

    if let Some(label) = &args.rep1_label {
        config.labels.rep1 = label.clone();
    }
    if let Some(label) = &args.rep2_label {
        config.labels.rep2 = label.clone();
    }
    if args.pooled {
        config.pooled = true;
    }
    if let Some(threads) = args.threads {
        config.threads = threads;
    }

    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = resolve_config(&args)?;

    if config.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .build_global()
            .context("configuring the worker pool")?;
    }

    if !args.database_dir.is_dir() {
        bail!("Database directory {:?} does not exist", args.database_dir);
    }

    info!("Loading gene tables from {:?}", args.database_dir);
    let genes = load_database(&args.database_dir, &config.labels)
        .with_context(|| format!("reading {:?}", args.database_dir))?;

    // every dataset is complete before any regression runs
    let datasets: Vec<SampleDataset> = config
        .samples()
        .into_iter()
        .map(|sample| build_sample_dataset(&genes, sample))
        .collect();

    info!("Generating regressions");
    let results = regress_all(&datasets, config.rate_scale);

    let written = write_all(
        &args.output_dir,
        &datasets,
        &genes,
        &results,
        &config.labels,
    )
    .with_context(|| format!("writing reports to {:?}", args.output_dir))?;

    log_regression_summary(&results, &config.samples(), &config.labels);

    info!(
        "Analysis complete: {} files written to {:?}",
        written.len(),
        args.output_dir
    );
    Ok(())
}
