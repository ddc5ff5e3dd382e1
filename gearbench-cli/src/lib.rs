use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, ValueEnum};
use gearbench::{
    BenchConfig, BenchRecord, Benchmark, Context, EnvInfo, Extent, HostBackend, PrecisionKind,
    ResultTable, Variant,
};
use log::LevelFilter;

/// `--variant` values.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum VariantArg {
    InplaceReal,
    OutplaceReal,
    InplaceComplex,
    OutplaceComplex,
}

impl From<VariantArg> for Variant {
    fn from(v: VariantArg) -> Self {
        match v {
            VariantArg::InplaceReal => Variant::InplaceReal,
            VariantArg::OutplaceReal => Variant::OutplaceReal,
            VariantArg::InplaceComplex => Variant::InplaceComplex,
            VariantArg::OutplaceComplex => Variant::OutplaceComplex,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrecisionArg {
    Float,
    Double,
}

impl From<PrecisionArg> for PrecisionKind {
    fn from(p: PrecisionArg) -> Self {
        match p {
            PrecisionArg::Float => PrecisionKind::Single,
            PrecisionArg::Double => PrecisionKind::Double,
        }
    }
}

/// Time the FFT lifecycle for every variant, precision and extent.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Args {
    /// List the available devices and exit
    #[arg(short = 'l', long)]
    pub list_devices: bool,

    /// Device index to run on
    #[arg(short, long)]
    pub device: Option<usize>,

    /// Transform extent such as `1024`, `64x64` or `16x16x16`; repeatable
    #[arg(short, long = "extent")]
    pub extents: Vec<Extent>,

    /// Restrict to these variants; repeatable
    #[arg(long = "variant", value_enum)]
    pub variants: Vec<VariantArg>,

    /// Restrict to these precisions; repeatable
    #[arg(long = "precision", value_enum)]
    pub precisions: Vec<PrecisionArg>,

    /// Recorded runs per combination
    #[arg(short, long)]
    pub runs: Option<usize>,

    /// Unrecorded runs before the recorded ones
    #[arg(short, long)]
    pub warmups: Option<usize>,

    /// Write results here; `.csv` selects CSV, anything else JSON
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Command-line flags override `base`, which already carries environment
/// overrides.
pub fn build_config(args: &Args, base: BenchConfig) -> BenchConfig {
    let mut config = base;
    if let Some(device) = args.device {
        config.device = device;
    }
    if let Some(runs) = args.runs {
        config.runs = runs;
    }
    if let Some(warmups) = args.warmups {
        config.warmups = warmups;
    }
    if !args.extents.is_empty() {
        config.extents = args.extents.clone();
    }
    if !args.variants.is_empty() {
        config.variants = args.variants.iter().map(|&v| v.into()).collect();
    }
    if !args.precisions.is_empty() {
        config.precisions = args.precisions.iter().map(|&p| p.into()).collect();
    }
    config
}

/// Install `env_logger` at a level chosen by the `-v` count.
pub fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    // RUST_LOG still wins when set
    let _ = env_logger::builder()
        .filter_level(level)
        .parse_default_env()
        .try_init();
}

/// Mean milliseconds over all phases, per variant/precision/extent.
pub fn summarize(records: &[BenchRecord]) -> BTreeMap<(String, String, String), f64> {
    let mut sums: BTreeMap<(String, String, String), (f64, usize)> = BTreeMap::new();
    for r in records {
        let key = (r.extent.clone(), r.precision.clone(), r.variant.clone());
        let entry = sums.entry(key).or_insert((0.0, 0));
        entry.0 += r.phases_ms.values().sum::<f64>();
        entry.1 += 1;
    }
    sums.into_iter()
        .map(|(k, (total, count))| (k, total / count as f64))
        .collect()
}

/// Markdown table of [`summarize`] under a one-line run header.
pub fn markdown_summary(table: &ResultTable) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Run: {} on {} ({}; {})\n\n",
        table.env.date, table.env.library, table.env.device, table.env.os
    ));
    out.push_str("| Extent | Precision | Variant | Mean total |\n");
    out.push_str("| --- | --- | --- | --- |\n");
    for ((extent, precision, variant), ms) in summarize(&table.results) {
        out.push_str(&format!("| {extent} | {precision} | {variant} | {ms:.3} ms |\n"));
    }
    out
}

/// Run with `GEARBENCH_*` overrides taken from the process environment.
pub fn run(args: &Args) -> Result<()> {
    run_with_vars(args, |key| std::env::var(key).ok())
}

/// Run with environment overrides from `lookup`.
///
/// Listing devices returns before any variable is read.
pub fn run_with_vars(args: &Args, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
    if args.list_devices {
        let ctx = Context::new(HostBackend::new());
        println!("{}", ctx.device_list());
        return Ok(());
    }

    let base = BenchConfig::default()
        .with_vars(lookup)
        .context("reading GEARBENCH_* environment")?;
    let config = build_config(args, base);

    let mut bench = Benchmark::new(HostBackend::new(), config);
    let mut records = Vec::new();
    let recorded = bench.run(&mut records)?;
    log::info!("{recorded} record(s) collected");

    let table = ResultTable {
        env: EnvInfo::new(bench.context().title(), &bench.context().device_infos()),
        results: records,
    };
    print!("{}", markdown_summary(&table));
    if let Some(path) = &args.output {
        table
            .write(path)
            .with_context(|| format!("writing results to {}", path.display()))?;
    }
    Ok(())
}
