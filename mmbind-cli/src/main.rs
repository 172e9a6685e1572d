use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mmbind_core::{
    Aligner, AlignmentList, FixtureEngine, IndexHandle, Mm2Result, NativeBridge, Preset, Runtime,
};
use rayon::prelude::*;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

mod config;
mod error;
mod output;
mod reads;

use config::{AlignConfig, Config};
use output::{write_results, OutputFormat};
use reads::{load_reads, Read};

#[derive(Parser)]
#[command(name = "mmbind")]
#[command(about = "mmbind - demo driver for the mmbind binding")]
#[command(long_about = "mmbind - demo driver for the mmbind binding.\n\n\
    Runs against the in-process fixture engine (exact 15-mer seeding, ungapped \
    extension). Its alignments exercise the binding; they are not minimap2 output.")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./mmbind.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Align reads against an index
    Align {
        /// Index (reference) file
        #[arg(short, long)]
        index: PathBuf,

        /// Query FASTA/FASTQ file
        #[arg(short, long)]
        query: PathBuf,

        /// Options preset (map-ont, sr, asm5, ...)
        #[arg(short, long)]
        preset: Option<Preset>,

        /// Number of threads, one aligner each
        #[arg(short, long)]
        threads: Option<usize>,

        /// Reads per engine call
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the reference names of an index
    Names {
        #[arg(short, long)]
        index: PathBuf,
    },

    /// Show the options struct the engine builds for an index
    Options {
        #[arg(short, long)]
        index: PathBuf,

        #[arg(short, long)]
        preset: Option<Preset>,
    },

    /// Print an example configuration file, or write it to a file
    Config {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    if let Commands::Config { output } = &cli.command {
        return cmd_config(output.as_deref());
    }

    let mut config = Config::load(cli.config.as_deref())?;
    let runtime =
        Runtime::new(FixtureEngine::new()).context("Failed to initialize alignment engine")?;
    log::info!(
        "Using the in-process {} engine ({}); results are for demonstration only",
        runtime.bridge().name(),
        runtime.version()
    );

    match cli.command {
        Commands::Align { index, query, preset, threads, batch_size, format, output } => {
            if preset.is_some() {
                config.align.preset = preset;
            }
            if let Some(threads) = threads {
                config.general.threads = threads;
            }
            if let Some(batch_size) = batch_size {
                config.general.batch_size = batch_size;
            }
            if let Some(format) = format {
                config.output.format = format;
            }
            config.validate()?;
            cmd_align(&runtime, &config, &index, &query, output.as_deref())
        }
        Commands::Names { index } => cmd_names(&runtime, &index),
        Commands::Options { index, preset } => {
            if preset.is_some() {
                config.align.preset = preset;
            }
            cmd_options(&runtime, &config.align, &index)
        }
        Commands::Config { .. } => Ok(()),
    }
}

fn cmd_config(output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            Config::default().save_to_file(path)?;
            log::info!("Wrote example configuration to {}", path.display());
        }
        None => print!("{}", Config::example_toml()?),
    }
    Ok(())
}

fn open_index(
    runtime: &Runtime<FixtureEngine>,
    path: &Path,
) -> Result<IndexHandle<FixtureEngine>> {
    let start = Instant::now();
    let index = runtime
        .open_index(path)
        .with_context(|| format!("Failed to load index {}", path.display()))?;
    log::info!("Loaded index {} in {:.2}s", path.display(), start.elapsed().as_secs_f64());
    Ok(index)
}

fn make_aligner<'i>(
    index: &'i IndexHandle<FixtureEngine>,
    settings: &AlignConfig,
) -> Mm2Result<Aligner<'i, FixtureEngine>> {
    let mut aligner = match settings.preset {
        Some(preset) => Aligner::with_preset(index, preset)?,
        None => Aligner::new(index)?,
    };
    settings.apply(aligner.options_mut()?);
    Ok(aligner)
}

fn cmd_align(
    runtime: &Runtime<FixtureEngine>,
    config: &Config,
    index_path: &Path,
    query: &Path,
    output: Option<&Path>,
) -> Result<()> {
    log::info!("Starting alignment: {} vs {}", query.display(), index_path.display());

    let index = open_index(runtime, index_path)?;
    let names = index.ref_names()?;
    let reads = load_reads(query)?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.general.threads)
        .build()
        .context("Failed to build thread pool")?;

    let start = Instant::now();
    let batches: Vec<&[Read]> = reads.chunks(config.general.batch_size).collect();
    let per_batch: Vec<Vec<AlignmentList>> = pool.install(|| {
        batches
            .par_iter()
            .map_init(
                || make_aligner(&index, &config.align),
                |aligner, batch| match aligner {
                    Ok(aligner) => aligner
                        .align_with(*batch, |read| read.seq.as_slice())
                        .context("Alignment failed"),
                    Err(e) => Err(anyhow::anyhow!("Failed to create aligner: {}", e)),
                },
            )
            .collect::<Result<Vec<_>>>()
    })?;
    let results: Vec<AlignmentList> = per_batch.into_iter().flatten().collect();

    let mapped = results.iter().filter(|hits| !hits.is_empty()).count();
    log::info!(
        "Aligned {} reads ({} mapped) in {:.2}s using {} threads",
        reads.len(),
        mapped,
        start.elapsed().as_secs_f64(),
        config.general.threads
    );

    let mut out: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    write_results(&mut out, config.output.format, names, &reads, &results)?;
    out.flush()?;

    index.close()?;
    Ok(())
}

fn cmd_names(runtime: &Runtime<FixtureEngine>, index_path: &Path) -> Result<()> {
    let index = open_index(runtime, index_path)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for name in index.ref_names()? {
        writeln!(out, "{}", name)?;
    }
    index.close()?;
    Ok(())
}

fn cmd_options(
    runtime: &Runtime<FixtureEngine>,
    settings: &AlignConfig,
    index_path: &Path,
) -> Result<()> {
    let index = open_index(runtime, index_path)?;
    {
        let aligner = make_aligner(&index, settings)?;
        println!("{}", aligner.options()?);
    }
    index.close()?;
    Ok(())
}
