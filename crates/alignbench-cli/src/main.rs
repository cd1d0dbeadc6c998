//! alignbench - pairwise aligner benchmarking CLI
//!
//! ## Commands
//!
//! - `validate`: Check an experiment file without running anything
//! - `expand`: Print the jobs an experiment expands into
//! - `fetch`: Download and cache the experiment's datasets
//! - `run`: Run all jobs against a backend and store the results

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use alignbench_runner::{
    default_results_path, expand_all, init_tracing, load_results, merge_results, retain_pending,
    save_results, verify_costs, write_log, DatasetFetcher, Expansion, FetchConfig, Orchestrator,
    OrchestratorConfig, Overrides, ProcessConfig, ProcessRunner,
};
use alignbench_types::{load_suites, parse_duration, ByteSize, Suite};
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "alignbench")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Benchmark pairwise sequence aligners", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and validate an experiment file
    Validate {
        /// Experiment YAML
        experiment: PathBuf,
    },

    /// Print the jobs of an experiment as JSON lines
    Expand {
        /// Experiment YAML
        experiment: PathBuf,

        /// Directory holding downloaded datasets
        #[arg(long, default_value = "evals/data", env = "ALIGNBENCH_DATA_DIR")]
        data_dir: PathBuf,
    },

    /// Download the datasets of an experiment
    Fetch {
        /// Experiment YAML
        experiment: PathBuf,

        /// Directory holding downloaded datasets
        #[arg(long, default_value = "evals/data", env = "ALIGNBENCH_DATA_DIR")]
        data_dir: PathBuf,

        /// Download again even when a cached copy exists
        #[arg(long)]
        force: bool,
    },

    /// Run an experiment
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Experiment YAML
    experiment: PathBuf,

    /// Results JSON. Defaults to the experiment path with its last
    /// `experiments` directory replaced by `results`.
    results: Option<PathBuf>,

    /// Directory holding downloaded datasets
    #[arg(long, default_value = "evals/data", env = "ALIGNBENCH_DATA_DIR")]
    data_dir: PathBuf,

    /// Directory for timestamped copies of each run's results
    #[arg(long, default_value = "evals/results/.log")]
    logs_dir: PathBuf,

    /// Backend executable running the aligners
    #[arg(long, env = "ALIGNBENCH_BACKEND")]
    backend: PathBuf,

    /// Extra argument placed before the aligner name (repeatable)
    #[arg(long = "backend-arg", allow_hyphen_values = true)]
    backend_args: Vec<String>,

    /// Override the time limit of every suite, e.g. `30s`
    #[arg(short, long, value_parser = parse_duration)]
    time_limit: Option<Duration>,

    /// Override the memory limit of every suite, e.g. `4GiB`
    #[arg(short, long, value_parser = parse_byte_size)]
    mem_limit: Option<ByteSize>,

    /// Number of parallel jobs, capped at the number of cores minus one
    #[arg(short = 'j', long, default_value_t = 1)]
    num_jobs: usize,

    /// Pin every job to its own core
    #[arg(long)]
    pin: bool,

    /// Show the backend's stderr
    #[arg(long)]
    stderr: bool,

    /// Skip jobs that already succeeded, or failed with at least the same
    /// resources
    #[arg(short, long)]
    incremental: bool,

    /// With --incremental, rerun failed jobs too
    #[arg(short, long, requires = "incremental")]
    rerun_failed: bool,

    /// Ignore existing results and download datasets again
    #[arg(long)]
    force_rerun: bool,
}

fn parse_byte_size(s: &str) -> Result<ByteSize, alignbench_types::UnitError> {
    s.parse()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    match cli.command {
        Commands::Validate { experiment } => cmd_validate(&experiment),
        Commands::Expand {
            experiment,
            data_dir,
        } => cmd_expand(&experiment, &data_dir).await,
        Commands::Fetch {
            experiment,
            data_dir,
            force,
        } => cmd_fetch(&experiment, &data_dir, force).await,
        Commands::Run(args) => cmd_run(args, cli.verbose).await,
    }
}

fn load(experiment: &Path) -> Result<Vec<Suite>> {
    load_suites(experiment).with_context(|| format!("Invalid experiment {}", experiment.display()))
}

/// Validate an experiment file
fn cmd_validate(experiment: &Path) -> Result<()> {
    let suites = load(experiment)?;
    for (i, suite) in suites.iter().enumerate() {
        println!(
            "suite {i}: {} dataset(s) x {} configuration(s), time limit {}, memory limit {}",
            suite.datasets.len(),
            suite.configurations_per_dataset(),
            alignbench_types::format_duration(suite.time_limit),
            suite.mem_limit,
        );
    }
    println!("{}: OK", experiment.display());
    Ok(())
}

/// Print every job as one JSON line
async fn cmd_expand(experiment: &Path, data_dir: &Path) -> Result<()> {
    let suites = load(experiment)?;
    let fetcher = DatasetFetcher::new(data_dir, FetchConfig::default())?;
    let Expansion { jobs, failed } = expand_all(&suites, &fetcher, &Overrides::default()).await;

    for job in &jobs {
        println!("{}", serde_json::to_string(job)?);
    }
    if !failed.is_empty() {
        bail!("{} suite(s) could not be expanded", failed.len());
    }
    Ok(())
}

/// Download all datasets
async fn cmd_fetch(experiment: &Path, data_dir: &Path, force: bool) -> Result<()> {
    let suites = load(experiment)?;
    let fetcher = DatasetFetcher::new(
        data_dir,
        FetchConfig {
            force,
            ..FetchConfig::default()
        },
    )?;

    let mut failures = 0;
    for (i, suite) in suites.iter().enumerate() {
        for dataset in &suite.datasets {
            match fetcher.fetch(dataset).await {
                Ok(files) => println!("suite {i}: {} ({} file(s))", dataset.describe(), files.len()),
                Err(err) => {
                    warn!(suite = i, dataset = %dataset.describe(), error = %err, "Fetch failed");
                    failures += 1;
                }
            }
        }
    }
    if failures > 0 {
        bail!("{failures} dataset(s) could not be fetched");
    }
    Ok(())
}

/// Cancel the run on Ctrl-C.
fn cancel_on_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping jobs");
            let _ = tx.send(true);
        }
    });
    rx
}

/// Run an experiment and store its results
async fn cmd_run(args: RunArgs, verbose: bool) -> Result<()> {
    let suites = load(&args.experiment)?;
    if !args.backend.exists() {
        bail!("Backend {} does not exist", args.backend.display());
    }
    let results_path = args
        .results
        .clone()
        .unwrap_or_else(|| default_results_path(&args.experiment));

    let fetcher = DatasetFetcher::new(
        &args.data_dir,
        FetchConfig {
            force: args.force_rerun,
            ..FetchConfig::default()
        },
    )?;
    let overrides = Overrides {
        time_limit: args.time_limit,
        mem_limit: args.mem_limit,
    };
    let Expansion { mut jobs, failed } = expand_all(&suites, &fetcher, &overrides).await;
    info!(jobs = jobs.len(), "Generated jobs");

    let existing = if args.force_rerun {
        Vec::new()
    } else {
        load_results(&results_path)
            .with_context(|| format!("Failed to read {}", results_path.display()))?
    };
    if args.incremental {
        info!(existing = existing.len(), "Existing results");
        jobs = retain_pending(jobs, &existing, args.rerun_failed);
    }

    let process = ProcessConfig {
        backend_args: args.backend_args.clone(),
        show_stderr: args.stderr,
        verbose,
        ..ProcessConfig::new(&args.backend)
    };
    let orchestrator = Orchestrator::new(
        Arc::new(ProcessRunner::new(process)),
        OrchestratorConfig {
            num_jobs: args.num_jobs,
            pin_cores: args.pin,
        },
    );
    let report = orchestrator.run(jobs, cancel_on_ctrl_c()).await;

    let stem = args
        .experiment
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "results".to_string());
    let log = write_log(&args.logs_dir, &stem, &report.results).context("Failed to write run log")?;
    info!(path = %log.display(), run_id = %report.run_id, "Run log written");

    let mut results = merge_results(existing, report.results);
    let verification = verify_costs(&mut results);
    save_results(&results_path, &results)
        .with_context(|| format!("Failed to write {}", results_path.display()))?;

    let counts = report.counts;
    println!(
        "Processed {} job(s): {} succeeded, {} unsupported, {} failed. Results: {}",
        counts.done,
        counts.success,
        counts.unsupported,
        counts.failed,
        results_path.display()
    );

    if !failed.is_empty() {
        bail!(
            "{} suite(s) were skipped because their datasets could not be fetched",
            failed.len()
        );
    }
    if !verification.is_consistent() {
        bail!(
            "{} exact result(s) disagree on costs",
            verification.mismatches.len()
        );
    }
    Ok(())
}
