//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use sc_core::config::load_config;
use sc_core::config::loader::validate_config;
use sc_core::pipeline::{event_channel, Pipeline};
use sc_protocol::{PipelineConfig, PipelineEvent};
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::report;

/// Exit code for a completed run with recorded issues under `--strict`.
pub(crate) const STRICT_FAILURE: i32 = 2;

const EVENT_CAPACITY: usize = 256;

/// SuperCode: convert SuperClaude configuration into generated artifacts.
#[derive(Parser)]
#[command(name = "supercode", version, about, long_about = None)]
pub(crate) struct Cli {
    /// Verbose logging (debug level unless RUST_LOG is set).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Report output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
    Yaml,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Detect, transform and generate.
    Run(RunArgs),

    /// Detect features and print them without generating anything.
    Detect(DetectArgs),
}

#[derive(clap::Args)]
pub(crate) struct RunArgs {
    /// Repository to convert.
    pub repo: PathBuf,

    /// Configuration file (defaults to supercode.toml in the working directory).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output directory.
    #[arg(short, long)]
    pub output: Option<String>,

    /// Plan the file set without writing.
    #[arg(long)]
    pub dry_run: bool,

    /// Overwrite files that changed since they were generated.
    #[arg(long)]
    pub force: bool,

    /// Keep a backup of every overwritten file.
    #[arg(long, overrides_with = "no_backup")]
    pub backup: bool,

    /// Overwrite without keeping backups.
    #[arg(long)]
    pub no_backup: bool,

    /// Feature kinds to convert (comma separated).
    #[arg(long, value_delimiter = ',')]
    pub include: Vec<String>,

    /// Feature kinds to leave out (comma separated).
    #[arg(long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Exit with status 2 when any error or warning was recorded.
    #[arg(long)]
    pub strict: bool,
}

#[derive(clap::Args)]
pub(crate) struct DetectArgs {
    /// Repository to scan.
    pub repo: PathBuf,

    /// Configuration file (defaults to supercode.toml in the working directory).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Feature kinds to detect (comma separated).
    #[arg(long, value_delimiter = ',')]
    pub include: Vec<String>,

    #[arg(long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    #[arg(long)]
    pub strict: bool,
}

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if cli.log_json {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Run the CLI command and return the process exit code.
pub(crate) async fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Run(args) => cmd_run(args).await,
        Command::Detect(args) => cmd_detect(args).await,
    }
}

fn load(config: Option<&Path>) -> Result<(PipelineConfig, PathBuf)> {
    let cwd = std::env::current_dir().wrap_err("cannot determine working directory")?;
    let config = load_config(config, &cwd)?;
    Ok((config, cwd))
}

fn select(config: &mut PipelineConfig, include: &[String], exclude: &[String]) {
    if !include.is_empty() {
        config.features.include = include.to_vec();
    }
    if !exclude.is_empty() {
        config.features.exclude = exclude.to_vec();
    }
}

fn apply_run_overrides(config: &mut PipelineConfig, args: &RunArgs) {
    select(config, &args.include, &args.exclude);
    if let Some(output) = &args.output {
        config.output_dir = output.clone();
    }
    if args.dry_run {
        config.generator.dry_run = true;
    }
    if args.force {
        config.generator.force = true;
    }
    if args.no_backup {
        config.generator.backup = false;
    } else if args.backup {
        config.generator.backup = true;
    }
}

/// Cancels `token` on Ctrl-C.
fn cancel_on_interrupt() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing with partial results");
            child.cancel();
        }
    });
    token
}

async fn cmd_run(args: RunArgs) -> Result<i32> {
    let (mut config, cwd) = load(args.config.as_deref())?;
    apply_run_overrides(&mut config, &args);
    validate_config(&config, &args.config.clone().unwrap_or_else(|| cwd.join("command line")))?;

    info!(
        repo = %args.repo.display(),
        output = %config.output_dir,
        dry_run = config.generator.dry_run,
        "converting repository"
    );

    let (tx, mut events) = event_channel(EVENT_CAPACITY);
    let progress = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            match event {
                PipelineEvent::StateChanged { state, .. } => debug!(?state, "state"),
                PipelineEvent::DetectorFinished {
                    kind,
                    features,
                    issues,
                    cancelled,
                } => info!(%kind, features, issues, cancelled, "detector finished"),
                PipelineEvent::FileProcessed(outcome) => {
                    debug!(path = %outcome.path, action = ?outcome.action, "file processed")
                }
            }
        }
    });

    let pipeline = Pipeline::new(config).with_events(tx);
    let result = pipeline.run(&args.repo, cancel_on_interrupt()).await;
    drop(pipeline);
    let _ = progress.await;
    let report = result?;

    report::print_run(&report, args.format)?;
    if args.strict && report.has_issues() {
        return Ok(STRICT_FAILURE);
    }
    Ok(0)
}

async fn cmd_detect(args: DetectArgs) -> Result<i32> {
    let (mut config, cwd) = load(args.config.as_deref())?;
    select(&mut config, &args.include, &args.exclude);
    validate_config(&config, &args.config.clone().unwrap_or_else(|| cwd.join("command line")))?;

    let pipeline = Pipeline::new(config);
    let detection = pipeline.detect(&args.repo, cancel_on_interrupt()).await?;

    report::print_detection(&detection, &pipeline.kinds(), args.format)?;
    if args.strict && !(detection.errors.is_empty() && detection.warnings.is_empty()) {
        return Ok(STRICT_FAILURE);
    }
    Ok(0)
}
