//! Command-line front end for the complaint classifier
//!
//! `classify` handles one complaint typed on the command line; `batch`
//! classifies a whole file and writes the result table as JSON records.

mod input;

use std::fs;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dotenv::dotenv;
use tokio_util::sync::CancellationToken;

use classifier_sdk::config::{
    ConfigProvider, DEFAULT_CHUNKED_STOP_THRESHOLD, DEFAULT_CHUNK_CAP, DEFAULT_PROVIDER,
    DEFAULT_TOKEN_BUDGET,
};
use classifier_sdk::{
    build_backend, BackendConfig, BatchRunner, ChunkSizing, ClassifierClient, LogProgress,
    RetryConfig, RetryPolicy, RunConfig, RunMode, RunOutcome,
};

/// Exit status when the failure threshold stopped the run
const EXIT_STOPPED_EARLY: i32 = 3;

/// Exit status when the run was interrupted
const EXIT_CANCELLED: i32 = 130;

#[derive(Debug, Parser)]
#[command(name = "classifier-cli", version, about = "Classify passenger complaints by root cause")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Classify a single complaint
    Classify {
        /// Complaint text
        text: String,

        /// Call the backend once, without retrying transient failures
        #[arg(long)]
        no_retry: bool,
    },

    /// Classify every complaint in a file
    Batch(BatchArgs),
}

#[derive(Debug, Args)]
struct BatchArgs {
    /// JSON array or plain text file, one complaint per line
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// Column holding the complaint when rows are JSON objects
    #[arg(short, long, default_value = "Queja")]
    column: String,

    /// Where to write the result records (stdout when absent)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Send complaints in chunks instead of one call per row
    #[arg(long)]
    chunked: bool,

    /// Fixed number of rows per chunk
    #[arg(long, conflicts_with = "token_budget")]
    chunk_size: Option<usize>,

    /// Token budget per chunked request
    #[arg(long)]
    token_budget: Option<usize>,

    /// Pause between calls, in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Consecutive failed units that stop the run
    #[arg(long)]
    stop_threshold: Option<usize>,

    /// Call the backend once per unit, without retrying transient failures
    #[arg(long)]
    no_retry: bool,
}

impl BatchArgs {
    fn wants_chunks(&self) -> bool {
        self.chunked || self.chunk_size.is_some() || self.token_budget.is_some()
    }

    /// Environment settings with the command-line overrides applied
    fn run_config(&self, provider: &dyn ConfigProvider) -> Result<RunConfig> {
        let mut config = RunConfig::from_provider(provider)?;

        if self.wants_chunks() {
            let sizing = match (self.chunk_size, self.token_budget, &config.mode) {
                (Some(size), _, _) => ChunkSizing::Fixed(size),
                (None, Some(budget), _) => ChunkSizing::token_budget(budget, DEFAULT_CHUNK_CAP),
                (None, None, RunMode::Chunked(sizing)) => sizing.clone(),
                (None, None, RunMode::PerRow) => {
                    ChunkSizing::token_budget(DEFAULT_TOKEN_BUDGET, DEFAULT_CHUNK_CAP)
                }
            };
            if config.mode == RunMode::PerRow {
                config.stop_threshold = DEFAULT_CHUNKED_STOP_THRESHOLD;
            }
            config.mode = RunMode::Chunked(sizing);
        }

        if let Some(threshold) = self.stop_threshold {
            config.stop_threshold = threshold;
        }
        if let Some(delay) = self.delay_ms {
            config = config.with_delay(std::time::Duration::from_millis(delay));
        }

        Ok(config)
    }
}

fn build_client(provider: &dyn ConfigProvider, no_retry: bool) -> Result<ClassifierClient> {
    let backend_config = BackendConfig::from_provider(provider)
        .context("Backend configuration is incomplete (set CLASSIFIER_API_KEY)")?;
    let backend = build_backend(&backend_config)?;
    let client = ClassifierClient::new(backend, backend_config);

    match RetryConfig::from_provider(provider)? {
        Some(retry) if !no_retry => {
            let policy = RetryPolicy::new(retry);
            log::info!("{} waits {:?}", policy, policy.wait_schedule());
            Ok(client.with_retry(policy))
        }
        _ => {
            log::info!("Retry disabled");
            Ok(client.without_retry())
        }
    }
}

async fn classify(text: String, no_retry: bool) -> Result<i32> {
    if text.trim().is_empty() {
        eprintln!("Ingresá una queja antes de clasificar.");
        return Ok(2);
    }

    let client = build_client(&**DEFAULT_PROVIDER, no_retry)?;
    let result = client.classify_one(&text).await;

    if result.is_error() {
        eprintln!("Error ({}): {}", result.category, result.reason);
        return Ok(1);
    }

    println!("Categoría: {}", result.category);
    println!("Razón: {}", result.reason);
    Ok(0)
}

async fn batch(args: BatchArgs) -> Result<i32> {
    let provider = &**DEFAULT_PROVIDER;
    let run_config = args.run_config(provider)?;
    let client = build_client(provider, args.no_retry)?;
    let texts = input::read_complaints(&args.input, &args.column)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received, finishing the current unit and stopping");
            on_signal.cancel();
        }
    });

    let runner = BatchRunner::new(client, run_config);
    let report = runner.run(&texts, &LogProgress, &cancel).await?;

    let outcome = report.outcome;
    let stats = report.stats;
    let table = report.into_table(&args.column, &texts)?;
    let failed = table.failed_rows();
    let rendered = serde_json::to_string_pretty(&table.to_records())?;

    match &args.output {
        Some(path) => {
            fs::write(path, rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("Wrote {} rows to {}", table.len(), path.display());
        }
        None => println!("{}", rendered),
    }

    log::info!(
        "{} classified, {} errors, {} blank, {} not processed",
        stats.classified,
        stats.errors,
        stats.skipped,
        stats.backfilled
    );
    if !failed.is_empty() {
        log::warn!("{} row(s) carry an error sentinel", failed.len());
    }

    Ok(match outcome {
        RunOutcome::Completed => 0,
        RunOutcome::StoppedEarly { at_row, .. } => {
            log::error!("Run stopped early at row {} after consecutive errors", at_row);
            EXIT_STOPPED_EARLY
        }
        RunOutcome::Cancelled { at_row } => {
            log::warn!("Run cancelled at row {}", at_row);
            EXIT_CANCELLED
        }
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenv().ok();

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Classify { text, no_retry } => classify(text, no_retry).await?,
        Commands::Batch(args) => batch(args).await?,
    };

    process::exit(code);
}
