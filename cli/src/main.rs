//! trawl CLI - binary entry point.
//!
//! ```text
//! main() -> init_tracing() -> TrawlConfig -> build_agent() -> Agent::run(stdin)
//! ```
//!
//! Logs go to a file so they never interleave with the chat on stdout.

use std::fs::{self, OpenOptions};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::BufReader;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use trawl_engine::{ConsoleTranscript, RunOptions, SessionEnd, TrawlConfig, build_agent};

#[derive(Debug, Parser)]
#[command(name = "trawl")]
#[command(about = "Chat with Claude from the terminal, with local file and search tools")]
#[command(version)]
struct Cli {
    /// Log conversation flow at debug level.
    #[arg(short, long)]
    verbose: bool,

    /// Model to use, overriding [app].model.
    #[arg(short, long)]
    model: Option<String>,

    /// Read configuration from this file instead of ~/.trawl/config.toml.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn init_tracing(verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let (log_file, init_warnings) = open_trawl_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // No log file: stay silent rather than write into the transcript.
    tracing_subscriber::registry().with(env_filter).init();
}

fn open_trawl_log_file() -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in trawl_log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new().create(true).append(true).open(&candidate) {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn trawl_log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: ~/.trawl/logs/trawl.log
    if let Some(config_path) = TrawlConfig::path()
        && let Some(config_dir) = config_path.parent()
    {
        candidates.push(config_dir.join("logs").join("trawl.log"));
    }

    // Fallback: ./.trawl/logs/trawl.log
    candidates.push(PathBuf::from(".trawl").join("logs").join("trawl.log"));

    candidates
}

fn load_config(explicit: Option<&PathBuf>) -> Result<TrawlConfig> {
    if let Some(path) = explicit {
        return TrawlConfig::read(path).context("loading --config");
    }
    Ok(TrawlConfig::load()?.unwrap_or_default())
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_ref())?;
    let working_dir = std::env::current_dir().context("resolving working directory")?;

    let mut agent = build_agent(
        &config,
        RunOptions {
            model: cli.model,
            working_dir: Some(working_dir),
        },
    )?;

    let mut transcript = ConsoleTranscript::new(std::io::stdout().is_terminal());
    let input = BufReader::new(tokio::io::stdin());
    let report = agent.run(input, &mut transcript).await;

    match &report.end {
        SessionEnd::InputClosed => tracing::info!("Input closed"),
        SessionEnd::InputFailed(e) => tracing::warn!("Input failed: {e}"),
        SessionEnd::InferenceFailed(e) => tracing::warn!("Session ended by inference error: {e}"),
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
