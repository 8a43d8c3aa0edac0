//! Command-line front end.
//!
//! Runs a local PDF through the same upload / start / poll / download cycle
//! a remote client would use, then cleans the job up.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use pdfdeck::{
    init_tracing, load_config, poll_until_terminal, Config, ConversionService, JobId, JobStatus,
    JobView, PollOptions,
};

#[derive(Parser, Debug)]
#[command(
    name = "pdfdeck",
    version,
    about = "Convert PDF documents into editable PowerPoint decks"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert one PDF and write the deck next to it (or into --out).
    Convert {
        /// PDF file to convert.
        input: PathBuf,

        /// Conversion mode: precision or safeguard.
        #[arg(short, long, env = "PDFDECK_MODE", default_value = "precision")]
        mode: String,

        /// JSON config file. Built-in defaults are used when omitted.
        #[arg(short, long, env = "PDFDECK_CONFIG")]
        config: Option<PathBuf>,

        /// Directory for the produced deck.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Give up after this many seconds.
        #[arg(long, env = "PDFDECK_TIMEOUT")]
        timeout: Option<u64>,
    },

    /// Load and validate a config file.
    CheckConfig {
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Convert {
            input,
            mode,
            config,
            out,
            timeout,
        } => {
            let config = match config {
                Some(path) => load_config(&path)
                    .with_context(|| format!("Failed to load config from {:?}", path))?,
                None => Config::default(),
            };
            init_tracing(&config.logging).context("Failed to initialise logging")?;

            let out_dir = match out {
                Some(dir) => dir,
                None => input
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from(".")),
            };
            let mut options = PollOptions::every(Duration::from_millis(config.poll_interval_ms));
            if let Some(secs) = timeout {
                options = options.with_deadline(Duration::from_secs(secs));
            }

            let service = ConversionService::from_config(&config)
                .await
                .context("Failed to start conversion service")?;

            let written = convert(&service, &input, &mode, &out_dir, options, ctrl_c()).await;

            // A second Ctrl-C stops waiting for a conversion still running.
            tokio::select! {
                _ = service.shutdown() => {}
                _ = ctrl_c() => eprintln!("Not waiting for the running conversion"),
            }
            let written = written?;
            println!("{}", written.display());
            Ok(())
        }
        Command::CheckConfig { path } => {
            let config = load_config(&path)
                .with_context(|| format!("Invalid config file {:?}", path))?;
            println!(
                "{:?} is valid: {} workers, queue of {}, precision via '{}', safeguard via '{}'",
                path,
                config.worker_count,
                config.queue_capacity,
                config.engines.precision.program,
                config.engines.safeguard.program
            );
            Ok(())
        }
    }
}

/// Resolves on Ctrl-C, or never if the handler cannot be installed.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        eprintln!("Warning: cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Uploads `input`, converts it and writes the deck into `out_dir`.
///
/// The job is deleted afterwards whether the conversion succeeded, failed or
/// was cut short by `interrupt`.
async fn convert(
    service: &ConversionService,
    input: &Path,
    mode: &str,
    out_dir: &Path,
    options: PollOptions,
    interrupt: impl Future<Output = ()>,
) -> Result<PathBuf> {
    let content = tokio::fs::read(input)
        .await
        .with_context(|| format!("Failed to read {:?}", input))?;
    let filename = input
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .context("Input path has no file name")?;

    let id = service
        .upload(&filename, &content, mode)
        .await
        .context("Upload rejected")?;

    let result = tokio::select! {
        result = run_job(service, &id, out_dir, options) => result,
        _ = interrupt => {
            eprintln!("Interrupted");
            Err(anyhow!("Conversion interrupted"))
        }
    };
    if let Err(e) = service.delete(&id).await {
        eprintln!("Warning: failed to clean up job {}: {}", id, e);
    }
    result
}

async fn run_job(
    service: &ConversionService,
    id: &JobId,
    out_dir: &Path,
    options: PollOptions,
) -> Result<PathBuf> {
    service
        .start_processing(id, None)
        .context("Failed to start processing")?;

    let mut last: Option<(JobStatus, u8, String)> = None;
    let view = poll_until_terminal(service, id, options, |view| print_progress(view, &mut last))
        .await
        .context("Failed while waiting for the conversion")?;

    if view.status == JobStatus::Error {
        bail!(
            "Conversion failed: {}",
            view.error_detail.as_deref().unwrap_or("no detail reported")
        );
    }

    let artifact = service
        .download(id)
        .await
        .context("Failed to fetch the converted deck")?;

    tokio::fs::create_dir_all(out_dir)
        .await
        .with_context(|| format!("Failed to create {:?}", out_dir))?;
    let target = out_dir.join(&artifact.filename);
    tokio::fs::write(&target, &artifact.bytes)
        .await
        .with_context(|| format!("Failed to write {:?}", target))?;

    Ok(target)
}

/// Prints a line whenever status, progress or message changes.
fn print_progress(view: &JobView, last: &mut Option<(JobStatus, u8, String)>) {
    let current = (view.status, view.progress, view.message.clone());
    if last.as_ref() == Some(&current) {
        return;
    }
    eprintln!("[{:>3}%] {:<10} {}", view.progress, view.status, view.message);
    *last = Some(current);
}
