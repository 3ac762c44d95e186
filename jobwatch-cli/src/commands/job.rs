//! Job command handlers
//!
//! Handles submitting, watching, cancelling and listing the files of jobs.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use colored::*;
use jobwatch_client::config::Config;
use jobwatch_client::{JobApiClient, JobTracker, SseEventStream, Upload};
use jobwatch_core::domain::{JobFile, JobId, JobSnapshot, JobStatus, StageStatus};
use serde_json::Value;

type CliTracker = JobTracker<JobApiClient, SseEventStream>;

/// Job subcommands
#[derive(Subcommand)]
pub enum JobCommands {
    /// Submit a document and follow the job until it ends
    Submit {
        /// Document to upload
        file: PathBuf,

        /// Translation options as a JSON object
        #[arg(long, default_value = "{}")]
        options: String,

        /// Engine source descriptor as a JSON object
        #[arg(long, default_value = "{}")]
        source: String,

        /// Return right after the job is started
        #[arg(long)]
        no_watch: bool,
    },
    /// Follow a job that is already running
    Watch {
        /// Job ID
        id: String,
    },
    /// Cancel a queued or running job
    Cancel {
        /// Job ID
        id: String,
    },
    /// List the files a finished job produced
    Files {
        /// Job ID
        id: String,
    },
}

/// Handle job commands
pub async fn handle_job_command(command: JobCommands, config: &Config) -> Result<()> {
    match command {
        JobCommands::Submit {
            file,
            options,
            source,
            no_watch,
        } => submit_job(config, file, &options, &source, no_watch).await,
        JobCommands::Watch { id } => watch_job(config, JobId::new(id)).await,
        JobCommands::Cancel { id } => cancel_job(config, JobId::new(id)).await,
        JobCommands::Files { id } => list_files(config, JobId::new(id)).await,
    }
}

fn api_client(config: &Config) -> Result<JobApiClient> {
    let http = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()
        .context("Failed to build HTTP client")?;
    Ok(JobApiClient::with_client(&config.api_url, http))
}

fn tracker(config: &Config) -> Result<CliTracker> {
    // The stream gets its own client: a request timeout would cut it off
    let stream = SseEventStream::new(&JobApiClient::new(&config.api_url));
    Ok(JobTracker::new(api_client(config)?, stream, config.reconnect))
}

/// Submit a document as a new job
async fn submit_job(
    config: &Config,
    file: PathBuf,
    options: &str,
    source: &str,
    no_watch: bool,
) -> Result<()> {
    let options: Value = serde_json::from_str(options).context("--options must be valid JSON")?;
    let source: Value = serde_json::from_str(source).context("--source must be valid JSON")?;
    let upload = Upload::from_path(&file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let mut tracker = tracker(config)?;
    let snapshot = tracker.start_job(upload, &options, &source).await;

    if snapshot.status == JobStatus::Failed {
        println!("{} {}", "✗ Failed to start job:".red().bold(), snapshot.error_message);
        bail!("job submission failed");
    }

    println!(
        "{} Job {} ({})",
        "✓".green(),
        snapshot.id.to_string().cyan(),
        colorize_status(&snapshot.status)
    );

    if no_watch {
        println!(
            "  Follow it with: {}",
            format!("jobwatch watch {}", snapshot.id).dimmed()
        );
        return Ok(());
    }

    follow(&mut tracker).await
}

/// Follow an existing job
async fn watch_job(config: &Config, job_id: JobId) -> Result<()> {
    let record = api_client(config)?
        .get_job(&job_id)
        .await
        .with_context(|| format!("Failed to get job {}", job_id))?;

    println!(
        "{} {} ({})",
        "Watching job".bold(),
        record.label().cyan(),
        colorize_status(&record.status)
    );

    if record.status.is_terminal() {
        // Already over: nothing will stream, so show what the server has
        if record.status == JobStatus::Finished {
            return list_files(config, job_id).await;
        }
        return Ok(());
    }

    let mut tracker = tracker(config)?;
    tracker.attach(job_id, record.status);
    follow(&mut tracker).await
}

/// Cancel a job
async fn cancel_job(config: &Config, job_id: JobId) -> Result<()> {
    let client = api_client(config)?;
    client
        .cancel_job(&job_id)
        .await
        .with_context(|| format!("Failed to cancel job {}", job_id))?;

    println!("{} Job {} canceled", "✓".green(), job_id.to_string().cyan());
    Ok(())
}

/// List a job's files
async fn list_files(config: &Config, job_id: JobId) -> Result<()> {
    let client = api_client(config)?;
    let files = client
        .get_job_files(&job_id)
        .await
        .with_context(|| format!("Failed to list files for job {}", job_id))?;

    print_files(&files);
    Ok(())
}

/// Renders the tracker's snapshot until the job ends
///
/// Ctrl-C asks the server to cancel the job; the job keeps being watched
/// if the server refuses.
async fn follow(tracker: &mut CliTracker) -> Result<()> {
    let mut observer = tracker.subscribe();
    print_progress(&observer.borrow_and_update());

    while !tracker.snapshot().is_terminal() {
        let message = tokio::select! {
            _ = tokio::signal::ctrl_c() => None,
            message = tracker.next_message() => Some(message),
        };

        match message {
            None => {
                println!("{}", "Cancelling...".yellow());
                if let Err(e) = tracker.cancel().await {
                    println!("{} {:#}", "⚠".yellow(), anyhow::Error::new(e));
                }
            }
            Some(Some(message)) => tracker.handle(message).await,
            Some(None) => break,
        }

        if observer.has_changed().unwrap_or(false) {
            print_progress(&observer.borrow_and_update());
        }
    }

    let snapshot = tracker.snapshot().clone();
    println!();
    print_summary(&snapshot);

    match snapshot.status {
        JobStatus::Finished => {
            print_files(&tracker.files());
            Ok(())
        }
        JobStatus::Failed => bail!("job {} failed", snapshot.id),
        JobStatus::Canceled => Ok(()),
        _ => bail!("event stream ended before job {} completed", snapshot.id),
    }
}

/// Print one progress line
fn print_progress(snapshot: &JobSnapshot) {
    let mut line = format!(
        "[{:>3}%] {}",
        snapshot.overall_progress,
        colorize_status(&snapshot.status)
    );

    if !snapshot.current_stage_name.is_empty() {
        line.push_str(&format!(
            "  {} {}%",
            snapshot.current_stage_name.cyan(),
            snapshot.current_stage_progress
        ));
    }
    if !snapshot.info_message.is_empty() {
        line.push_str(&format!("  {}", snapshot.info_message.dimmed()));
    }

    println!("{}", line);
}

/// Print the final state of a job
fn print_summary(snapshot: &JobSnapshot) {
    println!("{}", "Job Details:".bold());
    println!("  ID:       {}", snapshot.id.to_string().cyan());
    println!("  Status:   {}", colorize_status(&snapshot.status));
    println!("  Progress: {}%", snapshot.overall_progress);

    if !snapshot.stages.is_empty() {
        println!("\n{}", "Stages:".bold());
        for stage in snapshot.stages.iter() {
            let marker = match stage.status {
                StageStatus::Completed => "✓".green(),
                StageStatus::Running => "▸".cyan(),
                StageStatus::Pending => "·".dimmed(),
            };
            println!(
                "  {} {:<24} {:>3}%  {}",
                marker,
                stage.name,
                stage.percent,
                format!("weight {}", stage.weight).dimmed()
            );
        }
    }

    if !snapshot.error_message.is_empty() {
        println!("\n{}", "Error:".bold());
        println!("{}", snapshot.error_message.red());
    }
}

/// Print a list of job files
fn print_files(files: &[JobFile]) {
    if files.is_empty() {
        println!("{}", "No files found.".yellow());
        return;
    }

    println!("\n{}", format!("Found {} file(s):", files.len()).bold());
    for file in files {
        println!("  {} {}", "▸".cyan(), file.filename);
        println!("    Kind: {:?}", file.kind);
        println!("    Size: {}", format_size(file.size).dimmed());
        if let Some(watermark) = &file.watermark {
            println!("    Watermark: {}", watermark.dimmed());
        }
        println!("    URL:  {}", file.url.dimmed());
    }
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

/// Colorize job status for display
fn colorize_status(status: &JobStatus) -> colored::ColoredString {
    let status_str = status.to_string();
    match status {
        JobStatus::Idle => status_str.dimmed(),
        JobStatus::Queued => status_str.yellow(),
        JobStatus::Running => status_str.cyan(),
        JobStatus::Finished => status_str.green(),
        JobStatus::Failed => status_str.red(),
        JobStatus::Canceled => status_str.dimmed(),
    }
}
