//! bucketsync - incremental folder backup to a cloud bucket
//!
//! Walks a local folder, compares it against the bucket's inventory and
//! uploads only what is new or changed, one file at a time.

use anyhow::{Context, Result};
use bucketsync_engine::{BackupConfig, BackupEngine, ProgressEvent, ProgressReporter};
use bucketsync_fingerprint::FingerprintHandle;
use bucketsync_remote::{GcsConfig, GcsStore, RemoteHandle};
use bucketsync_types::{BackupStats, RetryPolicy, WriteOptions};
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// bucketsync - incremental folder backup to a cloud bucket
#[derive(Parser, Debug)]
#[command(
    name = "bucketsync",
    version = env!("CARGO_PKG_VERSION"),
    about = "Incremental folder backup to a Google Cloud Storage bucket",
    long_about = "bucketsync mirrors a local folder into a bucket under the folder's own\n\
                  name. Each run re-walks the tree, compares content fingerprints with\n\
                  the bucket inventory and uploads only new or changed files."
)]
struct Cli {
    /// Folder to back up; its name becomes the key prefix in the bucket
    folder: PathBuf,

    /// Destination bucket name
    #[arg(long)]
    bucket: String,

    /// Google Cloud project owning the bucket
    #[arg(long)]
    project_id: String,

    /// Service-account JSON key file
    #[arg(long)]
    service_account: PathBuf,

    /// Storage class for uploaded objects
    #[arg(long, default_value = "COLDLINE")]
    storage_class: String,

    /// Never upload new files whose path matches this pattern
    #[arg(long)]
    excluded_regex: Option<String>,

    /// Maximum number of restarts after a failed pass
    #[arg(long, default_value_t = 5)]
    max_retries: u32,

    /// Disable gzip compression of upload streams
    #[arg(long)]
    no_compress: bool,

    /// Alternative storage endpoint, mainly for emulators
    #[arg(long)]
    endpoint: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Quiet mode - minimal output
    #[arg(short, long)]
    quiet: bool,

    /// Verbose mode - detailed output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.debug, cli.quiet, cli.verbose)?;

    info!("bucketsync v{} starting", env!("CARGO_PKG_VERSION"));

    let cwd = std::env::current_dir().context("cannot determine current directory")?;
    let folder = resolve_against(&cwd, &cli.folder);
    let service_account = resolve_against(&cwd, &cli.service_account);

    if !service_account.is_file() {
        anyhow::bail!(
            "service account key file not found: {}",
            service_account.display()
        );
    }

    let mut config = BackupConfig::new(&folder)?
        .with_write_options(WriteOptions {
            compress: !cli.no_compress,
            storage_class: cli.storage_class.clone(),
        })
        .with_retry(RetryPolicy::new(
            cli.max_retries,
            Duration::from_millis(500),
            Duration::from_secs(60),
            2.0,
        )
        .map_err(anyhow::Error::msg)?);
    if let Some(pattern) = &cli.excluded_regex {
        config = config.with_exclude(pattern)?;
    }

    let remote: RemoteHandle = Arc::new(GcsStore::new(&GcsConfig {
        bucket: cli.bucket.clone(),
        project_id: cli.project_id.clone(),
        credential_path: service_account,
        storage_class: cli.storage_class.clone(),
        endpoint: cli.endpoint.clone(),
    })?);
    let fingerprints = fingerprint_store();

    if !cli.quiet {
        println!(
            "{} Backing up {} to bucket {}",
            style("→").green().bold(),
            style(folder.display()).cyan(),
            style(&cli.bucket).cyan()
        );
    }

    let engine = BackupEngine::new(remote, fingerprints, config);
    let mut reporter = ProgressReporter::new();
    let renderer = reporter
        .take_event_receiver()
        .map(|rx| tokio::spawn(render_events(rx, cli.quiet)));

    let outcome = engine.run(&reporter).await;
    drop(reporter);
    if let Some(renderer) = renderer {
        let _ = renderer.await;
    }

    let stats = outcome?;
    if !cli.quiet {
        print_backup_stats(&stats);
    }

    info!("backup completed successfully");
    Ok(())
}

fn init_logging(debug: bool, quiet: bool, verbose: bool) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else if quiet {
        "error"
    } else {
        "warn"
    };

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();

    Ok(())
}

fn resolve_against(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

#[cfg(unix)]
fn fingerprint_store() -> FingerprintHandle {
    Arc::new(bucketsync_fingerprint::XattrStore::new())
}

#[cfg(not(unix))]
fn fingerprint_store() -> FingerprintHandle {
    // No extended attributes here; every run re-fingerprints from the
    // bucket inventory, which costs backfill time but stays correct.
    tracing::warn!("extended attributes unavailable; fingerprints will not persist");
    Arc::new(bucketsync_fingerprint::MemoryStore::new())
}

async fn render_events(
    mut events: tokio::sync::mpsc::UnboundedReceiver<ProgressEvent>,
    quiet: bool,
) {
    let mut bar: Option<ProgressBar> = None;

    while let Some(event) = events.recv().await {
        match event {
            ProgressEvent::TotalsKnown { files, bytes } => {
                if !quiet && files > 0 {
                    println!(
                        "{} {} file(s) to upload ({})",
                        style("ℹ").blue(),
                        style(files).bold(),
                        format_bytes(bytes)
                    );
                }
            }
            ProgressEvent::FileStarted { key, size } => {
                if !quiet {
                    let pb = ProgressBar::new(size);
                    if let Ok(progress_style) = ProgressStyle::default_bar()
                        .template("{msg} [{bar:30.green}] {bytes}/{total_bytes}")
                    {
                        pb.set_style(progress_style);
                    }
                    pb.set_message(key);
                    bar = Some(pb);
                }
            }
            ProgressEvent::BytesTransferred(n) => {
                if let Some(pb) = &bar {
                    pb.inc(n);
                }
            }
            ProgressEvent::FileCompleted {
                key,
                completed,
                remaining,
                ..
            } => {
                if let Some(pb) = bar.take() {
                    pb.finish_and_clear();
                }
                if !quiet {
                    println!(
                        "{} {} ({} done, {} remaining)",
                        style("✓").green(),
                        key,
                        completed,
                        remaining
                    );
                }
            }
            ProgressEvent::FileExcluded(path) => {
                if !quiet {
                    println!("{} excluded {}", style("⊘").yellow(), path.display());
                }
            }
            ProgressEvent::FingerprintBackfilled(path) => {
                if !quiet {
                    println!(
                        "{} restored fingerprint for {}",
                        style("ℹ").yellow(),
                        path.display()
                    );
                }
            }
            ProgressEvent::PassFailed(message) => {
                if let Some(pb) = bar.take() {
                    pb.finish_and_clear();
                }
                eprintln!("{} pass failed: {}", style("✗").red().bold(), message);
            }
            ProgressEvent::PhaseChanged(_) | ProgressEvent::Completed(_) => {}
        }
    }
}

fn print_backup_stats(stats: &BackupStats) {
    println!();
    println!("{}", style("Backup Statistics:").bold().underlined());
    println!("  Files uploaded: {}", style(stats.files_uploaded).green());
    println!(
        "  Files re-uploaded: {}",
        style(stats.files_reuploaded).green()
    );
    println!(
        "  Files unchanged: {}",
        style(stats.files_unchanged).yellow()
    );
    println!("  Files excluded: {}", style(stats.files_excluded).yellow());
    println!(
        "  Fingerprints restored: {}",
        style(stats.fingerprints_backfilled).yellow()
    );
    println!(
        "  Bytes uploaded: {}",
        style(format_bytes(stats.bytes_uploaded)).green()
    );
    println!(
        "  Passes: {}",
        if stats.passes > 1 {
            style(stats.passes).yellow()
        } else {
            style(stats.passes).green()
        }
    );
    println!(
        "  Duration: {}",
        style(format_duration(stats.duration)).blue()
    );
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{:.2}s", duration.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
