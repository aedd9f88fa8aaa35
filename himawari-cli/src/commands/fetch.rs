//! Fetch command - keep a local copy of the latest image current.
//!
//! One-shot mode fetches once and exits. Daemon mode polls the archive every
//! `--tick` seconds and fetches only when a new image was published. Either
//! way the `--output` link is switched to the new file only after it has been
//! fully written.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use himawari::coord::{ImageTimestamp, Level};
use himawari::pipeline::Rgba;
use himawari::{merge_overlay, ImageAcquirer, OverlayLayer};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::common::{default_output, parse_level, parse_rgba, swap_link, DownloadArgs};
use crate::error::CliError;
use crate::progress::TileProgress;
use crate::runner::{write_pid_file, CliRunner, Overrides};

/// Arguments for the fetch command.
#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Detail level, one of 4, 8, 16, 20
    #[arg(short, long, default_value = "4", value_parser = parse_level)]
    pub level: Level,

    /// Link updated to point at the current image [default: <tmp>/himawari.png]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Keep running and poll for new images
    #[arg(long)]
    pub daemon: bool,

    /// Seconds between polls in daemon mode
    #[arg(long, default_value_t = 300, value_parser = clap::value_parser!(u64).range(1..))]
    pub tick: u64,

    /// Write the process id to this file in daemon mode
    #[arg(long)]
    pub pid: Option<PathBuf>,

    /// Draw coastlines over the image
    #[arg(long)]
    pub coastline: bool,

    /// Coastline colour as rrggbbaa
    #[arg(long, default_value = "ff0000ff", value_parser = parse_rgba)]
    pub color: Rgba<u8>,

    #[command(flatten)]
    pub download: DownloadArgs,
}

/// Run the fetch command.
pub fn run(args: FetchArgs) -> Result<(), CliError> {
    let runner = CliRunner::new()?;
    runner.log_startup("fetch");

    let overrides = Overrides::from(args.download.clone());
    let output = args.output.clone().unwrap_or_else(default_output);
    let progress = (!args.daemon).then(TileProgress::new);
    let acquirer = runner
        .acquirer(&overrides)?
        .with_progress(progress.as_ref().map(TileProgress::callback));

    runner.runtime().block_on(serve(&args, &acquirer, &output))
}

async fn serve(args: &FetchArgs, acquirer: &ImageAcquirer, output: &Path) -> Result<(), CliError> {
    let overlay = if args.coastline {
        Some(acquirer.acquire_overlay(args.level, Some(args.color)).await?)
    } else {
        None
    };
    let target = Target {
        acquirer,
        level: args.level,
        overlay: overlay.as_ref(),
        output,
    };

    if !args.daemon {
        let latest = acquirer.latest_timestamp().await?;
        let path = target.fetch(latest.timestamp).await?;
        println!("{}", path.display());
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    let handler_token = shutdown.clone();
    ctrlc::set_handler(move || handler_token.cancel())
        .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    if let Some(ref pid) = args.pid {
        write_pid_file(pid)?;
    }
    let result = target
        .watch(Duration::from_secs(args.tick), shutdown)
        .await;
    if let Some(ref pid) = args.pid {
        let _ = std::fs::remove_file(pid);
    }
    result
}

/// Where and how each new image is produced.
struct Target<'a> {
    acquirer: &'a ImageAcquirer,
    level: Level,
    overlay: Option<&'a OverlayLayer>,
    output: &'a Path,
}

impl Target<'_> {
    /// Acquires the image at `timestamp`, merges the overlay and repoints the
    /// output link.
    async fn fetch(&self, timestamp: ImageTimestamp) -> Result<PathBuf, CliError> {
        let mut image = self.acquirer.acquire_image_at(self.level, timestamp).await?;
        if let Some(overlay) = self.overlay {
            image = merge_overlay(&image, overlay).await?;
        }
        swap_link(&image, self.output)?;
        info!(image = %image.display(), output = %self.output.display(), "Output updated");
        Ok(image)
    }

    /// Polls until `shutdown` fires. Failed rounds are logged and retried on
    /// the next tick.
    async fn watch(&self, tick: Duration, shutdown: CancellationToken) -> Result<(), CliError> {
        let mut ticker = tokio::time::interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut current: Option<ImageTimestamp> = None;

        info!(tick_secs = tick.as_secs(), "Daemon started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let latest = match self.acquirer.latest_timestamp().await {
                Ok(latest) => latest.timestamp,
                Err(e) => {
                    warn!(error = %e, "Latest timestamp unavailable");
                    continue;
                }
            };
            if current == Some(latest) {
                debug!(timestamp = %latest, "No new image");
                continue;
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                result = self.fetch(latest) => match result {
                    Ok(_) => current = Some(latest),
                    Err(e) => warn!(timestamp = %latest, error = %e, "Fetch failed"),
                },
            }
        }

        info!("Daemon stopped");
        Ok(())
    }
}
