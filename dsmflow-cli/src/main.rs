//! Dsmflow command line - batch LIDAR tiles into filled DSM rasters.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use dsmflow::prelude::*;
use tracing::{info, warn};

/// Command-line arguments for dsmflow
#[derive(Parser, Debug)]
#[command(name = "dsmflow")]
#[command(about = "Batch point-cloud to DSM raster pipeline over PDAL and GDAL")]
#[command(version)]
struct Args {
    /// Directory containing .laz/.las input files
    input_dir: PathBuf,

    /// Directory receiving rasters and derived folders
    output_dir: PathBuf,

    /// Raster resolution in linear units per cell (0.1 to 10.0)
    #[arg(short, long, default_value_t = 0.5, env = "DSMFLOW_RESOLUTION")]
    resolution: f64,

    /// Maximum search distance for filling missing cells (1 to 500)
    #[arg(short, long, default_value_t = 75, env = "DSMFLOW_FILL_DISTANCE")]
    fill_distance: u32,

    /// Keep the per-item intermediate artifacts after success
    #[arg(long)]
    keep_intermediate: bool,

    /// Suppress per-stage progress events
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dsmflow=info".into()),
        )
        .init();

    let args = Args::parse();

    if !args.input_dir.is_dir() {
        bail!("input directory '{}' does not exist", args.input_dir.display());
    }

    let config = BatchConfig::new(&args.input_dir, &args.output_dir)
        .with_resolution(args.resolution)
        .with_fill_distance(args.fill_distance)
        .with_cleanup_intermediate(!args.keep_intermediate);
    config.validate().context("invalid arguments")?;

    info!(
        input = %args.input_dir.display(),
        output = %args.output_dir.display(),
        resolution = args.resolution,
        fill_distance = args.fill_distance,
        "starting batch"
    );

    let mut driver = BatchDriver::new(config);
    if !args.quiet {
        driver = driver.with_event_sink(Arc::new(LoggingEventSink::new()));
    }

    let cancel = driver.cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; finishing the current stage then stopping");
            cancel.cancel("interrupt received");
        }
    });

    let summary = driver.run().await?;

    if summary.cancelled {
        warn!(
            reason = summary.cancel_reason.as_deref().unwrap_or("unknown"),
            "batch cancelled"
        );
    }
    info!(
        produced = summary.produced,
        total = summary.total,
        filled = summary.filled,
        fill_failures = summary.fill_failures,
        duration_ms = summary.duration_ms,
        "done"
    );

    Ok(())
}
