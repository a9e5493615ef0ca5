//! Batch configuration.
//!
//! All tunables for a batch run live in [`BatchConfig`]; there is no
//! process-wide mutable state. Paths derived from the output directory
//! (filled-raster folder, transient pipeline-document folder) are exposed
//! as accessors so every component names them the same way.

use crate::errors::ConfigValidationError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Lower bound for the raster resolution, in linear units per cell.
pub const MIN_RESOLUTION: f64 = 0.1;
/// Upper bound for the raster resolution, in linear units per cell.
pub const MAX_RESOLUTION: f64 = 10.0;
/// Lower bound for the fill search distance, in cells.
pub const MIN_FILL_DISTANCE: u32 = 1;
/// Upper bound for the fill search distance, in cells.
pub const MAX_FILL_DISTANCE: u32 = 500;

/// Configuration for a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Directory scanned (non-recursively) for `.laz`/`.las` work items.
    pub input_dir: PathBuf,
    /// Directory receiving rasters and intermediate artifacts.
    pub output_dir: PathBuf,
    /// Raster resolution in linear units per cell.
    #[serde(default = "default_resolution")]
    pub resolution: f64,
    /// Maximum search distance for filling missing raster cells.
    #[serde(default = "default_fill_distance")]
    pub fill_distance: u32,
    /// Whether intermediate artifacts are removed after an item succeeds.
    #[serde(default = "default_cleanup_intermediate")]
    pub cleanup_intermediate: bool,
    /// Wall-clock timeout for each pipeline stage, in seconds.
    #[serde(default = "default_stage_timeout")]
    pub stage_timeout_seconds: u64,
    /// Wall-clock timeout for each fill-tool probe, in seconds.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_seconds: u64,
}

fn default_resolution() -> f64 {
    0.5
}

fn default_fill_distance() -> u32 {
    75
}

fn default_cleanup_intermediate() -> bool {
    true
}

fn default_stage_timeout() -> u64 {
    300
}

fn default_probe_timeout() -> u64 {
    5
}

impl BatchConfig {
    /// Creates a configuration with default tunables for the given directories.
    #[must_use]
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            resolution: default_resolution(),
            fill_distance: default_fill_distance(),
            cleanup_intermediate: default_cleanup_intermediate(),
            stage_timeout_seconds: default_stage_timeout(),
            probe_timeout_seconds: default_probe_timeout(),
        }
    }

    /// Sets the raster resolution.
    #[must_use]
    pub fn with_resolution(mut self, resolution: f64) -> Self {
        self.resolution = resolution;
        self
    }

    /// Sets the fill search distance.
    #[must_use]
    pub fn with_fill_distance(mut self, distance: u32) -> Self {
        self.fill_distance = distance;
        self
    }

    /// Sets whether intermediate artifacts are removed after success.
    #[must_use]
    pub fn with_cleanup_intermediate(mut self, cleanup: bool) -> Self {
        self.cleanup_intermediate = cleanup;
        self
    }

    /// Sets the per-stage timeout in seconds.
    #[must_use]
    pub fn with_stage_timeout(mut self, seconds: u64) -> Self {
        self.stage_timeout_seconds = seconds;
        self
    }

    /// Validates bounded numeric fields.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !(MIN_RESOLUTION..=MAX_RESOLUTION).contains(&self.resolution) {
            return Err(ConfigValidationError::new(
                "resolution",
                format!(
                    "{} is outside the allowed range [{MIN_RESOLUTION}, {MAX_RESOLUTION}]",
                    self.resolution
                ),
            ));
        }
        if !(MIN_FILL_DISTANCE..=MAX_FILL_DISTANCE).contains(&self.fill_distance) {
            return Err(ConfigValidationError::new(
                "fill_distance",
                format!(
                    "{} is outside the allowed range [{MIN_FILL_DISTANCE}, {MAX_FILL_DISTANCE}]",
                    self.fill_distance
                ),
            ));
        }
        Ok(())
    }

    /// Directory receiving filled rasters.
    #[must_use]
    pub fn filled_dir(&self) -> PathBuf {
        self.output_dir.join("nodata_raster_final")
    }

    /// Directory holding transient pipeline documents.
    #[must_use]
    pub fn temp_dir(&self) -> PathBuf {
        self.output_dir.join("temp")
    }

    /// Output directory accessor.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Per-stage timeout as a [`Duration`].
    #[must_use]
    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_seconds)
    }

    /// Probe timeout as a [`Duration`].
    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_seconds)
    }
}
