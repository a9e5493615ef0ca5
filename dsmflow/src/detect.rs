//! Best-effort detection of the optional raster fill tool.
//!
//! The fill tool ships under several invocation forms depending on how
//! GDAL was installed. Detection probes a fixed ordered candidate list
//! with a capability flag and keeps the first form that responds. A
//! candidate that fails in any way (non-zero exit, launch error, timeout)
//! is simply the next one's turn; its failure reason is discarded.
//! Absence of every candidate is an answer, not an error.

use crate::exec::ProcessRunner;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Candidate invocation forms for the fill tool, in probe order.
const FILL_TOOL_CANDIDATES: [&[&str]; 3] = [
    &["python", "-m", "osgeo_utils.gdal_fillnodata"],
    &["gdal_fillnodata"],
    &["gdal_fillnodata.py"],
];

/// Capability-probe argument accepted by every candidate form.
const PROBE_ARG: &str = "--help";

/// A resolved, working invocation form for the fill tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillTool {
    argv: Vec<String>,
}

impl FillTool {
    fn from_candidate(candidate: &[&str]) -> Self {
        Self {
            argv: candidate.iter().map(ToString::to_string).collect(),
        }
    }

    /// The executable to invoke.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    /// Arguments for one fill invocation: maximum fill distance, zero
    /// smoothing iterations, input raster, output raster.
    #[must_use]
    pub fn fill_args(&self, raster: &Path, filled: &Path, fill_distance: u32) -> Vec<String> {
        let mut args: Vec<String> = self.argv[1..].to_vec();
        args.push("-md".to_string());
        args.push(fill_distance.to_string());
        args.push("-si".to_string());
        args.push("0".to_string());
        args.push(raster.to_string_lossy().into_owned());
        args.push(filled.to_string_lossy().into_owned());
        args
    }

    fn probe_args(&self) -> Vec<String> {
        let mut args: Vec<String> = self.argv[1..].to_vec();
        args.push(PROBE_ARG.to_string());
        args
    }
}

impl std::fmt::Display for FillTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.argv.join(" "))
    }
}

/// Probes the candidate list and returns the first responding form.
///
/// Runs once per batch; the result is reused for every raster.
pub async fn detect_fill_tool(
    runner: &dyn ProcessRunner,
    probe_timeout: Duration,
) -> Option<FillTool> {
    for candidate in FILL_TOOL_CANDIDATES {
        let tool = FillTool::from_candidate(candidate);
        let outcome = runner
            .run(tool.program(), &tool.probe_args(), probe_timeout)
            .await;
        if outcome.is_success() {
            debug!(tool = %tool, "fill tool resolved");
            return Some(tool);
        }
        debug!(tool = %tool, "fill tool candidate did not respond");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{MockProcessRunner, RunOutcome};
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    #[test]
    fn test_fill_args_shape() {
        let tool = FillTool::from_candidate(FILL_TOOL_CANDIDATES[0]);
        let args = tool.fill_args(
            &PathBuf::from("/out/tile_raster.tif"),
            &PathBuf::from("/out/nodata_raster_final/tile_raster_filled.tif"),
            75,
        );

        assert_eq!(tool.program(), "python");
        assert_eq!(
            args,
            vec![
                "-m",
                "osgeo_utils.gdal_fillnodata",
                "-md",
                "75",
                "-si",
                "0",
                "/out/tile_raster.tif",
                "/out/nodata_raster_final/tile_raster_filled.tif",
            ]
        );
    }

    #[test]
    fn test_probe_args_end_with_capability_flag() {
        let tool = FillTool::from_candidate(FILL_TOOL_CANDIDATES[1]);
        assert_eq!(tool.program(), "gdal_fillnodata");
        assert_eq!(tool.probe_args(), vec!["--help"]);
    }

    #[tokio::test]
    async fn test_detect_returns_first_responding_candidate() {
        let mut runner = MockProcessRunner::new();
        runner.expect_run().returning(|program, _, _| {
            if program == "gdal_fillnodata" {
                RunOutcome::ok()
            } else {
                RunOutcome::failed("not installed")
            }
        });

        // Candidate A (python -m) fails, B succeeds, C is never probed.
        let tool = detect_fill_tool(&runner, Duration::from_secs(5)).await.unwrap();
        assert_eq!(tool.to_string(), "gdal_fillnodata");
    }

    #[tokio::test]
    async fn test_detect_stops_probing_after_success() {
        let mut runner = MockProcessRunner::new();
        runner
            .expect_run()
            .times(1)
            .returning(|_, _, _| RunOutcome::ok());

        let tool = detect_fill_tool(&runner, Duration::from_secs(5)).await.unwrap();
        assert_eq!(tool.program(), "python");
    }

    #[tokio::test]
    async fn test_detect_absence_is_none() {
        let mut runner = MockProcessRunner::new();
        runner
            .expect_run()
            .times(3)
            .returning(|_, _, _| RunOutcome::failed("no such tool"));

        assert!(detect_fill_tool(&runner, Duration::from_secs(5)).await.is_none());
    }
}
