//! A scripted process runner for exercising workflows without PDAL/GDAL.

use crate::exec::{ProcessRunner, RunOutcome};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::Path;
use std::time::Duration;

/// One recorded invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedInvocation {
    /// The program that was invoked.
    pub program: String,
    /// The arguments it received.
    pub args: Vec<String>,
}

/// A fake [`ProcessRunner`] that simulates the external tools.
///
/// Successful pipeline invocations create the output file named by the
/// pipeline document, and successful fill invocations create the filled
/// raster, so artifact-lifecycle assertions work against a real
/// (temporary) filesystem. Failures are scripted by argument substring.
#[derive(Debug)]
pub struct ScriptedRunner {
    invocations: Mutex<Vec<RecordedInvocation>>,
    failures: Mutex<Vec<(String, String)>>,
    timeouts: Mutex<Vec<String>>,
    fill_tool_available: Mutex<bool>,
}

impl ScriptedRunner {
    /// Creates a runner where every invocation succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self {
            invocations: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
            timeouts: Mutex::new(Vec::new()),
            fill_tool_available: Mutex::new(true),
        }
    }

    /// Scripts a failure for any invocation whose arguments contain `pattern`.
    #[must_use]
    pub fn fail_matching(self, pattern: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        self.failures.lock().push((pattern.into(), diagnostic.into()));
        self
    }

    /// Scripts a timeout for any invocation whose arguments contain `pattern`.
    #[must_use]
    pub fn time_out_matching(self, pattern: impl Into<String>) -> Self {
        self.timeouts.lock().push(pattern.into());
        self
    }

    /// Makes every fill-tool capability probe fail.
    #[must_use]
    pub fn without_fill_tool(self) -> Self {
        *self.fill_tool_available.lock() = false;
        self
    }

    /// Returns all recorded invocations, in order.
    #[must_use]
    pub fn invocations(&self) -> Vec<RecordedInvocation> {
        self.invocations.lock().clone()
    }

    /// Returns the recorded invocations of one program.
    #[must_use]
    pub fn invocations_of(&self, program: &str) -> Vec<RecordedInvocation> {
        self.invocations
            .lock()
            .iter()
            .filter(|i| i.program == program)
            .cloned()
            .collect()
    }

    fn scripted_outcome(&self, haystack: &str, timeout: Duration) -> Option<RunOutcome> {
        if self.timeouts.lock().iter().any(|p| haystack.contains(p.as_str())) {
            return Some(RunOutcome::timed_out(timeout));
        }
        self.failures
            .lock()
            .iter()
            .find(|(p, _)| haystack.contains(p.as_str()))
            .map(|(_, diagnostic)| RunOutcome::failed(diagnostic.clone()))
    }

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = std::fs::write(path, b"");
    }

    /// Creates the output file a successful pipeline run would produce.
    fn materialize_pipeline_output(document_path: &str) {
        let Ok(body) = std::fs::read_to_string(document_path) else {
            return;
        };
        let Ok(doc) = serde_json::from_str::<serde_json::Value>(&body) else {
            return;
        };
        let Some(entries) = doc.get("pipeline").and_then(|p| p.as_array()) else {
            return;
        };

        // Writer descriptors carry the output in "filename"; other stages
        // end with a plain output path string.
        let output = entries
            .iter()
            .find_map(|e| e.get("filename").and_then(|f| f.as_str()))
            .or_else(|| entries.iter().rev().find_map(|e| e.as_str()));

        if let Some(output) = output {
            Self::touch(Path::new(output));
        }
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, program: &str, args: &[String], timeout: Duration) -> RunOutcome {
        self.invocations.lock().push(RecordedInvocation {
            program: program.to_string(),
            args: args.to_vec(),
        });

        let haystack = format!("{program} {}", args.join(" "));
        if let Some(outcome) = self.scripted_outcome(&haystack, timeout) {
            return outcome;
        }

        let is_probe = args.iter().any(|a| a == "--help");
        if is_probe {
            return if *self.fill_tool_available.lock() {
                RunOutcome::ok()
            } else {
                RunOutcome::failed("command not found")
            };
        }

        if program == "pdal" {
            if let Some(document_path) = args.get(1) {
                Self::materialize_pipeline_output(document_path);
            }
        } else if args.iter().any(|a| a == "-md") {
            if let Some(output) = args.last() {
                Self::touch(Path::new(output));
            }
        }

        RunOutcome::ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_records_invocations() {
        let runner = ScriptedRunner::new();
        runner
            .run("pdal", &["pipeline".to_string(), "missing.json".to_string()], Duration::from_secs(1))
            .await;

        let recorded = runner.invocations();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].program, "pdal");
    }

    #[tokio::test]
    async fn test_scripted_failure_matches_substring() {
        let runner = ScriptedRunner::new().fail_matching("pipeline_merge", "merge exploded");
        let outcome = runner
            .run(
                "pdal",
                &["pipeline".to_string(), "/tmp/pipeline_merge_tile.json".to_string()],
                Duration::from_secs(1),
            )
            .await;

        assert!(!outcome.is_success());
        assert_eq!(outcome.diagnostic_text(), "merge exploded");
    }

    #[tokio::test]
    async fn test_scripted_timeout_uses_caller_timeout() {
        let runner = ScriptedRunner::new().time_out_matching("pipeline_raster");
        let outcome = runner
            .run(
                "pdal",
                &["pipeline".to_string(), "/tmp/pipeline_raster_tile.json".to_string()],
                Duration::from_secs(300),
            )
            .await;

        assert_eq!(outcome.diagnostic_text(), "timed out after 300 seconds");
    }

    #[tokio::test]
    async fn test_probe_respects_availability() {
        let runner = ScriptedRunner::new().without_fill_tool();
        let outcome = runner
            .run("gdal_fillnodata", &["--help".to_string()], Duration::from_secs(5))
            .await;
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn test_pipeline_success_creates_output() {
        let dir = tempfile::tempdir().unwrap();
        let doc_path = dir.path().join("pipeline_ground_tile.json");
        let output = dir.path().join("tile_ground.las");
        let document = serde_json::json!({
            "pipeline": [
                "tile.laz",
                { "type": "filters.range", "limits": "Classification[2:2]" },
                output.to_string_lossy(),
            ]
        });
        std::fs::write(&doc_path, serde_json::to_vec(&document).unwrap()).unwrap();

        let runner = ScriptedRunner::new();
        let args = vec!["pipeline".to_string(), doc_path.to_string_lossy().into_owned()];
        let outcome = runner.run("pdal", &args, Duration::from_secs(1)).await;

        assert!(outcome.is_success());
        assert!(output.exists());
    }
}
