//! Batch driver.
//!
//! Enumerates work items, runs the per-item workflow over all of them in
//! strict sequence, then runs the optional fill pass over every produced
//! raster. Only the empty-input precondition (and environmental faults
//! while preparing directories) can stop a batch; everything else is
//! isolated to its unit of work.


use crate::cancellation::CancellationToken;
use crate::config::BatchConfig;
use crate::core::discover_work_items;
use crate::detect::detect_fill_tool;
use crate::errors::{DsmflowError, EmptyInputDirectoryError};
use crate::events::{EventSink, NoOpEventSink};
use crate::exec::{ProcessRunner, SystemProcessRunner};
use crate::workflow::{process_item, ItemOutcome};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Aggregate accounting of one batch run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    /// Identifier of this run.
    pub run_id: Uuid,
    /// Number of work items discovered.
    pub total: usize,
    /// Number of items that produced their raster.
    pub produced: usize,
    /// Number of rasters successfully filled.
    pub filled: usize,
    /// Number of rasters whose fill invocation failed.
    pub fill_failures: usize,
    /// Whether the run was cancelled.
    pub cancelled: bool,
    /// Cancellation reason, if cancelled.
    pub cancel_reason: Option<String>,
    /// Total wall-clock duration in milliseconds.
    pub duration_ms: f64,
}

/// Orchestrates a full batch run.
pub struct BatchDriver {
    config: BatchConfig,
    runner: Arc<dyn ProcessRunner>,
    sink: Arc<dyn EventSink>,
    cancel: Arc<CancellationToken>,
}

impl BatchDriver {
    /// Creates a driver with the production runner and no event sink.
    #[must_use]
    pub fn new(config: BatchConfig) -> Self {
        Self {
            config,
            runner: Arc::new(SystemProcessRunner::new()),
            sink: Arc::new(NoOpEventSink),
            cancel: Arc::new(CancellationToken::new()),
        }
    }

    /// Replaces the process runner.
    #[must_use]
    pub fn with_runner(mut self, runner: Arc<dyn ProcessRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Replaces the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Replaces the cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: Arc<CancellationToken>) -> Self {
        self.cancel = cancel;
        self
    }

    /// The driver's cancellation token, for wiring to signal handlers.
    #[must_use]
    pub fn cancellation(&self) -> Arc<CancellationToken> {
        Arc::clone(&self.cancel)
    }

    /// Runs the batch to completion.
    pub async fn run(&self) -> Result<BatchSummary, DsmflowError> {
        self.config.validate()?;
        let start = Instant::now();
        let run_id = Uuid::new_v4();

        tokio::fs::create_dir_all(&self.config.output_dir).await?;
        tokio::fs::create_dir_all(self.config.filled_dir()).await?;
        tokio::fs::create_dir_all(self.config.temp_dir()).await?;

        let items = discover_work_items(&self.config.input_dir).await?;
        if items.is_empty() {
            return Err(EmptyInputDirectoryError::new(&self.config.input_dir).into());
        }

        info!(run_id = %run_id, total = items.len(), "batch started");
        self.sink
            .emit(
                "batch.started",
                Some(serde_json::json!({ "run_id": run_id, "total": items.len() })),
            )
            .await;

        let mut outcomes: Vec<ItemOutcome> = Vec::new();
        for (index, item) in items.iter().enumerate() {
            if self.cancel.is_cancelled() {
                break;
            }
            info!(item = %item.file_name(), position = index + 1, total = items.len(), "next work item");
            let outcome = process_item(
                item,
                &self.config,
                self.runner.as_ref(),
                self.sink.as_ref(),
                &self.cancel,
            )
            .await;
            outcomes.push(outcome);
        }

        let produced: Vec<&ItemOutcome> = outcomes.iter().filter(|o| o.produced()).collect();
        let (filled, fill_failures) = self.fill_pass(&produced).await;

        self.sweep_transient_documents().await;

        let cancelled = self.cancel.is_cancelled();
        if cancelled {
            self.sink
                .emit(
                    "batch.cancelled",
                    Some(serde_json::json!({ "reason": self.cancel.reason() })),
                )
                .await;
        }

        let summary = BatchSummary {
            run_id,
            total: items.len(),
            produced: produced.len(),
            filled,
            fill_failures,
            cancelled,
            cancel_reason: self.cancel.reason(),
            duration_ms: start.elapsed().as_secs_f64() * 1000.0,
        };

        info!(
            produced = summary.produced,
            total = summary.total,
            filled = summary.filled,
            "batch completed"
        );
        self.sink
            .emit(
                "batch.completed",
                Some(serde_json::json!({
                    "run_id": run_id,
                    "produced": summary.produced,
                    "total": summary.total,
                })),
            )
            .await;

        Ok(summary)
    }

    /// Fills every produced raster with the detected tool, if any.
    ///
    /// Returns `(filled, failures)`. Detection runs once; tool absence
    /// skips the whole pass and is not a batch failure.
    async fn fill_pass(&self, produced: &[&ItemOutcome]) -> (usize, usize) {
        if produced.is_empty() || self.cancel.is_cancelled() {
            return (0, 0);
        }

        let Some(tool) =
            detect_fill_tool(self.runner.as_ref(), self.config.probe_timeout()).await
        else {
            warn!("fill tool not found; skipping the fill pass");
            self.sink.emit("fill.unavailable", None).await;
            return (0, 0);
        };

        info!(tool = %tool, "fill tool resolved");
        self.sink
            .emit(
                "fill.resolved",
                Some(serde_json::json!({ "command": tool.to_string() })),
            )
            .await;

        let filled_dir = self.config.filled_dir();
        let mut filled = 0;
        let mut failures = 0;

        for outcome in produced {
            if self.cancel.is_cancelled() {
                break;
            }
            let Some(raster) = outcome.raster.as_deref() else {
                continue;
            };
            let target = outcome.item.filled_output(&filled_dir);
            let args = tool.fill_args(raster, &target, self.config.fill_distance);
            let result = self
                .runner
                .run(tool.program(), &args, self.config.stage_timeout())
                .await;

            if result.is_success() {
                filled += 1;
                self.sink
                    .emit(
                        "fill.completed",
                        Some(serde_json::json!({ "item": outcome.item.file_name() })),
                    )
                    .await;
            } else {
                failures += 1;
                warn!(
                    item = %outcome.item.file_name(),
                    diagnostic = result.diagnostic_text(),
                    "fill invocation failed"
                );
                self.sink
                    .emit(
                        "fill.failed",
                        Some(serde_json::json!({
                            "item": outcome.item.file_name(),
                            "diagnostic": result.diagnostic_text(),
                        })),
                    )
                    .await;
            }
        }

        (filled, failures)
    }

    /// Removes any residual pipeline documents from the transient folder.
    async fn sweep_transient_documents(&self) {
        let Ok(mut entries) = tokio::fs::read_dir(self.config.temp_dir()).await else {
            return;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                let _ = tokio::fs::remove_file(&path).await;
            }
        }
    }
}

impl std::fmt::Debug for BatchDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchDriver")
            .field("config", &self.config)
            .finish()
    }
}
