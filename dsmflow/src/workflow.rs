//! Per-item pipeline workflow.
//!
//! One work item runs a fixed four-stage sequence, each stage gated on
//! the previous one succeeding. The first failure aborts the item's
//! remaining stages; the batch moves on to the next item. Transient
//! pipeline documents are removed when the item ends no matter how it
//! ended; intermediate artifacts are removed only after full success,
//! and only under the cleanup policy.

use crate::cancellation::CancellationToken;
use crate::config::BatchConfig;
use crate::core::{
    StageDescription, StageKind, StageRecord, WorkItem, BUILDINGS_CLASS, GROUND_CLASS,
};
use crate::events::EventSink;
use crate::exec::ProcessRunner;
use chrono::Utc;
use std::path::PathBuf;
use tracing::{error, info};

/// The external processing engine executable.
const ENGINE_PROGRAM: &str = "pdal";

/// Outcome of one work item's pipeline.
#[derive(Debug, Clone)]
pub struct ItemOutcome {
    /// The work item.
    pub item: WorkItem,
    /// Path of the produced raster, if every stage succeeded.
    pub raster: Option<PathBuf>,
    /// Records of the stages that ran, in order.
    pub stages: Vec<StageRecord>,
}

impl ItemOutcome {
    /// Returns true if the item produced its raster.
    #[must_use]
    pub fn produced(&self) -> bool {
        self.raster.is_some()
    }
}

/// Builds the item's stage sequence, in execution order.
fn stage_plan(item: &WorkItem, config: &BatchConfig) -> Vec<(StageKind, StageDescription)> {
    let out = config.output_dir();
    vec![
        (
            StageKind::FilterGround,
            StageDescription::filter_by_class(
                &item.source,
                item.ground_artifact(out),
                GROUND_CLASS,
            ),
        ),
        (
            StageKind::FilterBuildings,
            StageDescription::filter_by_class(
                &item.source,
                item.buildings_artifact(out),
                BUILDINGS_CLASS,
            ),
        ),
        (
            StageKind::Merge,
            StageDescription::merge(
                vec![item.ground_artifact(out), item.buildings_artifact(out)],
                item.merged_artifact(out),
            ),
        ),
        (
            StageKind::Rasterize,
            StageDescription::rasterize(
                item.merged_artifact(out),
                item.raster_output(out),
                config.resolution,
            ),
        ),
    ]
}

/// Runs one work item through the full stage sequence.
///
/// Never returns an error: every fault is absorbed at the item boundary
/// and reflected in the outcome, so one bad item cannot stop the batch.
pub async fn process_item(
    item: &WorkItem,
    config: &BatchConfig,
    runner: &dyn ProcessRunner,
    sink: &dyn EventSink,
    cancel: &CancellationToken,
) -> ItemOutcome {
    let temp_dir = config.temp_dir();
    let mut records: Vec<StageRecord> = Vec::new();
    let mut written_documents: Vec<PathBuf> = Vec::new();
    let mut aborted = false;

    sink.emit(
        "item.started",
        Some(serde_json::json!({ "item": item.file_name() })),
    )
    .await;
    info!(item = %item.file_name(), "processing work item");

    for (kind, description) in stage_plan(item, config) {
        if cancel.is_cancelled() {
            aborted = true;
            break;
        }

        sink.emit(
            "stage.started",
            Some(serde_json::json!({ "item": item.file_name(), "stage": kind.short_name() })),
        )
        .await;
        let started = Utc::now();

        let document_path = item.document_path(&temp_dir, kind);
        if let Err(err) = description.write_document(&document_path).await {
            // Environmental fault; absorbed here like a stage failure.
            let diagnostic = err.to_string();
            error!(item = %item.file_name(), stage = %kind, %diagnostic, "item processing fault");
            sink.emit(
                "stage.failed",
                Some(serde_json::json!({
                    "item": item.file_name(),
                    "stage": kind.short_name(),
                    "diagnostic": diagnostic,
                })),
            )
            .await;
            records.push(StageRecord::failed(kind, started, diagnostic));
            aborted = true;
            break;
        }
        written_documents.push(document_path.clone());

        let args = vec![
            "pipeline".to_string(),
            document_path.to_string_lossy().into_owned(),
        ];
        let outcome = runner.run(ENGINE_PROGRAM, &args, config.stage_timeout()).await;

        if outcome.is_success() {
            records.push(StageRecord::completed(kind, started));
            sink.emit(
                "stage.completed",
                Some(serde_json::json!({ "item": item.file_name(), "stage": kind.short_name() })),
            )
            .await;
        } else {
            let diagnostic = outcome.diagnostic_text().to_string();
            error!(item = %item.file_name(), stage = %kind, %diagnostic, "stage failed");
            sink.emit(
                "stage.failed",
                Some(serde_json::json!({
                    "item": item.file_name(),
                    "stage": kind.short_name(),
                    "diagnostic": diagnostic,
                })),
            )
            .await;
            records.push(StageRecord::failed(kind, started, diagnostic));
            aborted = true;
            break;
        }
    }

    let raster = if aborted || records.len() < crate::core::STAGE_SEQUENCE.len() {
        None
    } else {
        Some(item.raster_output(config.output_dir()))
    };

    if raster.is_some() {
        if config.cleanup_intermediate {
            // Removal failures are non-fatal; the raster is what matters.
            for artifact in item.intermediate_artifacts(config.output_dir()) {
                let _ = tokio::fs::remove_file(&artifact).await;
            }
        }
        sink.emit(
            "item.completed",
            Some(serde_json::json!({ "item": item.file_name() })),
        )
        .await;
    } else if !cancel.is_cancelled() {
        sink.emit(
            "item.failed",
            Some(serde_json::json!({ "item": item.file_name() })),
        )
        .await;
    }

    // Transient documents never outlive the item, success or not.
    for document in &written_documents {
        let _ = tokio::fs::remove_file(document).await;
    }

    ItemOutcome {
        item: item.clone(),
        raster,
        stages: records,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StageRunStatus;
    use crate::events::CollectingEventSink;
    use crate::testing::ScriptedRunner;
    use pretty_assertions::assert_eq;

    struct Fixture {
        _dirs: (tempfile::TempDir, tempfile::TempDir),
        config: BatchConfig,
        item: WorkItem,
    }

    fn fixture() -> Fixture {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(output.path().join("temp")).unwrap();

        let source = input.path().join("tile.laz");
        std::fs::write(&source, b"").unwrap();

        let config = BatchConfig::new(input.path(), output.path());
        let item = WorkItem::from_path(source).unwrap();
        Fixture {
            _dirs: (input, output),
            config,
            item,
        }
    }

    #[tokio::test]
    async fn test_full_success_produces_raster_and_cleans_intermediates() {
        let f = fixture();
        let runner = ScriptedRunner::new();
        let sink = CollectingEventSink::new();
        let cancel = CancellationToken::new();

        let outcome = process_item(&f.item, &f.config, &runner, &sink, &cancel).await;

        assert!(outcome.produced());
        let raster = outcome.raster.unwrap();
        assert!(raster.exists());
        assert_eq!(raster, f.item.raster_output(f.config.output_dir()));

        for artifact in f.item.intermediate_artifacts(f.config.output_dir()) {
            assert!(!artifact.exists(), "intermediate should be cleaned: {artifact:?}");
        }
        assert_eq!(outcome.stages.len(), 4);
        assert!(outcome.stages.iter().all(StageRecord::is_success));
        assert_eq!(sink.count_of("item.completed"), 1);
    }

    #[tokio::test]
    async fn test_cleanup_disabled_keeps_intermediates() {
        let f = fixture();
        let config = f.config.clone().with_cleanup_intermediate(false);
        let runner = ScriptedRunner::new();
        let sink = CollectingEventSink::new();
        let cancel = CancellationToken::new();

        let outcome = process_item(&f.item, &config, &runner, &sink, &cancel).await;

        assert!(outcome.produced());
        for artifact in f.item.intermediate_artifacts(config.output_dir()) {
            assert!(artifact.exists(), "intermediate should remain: {artifact:?}");
        }
    }

    #[tokio::test]
    async fn test_stage_failure_aborts_remaining_stages() {
        let f = fixture();
        let runner = ScriptedRunner::new().fail_matching("pipeline_merge", "merge exploded");
        let sink = CollectingEventSink::new();
        let cancel = CancellationToken::new();

        let outcome = process_item(&f.item, &f.config, &runner, &sink, &cancel).await;

        assert!(!outcome.produced());
        // ground, buildings, merge ran; rasterize never started.
        assert_eq!(outcome.stages.len(), 3);
        assert_eq!(outcome.stages[2].kind, StageKind::Merge);
        assert_eq!(outcome.stages[2].status, StageRunStatus::Failed);
        assert_eq!(outcome.stages[2].error.as_deref(), Some("merge exploded"));
        assert_eq!(runner.invocations_of("pdal").len(), 3);
        assert_eq!(sink.count_of("item.failed"), 1);

        // Failed items never have their intermediates cleaned.
        assert!(f.item.ground_artifact(f.config.output_dir()).exists());
        assert!(f.item.buildings_artifact(f.config.output_dir()).exists());
        assert!(!f.item.merged_artifact(f.config.output_dir()).exists());
    }

    #[tokio::test]
    async fn test_timeout_is_reported_distinctly() {
        let f = fixture();
        let runner = ScriptedRunner::new().time_out_matching("pipeline_ground");
        let sink = CollectingEventSink::new();
        let cancel = CancellationToken::new();

        let outcome = process_item(&f.item, &f.config, &runner, &sink, &cancel).await;

        assert!(!outcome.produced());
        assert!(outcome.stages[0]
            .error
            .as_deref()
            .unwrap()
            .starts_with("timed out"));
    }

    #[tokio::test]
    async fn test_transient_documents_removed_on_success_and_failure() {
        let f = fixture();
        let sink = CollectingEventSink::new();
        let cancel = CancellationToken::new();

        let runner = ScriptedRunner::new();
        process_item(&f.item, &f.config, &runner, &sink, &cancel).await;
        assert_temp_empty(&f.config);

        let runner = ScriptedRunner::new().fail_matching("pipeline_buildings", "bad tile");
        process_item(&f.item, &f.config, &runner, &sink, &cancel).await;
        assert_temp_empty(&f.config);
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_before_first_stage() {
        let f = fixture();
        let runner = ScriptedRunner::new();
        let sink = CollectingEventSink::new();
        let cancel = CancellationToken::new();
        cancel.cancel("shutting down");

        let outcome = process_item(&f.item, &f.config, &runner, &sink, &cancel).await;

        assert!(!outcome.produced());
        assert!(outcome.stages.is_empty());
        assert!(runner.invocations().is_empty());
    }

    fn assert_temp_empty(config: &BatchConfig) {
        let leftovers: Vec<_> = std::fs::read_dir(config.temp_dir())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert!(leftovers.is_empty(), "transient documents left behind: {leftovers:?}");
    }
}
