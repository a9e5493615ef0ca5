//! Work items and their derived artifact families.
//!
//! A work item is one input point-cloud file. Every artifact the item's
//! pipeline touches is named from the item's base identifier, so items
//! never collide within a run.

use crate::core::stage::StageKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File extensions recognized as point-cloud work items.
pub const RECOGNIZED_EXTENSIONS: [&str; 2] = ["laz", "las"];

/// One input point-cloud file and its derived identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Path of the input file.
    pub source: PathBuf,
    /// Base identifier (file stem) used to name all derived artifacts.
    pub base: String,
}

impl WorkItem {
    /// Creates a work item from an input path.
    ///
    /// Returns `None` if the path has no file stem.
    #[must_use]
    pub fn from_path(source: impl Into<PathBuf>) -> Option<Self> {
        let source = source.into();
        let base = source.file_stem()?.to_string_lossy().into_owned();
        Some(Self { source, base })
    }

    /// File name of the input, for diagnostics.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.source
            .file_name()
            .map_or_else(|| self.base.clone(), |n| n.to_string_lossy().into_owned())
    }

    /// Path of the ground-filtered intermediate artifact.
    #[must_use]
    pub fn ground_artifact(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(format!("{}_ground.las", self.base))
    }

    /// Path of the buildings-filtered intermediate artifact.
    #[must_use]
    pub fn buildings_artifact(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(format!("{}_buildings.las", self.base))
    }

    /// Path of the merged intermediate artifact.
    #[must_use]
    pub fn merged_artifact(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(format!("{}_merged.las", self.base))
    }

    /// Path of the item's final raster.
    #[must_use]
    pub fn raster_output(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(format!("{}_raster.tif", self.base))
    }

    /// Path of the item's filled raster inside the filled-raster folder.
    #[must_use]
    pub fn filled_output(&self, filled_dir: &Path) -> PathBuf {
        filled_dir.join(format!("{}_raster_filled.tif", self.base))
    }

    /// The three intermediate artifacts, in production order.
    #[must_use]
    pub fn intermediate_artifacts(&self, output_dir: &Path) -> [PathBuf; 3] {
        [
            self.ground_artifact(output_dir),
            self.buildings_artifact(output_dir),
            self.merged_artifact(output_dir),
        ]
    }

    /// Path of the transient pipeline document for one stage.
    #[must_use]
    pub fn document_path(&self, temp_dir: &Path, kind: StageKind) -> PathBuf {
        temp_dir.join(format!("pipeline_{}_{}.json", kind.short_name(), self.base))
    }
}

/// Scans `input_dir` (non-recursively) for recognized point-cloud files.
///
/// Extension matching is ASCII case-insensitive. Results are sorted by
/// file name so batch ordering is deterministic across filesystems.
/// File contents are not inspected.
pub async fn discover_work_items(
    input_dir: &Path,
) -> Result<Vec<WorkItem>, crate::errors::DsmflowError> {
    let mut items = Vec::new();
    let mut entries = tokio::fs::read_dir(input_dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let recognized = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                RECOGNIZED_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            });
        if !recognized {
            continue;
        }
        if let Some(item) = WorkItem::from_path(path) {
            items.push(item);
        }
    }

    items.sort_by(|a, b| a.source.cmp(&b.source));
    Ok(items)
}
