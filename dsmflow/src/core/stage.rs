//! Stage kinds and declarative stage descriptions.
//!
//! A [`StageDescription`] is the serializable description of one external
//! processing stage: input path(s), an operation, and an output path. The
//! JSON rendering in [`StageDescription::to_document`] is the external
//! engine's input schema - key names and value formats are a fixed
//! contract and must not drift.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Classification code for ground returns.
pub const GROUND_CLASS: u8 = 2;
/// Classification code for building returns.
pub const BUILDINGS_CLASS: u8 = 6;

/// The fixed per-item stage sequence, in execution order.
pub const STAGE_SEQUENCE: [StageKind; 4] = [
    StageKind::FilterGround,
    StageKind::FilterBuildings,
    StageKind::Merge,
    StageKind::Rasterize,
];

/// The kind of processing stage within an item's pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Range-filter keeping ground-classified points.
    FilterGround,
    /// Range-filter keeping building-classified points.
    FilterBuildings,
    /// Merge of the filtered subsets.
    Merge,
    /// Rasterization of the merged cloud into a height raster.
    Rasterize,
}

impl StageKind {
    /// Short name used in transient document file names and diagnostics.
    #[must_use]
    pub fn short_name(self) -> &'static str {
        match self {
            Self::FilterGround => "ground",
            Self::FilterBuildings => "buildings",
            Self::Merge => "merge",
            Self::Rasterize => "raster",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// The operation a stage performs, carrying only the parameters relevant
/// to that operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op")]
pub enum StageOp {
    /// Keep only points whose classification equals `class`.
    FilterByClass {
        /// The classification code to keep.
        class: u8,
    },
    /// Merge all inputs into one cloud.
    Merge,
    /// Rasterize into a height raster.
    Rasterize {
        /// Cell size in linear units.
        resolution: f64,
    },
}

/// A declarative, serializable description of one processing stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDescription {
    /// Input path(s), in order.
    pub inputs: Vec<PathBuf>,
    /// Output path of the stage.
    pub output: PathBuf,
    /// The operation to perform.
    pub op: StageOp,
}

impl StageDescription {
    /// Describes a classification filter stage: one input, one output.
    #[must_use]
    pub fn filter_by_class(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        class: u8,
    ) -> Self {
        Self {
            inputs: vec![input.into()],
            output: output.into(),
            op: StageOp::FilterByClass { class },
        }
    }

    /// Describes a merge stage over N inputs.
    #[must_use]
    pub fn merge(inputs: Vec<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            inputs,
            output: output.into(),
            op: StageOp::Merge,
        }
    }

    /// Describes a rasterization stage: one input, raster output.
    #[must_use]
    pub fn rasterize(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        resolution: f64,
    ) -> Self {
        Self {
            inputs: vec![input.into()],
            output: output.into(),
            op: StageOp::Rasterize { resolution },
        }
    }

    /// Renders the external engine's pipeline document.
    ///
    /// Filter and merge stages list inputs, then the operation descriptor,
    /// then the output path. The rasterize stage instead carries the output
    /// path and options inside its writer descriptor, with no trailing
    /// output entry.
    #[must_use]
    pub fn to_document(&self) -> serde_json::Value {
        let mut entries: Vec<serde_json::Value> = self
            .inputs
            .iter()
            .map(|p| serde_json::Value::String(path_string(p)))
            .collect();

        match &self.op {
            StageOp::FilterByClass { class } => {
                entries.push(serde_json::json!({
                    "type": "filters.range",
                    "limits": format!("Classification[{class}:{class}]"),
                }));
                entries.push(serde_json::Value::String(path_string(&self.output)));
            }
            StageOp::Merge => {
                entries.push(serde_json::json!({ "type": "filters.merge" }));
                entries.push(serde_json::Value::String(path_string(&self.output)));
            }
            StageOp::Rasterize { resolution } => {
                entries.push(serde_json::json!({
                    "type": "writers.gdal",
                    "filename": path_string(&self.output),
                    "resolution": resolution,
                    "output_type": "max",
                    "gdalopts": "COMPRESS=DEFLATE,TILED=YES",
                }));
            }
        }

        serde_json::json!({ "pipeline": entries })
    }

    /// Writes the pipeline document, pretty-printed, to `path`.
    pub async fn write_document(&self, path: &Path) -> Result<(), crate::errors::DsmflowError> {
        let body = serde_json::to_vec_pretty(&self.to_document())?;
        tokio::fs::write(path, body).await?;
        Ok(())
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_stage_kind_short_names() {
        assert_eq!(StageKind::FilterGround.to_string(), "ground");
        assert_eq!(StageKind::FilterBuildings.to_string(), "buildings");
        assert_eq!(StageKind::Merge.to_string(), "merge");
        assert_eq!(StageKind::Rasterize.to_string(), "raster");
    }

    #[test]
    fn test_stage_sequence_order() {
        assert_eq!(
            STAGE_SEQUENCE,
            [
                StageKind::FilterGround,
                StageKind::FilterBuildings,
                StageKind::Merge,
                StageKind::Rasterize,
            ]
        );
    }

    #[test]
    fn test_filter_document() {
        let desc = StageDescription::filter_by_class("tile.laz", "tile_ground.las", GROUND_CLASS);

        assert_eq!(
            desc.to_document(),
            serde_json::json!({
                "pipeline": [
                    "tile.laz",
                    {
                        "type": "filters.range",
                        "limits": "Classification[2:2]",
                    },
                    "tile_ground.las",
                ]
            })
        );
    }

    #[test]
    fn test_filter_document_buildings_class() {
        let desc = StageDescription::filter_by_class("t.laz", "t_b.las", BUILDINGS_CLASS);
        let doc = desc.to_document();
        assert_eq!(doc["pipeline"][1]["limits"], "Classification[6:6]");
    }

    #[test]
    fn test_merge_document_preserves_input_order() {
        let desc = StageDescription::merge(
            vec![PathBuf::from("a_ground.las"), PathBuf::from("a_buildings.las")],
            "a_merged.las",
        );

        assert_eq!(
            desc.to_document(),
            serde_json::json!({
                "pipeline": [
                    "a_ground.las",
                    "a_buildings.las",
                    { "type": "filters.merge" },
                    "a_merged.las",
                ]
            })
        );
    }

    #[test]
    fn test_rasterize_document_has_no_trailing_output() {
        let desc = StageDescription::rasterize("a_merged.las", "a_raster.tif", 0.5);
        let doc = desc.to_document();

        let pipeline = doc["pipeline"].as_array().unwrap();
        assert_eq!(pipeline.len(), 2);
        assert_eq!(pipeline[0], "a_merged.las");
        assert_eq!(
            pipeline[1],
            serde_json::json!({
                "type": "writers.gdal",
                "filename": "a_raster.tif",
                "resolution": 0.5,
                "output_type": "max",
                "gdalopts": "COMPRESS=DEFLATE,TILED=YES",
            })
        );
    }

    #[test]
    fn test_builders_are_deterministic() {
        let a = StageDescription::rasterize("in.las", "out.tif", 1.0);
        let b = StageDescription::rasterize("in.las", "out.tif", 1.0);
        assert_eq!(a, b);
        assert_eq!(a.to_document(), b.to_document());
    }

    #[tokio::test]
    async fn test_write_document_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline_ground_tile.json");

        let desc = StageDescription::filter_by_class("tile.laz", "tile_ground.las", GROUND_CLASS);
        desc.write_document(&path).await.unwrap();

        let body = tokio::fs::read_to_string(&path).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed, desc.to_document());
    }
}
