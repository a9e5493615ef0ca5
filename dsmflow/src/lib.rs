//! # Dsmflow
//!
//! Batch orchestration of LIDAR point-cloud to DSM raster conversion over
//! external processing tools.
//!
//! Dsmflow sequences, per input file, the external stages that turn a
//! point cloud into a filled height raster:
//!
//! - **Stage-based execution**: a fixed filter → filter → merge →
//!   rasterize sequence per work item, each stage an external engine call
//! - **Partial-failure isolation**: a failed stage aborts only its item;
//!   the batch always runs to completion and accounts for every item
//! - **Artifact lifecycle**: intermediate artifacts are cleaned after
//!   success under a policy flag; transient pipeline documents never
//!   outlive their item
//! - **Best-effort tool detection**: the optional fill tool is probed
//!   once per run across its known invocation forms
//! - **Cancellation handling**: cooperative cancellation at item, stage,
//!   and fill boundaries
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dsmflow::prelude::*;
//!
//! let config = BatchConfig::new("/data/tiles", "/data/out")
//!     .with_resolution(0.5)
//!     .with_fill_distance(75);
//!
//! let summary = BatchDriver::new(config).run().await?;
//! println!("{}/{} rasters produced", summary.produced, summary.total);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod batch;
pub mod cancellation;
pub mod config;
pub mod core;
pub mod detect;
pub mod errors;
pub mod events;
pub mod exec;
pub mod testing;
pub mod workflow;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::batch::{BatchDriver, BatchSummary};
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::BatchConfig;
    pub use crate::core::{
        discover_work_items, StageDescription, StageKind, StageOp, StageRecord, StageRunStatus,
        WorkItem,
    };
    pub use crate::detect::{detect_fill_tool, FillTool};
    pub use crate::errors::{ConfigValidationError, DsmflowError, EmptyInputDirectoryError};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::exec::{ProcessRunner, RunOutcome, SystemProcessRunner};
    pub use crate::workflow::{process_item, ItemOutcome};
}
