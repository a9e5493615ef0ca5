//! Core domain model types for dsmflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Work items and their derived artifact families
//! - Stage kinds, operations, and declarative stage descriptions
//! - Per-stage execution records

mod item;
mod result;
mod stage;

pub use item::{discover_work_items, WorkItem, RECOGNIZED_EXTENSIONS};
pub use result::{StageRecord, StageRunStatus};
pub use stage::{
    StageDescription, StageKind, StageOp, BUILDINGS_CLASS, GROUND_CLASS, STAGE_SEQUENCE,
};
