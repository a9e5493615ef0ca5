//! Test support utilities.
//!
//! These helpers let workflow and batch behavior be exercised end to end
//! without PDAL or GDAL installed.

mod mocks;

pub use mocks::{RecordedInvocation, ScriptedRunner};
