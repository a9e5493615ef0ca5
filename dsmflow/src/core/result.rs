//! Per-stage execution records.

use crate::core::stage::StageKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Terminal status of one executed stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageRunStatus {
    /// Stage completed successfully.
    Completed,
    /// Stage failed (non-zero exit, timeout, or an environmental fault).
    Failed,
}

impl std::fmt::Display for StageRunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Timing and outcome record of one executed stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    /// Which stage ran.
    pub kind: StageKind,
    /// Terminal status.
    pub status: StageRunStatus,
    /// When the stage started.
    pub started_at: DateTime<Utc>,
    /// When the stage ended.
    pub ended_at: DateTime<Utc>,
    /// Diagnostic text when failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StageRecord {
    /// Creates a completed record.
    #[must_use]
    pub fn completed(kind: StageKind, started_at: DateTime<Utc>) -> Self {
        Self {
            kind,
            status: StageRunStatus::Completed,
            started_at,
            ended_at: Utc::now(),
            error: None,
        }
    }

    /// Creates a failed record with diagnostic text.
    #[must_use]
    pub fn failed(kind: StageKind, started_at: DateTime<Utc>, error: impl Into<String>) -> Self {
        Self {
            kind,
            status: StageRunStatus::Failed,
            started_at,
            ended_at: Utc::now(),
            error: Some(error.into()),
        }
    }

    /// Duration of the stage in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> f64 {
        (self.ended_at - self.started_at).num_milliseconds() as f64
    }

    /// Returns true if the stage completed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.status, StageRunStatus::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completed_record() {
        let record = StageRecord::completed(StageKind::Merge, Utc::now());
        assert!(record.is_success());
        assert!(record.error.is_none());
    }

    #[test]
    fn test_failed_record_keeps_diagnostic() {
        let record = StageRecord::failed(StageKind::Rasterize, Utc::now(), "writer aborted");
        assert!(!record.is_success());
        assert_eq!(record.error.as_deref(), Some("writer aborted"));
    }

    #[test]
    fn test_duration_is_non_negative() {
        let record = StageRecord::completed(StageKind::FilterGround, Utc::now());
        assert!(record.duration_ms() >= 0.0);
    }

    #[test]
    fn test_record_serialization() {
        let record = StageRecord::failed(StageKind::Merge, Utc::now(), "boom");
        let json = serde_json::to_string(&record).unwrap();
        let parsed: StageRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.status, StageRunStatus::Failed);
        assert_eq!(parsed.kind, StageKind::Merge);
    }
}
