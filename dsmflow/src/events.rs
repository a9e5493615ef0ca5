//! Progress event channel.
//!
//! Batch, item, stage, and fill lifecycle events flow through an
//! [`EventSink`]. Events are advisory text for operators and tests; no
//! control flow depends on them, and emission never fails.

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::info;

/// Trait for sinks receiving batch progress events.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits an event asynchronously.
    ///
    /// # Arguments
    ///
    /// * `event_type` - The type of event (e.g., "stage.failed")
    /// * `data` - Optional event data
    async fn emit(&self, event_type: &str, data: Option<serde_json::Value>);

    /// Emits an event without blocking.
    ///
    /// This method must never fail; sinks suppress their own errors.
    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>);
}

/// A sink that discards all events.
///
/// Used as the default when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event_type: &str, _data: Option<serde_json::Value>) {}

    fn try_emit(&self, _event_type: &str, _data: Option<serde_json::Value>) {}
}

/// A sink that forwards events to the tracing subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingEventSink;

impl LoggingEventSink {
    /// Creates a new logging sink.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn log_event(event_type: &str, data: &Option<serde_json::Value>) {
        match data {
            Some(data) => info!(event_type = %event_type, %data, "{event_type}"),
            None => info!(event_type = %event_type, "{event_type}"),
        }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        Self::log_event(event_type, &data);
    }

    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        Self::log_event(event_type, &data);
    }
}

/// A collecting sink for assertions in tests.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: Mutex<Vec<(String, Option<serde_json::Value>)>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<(String, Option<serde_json::Value>)> {
        self.events.lock().clone()
    }

    /// Returns collected event types whose name starts with the given prefix.
    #[must_use]
    pub fn types_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter(|(t, _)| t.starts_with(prefix))
            .map(|(t, _)| t.clone())
            .collect()
    }

    /// Returns the number of events of an exact type.
    #[must_use]
    pub fn count_of(&self, event_type: &str) -> usize {
        self.events.lock().iter().filter(|(t, _)| t == event_type).count()
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.events.lock().push((event_type.to_string(), data));
    }

    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.events.lock().push((event_type.to_string(), data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_sink() {
        let sink = NoOpEventSink;
        sink.emit("item.started", None).await;
        sink.try_emit("item.started", Some(serde_json::json!({"item": "tile_1"})));
    }

    #[tokio::test]
    async fn test_logging_sink_does_not_panic() {
        let sink = LoggingEventSink::new();
        sink.emit("batch.started", Some(serde_json::json!({"total": 3}))).await;
        sink.try_emit("batch.completed", None);
    }

    #[tokio::test]
    async fn test_collecting_sink_records_in_order() {
        let sink = CollectingEventSink::new();
        sink.emit("stage.started", None).await;
        sink.try_emit("stage.failed", Some(serde_json::json!({"stage": "merge"})));

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].0, "stage.started");
        assert_eq!(events[1].0, "stage.failed");
    }

    #[tokio::test]
    async fn test_collecting_sink_filters() {
        let sink = CollectingEventSink::new();
        sink.emit("stage.started", None).await;
        sink.emit("stage.completed", None).await;
        sink.emit("fill.completed", None).await;

        assert_eq!(sink.types_with_prefix("stage.").len(), 2);
        assert_eq!(sink.count_of("fill.completed"), 1);
    }
}
