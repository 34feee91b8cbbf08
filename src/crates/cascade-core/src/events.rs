//! Workflow lifecycle events and per-run delivery
//!
//! The executor emits a [`WorkflowEvent`] at every step boundary, on every
//! tool dispatch, when a provider request goes out, and for every streamed
//! completion chunk. Events flow through an [`EventSink`] owned by a single
//! run: there is no global listener registry, so cleanup is simply dropping
//! the sink (which happens on success, failure, and cancellation alike).
//!
//! Delivery is fire-and-forget. A consumer that stopped listening never
//! fails or slows a run; undeliverable events are dropped after a debug
//! trace. Every event is also mirrored to `tracing`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::definition::StepKind;

/// Event types emitted during a workflow run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// A step is about to run
    StepStarted {
        run_id: String,
        step_index: usize,
        kind: StepKind,
        /// Display form of the step's output binding
        target: String,
        timestamp: i64,
    },
    /// A step finished and its results are stored
    StepCompleted {
        run_id: String,
        step_index: usize,
        target: String,
        timestamp: i64,
    },
    /// A step failed; the run aborts after this event
    StepFailed {
        run_id: String,
        step_index: usize,
        error: String,
        timestamp: i64,
    },
    /// A tool is about to be invoked with its resolved input
    ToolExecution {
        run_id: String,
        step_index: usize,
        tool: String,
        input: Value,
        timestamp: i64,
    },
    /// A provider request was dispatched for a template step
    RequestSent {
        run_id: String,
        step_index: usize,
        provider: String,
        template: String,
        timestamp: i64,
    },
    /// One streamed chunk of provider output
    StreamChunk {
        run_id: String,
        step_index: usize,
        chunk: String,
        timestamp: i64,
    },
}

impl WorkflowEvent {
    /// Get the timestamp of the event
    pub fn timestamp(&self) -> i64 {
        match self {
            WorkflowEvent::StepStarted { timestamp, .. }
            | WorkflowEvent::StepCompleted { timestamp, .. }
            | WorkflowEvent::StepFailed { timestamp, .. }
            | WorkflowEvent::ToolExecution { timestamp, .. }
            | WorkflowEvent::RequestSent { timestamp, .. }
            | WorkflowEvent::StreamChunk { timestamp, .. } => *timestamp,
        }
    }

    /// Run this event belongs to
    pub fn run_id(&self) -> &str {
        match self {
            WorkflowEvent::StepStarted { run_id, .. }
            | WorkflowEvent::StepCompleted { run_id, .. }
            | WorkflowEvent::StepFailed { run_id, .. }
            | WorkflowEvent::ToolExecution { run_id, .. }
            | WorkflowEvent::RequestSent { run_id, .. }
            | WorkflowEvent::StreamChunk { run_id, .. } => run_id,
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            WorkflowEvent::StepStarted { step_index, kind, target, .. } => {
                format!("Step {} started: {} -> {}", step_index, kind, target)
            }
            WorkflowEvent::StepCompleted { step_index, target, .. } => {
                format!("Step {} completed -> {}", step_index, target)
            }
            WorkflowEvent::StepFailed { step_index, error, .. } => {
                format!("Step {} failed: {}", step_index, error)
            }
            WorkflowEvent::ToolExecution { step_index, tool, .. } => {
                format!("Step {} executing tool '{}'", step_index, tool)
            }
            WorkflowEvent::RequestSent { step_index, provider, template, .. } => {
                format!(
                    "Step {} sent template '{}' to provider '{}'",
                    step_index, template, provider
                )
            }
            WorkflowEvent::StreamChunk { step_index, chunk, .. } => {
                format!("Step {} chunk ({} bytes)", step_index, chunk.len())
            }
        }
    }

    /// Create a StepStarted event
    pub fn step_started(
        run_id: impl Into<String>,
        step_index: usize,
        kind: StepKind,
        target: impl Into<String>,
    ) -> Self {
        WorkflowEvent::StepStarted {
            run_id: run_id.into(),
            step_index,
            kind,
            target: target.into(),
            timestamp: Utc::now().timestamp(),
        }
    }

    /// Create a StepCompleted event
    pub fn step_completed(
        run_id: impl Into<String>,
        step_index: usize,
        target: impl Into<String>,
    ) -> Self {
        WorkflowEvent::StepCompleted {
            run_id: run_id.into(),
            step_index,
            target: target.into(),
            timestamp: Utc::now().timestamp(),
        }
    }

    /// Create a StepFailed event
    pub fn step_failed(
        run_id: impl Into<String>,
        step_index: usize,
        error: impl Into<String>,
    ) -> Self {
        WorkflowEvent::StepFailed {
            run_id: run_id.into(),
            step_index,
            error: error.into(),
            timestamp: Utc::now().timestamp(),
        }
    }

    /// Create a ToolExecution event
    pub fn tool_execution(
        run_id: impl Into<String>,
        step_index: usize,
        tool: impl Into<String>,
        input: Value,
    ) -> Self {
        WorkflowEvent::ToolExecution {
            run_id: run_id.into(),
            step_index,
            tool: tool.into(),
            input,
            timestamp: Utc::now().timestamp(),
        }
    }

    /// Create a RequestSent event
    pub fn request_sent(
        run_id: impl Into<String>,
        step_index: usize,
        provider: impl Into<String>,
        template: impl Into<String>,
    ) -> Self {
        WorkflowEvent::RequestSent {
            run_id: run_id.into(),
            step_index,
            provider: provider.into(),
            template: template.into(),
            timestamp: Utc::now().timestamp(),
        }
    }

    /// Create a StreamChunk event
    pub fn stream_chunk(
        run_id: impl Into<String>,
        step_index: usize,
        chunk: impl Into<String>,
    ) -> Self {
        WorkflowEvent::StreamChunk {
            run_id: run_id.into(),
            step_index,
            chunk: chunk.into(),
            timestamp: Utc::now().timestamp(),
        }
    }
}

/// Per-run event delivery handle
///
/// Cheap to clone; each run receives its own sink. The null sink discards
/// everything, which keeps event emission unconditional in the executor.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    sender: Option<mpsc::UnboundedSender<WorkflowEvent>>,
}

impl EventSink {
    /// Sink that discards all events
    pub fn null() -> Self {
        Self { sender: None }
    }

    /// Sink backed by an unbounded channel, plus its receiver
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<WorkflowEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    /// Emit an event, fire-and-forget
    ///
    /// Mirrors the event to `tracing` (chunks at debug, everything else at
    /// info) and then attempts delivery. A dropped receiver is not an
    /// error.
    pub fn emit(&self, event: WorkflowEvent) {
        match &event {
            WorkflowEvent::StreamChunk { .. } => {
                tracing::debug!(run_id = %event.run_id(), description = %event.description(), "workflow event");
            }
            _ => {
                tracing::info!(run_id = %event.run_id(), description = %event.description(), "workflow event");
            }
        }

        if let Some(sender) = &self.sender {
            if sender.send(event).is_err() {
                tracing::debug!("event receiver dropped, event discarded");
            }
        }
    }

    /// True when this sink discards events
    pub fn is_null(&self) -> bool {
        self.sender.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_step_started_event() {
        let event = WorkflowEvent::step_started("run-1", 0, StepKind::Tool, "issue");

        match &event {
            WorkflowEvent::StepStarted { run_id, step_index, kind, target, .. } => {
                assert_eq!(run_id, "run-1");
                assert_eq!(*step_index, 0);
                assert_eq!(*kind, StepKind::Tool);
                assert_eq!(target, "issue");
            }
            _ => panic!("expected StepStarted event"),
        }

        assert!(event.description().contains("Step 0 started"));
        assert!(event.description().contains("issue"));
    }

    #[test]
    fn test_step_failed_event() {
        let event = WorkflowEvent::step_failed("run-1", 2, "tool not found: 'x'");

        let desc = event.description();
        assert!(desc.contains("Step 2 failed"));
        assert!(desc.contains("tool not found"));
    }

    #[test]
    fn test_event_serialization_tags() {
        let event = WorkflowEvent::tool_execution("run-1", 1, "http_request", json!({"url": "/"}));

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"tool_execution\""));
        assert!(json.contains("http_request"));

        let back: WorkflowEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_event_timestamp() {
        let event = WorkflowEvent::stream_chunk("run-1", 0, "hi");
        let now = Utc::now().timestamp();
        assert!((event.timestamp() - now).abs() <= 1);
    }

    #[tokio::test]
    async fn test_channel_sink_delivers_in_order() {
        let (sink, mut rx) = EventSink::channel();

        sink.emit(WorkflowEvent::step_started("run-1", 0, StepKind::Template, "out"));
        sink.emit(WorkflowEvent::step_completed("run-1", 0, "out"));

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(matches!(first, WorkflowEvent::StepStarted { .. }));
        assert!(matches!(second, WorkflowEvent::StepCompleted { .. }));
    }

    #[tokio::test]
    async fn test_dropped_receiver_does_not_panic() {
        let (sink, rx) = EventSink::channel();
        drop(rx);

        // Emission after the consumer is gone is a silent no-op.
        sink.emit(WorkflowEvent::step_started("run-1", 0, StepKind::Tool, "out"));
    }

    #[test]
    fn test_null_sink_discards() {
        let sink = EventSink::null();
        assert!(sink.is_null());
        sink.emit(WorkflowEvent::step_completed("run-1", 0, "out"));
    }
}
