//! Progress events for a pipeline run.

use serde::{Serialize, Serializer};
use tokio::sync::mpsc;

use crate::stages::Stage;

/// What a progress event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStep {
    Chunking,
    Stage(Stage),
    Completed,
    Error,
}

impl std::fmt::Display for ProgressStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProgressStep::Chunking => write!(f, "chunking"),
            ProgressStep::Stage(stage) => write!(f, "{stage}"),
            ProgressStep::Completed => write!(f, "completed"),
            ProgressStep::Error => write!(f, "error"),
        }
    }
}

impl Serialize for ProgressStep {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One observable step of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub step: ProgressStep,
    /// 0-100, never decreasing within a run
    pub progress: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Receiver of progress events, called in emission order.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// No-op implementation for callers that do not observe progress
pub struct NoOpSink;

impl ProgressSink for NoOpSink {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Forwards events into an unbounded channel, so emission never waits and
/// never drops while the receiver is alive.
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelSink {
    fn emit(&self, event: ProgressEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Progress receiver dropped");
        }
    }
}

/// Emits the events of one run, holding progress non-decreasing.
pub(crate) struct ProgressReporter<'a> {
    sink: &'a dyn ProgressSink,
    document_id: String,
    last: u8,
}

impl<'a> ProgressReporter<'a> {
    pub(crate) fn new(sink: &'a dyn ProgressSink, document_id: &str) -> Self {
        Self {
            sink,
            document_id: document_id.to_string(),
            last: 0,
        }
    }

    pub(crate) fn emit(&mut self, step: ProgressStep, progress: u8, message: impl Into<String>) {
        self.last = self.last.max(progress.min(100));
        self.sink.emit(ProgressEvent {
            step,
            progress: self.last,
            message: message.into(),
            document_id: None,
            error: None,
        });
    }

    pub(crate) fn completed(&mut self, message: impl Into<String>) {
        self.last = 100;
        self.sink.emit(ProgressEvent {
            step: ProgressStep::Completed,
            progress: 100,
            message: message.into(),
            document_id: Some(self.document_id.clone()),
            error: None,
        });
    }

    /// Terminal error event at the last reached percentage.
    pub(crate) fn failed(&mut self, error: &str) {
        self.sink.emit(ProgressEvent {
            step: ProgressStep::Error,
            progress: self.last,
            message: error.to_string(),
            document_id: Some(self.document_id.clone()),
            error: Some(error.to_string()),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reporter_never_goes_backwards() {
        let (sink, mut rx) = ChannelSink::new();
        let mut reporter = ProgressReporter::new(&sink, "doc-1");

        reporter.emit(ProgressStep::Chunking, 5, "chunking");
        reporter.emit(ProgressStep::Stage(Stage::Items), 30, "bloco 2/4");
        reporter.emit(ProgressStep::Stage(Stage::Items), 25, "late");
        reporter.failed("boom");

        let progress: Vec<u8> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.progress)
            .collect();
        assert_eq!(progress, vec![5, 30, 30, 30]);
    }

    #[test]
    fn test_event_serialization() {
        let event = ProgressEvent {
            step: ProgressStep::Stage(Stage::Requirements),
            progress: 45,
            message: "Mapping requirements".into(),
            document_id: None,
            error: None,
        };

        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["step"], "requisitos_tecnicos");
        assert_eq!(json["progress"], 45);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_channel_sink_survives_dropped_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.emit(ProgressEvent {
            step: ProgressStep::Completed,
            progress: 100,
            message: String::new(),
            document_id: None,
            error: None,
        });
    }
}
