//! Event sinks for the agent loop

use std::sync::Mutex;
use tokio::sync::mpsc;
use toolpilot_core::AgentEvent;

/// Receives events in emission order.
///
/// Emitting never fails from the loop's point of view: a sink whose
/// consumer went away drops the event.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: AgentEvent);
}

impl EventSink for mpsc::UnboundedSender<AgentEvent> {
    fn emit(&self, event: AgentEvent) {
        // Receiver dropped means the client disconnected
        let _ = self.send(event);
    }
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: AgentEvent) {}
}

/// Sink that keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<AgentEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far
    pub fn events(&self) -> Vec<AgentEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Wire `type` tags of the recorded events
    pub fn kinds(&self) -> Vec<&'static str> {
        self.events().iter().map(AgentEvent::kind).collect()
    }

    /// All streamed content concatenated
    pub fn content(&self) -> String {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                AgentEvent::Content { content } => Some(content),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: AgentEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_keeps_order() {
        let sink = RecordingSink::new();
        sink.emit(AgentEvent::content("a"));
        sink.emit(AgentEvent::error("b"));
        sink.emit(AgentEvent::content("c"));
        assert_eq!(sink.kinds(), vec!["content", "error", "content"]);
        assert_eq!(sink.content(), "ac");
    }

    #[tokio::test]
    async fn test_channel_sink_survives_closed_receiver() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.emit(AgentEvent::content("hello"));
        assert_eq!(rx.recv().await, Some(AgentEvent::content("hello")));

        drop(rx);
        tx.emit(AgentEvent::content("nobody listening"));
    }
}
