//! Event types for observing backing builds
//!
//! Builds run on the compile work queue; hosts (an editor, a CLI) learn
//! about their progress and completion through an [`EventSink`].

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Trait for sending compiler events
///
/// This abstracts over the transport mechanism (GUI callback, mpsc, etc.)
pub trait EventSink: Send + Sync {
    /// Send an event
    ///
    /// Returns an error if the event could not be delivered (e.g., channel closed)
    fn send(&self, event: CompilerEvent) -> Result<(), EventError>;
}

/// Error when sending events fails
#[derive(Debug, Clone)]
pub struct EventError {
    pub message: String,
}

impl std::fmt::Display for EventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Event error: {}", self.message)
    }
}

impl std::error::Error for EventError {}

impl EventError {
    pub fn channel_closed() -> Self {
        Self {
            message: "Channel closed".to_string(),
        }
    }
}

/// Events emitted while resolving backings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CompilerEvent {
    /// A backing compile was started for a fingerprint
    #[serde(rename_all = "camelCase")]
    BuildStarted {
        node_class_name: String,
        session_id: String,
    },

    /// A request joined a build that was already in flight
    #[serde(rename_all = "camelCase")]
    BuildCoalesced {
        node_class_name: String,
        session_id: String,
    },

    /// A backing compile finished successfully
    #[serde(rename_all = "camelCase")]
    BuildFinished {
        node_class_name: String,
        session_id: String,
    },

    /// A backing compile failed
    #[serde(rename_all = "camelCase")]
    BuildFailed {
        node_class_name: String,
        session_id: String,
        diagnostics: Vec<String>,
    },

    /// A session stopped waiting for a build because it was cancelled
    #[serde(rename_all = "camelCase")]
    BuildCancelled {
        node_class_name: String,
        session_id: String,
    },

    /// A node class became visible in the shared registry
    #[serde(rename_all = "camelCase")]
    NodeClassPublished { node_class_name: String },
}

impl CompilerEvent {
    /// Name of the node class the event concerns
    pub fn node_class_name(&self) -> &str {
        match self {
            Self::BuildStarted { node_class_name, .. }
            | Self::BuildCoalesced { node_class_name, .. }
            | Self::BuildFinished { node_class_name, .. }
            | Self::BuildFailed { node_class_name, .. }
            | Self::BuildCancelled { node_class_name, .. }
            | Self::NodeClassPublished { node_class_name } => node_class_name,
        }
    }
}

/// A no-op event sink that discards all events
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn send(&self, _event: CompilerEvent) -> Result<(), EventError> {
        Ok(())
    }
}

/// A vector-based event sink that collects events
///
/// Useful for testing to verify events were emitted correctly.
pub struct VecEventSink {
    events: Mutex<Vec<CompilerEvent>>,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    /// Get all collected events
    pub fn events(&self) -> Vec<CompilerEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Clear all collected events
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl Default for VecEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for VecEventSink {
    fn send(&self, event: CompilerEvent) -> Result<(), EventError> {
        self.events
            .lock()
            .map_err(|_| EventError::channel_closed())?
            .push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_event_sink() {
        let sink = VecEventSink::new();

        sink.send(CompilerEvent::BuildStarted {
            node_class_name: "vuo.data.hold.VuoText".to_string(),
            session_id: "s1".to_string(),
        })
        .unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].node_class_name(), "vuo.data.hold.VuoText");

        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = CompilerEvent::NodeClassPublished {
            node_class_name: "vuo.list.make.3.VuoText".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"nodeClassPublished\""));
        assert!(json.contains("nodeClassName"));
    }
}
