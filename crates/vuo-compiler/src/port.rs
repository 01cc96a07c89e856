//! Port classes (node-class signature) and ports (per-node instances)

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::generic::is_generic_type_name;

/// Whether a port receives or emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortDirection {
    Input,
    Output,
}

/// What flows through a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortKind {
    /// Data with an accompanying event
    Data,
    /// Events only
    Event,
    /// Output that fires events on its own (optionally carrying data)
    Trigger,
}

/// How an input port passes incoming events through to the outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventBlocking {
    /// Always passes events through
    #[default]
    None,
    /// Sometimes passes events through
    Door,
    /// Never passes events through
    Wall,
}

/// One port in a node class's signature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortClass {
    pub name: String,
    pub direction: PortDirection,
    pub kind: PortKind,
    /// Data type name (None for event-only ports); may be generic
    pub data_type: Option<String>,
    #[serde(default)]
    pub event_blocking: EventBlocking,
    /// Suggested values and other editor metadata (`default`, `suggestedMin`, ...)
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub details: Value,
}

impl PortClass {
    fn new(name: impl Into<String>, direction: PortDirection, kind: PortKind, data_type: Option<String>) -> Self {
        Self {
            name: name.into(),
            direction,
            kind,
            data_type,
            event_blocking: EventBlocking::None,
            details: Value::Null,
        }
    }

    /// Create a data-and-event input port
    pub fn data_input(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self::new(name, PortDirection::Input, PortKind::Data, Some(data_type.into()))
    }

    /// Create a data-and-event output port
    pub fn data_output(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self::new(name, PortDirection::Output, PortKind::Data, Some(data_type.into()))
    }

    /// Create an event-only input port
    pub fn event_input(name: impl Into<String>) -> Self {
        Self::new(name, PortDirection::Input, PortKind::Event, None)
    }

    /// Create a trigger output port
    pub fn trigger(name: impl Into<String>, data_type: Option<String>) -> Self {
        Self::new(name, PortDirection::Output, PortKind::Trigger, data_type)
    }

    /// Set the event-blocking policy
    pub fn with_event_blocking(mut self, event_blocking: EventBlocking) -> Self {
        self.event_blocking = event_blocking;
        self
    }

    /// Set the editor metadata
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    pub fn is_input(&self) -> bool {
        self.direction == PortDirection::Input
    }

    /// Returns true if the port's data type is a generic type name
    pub fn is_generic(&self) -> bool {
        self.data_type.as_deref().is_some_and(is_generic_type_name)
    }

    /// Default constant from the port details, if any
    pub fn default_value(&self) -> Option<&Value> {
        self.details.get("default")
    }
}

/// A port on a node instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Port {
    /// Name of the port class this port instantiates
    pub name: String,
    /// Data type of this port (the specialized type for specialized nodes)
    pub data_type: Option<String>,
    /// Constant value for unconnected data inputs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constant: Option<Value>,
}

impl Port {
    /// Instantiate a port class, taking its default constant
    pub fn from_class(port_class: &PortClass) -> Self {
        let constant = if port_class.is_input() && port_class.kind == PortKind::Data {
            port_class.default_value().cloned()
        } else {
            None
        };
        Self {
            name: port_class.name.clone(),
            data_type: port_class.data_type.clone(),
            constant,
        }
    }
}
