//! Composition graph: nodes, their ports, and the cables between them
//!
//! A node refers to its class through a [`NodeClassRef`]. Concrete classes
//! and fully specialized classes are shared through the registry; a
//! specialization that leaves generic types open is owned by its node.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{CompilerError, Result};
use crate::generic::is_generic_type_name;
use crate::make_list::is_make_list_node_class_name;
use crate::node_class::{CompiledModule, NodeClass};
use crate::port::Port;
use crate::specialized::SpecializedNodeClass;
use crate::types::{is_list_type_name, item_type_name};

/// How a node refers to its class
#[derive(Debug, Clone)]
pub enum NodeClassRef {
    /// A loaded or compiled class, shared
    Class(Arc<NodeClass>),
    /// A fully specialized class, shared through the registry
    Shared(Arc<SpecializedNodeClass>),
    /// A specialization owned by one node
    Owned(Box<SpecializedNodeClass>),
}

impl NodeClassRef {
    /// The class signature
    pub fn node_class(&self) -> &NodeClass {
        match self {
            Self::Class(class) => class,
            Self::Shared(specialized) => specialized.node_class(),
            Self::Owned(specialized) => specialized.node_class(),
        }
    }

    pub fn name(&self) -> &str {
        &self.node_class().name
    }

    pub fn specialized(&self) -> Option<&SpecializedNodeClass> {
        match self {
            Self::Class(_) => None,
            Self::Shared(specialized) => Some(specialized),
            Self::Owned(specialized) => Some(specialized),
        }
    }

    /// Mutable access to a node-owned specialization
    pub fn specialized_mut(&mut self) -> Option<&mut SpecializedNodeClass> {
        match self {
            Self::Owned(specialized) => Some(specialized),
            _ => None,
        }
    }

    pub fn is_shared(&self) -> bool {
        !matches!(self, Self::Owned(_))
    }

    /// Compiled code that runs for nodes of this class.
    ///
    /// For a specialization, this is the module of a backing that matches
    /// its current substitutions.
    pub fn implementation(&self) -> Option<&Arc<CompiledModule>> {
        match self {
            Self::Class(class) => class.module.as_ref(),
            Self::Shared(_) | Self::Owned(_) => {
                let specialized = self.specialized()?;
                if !specialized.has_current_backing() {
                    return None;
                }
                specialized.backing_node_class()?.module.as_ref()
            }
        }
    }
}

/// A node placed in a composition
#[derive(Debug, Clone)]
pub struct Node {
    pub id: String,
    pub title: String,
    pub position: (f64, f64),
    pub class: NodeClassRef,
    pub input_ports: Vec<Port>,
    pub output_ports: Vec<Port>,
}

impl Node {
    /// Instantiate `class`, with each data input holding its default constant
    pub fn new(class: NodeClassRef, title: impl Into<String>, position: (f64, f64)) -> Self {
        let node_class = class.node_class();
        let input_ports = node_class.input_port_classes.iter().map(Port::from_class).collect();
        let output_ports = node_class.output_port_classes.iter().map(Port::from_class).collect();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            position,
            class,
            input_ports,
            output_ports,
        }
    }

    pub fn class_name(&self) -> &str {
        self.class.name()
    }

    pub fn input_port(&self, name: &str) -> Option<&Port> {
        self.input_ports.iter().find(|p| p.name == name)
    }

    pub fn input_port_mut(&mut self, name: &str) -> Option<&mut Port> {
        self.input_ports.iter_mut().find(|p| p.name == name)
    }

    pub fn output_port(&self, name: &str) -> Option<&Port> {
        self.output_ports.iter().find(|p| p.name == name)
    }

    /// Any port by name, inputs first
    pub fn port(&self, name: &str) -> Option<&Port> {
        self.input_port(name).or_else(|| self.output_port(name))
    }

    /// Set the constant of a data input
    pub fn set_constant(&mut self, port_name: &str, value: serde_json::Value) -> Result<()> {
        let node_id = self.id.clone();
        let port = self
            .input_port_mut(port_name)
            .filter(|p| p.data_type.is_some())
            .ok_or_else(|| CompilerError::PortNotFound {
                node: node_id,
                port: port_name.to_string(),
            })?;
        port.constant = Some(value);
        Ok(())
    }

    /// Bring port data types in line with the class signature.
    ///
    /// Constants survive only on ports whose type is unchanged.
    pub fn refresh_port_types(&mut self) {
        let node_class = self.class.node_class();
        for port in self.input_ports.iter_mut().chain(self.output_ports.iter_mut()) {
            let Some(port_class) = node_class.port_class(&port.name) else {
                continue;
            };
            if port.data_type != port_class.data_type {
                port.data_type = port_class.data_type.clone();
                port.constant = Port::from_class(port_class).constant;
            }
        }
    }
}

/// A connection from an output port to an input port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cable {
    pub from_node: String,
    pub from_port: String,
    pub to_node: String,
    pub to_port: String,
}

impl Cable {
    pub fn new(
        from_node: impl Into<String>,
        from_port: impl Into<String>,
        to_node: impl Into<String>,
        to_port: impl Into<String>,
    ) -> Self {
        Self {
            from_node: from_node.into(),
            from_port: from_port.into(),
            to_node: to_node.into(),
            to_port: to_port.into(),
        }
    }

    fn touches(&self, node_id: &str) -> bool {
        self.from_node == node_id || self.to_node == node_id
    }
}

/// Returns true if a cable may carry data from a port of type `from` into a port of type `to`.
///
/// Event-only ports (no data type) accept and emit events on any cable. A
/// generic type matches anything, since it is resolved by specialization.
pub fn cable_types_compatible(from: Option<&str>, to: Option<&str>) -> bool {
    match (from, to) {
        (Some(from), Some(to)) => from == to || is_generic_type_name(from) || is_generic_type_name(to),
        _ => true,
    }
}

/// An unconnected list input that a Make List drawer can feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MakeListAttachment {
    pub node_id: String,
    pub port_name: String,
    pub item_type_name: String,
}

/// A graph of nodes and cables
#[derive(Debug, Clone, Default)]
pub struct Composition {
    pub nodes: Vec<Node>,
    pub cables: Vec<Cable>,
}

impl Composition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, returning its id
    pub fn add_node(&mut self, node: Node) -> String {
        let id = node.id.clone();
        self.nodes.push(node);
        id
    }

    /// Remove a node along with every cable attached to it
    pub fn remove_node(&mut self, node_id: &str) -> Option<Node> {
        let index = self.nodes.iter().position(|n| n.id == node_id)?;
        self.cables.retain(|c| !c.touches(node_id));
        Some(self.nodes.remove(index))
    }

    /// Find a node by ID
    pub fn find_node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Find a node by ID (mutable)
    pub fn find_node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// Connect an output to an input.
    ///
    /// An input takes at most one cable, so any cable already feeding
    /// `cable.to_port` is replaced.
    pub fn connect(&mut self, cable: Cable) -> Result<()> {
        let from = self
            .find_node(&cable.from_node)
            .ok_or_else(|| CompilerError::NodeNotFound(cable.from_node.clone()))?;
        if from.output_port(&cable.from_port).is_none() {
            return Err(CompilerError::PortNotFound {
                node: cable.from_node.clone(),
                port: cable.from_port.clone(),
            });
        }
        let to = self
            .find_node(&cable.to_node)
            .ok_or_else(|| CompilerError::NodeNotFound(cable.to_node.clone()))?;
        if to.input_port(&cable.to_port).is_none() {
            return Err(CompilerError::PortNotFound {
                node: cable.to_node.clone(),
                port: cable.to_port.clone(),
            });
        }

        self.cables
            .retain(|c| !(c.to_node == cable.to_node && c.to_port == cable.to_port));
        self.cables.push(cable);
        Ok(())
    }

    /// Remove a cable, returning true if it was present
    pub fn disconnect(&mut self, cable: &Cable) -> bool {
        let before = self.cables.len();
        self.cables.retain(|c| c != cable);
        self.cables.len() != before
    }

    /// Get cables coming into a node
    pub fn incoming_cables<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Cable> + 'a {
        self.cables.iter().filter(move |c| c.to_node == node_id)
    }

    /// Get cables going out of a node
    pub fn outgoing_cables<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Cable> + 'a {
        self.cables.iter().filter(move |c| c.from_node == node_id)
    }

    /// Data type of the port at one end of a cable
    fn port_type(&self, node_id: &str, port_name: &str, input: bool) -> Option<Option<&str>> {
        let node = self.find_node(node_id)?;
        let port = if input {
            node.input_port(port_name)?
        } else {
            node.output_port(port_name)?
        };
        Some(port.data_type.as_deref())
    }

    /// Put `replacement` in place of the node with the same id.
    ///
    /// Cables attached to the node survive only if the replacement still
    /// has the port and its type is compatible with the other end. Returns
    /// the node that was replaced.
    pub fn replace_node(&mut self, replacement: Node) -> Option<Node> {
        let index = self.nodes.iter().position(|n| n.id == replacement.id)?;
        let old = std::mem::replace(&mut self.nodes[index], replacement);
        let node_id = old.id.clone();

        let cables = std::mem::take(&mut self.cables);
        let (attached, kept): (Vec<Cable>, Vec<Cable>) = cables.into_iter().partition(|c| c.touches(&node_id));
        self.cables = kept;

        for cable in attached {
            let from = self.port_type(&cable.from_node, &cable.from_port, false);
            let to = self.port_type(&cable.to_node, &cable.to_port, true);
            match (from, to) {
                (Some(from), Some(to)) if cable_types_compatible(from, to) => self.cables.push(cable),
                _ => log::debug!(
                    "Dropped cable {}:{} -> {}:{} while replacing node '{}'",
                    cable.from_node,
                    cable.from_port,
                    cable.to_node,
                    cable.to_port,
                    node_id
                ),
            }
        }

        Some(old)
    }

    /// Unconnected list inputs on nodes other than Make List nodes
    pub fn ports_needing_make_list(&self) -> Vec<MakeListAttachment> {
        let mut attachments = Vec::new();
        for node in &self.nodes {
            if is_make_list_node_class_name(node.class_name()) {
                continue;
            }
            for port in &node.input_ports {
                let Some(data_type) = port.data_type.as_deref().filter(|t| is_list_type_name(t)) else {
                    continue;
                };
                if self.incoming_cables(&node.id).any(|c| c.to_port == port.name) {
                    continue;
                }
                if let Some(item) = item_type_name(data_type) {
                    attachments.push(MakeListAttachment {
                        node_id: node.id.clone(),
                        port_name: port.name.clone(),
                        item_type_name: item.to_string(),
                    });
                }
            }
        }
        attachments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::PortClass;

    fn class(name: &str, input: (&str, &str), output: (&str, &str)) -> NodeClassRef {
        NodeClassRef::Class(Arc::new(
            NodeClass::new(name)
                .with_port(PortClass::data_input(input.0, input.1).with_details(serde_json::json!({"default": 1})))
                .with_port(PortClass::data_output(output.0, output.1)),
        ))
    }

    #[test]
    fn test_node_instantiates_ports() {
        let node = Node::new(class("vuo.math.round", ("real", "VuoReal"), ("rounded", "VuoInteger")), "Round", (10.0, 20.0));
        assert_eq!(node.input_ports.len(), 2);
        assert_eq!(node.input_port("real").unwrap().constant, Some(serde_json::json!(1)));
        assert!(node.input_port("refresh").unwrap().constant.is_none());
        assert_eq!(node.output_port("rounded").unwrap().data_type.as_deref(), Some("VuoInteger"));
        assert!(node.port("real").is_some());
    }

    #[test]
    fn test_connect_replaces_existing_input_cable() {
        let mut composition = Composition::new();
        let a = composition.add_node(Node::new(class("vuo.a", ("x", "VuoReal"), ("y", "VuoReal")), "A", (0.0, 0.0)));
        let b = composition.add_node(Node::new(class("vuo.b", ("x", "VuoReal"), ("y", "VuoReal")), "B", (0.0, 0.0)));
        let c = composition.add_node(Node::new(class("vuo.c", ("x", "VuoReal"), ("y", "VuoReal")), "C", (0.0, 0.0)));

        composition.connect(Cable::new(&a, "y", &c, "x")).unwrap();
        composition.connect(Cable::new(&b, "y", &c, "x")).unwrap();
        let incoming: Vec<&Cable> = composition.incoming_cables(&c).collect();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].from_node, b);
        assert_eq!(composition.outgoing_cables(&a).count(), 0);

        let err = composition.connect(Cable::new(&a, "nope", &c, "x")).unwrap_err();
        assert!(matches!(err, CompilerError::PortNotFound { .. }));
        let err = composition.connect(Cable::new("missing", "y", &c, "x")).unwrap_err();
        assert!(matches!(err, CompilerError::NodeNotFound(_)));

        composition.remove_node(&b);
        assert!(composition.cables.is_empty());
    }

    #[test]
    fn test_replace_node_drops_incompatible_cables() {
        let mut composition = Composition::new();
        let source = composition.add_node(Node::new(class("vuo.src", ("x", "VuoReal"), ("y", "VuoText")), "S", (0.0, 0.0)));
        let target = Node::new(class("vuo.dst", ("x", "VuoText"), ("y", "VuoText")), "T", (0.0, 0.0));
        let target_id = composition.add_node(target.clone());
        composition.connect(Cable::new(&source, "y", &target_id, "x")).unwrap();
        composition.connect(Cable::new(&source, "y", &target_id, "refresh")).unwrap();

        let mut replacement = Node::new(class("vuo.dst2", ("x", "VuoReal"), ("y", "VuoText")), "T", (0.0, 0.0));
        replacement.id = target_id.clone();
        let old = composition.replace_node(replacement).unwrap();
        assert_eq!(old.class_name(), "vuo.dst");

        // The data cable no longer type-checks; the event cable survives
        assert_eq!(composition.cables.len(), 1);
        assert_eq!(composition.cables[0].to_port, "refresh");
    }

    #[test]
    fn test_ports_needing_make_list() {
        let mut composition = Composition::new();
        let node = composition.add_node(Node::new(
            class("vuo.list.count.VuoText", ("list", "VuoList_VuoText"), ("count", "VuoInteger")),
            "Count",
            (0.0, 0.0),
        ));
        composition.add_node(Node::new(
            class("vuo.list.make.2.VuoText", ("items", "VuoList_VuoText"), ("list", "VuoList_VuoText")),
            "Make List",
            (0.0, 0.0),
        ));

        let needed = composition.ports_needing_make_list();
        assert_eq!(
            needed,
            vec![MakeListAttachment {
                node_id: node,
                port_name: "list".to_string(),
                item_type_name: "VuoText".to_string(),
            }]
        );
    }

    #[test]
    fn test_cable_types_compatible() {
        assert!(cable_types_compatible(Some("VuoText"), Some("VuoText")));
        assert!(!cable_types_compatible(Some("VuoText"), Some("VuoReal")));
        assert!(cable_types_compatible(Some("VuoGenericType1"), Some("VuoReal")));
        assert!(cable_types_compatible(None, Some("VuoReal")));
        assert!(cable_types_compatible(Some("VuoReal"), None));
    }

    #[test]
    fn test_set_constant() {
        let mut node = Node::new(class("vuo.math.round", ("real", "VuoReal"), ("rounded", "VuoInteger")), "Round", (0.0, 0.0));
        node.set_constant("real", serde_json::json!(2.5)).unwrap();
        assert_eq!(node.input_port("real").unwrap().constant, Some(serde_json::json!(2.5)));
        assert!(node.set_constant("refresh", serde_json::json!(1)).is_err());
    }
}
