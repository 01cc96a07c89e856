//! Composition validation
//!
//! Finds the problems that keep a composition from running: nodes whose
//! class is unknown or has no implementation yet, and cables that
//! reference missing nodes or ports or join incompatible types.

use crate::composition::{cable_types_compatible, Cable, Composition, NodeClassRef};
use crate::registry::NodeClassRegistry;

/// Validation error with location context
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A node's class is not in the registry
    UnknownNodeClass { node_id: String, node_class: String },
    /// A node's class has no compiled code (generic, unbacked, or failed to compile)
    MissingImplementation { node_id: String, node_class: String },
    /// A cable joins ports whose data types cannot connect
    IncompatibleCableTypes {
        cable: String,
        from_type: String,
        to_type: String,
    },
    /// A cable references a node that is not in the composition
    UnknownNode { cable: String, node_id: String },
    /// A cable references a port the node does not have
    UnknownPort {
        cable: String,
        node_id: String,
        port: String,
    },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownNodeClass { node_id, node_class } => {
                write!(f, "Unknown node class '{}' for node '{}'", node_class, node_id)
            }
            Self::MissingImplementation { node_id, node_class } => {
                write!(f, "Node '{}' ({}) has no implementation", node_id, node_class)
            }
            Self::IncompatibleCableTypes {
                cable,
                from_type,
                to_type,
            } => {
                write!(f, "Cable {} connects incompatible types: {} -> {}", cable, from_type, to_type)
            }
            Self::UnknownNode { cable, node_id } => {
                write!(f, "Cable {} references unknown node '{}'", cable, node_id)
            }
            Self::UnknownPort { cable, node_id, port } => {
                write!(f, "Cable {} references unknown port '{}' on node '{}'", cable, port, node_id)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate a composition
///
/// Returns all validation errors found (not just the first).
/// Pass a registry to also check that node classes are known.
pub fn validate_composition(
    composition: &Composition,
    registry: Option<&NodeClassRegistry>,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    validate_cables(composition, &mut errors);
    validate_implementations(composition, &mut errors);

    if let Some(reg) = registry {
        validate_node_classes(composition, reg, &mut errors);
    }

    errors
}

fn describe(cable: &Cable) -> String {
    format!("{}:{} -> {}:{}", cable.from_node, cable.from_port, cable.to_node, cable.to_port)
}

fn validate_cables(composition: &Composition, errors: &mut Vec<ValidationError>) {
    for cable in &composition.cables {
        let label = describe(cable);

        let Some(from) = composition.find_node(&cable.from_node) else {
            errors.push(ValidationError::UnknownNode {
                cable: label.clone(),
                node_id: cable.from_node.clone(),
            });
            continue;
        };
        let Some(to) = composition.find_node(&cable.to_node) else {
            errors.push(ValidationError::UnknownNode {
                cable: label,
                node_id: cable.to_node.clone(),
            });
            continue;
        };

        let Some(from_port) = from.output_port(&cable.from_port) else {
            errors.push(ValidationError::UnknownPort {
                cable: label,
                node_id: from.id.clone(),
                port: cable.from_port.clone(),
            });
            continue;
        };
        let Some(to_port) = to.input_port(&cable.to_port) else {
            errors.push(ValidationError::UnknownPort {
                cable: label,
                node_id: to.id.clone(),
                port: cable.to_port.clone(),
            });
            continue;
        };

        let from_type = from_port.data_type.as_deref();
        let to_type = to_port.data_type.as_deref();
        if !cable_types_compatible(from_type, to_type) {
            errors.push(ValidationError::IncompatibleCableTypes {
                cable: label,
                from_type: from_type.unwrap_or_default().to_string(),
                to_type: to_type.unwrap_or_default().to_string(),
            });
        }
    }
}

fn validate_implementations(composition: &Composition, errors: &mut Vec<ValidationError>) {
    for node in &composition.nodes {
        if node.class.implementation().is_none() {
            errors.push(ValidationError::MissingImplementation {
                node_id: node.id.clone(),
                node_class: node.class_name().to_string(),
            });
        }
    }
}

fn validate_node_classes(composition: &Composition, registry: &NodeClassRegistry, errors: &mut Vec<ValidationError>) {
    for node in &composition.nodes {
        // Owned specializations never enter the registry
        if matches!(node.class, NodeClassRef::Owned(_)) {
            continue;
        }
        if !registry.has_node_class(node.class_name()) {
            errors.push(ValidationError::UnknownNodeClass {
                node_id: node.id.clone(),
                node_class: node.class_name().to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::Node;
    use crate::node_class::{CompiledModule, EntryPoints, NodeClass};
    use crate::port::PortClass;
    use std::sync::Arc;

    fn compiled(name: &str, input: &str, output: &str) -> Arc<NodeClass> {
        let class = NodeClass::new(name)
            .with_port(PortClass::data_input("in", input))
            .with_port(PortClass::data_output("out", output));
        let entry_points = EntryPoints::for_node_class(&class);
        let details = class.details.clone();
        Arc::new(class.with_module(CompiledModule::new(name, details, entry_points)))
    }

    #[test]
    fn test_valid_composition() {
        let registry = NodeClassRegistry::new();
        let a_class = compiled("vuo.a", "VuoReal", "VuoText");
        let b_class = compiled("vuo.b", "VuoText", "VuoText");
        registry.publish(a_class.clone());
        registry.publish(b_class.clone());

        let mut composition = Composition::new();
        let a = composition.add_node(Node::new(NodeClassRef::Class(a_class), "A", (0.0, 0.0)));
        let b = composition.add_node(Node::new(NodeClassRef::Class(b_class), "B", (0.0, 0.0)));
        composition.connect(Cable::new(&a, "out", &b, "in")).unwrap();

        assert!(validate_composition(&composition, Some(&registry)).is_empty());
    }

    #[test]
    fn test_reports_every_problem() {
        let registry = NodeClassRegistry::new();
        let a_class = compiled("vuo.a", "VuoReal", "VuoReal");
        registry.publish(a_class.clone());
        let generic = Arc::new(NodeClass::new("vuo.data.hold.VuoGenericType1").with_port(PortClass::data_input("in", "VuoGenericType1")));

        let mut composition = Composition::new();
        let a = composition.add_node(Node::new(NodeClassRef::Class(a_class), "A", (0.0, 0.0)));
        let b = composition.add_node(Node::new(NodeClassRef::Class(compiled("vuo.b", "VuoText", "VuoText")), "B", (0.0, 0.0)));
        composition.add_node(Node::new(NodeClassRef::Class(generic), "Hold", (0.0, 0.0)));
        composition.cables.push(Cable::new(&a, "out", &b, "in"));
        composition.cables.push(Cable::new(&a, "out", "ghost", "in"));
        composition.cables.push(Cable::new(&a, "missing", &b, "in"));

        let errors = validate_composition(&composition, Some(&registry));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::IncompatibleCableTypes { from_type, to_type, .. } if from_type == "VuoReal" && to_type == "VuoText")));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::UnknownNode { node_id, .. } if node_id == "ghost")));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::UnknownPort { port, .. } if port == "missing")));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::UnknownNodeClass { node_class, .. } if node_class == "vuo.b")));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::MissingImplementation { node_class, .. } if node_class == "vuo.data.hold.VuoGenericType1")));

        // Without a registry, class membership is not checked
        let errors = validate_composition(&composition, None);
        assert!(!errors.iter().any(|e| matches!(e, ValidationError::UnknownNodeClass { .. })));
    }

    #[test]
    fn test_error_display() {
        let err = ValidationError::MissingImplementation {
            node_id: "n1".to_string(),
            node_class: "vuo.data.hold.VuoText".to_string(),
        };
        assert_eq!(err.to_string(), "Node 'n1' (vuo.data.hold.VuoText) has no implementation");
    }
}
