//! Node class registry
//!
//! Process-wide cache of node classes keyed by name, shared by every open
//! composition. Entries are only ever inserted, and only once fully built,
//! so a reader on another thread never sees a class under construction.
//!
//! Two kinds of entry are kept:
//! - loaded and compiled classes (generic originals, concrete classes and
//!   the backings built for specializations)
//! - fully specialized classes, shared by every node that uses them
//!
//! Specializations that leave generic types open are owned by their node
//! and never enter the registry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::composition::NodeClassRef;
use crate::naming::is_specialization_of_node_class;
use crate::node_class::NodeClass;
use crate::specialized::SpecializedNodeClass;

/// Registry of node classes, keyed by name
pub struct NodeClassRegistry {
    node_classes: RwLock<HashMap<String, Arc<NodeClass>>>,
    specializations: RwLock<HashMap<String, Arc<SpecializedNodeClass>>>,
}

impl NodeClassRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            node_classes: RwLock::new(HashMap::new()),
            specializations: RwLock::new(HashMap::new()),
        }
    }

    /// Register a loaded node class, replacing any class with the same name
    pub fn register(&self, node_class: NodeClass) -> Arc<NodeClass> {
        let node_class = Arc::new(node_class);
        log::debug!("Registered node class '{}'", node_class.name);
        self.node_classes
            .write()
            .insert(node_class.name.clone(), node_class.clone());
        node_class
    }

    /// Publish a built node class unless one with the same name is already present.
    ///
    /// Returns the class that ends up registered under the name.
    pub fn publish(&self, node_class: Arc<NodeClass>) -> Arc<NodeClass> {
        self.node_classes
            .write()
            .entry(node_class.name.clone())
            .or_insert(node_class)
            .clone()
    }

    /// Publish a fully specialized class unless one with the same name is already present.
    ///
    /// Returns None, publishing nothing, for a specialization that still
    /// leaves generic types open.
    pub fn publish_specialization(&self, specialized: SpecializedNodeClass) -> Option<Arc<SpecializedNodeClass>> {
        if !specialized.is_fully_specialized() {
            log::warn!(
                "Refusing to share partial specialization '{}'",
                specialized.name()
            );
            return None;
        }
        let published = self
            .specializations
            .write()
            .entry(specialized.name().to_string())
            .or_insert_with(|| Arc::new(specialized))
            .clone();
        Some(published)
    }

    /// Get a loaded or compiled node class
    pub fn lookup_node_class(&self, name: &str) -> Option<Arc<NodeClass>> {
        self.node_classes.read().get(name).cloned()
    }

    /// Get a shared specialization
    pub fn lookup_specialization(&self, name: &str) -> Option<Arc<SpecializedNodeClass>> {
        self.specializations.read().get(name).cloned()
    }

    /// Get whatever is registered under `name`, preferring a shared specialization
    pub fn lookup(&self, name: &str) -> Option<NodeClassRef> {
        if let Some(specialized) = self.lookup_specialization(name) {
            return Some(NodeClassRef::Shared(specialized));
        }
        self.lookup_node_class(name).map(NodeClassRef::Class)
    }

    /// Check if a node class or specialization is registered under `name`
    pub fn has_node_class(&self, name: &str) -> bool {
        self.specializations.read().contains_key(name) || self.node_classes.read().contains_key(name)
    }

    /// All registered names, sorted
    pub fn node_class_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.node_classes.read().keys().cloned().collect();
        for name in self.specializations.read().keys() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names.sort();
        names
    }

    /// All loaded generic node classes, sorted by name
    pub fn generic_node_classes(&self) -> Vec<Arc<NodeClass>> {
        let mut generics: Vec<Arc<NodeClass>> = self
            .node_classes
            .read()
            .values()
            .filter(|c| c.is_generic())
            .cloned()
            .collect();
        generics.sort_by(|a, b| a.name.cmp(&b.name));
        generics
    }

    /// The loaded generic class that `name` specializes, if any
    pub fn find_generic_for(&self, name: &str) -> Option<Arc<NodeClass>> {
        self.generic_node_classes()
            .into_iter()
            .find(|generic| generic.name != name && is_specialization_of_node_class(name, generic))
    }

    /// Merge another registry into this one
    ///
    /// Entries from `other` override entries in `self` if they share the same name.
    pub fn merge(&self, other: NodeClassRegistry) {
        self.node_classes.write().extend(other.node_classes.into_inner());
        self.specializations.write().extend(other.specializations.into_inner());
    }

    pub fn len(&self) -> usize {
        self.node_classes.read().len() + self.specializations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for NodeClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::PortClass;
    use std::collections::BTreeMap;

    fn hold() -> NodeClass {
        NodeClass::new("vuo.data.hold.VuoGenericType1")
            .with_port(PortClass::data_input("newValue", "VuoGenericType1"))
            .with_port(PortClass::data_output("heldValue", "VuoGenericType1"))
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = NodeClassRegistry::new();
        registry.register(hold());
        registry.register(NodeClass::new("vuo.event.fire"));

        assert!(registry.has_node_class("vuo.data.hold.VuoGenericType1"));
        assert!(!registry.has_node_class("vuo.data.hold.VuoText"));
        assert_eq!(registry.generic_node_classes().len(), 1);
        assert_eq!(registry.node_class_names(), vec!["vuo.data.hold.VuoGenericType1", "vuo.event.fire"]);
        assert!(matches!(registry.lookup("vuo.event.fire"), Some(NodeClassRef::Class(_))));
    }

    #[test]
    fn test_find_generic_for() {
        let registry = NodeClassRegistry::new();
        registry.register(hold());
        assert_eq!(
            registry.find_generic_for("vuo.data.hold.VuoText").unwrap().name,
            "vuo.data.hold.VuoGenericType1"
        );
        assert!(registry.find_generic_for("vuo.data.hold.VuoGenericType1").is_none());
        assert!(registry.find_generic_for("vuo.math.add.VuoText").is_none());
    }

    #[test]
    fn test_publish_first_wins() {
        let registry = NodeClassRegistry::new();
        let first = registry.publish(Arc::new(NodeClass::new("vuo.data.hold.VuoText")));
        let second = registry.publish(Arc::new(NodeClass::new("vuo.data.hold.VuoText")));
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_partial_specializations_not_shared() {
        let registry = NodeClassRegistry::new();
        let generic = registry.register(hold());

        let partial = SpecializedNodeClass::unspecialized(generic.clone());
        assert!(registry.publish_specialization(partial).is_none());

        let full = SpecializedNodeClass::new(
            generic,
            &BTreeMap::from([("VuoGenericType1".to_string(), "VuoText".to_string())]),
        );
        let shared = registry.publish_specialization(full).unwrap();
        assert!(matches!(registry.lookup("vuo.data.hold.VuoText"), Some(NodeClassRef::Shared(s)) if Arc::ptr_eq(&s, &shared)));
    }

    #[test]
    fn test_merge_override() {
        let registry1 = NodeClassRegistry::new();
        registry1.register(NodeClass::new("vuo.event.fire").with_title("Original"));

        let registry2 = NodeClassRegistry::new();
        registry2.register(NodeClass::new("vuo.event.fire").with_title("Override"));
        registry2.register(hold());

        registry1.merge(registry2);
        assert_eq!(registry1.len(), 2);
        assert_eq!(registry1.lookup_node_class("vuo.event.fire").unwrap().title, "Override");
    }
}
