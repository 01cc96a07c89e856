//! Node classes and the compiled modules that back them
//!
//! A [`NodeClass`] is either *generic* (some port is typed by a generic type
//! name, no compiled code) or *concrete* (every port type is real). A
//! concrete node class is runnable once it has a [`CompiledModule`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::constants::module;
use crate::generic::{sort_generic_type_names, GenericTypeDetails};
use crate::module_details::ModuleDetails;
use crate::port::{PortClass, PortKind};
use crate::types::innermost_type_name;

/// Values keyed by port name, passed to and returned from node functions
pub type PortValues = BTreeMap<String, Value>;

/// In-process body of an entry point
pub type NodeFunction = Arc<dyn Fn(&PortValues) -> PortValues + Send + Sync>;

/// One exported function of a compiled module
#[derive(Clone)]
pub struct EntryPoint {
    /// Exported symbol name
    pub symbol: String,
    function: Option<NodeFunction>,
}

impl EntryPoint {
    /// An entry point known only by symbol (linked later)
    pub fn symbol(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            function: None,
        }
    }

    /// An entry point with an in-process body
    pub fn with_function(symbol: impl Into<String>, function: NodeFunction) -> Self {
        Self {
            symbol: symbol.into(),
            function: Some(function),
        }
    }

    /// Returns true if the entry point can be called in-process
    pub fn is_callable(&self) -> bool {
        self.function.is_some()
    }

    /// Call the in-process body, if there is one
    pub fn call(&self, inputs: &PortValues) -> Option<PortValues> {
        self.function.as_ref().map(|f| f(inputs))
    }
}

impl fmt::Debug for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryPoint")
            .field("symbol", &self.symbol)
            .field("callable", &self.is_callable())
            .finish()
    }
}

/// The functions a compiled node-class module exports
#[derive(Debug, Clone)]
pub struct EntryPoints {
    pub event: EntryPoint,
    pub instance_init: Option<EntryPoint>,
    pub instance_fini: Option<EntryPoint>,
    /// Trigger port name → worker function
    pub trigger_workers: BTreeMap<String, EntryPoint>,
}

impl EntryPoints {
    /// Entry points of a stateless node class
    pub fn stateless() -> Self {
        Self {
            event: EntryPoint::symbol(module::EVENT_FUNCTION),
            instance_init: None,
            instance_fini: None,
            trigger_workers: BTreeMap::new(),
        }
    }

    /// Entry points of a stateful node class
    pub fn stateful() -> Self {
        Self {
            event: EntryPoint::symbol(module::INSTANCE_EVENT_FUNCTION),
            instance_init: Some(EntryPoint::symbol(module::INSTANCE_INIT_FUNCTION)),
            instance_fini: Some(EntryPoint::symbol(module::INSTANCE_FINI_FUNCTION)),
            trigger_workers: BTreeMap::new(),
        }
    }

    /// The symbols a module built for `node_class` is expected to export
    pub fn for_node_class(node_class: &NodeClass) -> Self {
        let mut entry_points = if node_class.stateful {
            Self::stateful()
        } else {
            Self::stateless()
        };
        for port in node_class.output_port_classes.iter().filter(|p| p.kind == PortKind::Trigger) {
            entry_points
                .trigger_workers
                .insert(port.name.clone(), EntryPoint::symbol(format!("{}Worker", port.name)));
        }
        entry_points
    }

    /// All exported symbol names
    pub fn symbols(&self) -> Vec<&str> {
        let mut symbols = vec![self.event.symbol.as_str()];
        symbols.extend(self.instance_init.iter().map(|e| e.symbol.as_str()));
        symbols.extend(self.instance_fini.iter().map(|e| e.symbol.as_str()));
        symbols.extend(self.trigger_workers.values().map(|e| e.symbol.as_str()));
        symbols
    }
}

/// Compiled code backing a concrete node class
#[derive(Debug, Clone)]
pub struct CompiledModule {
    /// Name the module was compiled under (the node-class name)
    pub module_key: String,
    pub details: ModuleDetails,
    pub entry_points: EntryPoints,
    /// Compiled bitcode (empty for modules synthesized in-process)
    pub bitcode: Vec<u8>,
}

impl CompiledModule {
    pub fn new(module_key: impl Into<String>, details: ModuleDetails, entry_points: EntryPoints) -> Self {
        Self {
            module_key: module_key.into(),
            details,
            entry_points,
            bitcode: Vec::new(),
        }
    }

    /// Attach compiled bitcode
    pub fn with_bitcode(mut self, bitcode: Vec<u8>) -> Self {
        self.bitcode = bitcode;
        self
    }

    /// Run the event function in-process, if it has a body
    pub fn invoke_event(&self, inputs: &PortValues) -> Option<PortValues> {
        self.entry_points.event.call(inputs)
    }
}

/// Generic or concrete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeClassKind {
    Generic,
    Concrete,
}

/// A template for nodes
#[derive(Debug, Clone)]
pub struct NodeClass {
    /// Module key, e.g. `vuo.data.hold.VuoGenericType1`
    pub name: String,
    pub title: String,
    pub description: String,
    /// Node set the class was loaded from
    pub node_set: Option<String>,
    pub input_port_classes: Vec<PortClass>,
    pub output_port_classes: Vec<PortClass>,
    /// Module metadata (generic type details, provenance)
    pub details: ModuleDetails,
    /// Implementation source, for classes loaded from a node set
    pub source: Option<String>,
    /// Whether the class keeps per-instance state
    pub stateful: bool,
    /// Compiled code (None for generic classes and unresolved backings)
    pub module: Option<Arc<CompiledModule>>,
}

impl NodeClass {
    /// Create a node class with a `refresh` input and no other ports
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            title: name.clone(),
            name,
            description: String::new(),
            node_set: None,
            input_port_classes: vec![PortClass::event_input(crate::constants::ports::REFRESH)],
            output_port_classes: Vec::new(),
            details: ModuleDetails::default(),
            source: None,
            stateful: false,
            module: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_node_set(mut self, node_set: impl Into<String>) -> Self {
        self.node_set = Some(node_set.into());
        self
    }

    /// Add a port class to the inputs or outputs according to its direction
    pub fn with_port(mut self, port_class: PortClass) -> Self {
        if port_class.is_input() {
            self.input_port_classes.push(port_class);
        } else {
            self.output_port_classes.push(port_class);
        }
        self
    }

    /// Declare metadata for one of the class's generic types
    pub fn with_generic_type(mut self, generic_type_name: impl Into<String>, details: GenericTypeDetails) -> Self {
        self.details.generic_types.insert(generic_type_name.into(), details);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn stateful(mut self) -> Self {
        self.stateful = true;
        self
    }

    pub fn with_module(mut self, module: CompiledModule) -> Self {
        self.module = Some(Arc::new(module));
        self
    }

    /// Input then output port classes, in declaration order
    pub fn port_classes(&self) -> impl Iterator<Item = &PortClass> {
        self.input_port_classes
            .iter()
            .chain(self.output_port_classes.iter())
    }

    pub fn input_port_class(&self, name: &str) -> Option<&PortClass> {
        self.input_port_classes.iter().find(|p| p.name == name)
    }

    pub fn output_port_class(&self, name: &str) -> Option<&PortClass> {
        self.output_port_classes.iter().find(|p| p.name == name)
    }

    /// Find a port class by name, inputs first
    pub fn port_class(&self, name: &str) -> Option<&PortClass> {
        self.input_port_class(name).or_else(|| self.output_port_class(name))
    }

    /// Innermost generic type names used by the ports, in suffix order
    pub fn generic_type_names_from_ports(&self) -> Vec<String> {
        let unique: BTreeSet<String> = self
            .port_classes()
            .filter(|p| p.is_generic())
            .filter_map(|p| p.data_type.as_deref())
            .map(|t| innermost_type_name(t).to_string())
            .collect();
        let mut names: Vec<String> = unique.into_iter().collect();
        sort_generic_type_names(&mut names);
        names
    }

    /// Metadata for a generic type (unrestricted if the class declares none)
    pub fn generic_type_details(&self, generic_type_name: &str) -> GenericTypeDetails {
        self.details
            .generic_types
            .get(innermost_type_name(generic_type_name))
            .cloned()
            .unwrap_or_default()
    }

    pub fn kind(&self) -> NodeClassKind {
        if self.port_classes().any(PortClass::is_generic) {
            NodeClassKind::Generic
        } else {
            NodeClassKind::Concrete
        }
    }

    pub fn is_generic(&self) -> bool {
        self.kind() == NodeClassKind::Generic
    }

    /// Returns true if the class has compiled code
    pub fn has_implementation(&self) -> bool {
        self.module.is_some()
    }

    /// Type names the class's ports refer to, innermost forms included
    pub fn port_type_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        for data_type in self.port_classes().filter_map(|p| p.data_type.as_deref()) {
            names.insert(data_type.to_string());
            names.insert(innermost_type_name(data_type).to_string());
        }
        names
    }
}
