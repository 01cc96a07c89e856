//! Compiler facade
//!
//! Ties the registries and the backing resolver together behind the
//! operations an editor performs on a composition: fetching node classes by
//! name, placing nodes, attaching Make List drawers, and changing the types
//! of generic ports.

use std::sync::Arc;

use crate::backing::{BackingResolver, CompileSession, ModuleCompiler};
use crate::clang::ClangModuleCompiler;
use crate::composition::{Cable, Composition, Node, NodeClassRef};
use crate::config::CompilerConfig;
use crate::constants::ports::MAKE_LIST_OUTPUT;
use crate::error::{CompilerError, Result};
use crate::events::EventSink;
use crate::generic::is_generic_type_name;
use crate::make_list::{self, MAKE_LIST_TITLE};
use crate::node_class::NodeClass;
use crate::registry::NodeClassRegistry;
use crate::specialized::SpecializedNodeClass;
use crate::types::TypeRegistry;
use crate::validation::{validate_composition, ValidationError};

/// Horizontal distance between a Make List drawer and the node it feeds
const DRAWER_OFFSET: f64 = 100.0;

/// A generic class cannot be placed as is; nodes get their own open specialization of it
fn instantiable(class: NodeClassRef) -> NodeClassRef {
    match class {
        NodeClassRef::Class(generic) if generic.is_generic() => {
            NodeClassRef::Owned(Box::new(SpecializedNodeClass::unspecialized(generic)))
        }
        other => other,
    }
}

/// Entry point for node-class resolution and composition editing
pub struct Compiler {
    config: CompilerConfig,
    types: Arc<TypeRegistry>,
    registry: Arc<NodeClassRegistry>,
    resolver: BackingResolver,
}

impl Compiler {
    /// Create a compiler with the core types loaded and no node classes
    pub fn new(config: CompilerConfig, module_compiler: Arc<dyn ModuleCompiler>, event_sink: Arc<dyn EventSink>) -> Self {
        let types = Arc::new(TypeRegistry::with_core_types());
        let registry = Arc::new(NodeClassRegistry::new());
        let resolver = BackingResolver::new(
            module_compiler,
            registry.clone(),
            types.clone(),
            event_sink,
            config.default_backing_type.clone(),
        );
        log::debug!("Compiler created with {} core types", types.len());
        Self {
            config,
            types,
            registry,
            resolver,
        }
    }

    /// Create a compiler that builds backings with the configured clang
    pub fn with_clang(config: CompilerConfig, event_sink: Arc<dyn EventSink>) -> Self {
        let clang = ClangModuleCompiler::from_config(&config);
        if !clang.is_available() {
            log::warn!(
                "Toolchain {} not found; specializations will have no implementation",
                config.clang_path.display()
            );
        }
        Self::new(config, Arc::new(clang), event_sink)
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn types(&self) -> &Arc<TypeRegistry> {
        &self.types
    }

    pub fn registry(&self) -> &Arc<NodeClassRegistry> {
        &self.registry
    }

    pub fn resolver(&self) -> &BackingResolver {
        &self.resolver
    }

    /// Add a node class read from a module
    pub fn load_node_class(&self, node_class: NodeClass) -> Result<NodeClassRef> {
        self.resolver.node_class_from_module(node_class)
    }

    /// Registry lookup only; never compiles, so safe on an interactive thread
    pub fn lookup_node_class(&self, name: &str) -> Option<NodeClassRef> {
        self.registry.lookup(name)
    }

    /// Fetch, synthesize or build the node class named `name`
    pub async fn get_node_class(&self, name: &str, session: &CompileSession) -> Result<Option<NodeClassRef>> {
        self.resolver.new_node_class(name, session).await
    }

    /// Place a node of class `class_name`.
    ///
    /// A generic class is instantiated through its default specialization.
    pub async fn create_node(
        &self,
        class_name: &str,
        title: impl Into<String>,
        position: (f64, f64),
        session: &CompileSession,
    ) -> Result<Node> {
        let class = self
            .get_node_class(class_name, session)
            .await?
            .ok_or_else(|| CompilerError::not_found(class_name))?;

        let class = match class {
            NodeClassRef::Class(generic) if generic.is_generic() => {
                let default_name = SpecializedNodeClass::create_default_specialized_node_class_name(&generic);
                let default_class = if default_name == generic.name {
                    None
                } else {
                    self.get_node_class(&default_name, session).await?
                };
                default_class.unwrap_or_else(|| instantiable(NodeClassRef::Class(generic)))
            }
            other => other,
        };

        Ok(Node::new(class, title, position))
    }

    /// Feed every unconnected list input from a new Make List drawer.
    ///
    /// Returns the ids of the drawers added.
    pub async fn attach_make_list_nodes(&self, composition: &mut Composition, session: &CompileSession) -> Result<Vec<String>> {
        let mut added = Vec::new();
        for attachment in composition.ports_needing_make_list() {
            let name = make_list::build_node_class_name(self.config.default_make_list_item_count, &attachment.item_type_name);
            let Some(class) = self.get_node_class(&name, session).await? else {
                log::debug!("No Make List class for '{}'", name);
                continue;
            };

            let position = composition
                .find_node(&attachment.node_id)
                .map(|n| (n.position.0 - DRAWER_OFFSET, n.position.1))
                .unwrap_or_default();
            let drawer_id = composition.add_node(Node::new(class, MAKE_LIST_TITLE, position));
            composition.connect(Cable::new(&drawer_id, MAKE_LIST_OUTPUT, &attachment.node_id, &attachment.port_name))?;
            added.push(drawer_id);
        }
        Ok(added)
    }

    /// Swap the node's class for `class_name`, keeping what carries over
    async fn replace_node_class(
        &self,
        composition: &mut Composition,
        node_id: &str,
        class_name: &str,
        session: &CompileSession,
    ) -> Result<bool> {
        let node = composition
            .find_node(node_id)
            .ok_or_else(|| CompilerError::NodeNotFound(node_id.to_string()))?;
        if node.class_name() == class_name {
            return Ok(false);
        }
        let specialized = node
            .class
            .specialized()
            .ok_or_else(|| CompilerError::not_found(class_name))?;

        let Some(class) = self.get_node_class(class_name, session).await? else {
            return Err(CompilerError::not_found(class_name));
        };
        let replacement = specialized.create_replacement_backing_node(node, instantiable(class));
        log::debug!("Node '{}' changes class from '{}' to '{}'", node_id, node.class_name(), class_name);
        composition.replace_node(replacement);
        Ok(true)
    }

    /// Specialize the generic type of `port_name` on a node to `type_name`.
    ///
    /// Every port sharing that generic type changes with it. The node is
    /// replaced by one of the new class, with the same id, constants kept
    /// where the port type is unchanged, and cables kept where they still
    /// type-check.
    pub async fn specialize_node_port(
        &self,
        composition: &mut Composition,
        node_id: &str,
        port_name: &str,
        type_name: &str,
        session: &CompileSession,
    ) -> Result<()> {
        let node = composition
            .find_node(node_id)
            .ok_or_else(|| CompilerError::NodeNotFound(node_id.to_string()))?;
        let port_not_found = || CompilerError::PortNotFound {
            node: node_id.to_string(),
            port: port_name.to_string(),
        };
        let specialized = node.class.specialized().ok_or_else(port_not_found)?;
        let original = specialized.original_port_type(port_name).ok_or_else(port_not_found)?;
        if !is_generic_type_name(&original) {
            return Err(CompilerError::IncompatibleType {
                generic_type_name: original,
                type_name: type_name.to_string(),
            });
        }

        let class_name = specialized.create_specialized_node_class_name_with_replacement(&original, type_name);
        match self.replace_node_class(composition, node_id, &class_name, session).await {
            Err(CompilerError::NodeClassNotFound(_)) => Err(CompilerError::IncompatibleType {
                generic_type_name: original,
                type_name: type_name.to_string(),
            }),
            other => other.map(|_| ()),
        }
    }

    /// Revert the given ports of a node, and every port sharing their generic types, to generic
    pub async fn unspecialize_node_ports(
        &self,
        composition: &mut Composition,
        node_id: &str,
        port_names: &[&str],
        session: &CompileSession,
    ) -> Result<()> {
        let node = composition
            .find_node(node_id)
            .ok_or_else(|| CompilerError::NodeNotFound(node_id.to_string()))?;
        let Some(specialized) = node.class.specialized() else {
            return Ok(());
        };
        let class_name = specialized.create_unspecialized_node_class_name(port_names);
        self.replace_node_class(composition, node_id, &class_name, session)
            .await
            .map(|_| ())
    }

    /// Give every fully specialized node a backing that matches its substitutions.
    ///
    /// A node whose backing fails to compile is left as it is, without an
    /// implementation. Returns the number of nodes that gained a backing.
    pub async fn reify_generic_port_types(&self, composition: &mut Composition, session: &CompileSession) -> Result<usize> {
        let stale: Vec<(String, String)> = composition
            .nodes
            .iter()
            .filter_map(|node| {
                let specialized = node.class.specialized()?;
                (specialized.is_fully_specialized() && !specialized.has_current_backing())
                    .then(|| (node.id.clone(), specialized.name().to_string()))
            })
            .collect();

        let mut reified = 0;
        for (node_id, class_name) in stale {
            match self.replace_node_class_for_backing(composition, &node_id, &class_name, session).await {
                Ok(true) => reified += 1,
                Ok(false) => {}
                Err(err @ CompilerError::Cancelled(_)) => return Err(err),
                Err(err) => log::warn!("Node '{}' keeps no implementation: {}", node_id, err),
            }
        }
        Ok(reified)
    }

    async fn replace_node_class_for_backing(
        &self,
        composition: &mut Composition,
        node_id: &str,
        class_name: &str,
        session: &CompileSession,
    ) -> Result<bool> {
        let Some(class) = self.get_node_class(class_name, session).await? else {
            return Ok(false);
        };
        let Some(node) = composition.find_node(node_id) else {
            return Ok(false);
        };
        let Some(specialized) = node.class.specialized() else {
            return Ok(false);
        };
        let replacement = specialized.create_replacement_backing_node(node, class);
        let backed = replacement.class.implementation().is_some();
        composition.replace_node(replacement);
        Ok(backed)
    }

    /// Validate a composition against this compiler's registry
    pub fn validate(&self, composition: &Composition) -> Vec<ValidationError> {
        validate_composition(composition, Some(&self.registry))
    }
}
