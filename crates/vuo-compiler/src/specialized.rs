//! Specialized node classes
//!
//! A [`SpecializedNodeClass`] is derived from one generic original by
//! substituting a type for each of the original's generic type names. It
//! comes in two variants: a specialization of a generic class loaded from a
//! module, and a synthesized "Make List" class (whose generic family has no
//! module on disk).
//!
//! A specialization that still leaves generic types open has no backing and
//! belongs to a single node. Once every generic type is substituted, it can
//! acquire a backing: the compiled concrete node class with the same name,
//! which is shared by every specialization that needs it.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::backing::{BackingResolver, CompileRequest, CompileSession};
use crate::composition::{Node, NodeClassRef};
use crate::constants::naming::{MAKE_LIST_GENERIC_NODE_CLASS_NAME, MAKE_LIST_NODE_SET};
use crate::constants::ports::MAKE_LIST_OUTPUT;
use crate::error::Result;
use crate::generic::{
    create_generic_type_name, generic_type_suffix, is_generic_type_name,
    replace_innermost_generic_type_name, sort_generic_type_names, GenericTypeDetails,
};
use crate::make_list::{self, item_port_index, MAKE_LIST_DESCRIPTION};
use crate::module_details::build_specialized_module_details;
use crate::naming::{create_specialized_node_class_name, generic_type_names_in_name, specialization_substitutions};
use crate::node_class::NodeClass;
use crate::port::PortClass;
use crate::types::{innermost_type_name, list_type_name, VuoType};

/// The two kinds of specialization
#[derive(Debug, Clone)]
pub enum Specialization {
    /// Specialization of a generic class loaded from a module
    Generic {
        /// The generic original, once it has been looked up
        generic_node_class: Option<Arc<NodeClass>>,
    },
    /// Synthesized "Make List" class
    MakeList {
        item_count: usize,
        /// The list type, once it has been looked up
        list_type: Option<Arc<VuoType>>,
    },
}

/// A node class derived from a generic original by type substitution
#[derive(Debug, Clone)]
pub struct SpecializedNodeClass {
    node_class: NodeClass,
    original_generic_node_class_name: String,
    specialized_for_generic_type_name: BTreeMap<String, String>,
    backing_node_class: Option<Arc<NodeClass>>,
    variant: Specialization,
}

/// All innermost generic type names of a generic class, from its ports and its name
fn generic_type_names_of(generic: &NodeClass) -> Vec<String> {
    let mut names = generic.generic_type_names_from_ports();
    for name in generic_type_names_in_name(&generic.name) {
        if !names.contains(&name) {
            names.push(name);
        }
    }
    sort_generic_type_names(&mut names);
    names
}

/// Replacement types in generic-type-name order, for positional naming
fn ordered_replacements(map: &BTreeMap<String, String>) -> Vec<String> {
    let max_suffix = map.keys().filter_map(|k| generic_type_suffix(k)).max().unwrap_or(0);
    (1..=max_suffix)
        .map(|k| {
            let generic = create_generic_type_name(k);
            map.get(&generic).cloned().unwrap_or(generic)
        })
        .collect()
}

/// Strips the list wrapper of `generic_type_name` from `type_name`.
///
/// `VuoList_VuoGenericType1` with `VuoList_VuoText` gives `VuoText`; a
/// non-list type for a list generic gives None.
fn replacement_for(generic_type_name: &str, type_name: &str) -> Option<String> {
    let innermost = innermost_type_name(generic_type_name);
    let outer = &generic_type_name[..generic_type_name.len() - innermost.len()];
    type_name
        .strip_prefix(outer)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
}

/// Port class of the generic model with the substituted type
fn substitute_port_class(model: &PortClass, map: &BTreeMap<String, String>) -> PortClass {
    let mut port_class = model.clone();
    if let Some(data_type) = model.data_type.as_deref().filter(|t| is_generic_type_name(t)) {
        if let Some(replacement) = map.get(innermost_type_name(data_type)) {
            port_class.data_type = Some(replace_innermost_generic_type_name(data_type, replacement));
        }
    }
    port_class
}

/// Builds the specialized signature of `generic` under `map`
fn build_from_generic(generic: &NodeClass, map: &BTreeMap<String, String>) -> NodeClass {
    let name = create_specialized_node_class_name(&generic.name, &ordered_replacements(map));

    let mut node_class = NodeClass::new(name);
    node_class.title = generic.title.clone();
    node_class.description = generic.description.clone();
    node_class.node_set = generic.node_set.clone();
    node_class.stateful = generic.stateful;
    node_class.input_port_classes = generic
        .input_port_classes
        .iter()
        .map(|p| substitute_port_class(p, map))
        .collect();
    node_class.output_port_classes = generic
        .output_port_classes
        .iter()
        .map(|p| substitute_port_class(p, map))
        .collect();

    let mut details = generic.details.merged_with(&build_specialized_module_details(map, &generic.name));
    // Only still-open generics keep their metadata
    details
        .generic_types
        .retain(|g, _| map.get(g).is_some_and(|r| is_generic_type_name(r)));
    node_class.details = details;
    node_class
}

impl SpecializedNodeClass {
    /// Specializes `generic` with `replacements` (generic type name → type name).
    ///
    /// Generic types missing from `replacements` stay generic.
    pub fn new(generic: Arc<NodeClass>, replacements: &BTreeMap<String, String>) -> Self {
        let map: BTreeMap<String, String> = generic_type_names_of(&generic)
            .into_iter()
            .map(|g| {
                let replacement = replacements.get(&g).cloned().unwrap_or_else(|| g.clone());
                (g, replacement)
            })
            .collect();

        Self {
            node_class: build_from_generic(&generic, &map),
            original_generic_node_class_name: generic.name.clone(),
            specialized_for_generic_type_name: map,
            backing_node_class: None,
            variant: Specialization::Generic {
                generic_node_class: Some(generic),
            },
        }
    }

    /// A specialization of `generic` that leaves every generic type open
    pub fn unspecialized(generic: Arc<NodeClass>) -> Self {
        Self::new(generic, &BTreeMap::new())
    }

    /// The Make List class for `item_count` items of `item_type_name`
    pub fn make_list(
        item_count: usize,
        item_type_name: &str,
        lookup_type: impl Fn(&str) -> Option<Arc<VuoType>>,
    ) -> Self {
        let mut specialized = Self {
            node_class: make_list::synthesize_node_class(item_count, item_type_name, None),
            original_generic_node_class_name: MAKE_LIST_GENERIC_NODE_CLASS_NAME.to_string(),
            specialized_for_generic_type_name: BTreeMap::from([(
                create_generic_type_name(1),
                item_type_name.to_string(),
            )]),
            backing_node_class: None,
            variant: Specialization::MakeList {
                item_count,
                list_type: None,
            },
        };
        specialized.update_list_type(lookup_type);
        specialized
    }

    /// Recovers a specialization from a node class loaded from a compiled module.
    ///
    /// The module details' provenance is used when present; otherwise the
    /// class name is matched against `generic`. Returns None if neither
    /// identifies the class as a specialization.
    pub fn from_module(node_class: NodeClass, generic: Option<Arc<NodeClass>>) -> Option<Self> {
        let (recorded, original_name) = match node_class.details.specialization() {
            Some((map, Some(generic_name))) => (map.clone(), generic_name.to_string()),
            _ => {
                let generic = generic.as_ref()?;
                let map = specialization_substitutions(&node_class.name, &generic.name)?;
                (map, generic.name.clone())
            }
        };

        let generic = generic.filter(|g| g.name == original_name);
        let mut map = recorded;
        if let Some(generic) = &generic {
            for g in generic_type_names_of(generic) {
                map.entry(g.clone()).or_insert(g);
            }
        }

        let fully_specialized = map.values().all(|t| !is_generic_type_name(t));
        let backing_node_class = (fully_specialized && node_class.has_implementation())
            .then(|| Arc::new(node_class.clone()));

        Some(Self {
            node_class,
            original_generic_node_class_name: original_name,
            specialized_for_generic_type_name: map,
            backing_node_class,
            variant: Specialization::Generic {
                generic_node_class: generic,
            },
        })
    }

    /// Name of `generic` with each generic type that declares a default type replaced by it
    pub fn create_default_specialized_node_class_name(generic: &NodeClass) -> String {
        let defaults: BTreeMap<String, String> = generic_type_names_of(generic)
            .into_iter()
            .map(|g| {
                let default_type = generic.generic_type_details(&g).default_type;
                (g.clone(), default_type.unwrap_or(g))
            })
            .collect();
        create_specialized_node_class_name(&generic.name, &ordered_replacements(&defaults))
    }

    pub fn name(&self) -> &str {
        &self.node_class.name
    }

    /// The specialized signature
    pub fn node_class(&self) -> &NodeClass {
        &self.node_class
    }

    pub fn variant(&self) -> &Specialization {
        &self.variant
    }

    pub fn is_make_list(&self) -> bool {
        matches!(self.variant, Specialization::MakeList { .. })
    }

    pub fn specialized_for_generic_type_name(&self) -> &BTreeMap<String, String> {
        &self.specialized_for_generic_type_name
    }

    /// Returns true if every generic type is substituted by a concrete type
    pub fn is_fully_specialized(&self) -> bool {
        self.specialized_for_generic_type_name
            .values()
            .all(|t| !is_generic_type_name(t))
    }

    pub fn original_generic_node_class_name(&self) -> &str {
        &self.original_generic_node_class_name
    }

    /// Description of the generic family, for palettes and documentation panels
    pub fn original_generic_node_class_description(&self) -> &str {
        match &self.variant {
            Specialization::MakeList { .. } => MAKE_LIST_DESCRIPTION,
            Specialization::Generic {
                generic_node_class: Some(generic),
            } => &generic.description,
            Specialization::Generic { .. } => &self.node_class.description,
        }
    }

    /// Node set the generic family is listed under
    pub fn original_generic_node_set(&self) -> Option<&str> {
        match &self.variant {
            Specialization::MakeList { .. } => Some(MAKE_LIST_NODE_SET),
            Specialization::Generic {
                generic_node_class: Some(generic),
            } => generic.node_set.as_deref(),
            Specialization::Generic { .. } => self.node_class.node_set.as_deref(),
        }
    }

    pub fn generic_node_class(&self) -> Option<&Arc<NodeClass>> {
        match &self.variant {
            Specialization::Generic { generic_node_class } => generic_node_class.as_ref(),
            Specialization::MakeList { .. } => None,
        }
    }

    /// Item count, for Make List classes
    pub fn item_count(&self) -> Option<usize> {
        match self.variant {
            Specialization::MakeList { item_count, .. } => Some(item_count),
            Specialization::Generic { .. } => None,
        }
    }

    /// List type, for Make List classes whose list type has been looked up
    pub fn list_type(&self) -> Option<&Arc<VuoType>> {
        match &self.variant {
            Specialization::MakeList { list_type, .. } => list_type.as_ref(),
            Specialization::Generic { .. } => None,
        }
    }

    /// Compiled concrete class providing this class's implementation
    pub fn backing_node_class(&self) -> Option<&Arc<NodeClass>> {
        self.backing_node_class.as_ref()
    }

    /// Returns true if the stored backing matches the current substitutions
    pub fn has_current_backing(&self) -> bool {
        self.backing_node_class
            .as_ref()
            .is_some_and(|b| b.name == self.node_class.name)
    }

    /// Name of the backing this class needs (None while generic types remain)
    pub fn backing_node_class_name(&self) -> Option<&str> {
        self.is_fully_specialized().then(|| self.name())
    }

    /// Metadata for one of the original's generic types
    pub fn generic_type_details(&self, generic_type_name: &str) -> GenericTypeDetails {
        match &self.variant {
            Specialization::Generic {
                generic_node_class: Some(generic),
            } => generic.generic_type_details(generic_type_name),
            Specialization::Generic { .. } => self.node_class.generic_type_details(generic_type_name),
            Specialization::MakeList { .. } => GenericTypeDetails::default(),
        }
    }

    /// `model` (a port class of the generic original) with this class's substitution applied.
    ///
    /// Every attribute besides the data type is kept.
    pub fn copy_port_class_from_model(&self, model: &PortClass) -> PortClass {
        substitute_port_class(model, &self.specialized_for_generic_type_name)
    }

    /// The port's data type in the generic original
    pub fn original_port_type(&self, port_name: &str) -> Option<String> {
        match &self.variant {
            Specialization::Generic {
                generic_node_class: Some(generic),
            } => generic.port_class(port_name)?.data_type.clone(),
            Specialization::Generic { .. } => None,
            Specialization::MakeList { .. } => {
                let generic = create_generic_type_name(1);
                if port_name == MAKE_LIST_OUTPUT {
                    Some(list_type_name(&generic))
                } else {
                    item_port_index(port_name).map(|_| generic)
                }
            }
        }
    }

    /// Looks up the generic original if it is not resolved yet.
    ///
    /// Returns false while the original is not loaded. Make List classes have
    /// no module for their original and always succeed.
    pub fn update_generic_node_class(&mut self, lookup_node_class: impl Fn(&str) -> Option<Arc<NodeClass>>) -> bool {
        match &mut self.variant {
            Specialization::MakeList { .. } => true,
            Specialization::Generic {
                generic_node_class: Some(_),
            } => true,
            Specialization::Generic { generic_node_class } => {
                match lookup_node_class(&self.original_generic_node_class_name) {
                    Some(generic) => {
                        for g in generic_type_names_of(&generic) {
                            self.specialized_for_generic_type_name.entry(g.clone()).or_insert(g);
                        }
                        *generic_node_class = Some(generic);
                        true
                    }
                    None => false,
                }
            }
        }
    }

    /// Looks up the list type of a Make List class if it is not resolved yet.
    ///
    /// Returns false for other classes, for a generic item type, and while
    /// the list type is not loaded.
    pub fn update_list_type(&mut self, lookup_type: impl Fn(&str) -> Option<Arc<VuoType>>) -> bool {
        let item_type_name = self.item_type_name().to_string();
        let Specialization::MakeList { item_count, list_type } = &mut self.variant else {
            return false;
        };
        if list_type.is_some() {
            return true;
        }
        if is_generic_type_name(&item_type_name) {
            return false;
        }

        let Some(resolved) = lookup_type(&list_type_name(&item_type_name)) else {
            return false;
        };
        *list_type = Some(resolved);

        // Item defaults become known with the item type
        if let Some(item_type) = lookup_type(&item_type_name) {
            self.node_class = make_list::synthesize_node_class(*item_count, &item_type_name, Some(&*item_type));
        }
        true
    }

    fn item_type_name(&self) -> &str {
        self.specialized_for_generic_type_name
            .get(&create_generic_type_name(1))
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Ensures this class has a backing for its current substitutions.
    ///
    /// Idempotent: returns at once when the stored backing already matches.
    /// Returns `Ok(false)` while generic types remain or the generic original
    /// is not loaded; compile failures and cancellation are errors.
    pub async fn update_backing_node_class(
        &mut self,
        resolver: &BackingResolver,
        session: &CompileSession,
    ) -> Result<bool> {
        if !self.is_fully_specialized() {
            return Ok(false);
        }
        if self.has_current_backing() {
            return Ok(true);
        }

        let backing = match &self.variant {
            Specialization::MakeList { .. } => {
                if !self.node_class.has_implementation() {
                    return Ok(false);
                }
                Arc::new(self.node_class.clone())
            }
            Specialization::Generic {
                generic_node_class: None,
            } => return Ok(false),
            Specialization::Generic {
                generic_node_class: Some(generic),
            } => {
                let request = CompileRequest::for_specialization(self, generic, resolver.default_backing_type());
                resolver.resolve_backing(request, session).await?
            }
        };

        log::debug!("Backing '{}' attached", backing.name);
        self.backing_node_class = Some(backing);
        Ok(true)
    }

    /// Installs a backing resolved elsewhere (e.g. shared through the registry)
    pub fn set_backing_node_class(&mut self, backing: Arc<NodeClass>) {
        self.backing_node_class = Some(backing);
    }

    /// Replaces the substitution map, rebuilding the signature.
    ///
    /// Drops the stored backing when the map changes. Returns false if the
    /// generic original is needed and not loaded.
    fn apply(&mut self, map: BTreeMap<String, String>) -> bool {
        if map == self.specialized_for_generic_type_name {
            return true;
        }

        let node_class = match &mut self.variant {
            Specialization::Generic {
                generic_node_class: Some(generic),
            } => build_from_generic(generic, &map),
            Specialization::Generic { .. } => return false,
            Specialization::MakeList { item_count, list_type } => {
                let item_type_name = map.get(&create_generic_type_name(1)).cloned().unwrap_or_default();
                *list_type = None;
                make_list::synthesize_node_class(*item_count, &item_type_name, None)
            }
        };

        if let Some(backing) = self.backing_node_class.take() {
            log::debug!("Dropped backing '{}' of '{}'", backing.name, self.node_class.name);
        }
        self.node_class = node_class;
        self.specialized_for_generic_type_name = map;
        true
    }

    /// Substitutes `type_name` for `generic_type_name` in this instance.
    ///
    /// `generic_type_name` may carry a list wrapper, in which case
    /// `type_name` must be a list too. Returns false if the generic type is
    /// not one of the original's, the type is not compatible, or the generic
    /// original is not loaded. Specializing again with the same type changes
    /// nothing.
    pub fn specialize(&mut self, generic_type_name: &str, type_name: &str) -> bool {
        let key = innermost_type_name(generic_type_name).to_string();
        if !self.specialized_for_generic_type_name.contains_key(&key) {
            return false;
        }
        let Some(replacement) = replacement_for(generic_type_name, type_name) else {
            return false;
        };
        if !is_generic_type_name(&replacement)
            && !self.generic_type_details(&key).is_specialized_type_compatible(&key, &replacement)
        {
            log::debug!("'{}' rejected for {} of '{}'", replacement, key, self.name());
            return false;
        }

        let mut map = self.specialized_for_generic_type_name.clone();
        map.insert(key, replacement);
        self.apply(map)
    }

    /// Reverts the given generic types to generic
    pub fn unspecialize(&mut self, generic_type_names: &[&str]) -> bool {
        let mut map = self.specialized_for_generic_type_name.clone();
        for generic_type_name in generic_type_names {
            let key = innermost_type_name(generic_type_name);
            if let Some(replacement) = map.get_mut(key) {
                *replacement = key.to_string();
            }
        }
        self.apply(map)
    }

    fn name_for(&self, map: &BTreeMap<String, String>) -> String {
        match &self.variant {
            Specialization::MakeList { item_count, .. } => {
                let item_type_name = map
                    .get(&create_generic_type_name(1))
                    .map(String::as_str)
                    .unwrap_or_default();
                make_list::build_node_class_name(*item_count, item_type_name)
            }
            Specialization::Generic { .. } => {
                create_specialized_node_class_name(&self.original_generic_node_class_name, &ordered_replacements(map))
            }
        }
    }

    /// Name of the class that results from reverting the given ports to their generic types.
    ///
    /// Other ports sharing a reverted generic type revert with them.
    pub fn create_unspecialized_node_class_name(&self, port_names: &[&str]) -> String {
        let mut map = self.specialized_for_generic_type_name.clone();
        for port_name in port_names {
            let Some(original) = self.original_port_type(port_name) else {
                continue;
            };
            if is_generic_type_name(&original) {
                let key = innermost_type_name(&original);
                map.insert(key.to_string(), key.to_string());
            }
        }
        self.name_for(&map)
    }

    /// Name of the class that results from substituting `specialized_type_name`
    /// for `generic_type_name`, keeping every other substitution.
    pub fn create_specialized_node_class_name_with_replacement(
        &self,
        generic_type_name: &str,
        specialized_type_name: &str,
    ) -> String {
        let key = innermost_type_name(generic_type_name).to_string();
        let replacement = replacement_for(generic_type_name, specialized_type_name)
            .unwrap_or_else(|| specialized_type_name.to_string());

        let mut map = self.specialized_for_generic_type_name.clone();
        if let Some(entry) = map.get_mut(&key) {
            *entry = replacement;
        }
        self.name_for(&map)
    }

    /// Builds the node that replaces `node_to_back` once its class becomes `replacement`.
    ///
    /// The node keeps its id, title and position. Generic specializations
    /// keep constants of same-named ports whose type is unchanged; Make List
    /// classes keep item constants by position.
    pub fn create_replacement_backing_node(&self, node_to_back: &Node, replacement: NodeClassRef) -> Node {
        let mut node = Node::new(replacement, node_to_back.title.clone(), node_to_back.position);
        node.id = node_to_back.id.clone();

        match &self.variant {
            Specialization::MakeList { .. } => {
                let mut old_items: Vec<(usize, &crate::port::Port)> = node_to_back
                    .input_ports
                    .iter()
                    .filter_map(|p| item_port_index(&p.name).map(|i| (i, p)))
                    .collect();
                old_items.sort_by_key(|(i, _)| *i);

                let mut new_items: Vec<&mut crate::port::Port> = node
                    .input_ports
                    .iter_mut()
                    .filter(|p| item_port_index(&p.name).is_some())
                    .collect();
                new_items.sort_by_key(|p| item_port_index(&p.name));

                for ((_, old), new) in old_items.into_iter().zip(new_items) {
                    if old.data_type == new.data_type && old.constant.is_some() {
                        new.constant = old.constant.clone();
                    }
                }
            }
            Specialization::Generic { .. } => {
                for port in node.input_ports.iter_mut() {
                    let Some(old) = node_to_back.input_port(&port.name) else {
                        continue;
                    };
                    if old.data_type == port.data_type && old.constant.is_some() {
                        port.constant = old.constant.clone();
                    }
                }
            }
        }

        node
    }

    /// Type and module names this class depends on
    pub fn dependencies(&self) -> BTreeSet<String> {
        let mut dependencies = BTreeSet::new();
        if !self.is_make_list() {
            dependencies.insert(self.original_generic_node_class_name.clone());
        }
        for port_class in self.node_class.port_classes() {
            if let Some(data_type) = port_class.data_type.as_deref() {
                if !is_generic_type_name(data_type) {
                    dependencies.insert(data_type.to_string());
                    dependencies.insert(innermost_type_name(data_type).to_string());
                }
            }
        }
        for replacement in self.specialized_for_generic_type_name.values() {
            if !is_generic_type_name(replacement) {
                dependencies.insert(replacement.clone());
            }
        }
        dependencies
    }
}
