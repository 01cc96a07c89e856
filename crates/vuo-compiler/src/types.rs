//! Port data types and the type registry
//!
//! A [`VuoType`] is identified by its name and is immutable once loaded.
//! The [`TypeRegistry`] owns every loaded type for the life of the process
//! and is shared by all open compositions.
//!
//! Core types are contributed at link time:
//!
//! ```ignore
//! inventory::submit!(vuo_compiler::types::CoreTypeFn {
//!     name: "VuoPoint3d",
//!     descriptor: || VuoType::record("VuoPoint3d", "3D Point", &["x", "y", "z"]),
//! });
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::naming::LIST_TYPE_NAME_PREFIX;

/// Returns true if the name has the format of a list type name.
pub fn is_list_type_name(type_name: &str) -> bool {
    type_name.starts_with(LIST_TYPE_NAME_PREFIX)
}

/// Returns the list type name whose items have type `item_type_name`.
pub fn list_type_name(item_type_name: &str) -> String {
    format!("{}{}", LIST_TYPE_NAME_PREFIX, item_type_name)
}

/// Returns the item type name of a list type name, or None for non-list names.
pub fn item_type_name(list_type_name: &str) -> Option<&str> {
    list_type_name
        .strip_prefix(LIST_TYPE_NAME_PREFIX)
        .filter(|item| !item.is_empty())
}

/// Strips every list wrapper: `VuoList_VuoList_VuoText` gives `VuoText`.
pub fn innermost_type_name(type_name: &str) -> &str {
    let mut name = type_name;
    while let Some(item) = item_type_name(name) {
        name = item;
    }
    name
}

/// Shape of the values a type holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TypeKind {
    Boolean,
    Integer,
    Real,
    Text,
    /// Arbitrary JSON
    Json,
    /// JSON object with the given numeric fields
    #[serde(rename_all = "camelCase")]
    Record { fields: Vec<String> },
    /// List of items of another type
    #[serde(rename_all = "camelCase")]
    List { item_type: String },
}

/// A loaded port data type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VuoType {
    /// Module key, e.g. `VuoText`
    pub name: String,
    /// Human-readable title
    pub title: String,
    /// Size of a value of this type as passed to node functions
    pub size_in_bytes: usize,
    pub kind: TypeKind,
    /// Value used when a port of this type has no constant
    pub default_value: Value,
}

impl VuoType {
    pub fn new(
        name: impl Into<String>,
        title: impl Into<String>,
        size_in_bytes: usize,
        kind: TypeKind,
        default_value: Value,
    ) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            size_in_bytes,
            kind,
            default_value,
        }
    }

    /// A record type whose values are objects of real-valued fields
    pub fn record(name: &str, title: &str, fields: &[&str]) -> Self {
        let default_value = Value::Object(
            fields
                .iter()
                .map(|f| (f.to_string(), serde_json::json!(0.0)))
                .collect(),
        );
        Self::new(
            name,
            title,
            fields.len() * std::mem::size_of::<f64>(),
            TypeKind::Record {
                fields: fields.iter().map(|f| f.to_string()).collect(),
            },
            default_value,
        )
    }

    /// The list type whose items are of this type
    pub fn list_of(item: &VuoType) -> Self {
        Self::new(
            list_type_name(&item.name),
            format!("List of {} elements", item.title),
            std::mem::size_of::<usize>(),
            TypeKind::List {
                item_type: item.name.clone(),
            },
            Value::Array(Vec::new()),
        )
    }

    /// Returns true if this is a list type
    pub fn is_list(&self) -> bool {
        matches!(self.kind, TypeKind::List { .. })
    }

    /// Item type name, for list types
    pub fn item_type_name(&self) -> Option<&str> {
        match &self.kind {
            TypeKind::List { item_type } => Some(item_type),
            _ => None,
        }
    }

    /// Reads a constant from JSON, normalizing it to this type's canonical form.
    ///
    /// List items are checked against the item type when `registry` is given.
    pub fn from_json(&self, value: &Value, registry: Option<&TypeRegistry>) -> Option<Value> {
        match &self.kind {
            TypeKind::Boolean => value.as_bool().map(Value::Bool),
            TypeKind::Integer => value
                .as_i64()
                .or_else(|| value.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .map(|i| serde_json::json!(i)),
            TypeKind::Real => value.as_f64().map(|f| serde_json::json!(f)),
            TypeKind::Text => value.as_str().map(|s| Value::String(s.to_string())),
            TypeKind::Json => Some(value.clone()),
            TypeKind::Record { fields } => {
                let object = value.as_object()?;
                let mut normalized = serde_json::Map::new();
                for field in fields {
                    let v = object.get(field).and_then(Value::as_f64).unwrap_or(0.0);
                    normalized.insert(field.clone(), serde_json::json!(v));
                }
                Some(Value::Object(normalized))
            }
            TypeKind::List { item_type } => {
                let items = value.as_array()?;
                let Some(item_type) = registry.and_then(|r| r.lookup_type(item_type)) else {
                    return Some(value.clone());
                };
                items
                    .iter()
                    .map(|item| item_type.from_json(item, registry))
                    .collect::<Option<Vec<_>>>()
                    .map(Value::Array)
            }
        }
    }

    /// Writes a constant as JSON; None if the value does not belong to this type
    pub fn to_json(&self, value: &Value) -> Option<Value> {
        self.from_json(value, None)
    }

    /// Reads a constant from its persisted string form
    pub fn from_json_string(&self, text: &str, registry: Option<&TypeRegistry>) -> Option<Value> {
        let value: Value = serde_json::from_str(text).ok()?;
        self.from_json(&value, registry)
    }

    /// Writes a constant in its persisted string form
    pub fn to_json_string(&self, value: &Value) -> Option<String> {
        self.to_json(value).map(|v| v.to_string())
    }

    /// Returns true if a cable from a port of this type can feed a port of `other`
    pub fn can_connect_to(&self, other: &VuoType) -> bool {
        self.name == other.name
    }
}

/// Link-time registration of a core type.
///
/// The `descriptor` function runs when a registry is built with
/// [`TypeRegistry::with_core_types`]; each core type is registered along
/// with its list type.
pub struct CoreTypeFn {
    /// Type name (must match the descriptor's name)
    pub name: &'static str,
    /// Factory for the type descriptor
    pub descriptor: fn() -> VuoType,
}

inventory::collect!(CoreTypeFn);

inventory::submit!(CoreTypeFn {
    name: "VuoBoolean",
    descriptor: || VuoType::new("VuoBoolean", "Boolean", 1, TypeKind::Boolean, Value::Bool(false)),
});

inventory::submit!(CoreTypeFn {
    name: "VuoInteger",
    descriptor: || VuoType::new("VuoInteger", "Integer", 8, TypeKind::Integer, serde_json::json!(0)),
});

inventory::submit!(CoreTypeFn {
    name: "VuoReal",
    descriptor: || VuoType::new("VuoReal", "Real", 8, TypeKind::Real, serde_json::json!(0.0)),
});

inventory::submit!(CoreTypeFn {
    name: "VuoText",
    descriptor: || VuoType::new("VuoText", "Text", 8, TypeKind::Text, Value::String(String::new())),
});

inventory::submit!(CoreTypeFn {
    name: "VuoPoint2d",
    descriptor: || VuoType::record("VuoPoint2d", "2D Point", &["x", "y"]),
});

inventory::submit!(CoreTypeFn {
    name: "VuoColor",
    descriptor: || VuoType::record("VuoColor", "Color", &["r", "g", "b", "a"]),
});

/// Registry of loaded types, keyed by name
///
/// Reads never block on each other; registration is the only mutation.
pub struct TypeRegistry {
    types: RwLock<HashMap<String, Arc<VuoType>>>,
}

impl TypeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            types: RwLock::new(HashMap::new()),
        }
    }

    /// Create a registry holding every core type and its list type
    pub fn with_core_types() -> Self {
        let registry = Self::new();
        for core in inventory::iter::<CoreTypeFn> {
            let descriptor = (core.descriptor)();
            debug_assert_eq!(descriptor.name, core.name);
            registry.register_with_list(descriptor);
        }
        registry
    }

    /// Register a type, replacing any type with the same name
    pub fn register(&self, vuo_type: VuoType) -> Arc<VuoType> {
        let vuo_type = Arc::new(vuo_type);
        self.types
            .write()
            .insert(vuo_type.name.clone(), vuo_type.clone());
        vuo_type
    }

    /// Register a type together with its list type
    pub fn register_with_list(&self, item: VuoType) -> Arc<VuoType> {
        let list = VuoType::list_of(&item);
        let item = Arc::new(item);
        let mut types = self.types.write();
        types.insert(item.name.clone(), item.clone());
        types.insert(list.name.clone(), Arc::new(list));
        item
    }

    /// Look up a type by name
    pub fn lookup_type(&self, name: &str) -> Option<Arc<VuoType>> {
        self.types.read().get(name).cloned()
    }

    /// Check if a type is loaded
    pub fn has_type(&self, name: &str) -> bool {
        self.types.read().contains_key(name)
    }

    /// Returns true if `name` is a loaded list type (false for unknown names)
    pub fn is_list_type(&self, name: &str) -> bool {
        self.lookup_type(name).is_some_and(|t| t.is_list())
    }

    /// All loaded type names, sorted
    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.types.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.types.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.read().is_empty()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
