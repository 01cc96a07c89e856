//! Module details documents
//!
//! Every compiled module carries a details document. For specialized
//! modules it records which generic node class the module was built from
//! and the type substituted for each generic parameter, so reloading the
//! module recovers its provenance without re-parsing its name.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::generic::GenericTypeDetails;

/// Metadata document embedded in a compiled module
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Generic parameters declared by a generic node class
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub generic_types: BTreeMap<String, GenericTypeDetails>,
    /// Generic parameter name → substituted type name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub specialized_types: BTreeMap<String, String>,
    /// Generic node class a specialized module was built from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generic_node_class_name: Option<String>,
    /// Keys this crate does not interpret, preserved on round-trip
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ModuleDetails {
    /// Details with a title, description and version
    pub fn described(title: &str, description: &str, version: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            description: Some(description.to_string()),
            version: Some(version.to_string()),
            ..Self::default()
        }
    }

    /// Parse a details document
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the document
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Returns true if the document records specialization provenance
    pub fn is_specialized(&self) -> bool {
        self.generic_node_class_name.is_some() || !self.specialized_types.is_empty()
    }

    /// The recorded substitution map and generic class name, if any
    pub fn specialization(&self) -> Option<(&BTreeMap<String, String>, Option<&str>)> {
        self.is_specialized()
            .then(|| (&self.specialized_types, self.generic_node_class_name.as_deref()))
    }

    /// Layer `other` on top of these details; `other` wins where both are set
    pub fn merged_with(&self, other: &ModuleDetails) -> ModuleDetails {
        let mut merged = self.clone();
        if other.title.is_some() {
            merged.title = other.title.clone();
        }
        if other.description.is_some() {
            merged.description = other.description.clone();
        }
        if other.version.is_some() {
            merged.version = other.version.clone();
        }
        merged.generic_types.extend(other.generic_types.clone());
        merged.specialized_types.extend(other.specialized_types.clone());
        if other.generic_node_class_name.is_some() {
            merged.generic_node_class_name = other.generic_node_class_name.clone();
        }
        merged.extra.extend(other.extra.clone());
        merged
    }
}

/// Builds the details document for a module specialized from `generic_node_class_name`.
pub fn build_specialized_module_details(
    specialized_for_generic_type_name: &BTreeMap<String, String>,
    generic_node_class_name: &str,
) -> ModuleDetails {
    ModuleDetails {
        specialized_types: specialized_for_generic_type_name.clone(),
        generic_node_class_name: Some(generic_node_class_name.to_string()),
        ..ModuleDetails::default()
    }
}

/// Reads specialization provenance back out of a serialized details document.
///
/// Returns None when the document is malformed or records no specialization.
pub fn parse_specialized_module_details(json: &str) -> Option<(BTreeMap<String, String>, String)> {
    let details = ModuleDetails::from_json_str(json).ok()?;
    let generic_node_class_name = details.generic_node_class_name?;
    Some((details.specialized_types, generic_node_class_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn substitution() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("VuoGenericType1".to_string(), "VuoInteger".to_string()),
            ("VuoGenericType2".to_string(), "VuoReal".to_string()),
        ])
    }

    #[test]
    fn test_specialized_details_round_trip() {
        let details = build_specialized_module_details(&substitution(), "vuo.example.op.VuoGenericType1.VuoGenericType2");
        let json = details.to_json_string().unwrap();
        assert!(json.contains("specializedTypes"));
        assert!(json.contains("genericNodeClassName"));

        let (map, generic) = parse_specialized_module_details(&json).unwrap();
        assert_eq!(map, substitution());
        assert_eq!(generic, "vuo.example.op.VuoGenericType1.VuoGenericType2");
    }

    #[test]
    fn test_key_order_does_not_matter() {
        let json = r#"{
            "genericNodeClassName": "vuo.example.op.VuoGenericType1.VuoGenericType2",
            "specializedTypes": { "VuoGenericType2": "VuoReal", "VuoGenericType1": "VuoInteger" }
        }"#;
        let (map, _) = parse_specialized_module_details(json).unwrap();
        assert_eq!(map, substitution());
    }

    #[test]
    fn test_unspecialized_details_have_no_provenance() {
        let details = ModuleDetails::described("Hold Value", "Keeps a value", "2.0.0");
        assert!(!details.is_specialized());
        assert!(details.specialization().is_none());
        let json = details.to_json_string().unwrap();
        assert!(parse_specialized_module_details(&json).is_none());
        assert!(parse_specialized_module_details("not json").is_none());
    }

    #[test]
    fn test_unknown_keys_preserved() {
        let json = r#"{ "title": "Hold", "keywords": ["store"], "specializedTypes": {"VuoGenericType1": "VuoText"}, "genericNodeClassName": "vuo.data.hold.VuoGenericType1" }"#;
        let details = ModuleDetails::from_json_str(json).unwrap();
        assert_eq!(details.extra.get("keywords"), Some(&serde_json::json!(["store"])));
        let again = ModuleDetails::from_json_str(&details.to_json_string().unwrap()).unwrap();
        assert_eq!(again, details);
    }

    #[test]
    fn test_merge_prefers_overlay() {
        let base = ModuleDetails::described("Hold Value", "Keeps a value", "2.0.0");
        let overlay = build_specialized_module_details(&substitution(), "vuo.example.op.VuoGenericType1.VuoGenericType2");
        let merged = base.merged_with(&overlay);
        assert_eq!(merged.title.as_deref(), Some("Hold Value"));
        assert_eq!(merged.specialized_types, substitution());
    }
}
