//! Rewriting generic node-class source into specialized source
//!
//! The compile step receives the generic class's source with every generic
//! type name replaced: by its substituted type where there is one, or by
//! its backing type otherwise. The headers of the substituted types are
//! included just before the module metadata.

use std::collections::{BTreeMap, BTreeSet};

use crate::constants::module::{METADATA_MARKER, SPECIALIZED_NODE_DEFINE};
use crate::generic::{
    choose_backing_type_name, find_generic_type_name, is_generic_type_name,
    replace_innermost_generic_type_name, GenericTypeDetails,
};
use crate::types::{innermost_type_name, list_type_name};

/// Returns `source` with generic type names replaced and includes added.
///
/// `specialized_for_generic_type_name` maps innermost generic type names to
/// their replacement. Generic names with no concrete replacement get the
/// backing type chosen from `generic_types` and `default_backing_type`.
pub fn specialize_source(
    source: &str,
    specialized_for_generic_type_name: &BTreeMap<String, String>,
    generic_types: &BTreeMap<String, GenericTypeDetails>,
    default_backing_type: &str,
) -> String {
    let mut specialized = source.to_string();
    let mut included: BTreeSet<String> = BTreeSet::new();

    let mut pos = 0;
    while let Some((start, generic_name)) = find_generic_type_name(&specialized, pos) {
        let key = innermost_type_name(&generic_name).to_string();
        let replacement = match specialized_for_generic_type_name.get(&key) {
            Some(concrete) if !is_generic_type_name(concrete) => {
                included.insert(innermost_type_name(concrete).to_string());
                replace_innermost_generic_type_name(&generic_name, concrete)
            }
            _ => {
                let compatible = generic_types
                    .get(&key)
                    .map(|d| d.compatible_types.clone())
                    .unwrap_or_default();
                choose_backing_type_name(&generic_name, &compatible, default_backing_type)
            }
        };

        specialized.replace_range(start..start + generic_name.len(), &replacement);
        pos = start + replacement.len();
    }

    let mut includes = String::new();
    for type_name in &included {
        includes.push_str(&format!("#include \"{}.h\"\n", type_name));
        let list = list_type_name(type_name);
        if specialized.contains(&list) {
            includes.push_str(&format!("#include \"{}.h\"\n", list));
        }
    }
    if let Some(marker) = specialized.find(METADATA_MARKER) {
        specialized.insert_str(marker, &includes);
    }

    format!("{}{}", SPECIALIZED_NODE_DEFINE, specialized)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOLD_SOURCE: &str = "#include \"node.h\"\n\
VuoModuleMetadata({ \"title\": \"Hold Value\" });\n\
void nodeEvent(VuoInputData(VuoGenericType1) newValue, VuoOutputData(VuoGenericType1) heldValue, VuoList_VuoGenericType1 history);\n";

    #[test]
    fn test_specialized_types_replace_generics() {
        let map = BTreeMap::from([("VuoGenericType1".to_string(), "VuoText".to_string())]);
        let out = specialize_source(HOLD_SOURCE, &map, &BTreeMap::new(), "VuoInteger");

        assert!(out.starts_with("#define VuoSpecializedNode 1\n"));
        assert!(!out.contains("VuoGenericType"));
        assert!(out.contains("VuoInputData(VuoText) newValue"));
        assert!(out.contains("VuoList_VuoText history"));

        let include = out.find("#include \"VuoText.h\"").unwrap();
        let list_include = out.find("#include \"VuoList_VuoText.h\"").unwrap();
        let metadata = out.find("VuoModuleMetadata").unwrap();
        assert!(include < metadata && list_include < metadata);
    }

    #[test]
    fn test_open_generics_get_backing_types() {
        let source = "VuoModuleMetadata({});\nVuoGenericType2 a; VuoGenericType12 b;\n";
        let map = BTreeMap::from([("VuoGenericType2".to_string(), "VuoGenericType2".to_string())]);
        let generic_types = BTreeMap::from([(
            "VuoGenericType12".to_string(),
            GenericTypeDetails {
                default_type: None,
                compatible_types: vec!["VuoText".to_string(), "VuoReal".to_string()],
            },
        )]);
        let out = specialize_source(source, &map, &generic_types, "VuoInteger");
        assert!(out.contains("VuoInteger a;"));
        assert!(out.contains("VuoReal b;"));
        assert!(!out.contains("#include"));
    }
}
