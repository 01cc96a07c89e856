//! Generic type names and their compatibility rules
//!
//! A generic type name is `VuoGenericType<N>` or a list of one,
//! `VuoList_VuoGenericType<N>`. Generic names only appear in the port
//! signatures of generic node classes and of specializations that still
//! leave some parameters open.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::constants::naming::{GENERIC_TYPE_NAME_PREFIX, LIST_TYPE_NAME_PREFIX};
use crate::types::{innermost_type_name, is_list_type_name};

/// Finds the next generic type name in `text` at or after byte offset `start`.
///
/// The name may be a singleton (`VuoGenericType1`) or a list
/// (`VuoList_VuoGenericType1`). Returns the byte offset where the name begins
/// along with the name itself.
pub fn find_generic_type_name(text: &str, start: usize) -> Option<(usize, String)> {
    let mut search_from = start;

    while search_from <= text.len() {
        let found = text.get(search_from..)?.find(GENERIC_TYPE_NAME_PREFIX)? + search_from;
        let suffix_start = found + GENERIC_TYPE_NAME_PREFIX.len();
        let suffix: String = text[suffix_start..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();

        if !suffix.is_empty() {
            let mut name_start = found;
            let mut list_prefix = "";
            if found >= LIST_TYPE_NAME_PREFIX.len()
                && text[..found].ends_with(LIST_TYPE_NAME_PREFIX)
            {
                name_start = found - LIST_TYPE_NAME_PREFIX.len();
                list_prefix = LIST_TYPE_NAME_PREFIX;
            }
            return Some((
                name_start,
                format!("{}{}{}", list_prefix, GENERIC_TYPE_NAME_PREFIX, suffix),
            ));
        }

        search_from = suffix_start;
    }

    None
}

/// Returns true if the whole of `type_name` is a generic type name.
pub fn is_generic_type_name(type_name: &str) -> bool {
    matches!(find_generic_type_name(type_name, 0), Some((0, found)) if found == type_name)
}

/// Creates a generic type name with the given numeric suffix.
pub fn create_generic_type_name(suffix: u32) -> String {
    format!("{}{}", GENERIC_TYPE_NAME_PREFIX, suffix)
}

/// Returns the numeric suffix of a generic type name (list or singleton).
pub fn generic_type_suffix(generic_type_name: &str) -> Option<u32> {
    if !is_generic_type_name(generic_type_name) {
        return None;
    }
    innermost_type_name(generic_type_name)
        .strip_prefix(GENERIC_TYPE_NAME_PREFIX)?
        .parse()
        .ok()
}

/// Puts generic type names in ascending order of their numeric suffix.
pub fn sort_generic_type_names(names: &mut [String]) {
    names.sort_by_key(|name| generic_type_suffix(name).unwrap_or(u32::MAX));
}

/// Replaces the innermost type of `generic_type_name` with `replacement`.
///
/// `VuoList_VuoGenericType1` with `VuoText` gives `VuoList_VuoText`.
/// Non-generic names are returned unchanged.
pub fn replace_innermost_generic_type_name(generic_type_name: &str, replacement: &str) -> String {
    if !is_generic_type_name(generic_type_name) {
        return generic_type_name.to_string();
    }
    let innermost = innermost_type_name(generic_type_name);
    let outer_len = generic_type_name.len() - innermost.len();
    format!("{}{}", &generic_type_name[..outer_len], replacement)
}

/// What a generic type may be specialized to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compatibility {
    /// Any concrete type
    AnyType,
    /// Any list type
    AnyListType,
    /// Only the listed types
    Whitelisted(Vec<String>),
}

/// Per-generic-type metadata declared by a generic node class
///
/// Read from the `genericTypes` key of a module's metadata, keyed by the
/// innermost generic type name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenericTypeDetails {
    /// Type substituted when a node is created from the generic class
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_type: Option<String>,
    /// Types this generic may be specialized to (empty = unrestricted)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compatible_types: Vec<String>,
}

impl GenericTypeDetails {
    /// Compatibility of the generic type `generic_type_name` under these details
    pub fn compatibility(&self, generic_type_name: &str) -> Compatibility {
        if !self.compatible_types.is_empty() {
            Compatibility::Whitelisted(self.compatible_types.clone())
        } else if is_list_type_name(generic_type_name) {
            Compatibility::AnyListType
        } else {
            Compatibility::AnyType
        }
    }

    /// Returns true if `generic_type_name` may be specialized with `type_name`.
    pub fn is_specialized_type_compatible(&self, generic_type_name: &str, type_name: &str) -> bool {
        match self.compatibility(generic_type_name) {
            Compatibility::AnyType => true,
            Compatibility::AnyListType => is_list_type_name(type_name),
            Compatibility::Whitelisted(types) => types.iter().any(|t| t == type_name),
        }
    }

    /// Returns true if the two generics share at least one specialization.
    pub fn is_generic_type_compatible(
        &self,
        generic_type_name: &str,
        other: &GenericTypeDetails,
        other_generic_type_name: &str,
    ) -> bool {
        let this_compat = self.compatibility(generic_type_name);
        let other_compat = other.compatibility(other_generic_type_name);

        match (&this_compat, &other_compat) {
            (Compatibility::AnyType, _) | (_, Compatibility::AnyType) => true,
            (Compatibility::AnyListType, _) if is_list_type_name(other_generic_type_name) => true,
            (_, Compatibility::AnyListType) if is_list_type_name(generic_type_name) => true,
            (Compatibility::Whitelisted(a), Compatibility::Whitelisted(b)) => {
                let a: BTreeSet<&String> = a.iter().collect();
                b.iter().any(|t| a.contains(t))
            }
            _ => false,
        }
    }
}

/// Chooses the concrete type that backs a generic type that has no specialization.
///
/// The default backing type wins when it is compatible; otherwise the first
/// compatible type in sorted order. The list wrapper of `generic_type_name`
/// is preserved.
pub fn choose_backing_type_name(
    generic_type_name: &str,
    compatible_types: &[String],
    default_backing_type: &str,
) -> String {
    let innermost_backing = if compatible_types.is_empty()
        || compatible_types.iter().any(|t| t == default_backing_type)
    {
        default_backing_type.to_string()
    } else {
        let mut sorted: Vec<&String> = compatible_types.iter().collect();
        sorted.sort();
        sorted[0].clone()
    };

    replace_innermost_generic_type_name(generic_type_name, &innermost_backing)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_generic_type_name() {
        assert_eq!(
            find_generic_type_name("VuoGenericType12 x", 0),
            Some((0, "VuoGenericType12".to_string()))
        );
        assert_eq!(
            find_generic_type_name("f(VuoList_VuoGenericType3 l)", 0),
            Some((2, "VuoList_VuoGenericType3".to_string()))
        );
        // A bare prefix without digits is skipped
        assert_eq!(
            find_generic_type_name("VuoGenericTypeX VuoGenericType2", 0),
            Some((16, "VuoGenericType2".to_string()))
        );
        assert_eq!(find_generic_type_name("VuoInteger", 0), None);
    }

    #[test]
    fn test_is_generic_type_name() {
        assert!(is_generic_type_name("VuoGenericType1"));
        assert!(is_generic_type_name("VuoList_VuoGenericType1"));
        assert!(!is_generic_type_name("VuoGenericType"));
        assert!(!is_generic_type_name("VuoGenericType1x"));
        assert!(!is_generic_type_name("VuoText"));
        assert!(!is_generic_type_name("MyVuoGenericType1"));
    }

    #[test]
    fn test_suffix_and_sorting() {
        assert_eq!(generic_type_suffix("VuoList_VuoGenericType7"), Some(7));
        assert_eq!(generic_type_suffix("VuoReal"), None);

        let mut names = vec![
            "VuoGenericType10".to_string(),
            "VuoGenericType2".to_string(),
            "VuoGenericType1".to_string(),
        ];
        sort_generic_type_names(&mut names);
        assert_eq!(names, vec!["VuoGenericType1", "VuoGenericType2", "VuoGenericType10"]);
    }

    #[test]
    fn test_replace_innermost() {
        assert_eq!(
            replace_innermost_generic_type_name("VuoList_VuoGenericType1", "VuoText"),
            "VuoList_VuoText"
        );
        assert_eq!(replace_innermost_generic_type_name("VuoGenericType1", "VuoReal"), "VuoReal");
        assert_eq!(replace_innermost_generic_type_name("VuoReal", "VuoText"), "VuoReal");
    }

    #[test]
    fn test_compatibility() {
        let any = GenericTypeDetails::default();
        assert_eq!(any.compatibility("VuoGenericType1"), Compatibility::AnyType);
        assert_eq!(any.compatibility("VuoList_VuoGenericType1"), Compatibility::AnyListType);
        assert!(any.is_specialized_type_compatible("VuoGenericType1", "VuoText"));
        assert!(!any.is_specialized_type_compatible("VuoList_VuoGenericType1", "VuoText"));

        let numeric = GenericTypeDetails {
            default_type: Some("VuoReal".to_string()),
            compatible_types: vec!["VuoInteger".to_string(), "VuoReal".to_string()],
        };
        assert!(numeric.is_specialized_type_compatible("VuoGenericType1", "VuoReal"));
        assert!(!numeric.is_specialized_type_compatible("VuoGenericType1", "VuoText"));

        let text_only = GenericTypeDetails {
            default_type: None,
            compatible_types: vec!["VuoText".to_string()],
        };
        assert!(!numeric.is_generic_type_compatible("VuoGenericType1", &text_only, "VuoGenericType2"));
        assert!(numeric.is_generic_type_compatible("VuoGenericType1", &any, "VuoGenericType2"));
    }

    #[test]
    fn test_choose_backing_type_name() {
        assert_eq!(choose_backing_type_name("VuoGenericType1", &[], "VuoInteger"), "VuoInteger");
        assert_eq!(
            choose_backing_type_name(
                "VuoList_VuoGenericType1",
                &["VuoText".to_string(), "VuoReal".to_string()],
                "VuoInteger"
            ),
            "VuoList_VuoReal"
        );
        assert_eq!(
            choose_backing_type_name(
                "VuoGenericType2",
                &["VuoReal".to_string(), "VuoInteger".to_string()],
                "VuoInteger"
            ),
            "VuoInteger"
        );
    }
}
