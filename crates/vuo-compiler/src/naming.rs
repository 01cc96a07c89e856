//! Specialized node-class naming
//!
//! A generic node class's name carries one dot-separated segment per generic
//! type parameter, e.g. `vuo.example.op.VuoGenericType1.VuoGenericType2`.
//! Specializing substitutes those segments by position:
//! `vuo.example.op.VuoInteger.VuoReal`. Parsing goes the other way and never
//! searches for type names inside a segment, so a replacement type whose
//! name happens to contain another type name is still recovered intact.

use std::collections::BTreeMap;

use crate::constants::naming::SEGMENT_SEPARATOR;
use crate::generic::{
    create_generic_type_name, generic_type_suffix, is_generic_type_name,
    replace_innermost_generic_type_name, sort_generic_type_names,
};
use crate::node_class::NodeClass;
use crate::types::innermost_type_name;

fn segments(name: &str) -> Vec<&str> {
    name.split(SEGMENT_SEPARATOR).collect()
}

/// Generic type names appearing as segments of a node-class name, unique, in suffix order
pub fn generic_type_names_in_name(node_class_name: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for segment in segments(node_class_name) {
        if is_generic_type_name(segment) {
            let innermost = innermost_type_name(segment).to_string();
            if !names.contains(&innermost) {
                names.push(innermost);
            }
        }
    }
    sort_generic_type_names(&mut names);
    names
}

/// Substitutes `types[k-1]` for each `VuoGenericType<k>` segment of `generic_node_class_name`.
///
/// Tokens without a corresponding entry in `types` are left as they are, so
/// a short list yields a partial specialization.
pub fn create_specialized_node_class_name(generic_node_class_name: &str, types: &[String]) -> String {
    segments(generic_node_class_name)
        .into_iter()
        .map(|segment| {
            let replacement = generic_type_suffix(segment)
                .and_then(|k| types.get((k as usize).checked_sub(1)?));
            match replacement {
                Some(type_name) => replace_innermost_generic_type_name(segment, type_name),
                None => segment.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join(&SEGMENT_SEPARATOR.to_string())
}

/// Rebuilds a generic node-class name from a specialized one.
///
/// Type segments are the segments after the first that start with an
/// uppercase letter; the other segments of a node-class name are lower camel
/// case. Each type segment keeps its list wrapper around a
/// `VuoGenericType<n>`. When there are exactly `generic_type_count` type
/// segments they are numbered by position. Otherwise segments holding the
/// same innermost type share a number, assigned by first occurrence, and
/// there must be exactly `generic_type_count` distinct types.
///
/// A list type substituted for an unwrapped generic type reads back as a
/// list-wrapped generic; [`specialization_substitutions`] tells the two
/// apart when the generic class is at hand. Returns None if the name has an
/// empty segment or its layout cannot be rebuilt.
pub fn parse_generic_node_class_name(specialized_node_class_name: &str, generic_type_count: usize) -> Option<String> {
    let parts = segments(specialized_node_class_name);
    if parts.iter().any(|s| s.is_empty()) {
        return None;
    }
    if generic_type_count == 0 {
        return Some(specialized_node_class_name.to_string());
    }

    let type_positions: Vec<usize> = (1..parts.len())
        .filter(|&i| parts[i].starts_with(|c: char| c.is_ascii_uppercase()))
        .collect();

    let suffixes: Vec<usize> = if type_positions.len() == generic_type_count {
        (1..=generic_type_count).collect()
    } else {
        let mut seen: Vec<&str> = Vec::new();
        let suffixes: Vec<usize> = type_positions
            .iter()
            .map(|&i| {
                let innermost = innermost_type_name(parts[i]);
                match seen.iter().position(|s| *s == innermost) {
                    Some(index) => index + 1,
                    None => {
                        seen.push(innermost);
                        seen.len()
                    }
                }
            })
            .collect();
        if seen.len() != generic_type_count {
            return None;
        }
        suffixes
    };

    let mut rebuilt: Vec<String> = parts.iter().map(|s| s.to_string()).collect();
    for (&i, &suffix) in type_positions.iter().zip(&suffixes) {
        let innermost = innermost_type_name(parts[i]);
        let wrapper = &parts[i][..parts[i].len() - innermost.len()];
        rebuilt[i] = format!("{}{}", wrapper, create_generic_type_name(suffix as u32));
    }
    Some(rebuilt.join(&SEGMENT_SEPARATOR.to_string()))
}

/// Generic types of `generic`'s ports that have no segment in its name.
///
/// A specialization of such a class could not encode every substitution in
/// its name, so these classes are not loaded.
pub fn generic_type_names_missing_from_name(generic: &NodeClass) -> Vec<String> {
    let named = generic_type_names_in_name(&generic.name);
    generic
        .generic_type_names_from_ports()
        .into_iter()
        .filter(|g| !named.contains(g))
        .collect()
}

/// Matches `candidate` against the token layout of `generic_node_class_name`.
///
/// Returns the replacement for each generic type name if every literal
/// segment matches and every occurrence of the same generic token holds the
/// same replacement.
pub fn specialization_substitutions(candidate: &str, generic_node_class_name: &str) -> Option<BTreeMap<String, String>> {
    let candidate_parts = segments(candidate);
    let generic_parts = segments(generic_node_class_name);
    if candidate_parts.len() != generic_parts.len() {
        return None;
    }

    let mut substitutions = BTreeMap::new();
    for (candidate_segment, generic_segment) in candidate_parts.into_iter().zip(generic_parts) {
        if !is_generic_type_name(generic_segment) {
            if candidate_segment != generic_segment {
                return None;
            }
            continue;
        }

        if candidate_segment.is_empty() {
            return None;
        }

        // `VuoList_VuoGenericType1` only matches `VuoList_<T>`
        let generic_innermost = innermost_type_name(generic_segment);
        let outer = &generic_segment[..generic_segment.len() - generic_innermost.len()];
        let replacement = candidate_segment.strip_prefix(outer)?;
        if replacement.is_empty() {
            return None;
        }

        match substitutions.get(generic_innermost) {
            Some(existing) if existing != replacement => return None,
            Some(_) => {}
            None => {
                substitutions.insert(generic_innermost.to_string(), replacement.to_string());
            }
        }
    }

    Some(substitutions)
}

/// Returns true if `candidate` names a specialization (full or partial) of `generic_node_class`.
pub fn is_specialization_of_node_class(candidate: &str, generic_node_class: &NodeClass) -> bool {
    let generic_name = &generic_node_class.name;
    if generic_type_names_in_name(generic_name).is_empty()
        || !generic_type_names_missing_from_name(generic_node_class).is_empty()
    {
        return false;
    }
    specialization_substitutions(candidate, generic_name).is_some()
}
