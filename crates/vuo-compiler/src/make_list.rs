//! "Make List" node classes
//!
//! A Make List node class is named `vuo.list.make.<item count>.<item type>`
//! and is synthesized in-process for any item count and item type: inputs
//! `item1..itemN` of the item type, output `list` of the list type. There is
//! no source module for it on disk.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::constants::module::EVENT_FUNCTION;
use crate::constants::naming::{
    MAKE_LIST_GENERIC_NODE_CLASS_NAME, MAKE_LIST_NODE_CLASS_NAME_PREFIX, MAKE_LIST_NODE_SET,
    SEGMENT_SEPARATOR,
};
use crate::constants::ports::{MAKE_LIST_ITEM_PREFIX, MAKE_LIST_OUTPUT};
use crate::generic::is_generic_type_name;
use crate::module_details::{build_specialized_module_details, ModuleDetails};
use crate::node_class::{CompiledModule, EntryPoint, EntryPoints, NodeClass, PortValues};
use crate::port::PortClass;
use crate::types::{list_type_name, VuoType};

/// Title of every synthesized Make List node class
pub const MAKE_LIST_TITLE: &str = "Make List";
/// Description reported for the Make List family
pub const MAKE_LIST_DESCRIPTION: &str = "Creates a list from the given items.";
/// Version recorded in synthesized module details
pub const MAKE_LIST_VERSION: &str = "1.0.0";

/// Builds the name of the Make List node class for `item_count` items of `item_type_name`.
pub fn build_node_class_name(item_count: usize, item_type_name: &str) -> String {
    format!("{}{}{}{}", MAKE_LIST_NODE_CLASS_NAME_PREFIX, item_count, SEGMENT_SEPARATOR, item_type_name)
}

/// Recovers the item count and item type name from a Make List node-class name.
///
/// Only names that [`build_node_class_name`] could have produced parse: the
/// count must be a plain decimal without leading zeros and the item type a
/// single non-empty segment.
pub fn parse_node_class_name(node_class_name: &str) -> Option<(usize, String)> {
    let rest = node_class_name.strip_prefix(MAKE_LIST_NODE_CLASS_NAME_PREFIX)?;
    let (count, item_type_name) = rest.split_once(SEGMENT_SEPARATOR)?;

    if count.is_empty() || !count.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if count.len() > 1 && count.starts_with('0') {
        return None;
    }
    if item_type_name.is_empty() || item_type_name.contains(SEGMENT_SEPARATOR) {
        return None;
    }

    let item_count = count.parse().ok()?;
    Some((item_count, item_type_name.to_string()))
}

/// Returns true if `node_class_name` follows the Make List naming convention
pub fn is_make_list_node_class_name(node_class_name: &str) -> bool {
    parse_node_class_name(node_class_name).is_some()
}

/// The Make List node class name for `item_count` items that produces `list_type`
pub fn get_node_class_name(item_count: usize, list_type: &VuoType) -> String {
    let item_type_name = list_type.item_type_name().unwrap_or(list_type.name.as_str());
    build_node_class_name(item_count, item_type_name)
}

/// Name of the `index`-th (1-based) item input
pub fn item_port_name(index: usize) -> String {
    format!("{}{}", MAKE_LIST_ITEM_PREFIX, index)
}

/// Index of an item input from its name
pub fn item_port_index(port_name: &str) -> Option<usize> {
    port_name
        .strip_prefix(MAKE_LIST_ITEM_PREFIX)?
        .parse()
        .ok()
        .filter(|&i| i >= 1)
}

/// Event body: collects `item1..=item_count`, in order, into the `list` output
fn collect_items(item_count: usize) -> EntryPoint {
    EntryPoint::with_function(
        EVENT_FUNCTION,
        Arc::new(move |inputs: &PortValues| {
            let items: Vec<Value> = (1..=item_count)
                .map(|i| inputs.get(&item_port_name(i)).cloned().unwrap_or(Value::Null))
                .collect();
            PortValues::from([(MAKE_LIST_OUTPUT.to_string(), Value::Array(items))])
        }),
    )
}

/// Synthesizes the Make List node class for `item_count` items of `item_type_name`.
///
/// `item_type` supplies the default constant for the item inputs when the
/// type is loaded. A generic item type yields a class with no compiled
/// module, since it cannot run until the item type is chosen.
pub fn synthesize_node_class(item_count: usize, item_type_name: &str, item_type: Option<&VuoType>) -> NodeClass {
    let name = build_node_class_name(item_count, item_type_name);
    let list_type = list_type_name(item_type_name);

    let mut node_class = NodeClass::new(name.clone())
        .with_title(MAKE_LIST_TITLE)
        .with_description(MAKE_LIST_DESCRIPTION)
        .with_node_set(MAKE_LIST_NODE_SET);

    for i in 1..=item_count {
        let mut port = PortClass::data_input(item_port_name(i), item_type_name);
        if let Some(item_type) = item_type {
            port = port.with_details(json!({ "default": item_type.default_value.clone() }));
        }
        node_class = node_class.with_port(port);
    }
    node_class = node_class.with_port(PortClass::data_output(MAKE_LIST_OUTPUT, list_type));

    let generic_type = crate::generic::create_generic_type_name(1);
    let substitution = BTreeMap::from([(generic_type, item_type_name.to_string())]);
    node_class.details = ModuleDetails::described(MAKE_LIST_TITLE, MAKE_LIST_DESCRIPTION, MAKE_LIST_VERSION)
        .merged_with(&build_specialized_module_details(&substitution, MAKE_LIST_GENERIC_NODE_CLASS_NAME));

    if !is_generic_type_name(item_type_name) {
        let mut entry_points = EntryPoints::stateless();
        entry_points.event = collect_items(item_count);
        let module = CompiledModule::new(name, node_class.details.clone(), entry_points);
        node_class = node_class.with_module(module);
    }

    node_class
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeRegistry;

    #[test]
    fn test_build_and_parse() {
        assert_eq!(build_node_class_name(3, "VuoText"), "vuo.list.make.3.VuoText");
        for (count, item) in [(0, "VuoText"), (3, "VuoText"), (12, "VuoPoint2d"), (1, "VuoGenericType1")] {
            let name = build_node_class_name(count, item);
            assert!(is_make_list_node_class_name(&name));
            assert_eq!(parse_node_class_name(&name), Some((count, item.to_string())));
        }
    }

    #[test]
    fn test_parse_negative() {
        for name in [
            "vuo.list.make",
            "vuo.list.make.",
            "vuo.list.make.3",
            "vuo.list.make.3.",
            "vuo.list.make..VuoText",
            "vuo.list.make.x.VuoText",
            "vuo.list.make.-1.VuoText",
            "vuo.list.make.03.VuoText",
            "vuo.list.make.3.Vuo.Text",
            "vuo.list.count.VuoText",
            "vuo.data.hold.VuoText",
        ] {
            assert!(!is_make_list_node_class_name(name), "{name}");
        }
    }

    #[test]
    fn test_get_node_class_name_uses_item_type() {
        let types = TypeRegistry::with_core_types();
        let list = types.lookup_type("VuoList_VuoReal").unwrap();
        assert_eq!(get_node_class_name(2, &list), "vuo.list.make.2.VuoReal");
    }

    #[test]
    fn test_synthesized_ports_and_event() {
        let types = TypeRegistry::with_core_types();
        let text = types.lookup_type("VuoText").unwrap();
        let class = synthesize_node_class(3, "VuoText", Some(&*text));

        let inputs: Vec<&str> = class.input_port_classes.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(inputs, vec!["refresh", "item1", "item2", "item3"]);
        assert_eq!(class.output_port_class("list").unwrap().data_type.as_deref(), Some("VuoList_VuoText"));
        assert_eq!(class.details.title.as_deref(), Some("Make List"));
        assert_eq!(class.details.version.as_deref(), Some("1.0.0"));
        assert_eq!(class.details.generic_node_class_name.as_deref(), Some("vuo.list.make"));

        let module = class.module.as_ref().unwrap();
        let inputs = PortValues::from([
            ("item1".to_string(), json!("a")),
            ("item2".to_string(), json!("b")),
            ("item3".to_string(), json!("c")),
        ]);
        let outputs = module.invoke_event(&inputs).unwrap();
        assert_eq!(outputs["list"], json!(["a", "b", "c"]));
    }

    #[test]
    fn test_generic_item_type_has_no_module() {
        let class = synthesize_node_class(2, "VuoGenericType1", None);
        assert!(class.is_generic());
        assert!(!class.has_implementation());
    }

    #[test]
    fn test_item_port_index() {
        assert_eq!(item_port_index("item4"), Some(4));
        assert_eq!(item_port_index("item0"), None);
        assert_eq!(item_port_index("list"), None);
    }
}
