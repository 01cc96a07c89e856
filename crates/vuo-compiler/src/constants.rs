//! Crate-wide constants
//!
//! Naming prefixes here are part of the persisted composition format and
//! must not change.

/// Node-class and type naming grammar
pub mod naming {
    /// The common beginning of all generic type names (before the numeric suffix).
    pub const GENERIC_TYPE_NAME_PREFIX: &str = "VuoGenericType";
    /// The common beginning of all list type names (before the item type name).
    pub const LIST_TYPE_NAME_PREFIX: &str = "VuoList_";
    /// The common beginning of all "Make List" node class names (before the item count and item type).
    pub const MAKE_LIST_NODE_CLASS_NAME_PREFIX: &str = "vuo.list.make.";
    /// Family name reported for synthesized "Make List" node classes.
    pub const MAKE_LIST_GENERIC_NODE_CLASS_NAME: &str = "vuo.list.make";
    /// Node set that the "Make List" family is listed under.
    pub const MAKE_LIST_NODE_SET: &str = "vuo.list";
    /// Separator between node-class name segments.
    pub const SEGMENT_SEPARATOR: char = '.';
}

/// Symbols and markers used by compiled node-class modules
pub mod module {
    /// Event function of a stateless node class
    pub const EVENT_FUNCTION: &str = "nodeEvent";
    /// Event function of a stateful node class
    pub const INSTANCE_EVENT_FUNCTION: &str = "nodeInstanceEvent";
    /// Init function of a stateful node class
    pub const INSTANCE_INIT_FUNCTION: &str = "nodeInstanceInit";
    /// Fini function of a stateful node class
    pub const INSTANCE_FINI_FUNCTION: &str = "nodeInstanceFini";
    /// Source marker after which includes and typedefs are inserted
    pub const METADATA_MARKER: &str = "VuoModuleMetadata";
    /// Define prepended to every specialized node-class source
    pub const SPECIALIZED_NODE_DEFINE: &str = "#define VuoSpecializedNode 1\n";
}

/// Port names shared by synthesized node classes
pub mod ports {
    /// Event-only input present on every node class
    pub const REFRESH: &str = "refresh";
    /// Prefix of the item inputs of a "Make List" node class
    pub const MAKE_LIST_ITEM_PREFIX: &str = "item";
    /// Output of a "Make List" node class
    pub const MAKE_LIST_OUTPUT: &str = "list";
}

/// Default values for compiler configuration
pub mod defaults {
    /// Backing type used for generic ports that have no specialization
    pub const BACKING_TYPE: &str = "VuoInteger";
    /// Number of items in a freshly attached "Make List" drawer
    pub const MAKE_LIST_ITEM_COUNT: usize = 2;
    /// Toolchain used to build specialized modules
    pub const CLANG_PATH: &str = "clang";
    /// Seconds a single toolchain invocation may run before it is killed
    pub const COMPILE_TIMEOUT_SECS: u64 = 120;
    /// Name of the configuration file inside a config directory
    pub const CONFIG_FILE_NAME: &str = "compiler.json";
}
