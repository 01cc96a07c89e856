//! Error types for the node-class compiler
//!
//! Lookups in this crate (types, node classes, specializations) report a
//! miss with `None`/`false`, since a miss is routine while modules are
//! still loading. Errors are reserved for the compile boundary and for
//! I/O around it.

use std::fmt;

use thiserror::Error;

/// Result type alias using CompilerError
pub type Result<T> = std::result::Result<T, CompilerError>;

/// Errors that can occur while resolving or building node classes
#[derive(Debug, Error)]
pub enum CompilerError {
    /// The backing compile for a node class failed
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// The compile session was cancelled before the work completed
    #[error("Compile session {0} cancelled")]
    Cancelled(String),

    /// A node class could not be found or synthesized
    #[error("Node class not found: {0}")]
    NodeClassNotFound(String),

    /// A loaded node class cannot be used as given
    #[error("Invalid node class '{name}': {reason}")]
    InvalidNodeClass { name: String, reason: String },

    /// A node referenced by an operation is not in the composition
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// A port referenced by an operation is not on the node
    #[error("Port '{port}' not found on node '{node}'")]
    PortNotFound { node: String, port: String },

    /// A type that a specialization requires is not compatible or not loaded
    #[error("Type '{type_name}' cannot specialize '{generic_type_name}'")]
    IncompatibleType {
        generic_type_name: String,
        type_name: String,
    },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CompilerError {
    /// Create a not-found error for a node class name
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NodeClassNotFound(name.into())
    }

    /// Create a configuration error with a message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Failure of a single backing compile
///
/// Cloneable so that every caller coalesced onto the same build receives
/// the same diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    /// Fully specialized name of the node class being built
    pub node_class_name: String,
    /// Diagnostic lines from the toolchain
    pub diagnostics: Vec<String>,
}

impl CompileError {
    pub fn new(node_class_name: impl Into<String>, diagnostics: Vec<String>) -> Self {
        Self {
            node_class_name: node_class_name.into(),
            diagnostics,
        }
    }

    /// Create a compile error with a single diagnostic line
    pub fn failed(node_class_name: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        Self::new(node_class_name, vec![diagnostic.into()])
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Failed to compile '{}'", self.node_class_name)?;
        if !self.diagnostics.is_empty() {
            write!(f, ": {}", self.diagnostics.join("; "))?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileError {}
