//! Vuo Compiler - generic node specialization for Vuo compositions
//!
//! Generic node classes declare ports of placeholder types
//! (`VuoGenericType1`, `VuoList_VuoGenericType2`, ...). This crate turns
//! them into runnable node classes:
//!
//! - Specialization: substituting concrete types for a generic class's
//!   placeholders, partially or fully, with names that encode the
//!   substitution (`vuo.data.hold.VuoGenericType1` → `vuo.data.hold.VuoText`)
//! - "Make List" synthesis: `vuo.list.make.<count>.<type>` classes built in
//!   process for any item count and item type
//! - Backing management: compiling (once per fully specialized name, with
//!   concurrent requests coalesced) and sharing the concrete class that
//!   runs a specialization's code
//!
//! # Architecture
//!
//! - `TypeRegistry` / `NodeClassRegistry`: process-wide, read-mostly caches
//! - `SpecializedNodeClass`: a generic or Make List specialization, owned by
//!   one node while generic types remain, shared once fully specialized
//! - `BackingResolver`: compile-or-fetch behind the `ModuleCompiler` trait
//! - `Compiler`: the operations an editor performs on a `Composition`
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use vuo_compiler::{CompileSession, Compiler, CompilerConfig, NullEventSink};
//!
//! let compiler = Compiler::with_clang(CompilerConfig::default(), Arc::new(NullEventSink));
//! let session = CompileSession::new();
//! let node = compiler.create_node("vuo.data.hold.VuoText", "Hold", (0.0, 0.0), &session).await?;
//! ```

pub mod backing;
pub mod clang;
pub mod compiler;
pub mod composition;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod generic;
pub mod make_list;
pub mod module_details;
pub mod naming;
pub mod node_class;
pub mod port;
pub mod registry;
pub mod source;
pub mod specialized;
pub mod types;
pub mod validation;

// Re-export key types
pub use backing::{BackingResolver, CompileRequest, CompileSession, ModuleCompiler};
pub use clang::ClangModuleCompiler;
pub use compiler::Compiler;
pub use composition::{Cable, Composition, Node, NodeClassRef};
pub use config::CompilerConfig;
pub use error::{CompileError, CompilerError, Result};
pub use events::{CompilerEvent, EventSink, NullEventSink, VecEventSink};
pub use generic::GenericTypeDetails;
pub use module_details::ModuleDetails;
pub use node_class::{CompiledModule, NodeClass};
pub use port::{Port, PortClass};
pub use registry::NodeClassRegistry;
pub use specialized::{Specialization, SpecializedNodeClass};
pub use types::{TypeRegistry, VuoType};
pub use validation::{validate_composition, ValidationError};
