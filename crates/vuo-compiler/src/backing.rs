//! Backing resolution
//!
//! A fully specialized node class runs the code of its backing: the
//! concrete node class compiled from the generic original's source with the
//! substituted types. The [`BackingResolver`] fetches backings from the
//! registry or compiles them through a [`ModuleCompiler`].
//!
//! # Coalescing
//!
//! At most one compile per fingerprint (the fully specialized name) is in
//! flight at a time. Later requests for the same fingerprint wait on the
//! first one's result. A successful build is published to the registry
//! before its in-flight slot is released, so a request arriving after the
//! slot is gone finds the backing in the registry. A failed build is not
//! published and its slot is released, so the next request compiles again.
//!
//! # Cancellation
//!
//! Each request runs under a [`CompileSession`]. A cancelled session stops
//! waiting and gets [`CompilerError::Cancelled`]; if it was the one
//! running the compile, another waiter on the same fingerprint takes over.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex, OnceCell};

use crate::composition::NodeClassRef;
use crate::error::{CompileError, CompilerError, Result};
use crate::events::{CompilerEvent, EventSink};
use crate::generic::is_generic_type_name;
use crate::make_list;
use crate::module_details::ModuleDetails;
use crate::naming::{
    generic_type_names_missing_from_name, is_specialization_of_node_class, specialization_substitutions,
};
use crate::node_class::{CompiledModule, NodeClass};
use crate::registry::NodeClassRegistry;
use crate::source::specialize_source;
use crate::specialized::SpecializedNodeClass;
use crate::types::TypeRegistry;

/// Everything the compile step needs to build one backing
#[derive(Debug, Clone)]
pub struct CompileRequest {
    /// Fully specialized name, unique per backing
    pub fingerprint: String,
    pub generic_node_class_name: String,
    pub specialized_for_generic_type_name: BTreeMap<String, String>,
    /// Generic source with the substituted types, if the original has source
    pub specialized_source: Option<String>,
    /// Details embedded in the compiled module
    pub module_details: ModuleDetails,
    pub dependencies: BTreeSet<String>,
    /// Signature of the backing being built
    pub node_class: NodeClass,
}

impl CompileRequest {
    /// The request that builds the backing of `specialized` from `generic`
    pub fn for_specialization(
        specialized: &SpecializedNodeClass,
        generic: &NodeClass,
        default_backing_type: &str,
    ) -> Self {
        let map = specialized.specialized_for_generic_type_name();
        let specialized_source = generic
            .source
            .as_deref()
            .map(|source| specialize_source(source, map, &generic.details.generic_types, default_backing_type));

        let mut node_class = specialized.node_class().clone();
        node_class.module = None;
        node_class.source = specialized_source.clone();

        Self {
            fingerprint: specialized.name().to_string(),
            generic_node_class_name: generic.name.clone(),
            specialized_for_generic_type_name: map.clone(),
            specialized_source,
            module_details: node_class.details.clone(),
            dependencies: specialized.dependencies(),
            node_class,
        }
    }
}

/// The compile step
///
/// Implementations turn a [`CompileRequest`] into compiled code. They are
/// shared across sessions and must tolerate concurrent calls for different
/// fingerprints.
#[async_trait]
pub trait ModuleCompiler: Send + Sync {
    async fn compile(&self, request: &CompileRequest) -> std::result::Result<CompiledModule, CompileError>;
}

/// One composition-compile operation, cancellable from any thread
#[derive(Debug, Clone)]
pub struct CompileSession {
    id: String,
    cancelled: Arc<watch::Sender<bool>>,
}

impl CompileSession {
    pub fn new() -> Self {
        let (cancelled, _) = watch::channel(false);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            cancelled: Arc::new(cancelled),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Cancel the session; waiting requests return at once
    pub fn cancel(&self) {
        log::info!("Cancelling compile session {}", self.id);
        self.cancelled.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }

    /// Completes once the session is cancelled
    pub async fn cancelled(&self) {
        let mut receiver = self.cancelled.subscribe();
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }

    fn cancelled_error(&self) -> CompilerError {
        CompilerError::Cancelled(self.id.clone())
    }
}

impl Default for CompileSession {
    fn default() -> Self {
        Self::new()
    }
}

type BuildSlot = Arc<OnceCell<std::result::Result<Arc<NodeClass>, CompileError>>>;

/// Fetches or builds backings and hands out node classes by name
pub struct BackingResolver {
    compiler: Arc<dyn ModuleCompiler>,
    registry: Arc<NodeClassRegistry>,
    types: Arc<TypeRegistry>,
    event_sink: Arc<dyn EventSink>,
    default_backing_type: String,
    in_flight: Mutex<HashMap<String, BuildSlot>>,
}

impl BackingResolver {
    pub fn new(
        compiler: Arc<dyn ModuleCompiler>,
        registry: Arc<NodeClassRegistry>,
        types: Arc<TypeRegistry>,
        event_sink: Arc<dyn EventSink>,
        default_backing_type: impl Into<String>,
    ) -> Self {
        Self {
            compiler,
            registry,
            types,
            event_sink,
            default_backing_type: default_backing_type.into(),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Backing type for generic types left open in compiled source
    pub fn default_backing_type(&self) -> &str {
        &self.default_backing_type
    }

    pub fn registry(&self) -> &Arc<NodeClassRegistry> {
        &self.registry
    }

    pub fn types(&self) -> &Arc<TypeRegistry> {
        &self.types
    }

    fn lookup_backing(&self, name: &str) -> Option<Arc<NodeClass>> {
        self.registry
            .lookup_node_class(name)
            .filter(|class| class.has_implementation())
    }

    /// Fetch the backing for `request`, compiling it if no one has yet.
    pub async fn resolve_backing(&self, request: CompileRequest, session: &CompileSession) -> Result<Arc<NodeClass>> {
        if session.is_cancelled() {
            return Err(session.cancelled_error());
        }

        let fingerprint = request.fingerprint.clone();
        let (slot, joined) = {
            let mut in_flight = self.in_flight.lock().await;
            if let Some(backing) = self.lookup_backing(&fingerprint) {
                log::debug!("Backing '{}' found in registry", fingerprint);
                return Ok(backing);
            }
            match in_flight.get(&fingerprint) {
                Some(slot) => (slot.clone(), true),
                None => {
                    let slot: BuildSlot = Arc::new(OnceCell::new());
                    in_flight.insert(fingerprint.clone(), slot.clone());
                    (slot, false)
                }
            }
        };

        if joined {
            log::debug!("Waiting on in-flight build of '{}'", fingerprint);
            let _ = self.event_sink.send(CompilerEvent::BuildCoalesced {
                node_class_name: fingerprint.clone(),
                session_id: session.id().to_string(),
            });
        }

        let outcome = tokio::select! {
            result = slot.get_or_init(|| self.build(&request, session)) => Some(result.clone()),
            _ = session.cancelled() => None,
        };

        let mut in_flight = self.in_flight.lock().await;
        let current = in_flight.get(&fingerprint).is_some_and(|s| Arc::ptr_eq(s, &slot));
        let Some(result) = outcome else {
            // An unfinished build with no one left waiting on it
            if current && !slot.initialized() && Arc::strong_count(&slot) == 2 {
                in_flight.remove(&fingerprint);
            }
            drop(in_flight);

            log::info!("Stopped waiting for '{}' in session {}", fingerprint, session.id());
            let _ = self.event_sink.send(CompilerEvent::BuildCancelled {
                node_class_name: fingerprint,
                session_id: session.id().to_string(),
            });
            return Err(session.cancelled_error());
        };

        if current {
            in_flight.remove(&fingerprint);
        }
        drop(in_flight);

        result.map_err(CompilerError::from)
    }

    async fn build(
        &self,
        request: &CompileRequest,
        session: &CompileSession,
    ) -> std::result::Result<Arc<NodeClass>, CompileError> {
        let name = request.fingerprint.clone();
        log::info!("Compiling backing '{}' from '{}'", name, request.generic_node_class_name);
        let _ = self.event_sink.send(CompilerEvent::BuildStarted {
            node_class_name: name.clone(),
            session_id: session.id().to_string(),
        });

        match self.compiler.compile(request).await {
            Ok(module) => {
                let backing = self
                    .registry
                    .publish(Arc::new(request.node_class.clone().with_module(module)));
                log::info!("Compiled backing '{}'", name);
                let _ = self.event_sink.send(CompilerEvent::BuildFinished {
                    node_class_name: name.clone(),
                    session_id: session.id().to_string(),
                });
                let _ = self.event_sink.send(CompilerEvent::NodeClassPublished { node_class_name: name });
                Ok(backing)
            }
            Err(err) => {
                log::warn!("{}", err);
                let _ = self.event_sink.send(CompilerEvent::BuildFailed {
                    node_class_name: name,
                    session_id: session.id().to_string(),
                    diagnostics: err.diagnostics.clone(),
                });
                Err(err)
            }
        }
    }

    /// Finds the generic class that `name` specializes and the substitutions it implies.
    ///
    /// Returns None if no loaded generic matches, or a substituted type is
    /// not loaded or not compatible with its generic type.
    pub fn resolve_specialization(&self, name: &str) -> Option<(Arc<NodeClass>, BTreeMap<String, String>)> {
        self.registry
            .generic_node_classes()
            .into_iter()
            .filter(|generic| generic.name != name && is_specialization_of_node_class(name, generic))
            .find_map(|generic| {
                let map = specialization_substitutions(name, &generic.name)?;
                for (generic_type_name, replacement) in &map {
                    if is_generic_type_name(replacement) {
                        continue;
                    }
                    if !self.types.has_type(replacement) {
                        log::debug!("'{}' names unknown type '{}'", name, replacement);
                        return None;
                    }
                    if !generic
                        .generic_type_details(generic_type_name)
                        .is_specialized_type_compatible(generic_type_name, replacement)
                    {
                        log::debug!("'{}' is not compatible with {} of '{}'", replacement, generic_type_name, generic.name);
                        return None;
                    }
                }
                Some((generic, map))
            })
    }

    fn publish_shared(&self, specialized: SpecializedNodeClass) -> Option<NodeClassRef> {
        let name = specialized.name().to_string();
        let shared = self.registry.publish_specialization(specialized)?;
        log::debug!("Shared specialization '{}'", name);
        let _ = self.event_sink.send(CompilerEvent::NodeClassPublished { node_class_name: name });
        Some(NodeClassRef::Shared(shared))
    }

    /// Fetch or build the node class named `name`.
    ///
    /// Lookup order: shared specializations, loaded classes, Make List
    /// synthesis, then specialization of a loaded generic. A full
    /// specialization is backed and shared; a partial one is returned for
    /// a single node to own. Returns `Ok(None)` if the name resolves to
    /// nothing.
    pub async fn new_node_class(&self, name: &str, session: &CompileSession) -> Result<Option<NodeClassRef>> {
        if session.is_cancelled() {
            return Err(session.cancelled_error());
        }

        if let Some(shared) = self.registry.lookup_specialization(name) {
            return Ok(Some(NodeClassRef::Shared(shared)));
        }
        if let Some(class) = self
            .registry
            .lookup_node_class(name)
            .filter(|class| !class.details.is_specialized())
        {
            return Ok(Some(NodeClassRef::Class(class)));
        }

        if let Some((item_count, item_type_name)) = make_list::parse_node_class_name(name) {
            let types = &self.types;
            let mut make_list = SpecializedNodeClass::make_list(item_count, &item_type_name, |n| types.lookup_type(n));
            if make_list.is_fully_specialized() && make_list.list_type().is_some() {
                make_list.update_backing_node_class(self, session).await?;
                return Ok(self.publish_shared(make_list));
            }
            if session.is_cancelled() {
                return Err(session.cancelled_error());
            }
            return Ok(Some(NodeClassRef::Owned(Box::new(make_list))));
        }

        let Some((generic, map)) = self.resolve_specialization(name) else {
            log::debug!("No node class named '{}'", name);
            return Ok(None);
        };
        let mut specialized = SpecializedNodeClass::new(generic, &map);
        if specialized.is_fully_specialized() {
            specialized.update_backing_node_class(self, session).await?;
            return Ok(self.publish_shared(specialized));
        }

        if session.is_cancelled() {
            return Err(session.cancelled_error());
        }
        Ok(Some(NodeClassRef::Owned(Box::new(specialized))))
    }

    /// Wrap a class loaded from an already compiled module, without compiling.
    ///
    /// The module's details are the preferred record of what it specializes;
    /// the name is matched against loaded generics only when they are absent.
    ///
    /// A generic class whose name lacks a segment for one of its generic
    /// types is rejected.
    pub fn node_class_from_module(&self, node_class: NodeClass) -> Result<NodeClassRef> {
        if node_class.is_generic() {
            let missing = generic_type_names_missing_from_name(&node_class);
            if !missing.is_empty() {
                log::warn!("Not loading '{}': {} missing from its name", node_class.name, missing.join(", "));
                return Err(CompilerError::InvalidNodeClass {
                    name: node_class.name,
                    reason: format!("generic types {} have no segment in the name", missing.join(", ")),
                });
            }
        }

        let recorded_generic = node_class
            .details
            .specialization()
            .and_then(|(_, generic_name)| generic_name)
            .map(str::to_string);
        let generic = match &recorded_generic {
            Some(generic_name) => self.registry.lookup_node_class(generic_name),
            None if node_class.is_generic() => None,
            None => self.registry.find_generic_for(&node_class.name),
        };

        if recorded_generic.is_none() && generic.is_none() {
            return Ok(NodeClassRef::Class(self.registry.register(node_class)));
        }

        let Some(specialized) = SpecializedNodeClass::from_module(node_class.clone(), generic) else {
            return Ok(NodeClassRef::Class(self.registry.register(node_class)));
        };

        if !specialized.is_fully_specialized() {
            return Ok(NodeClassRef::Owned(Box::new(specialized)));
        }
        if let Some(backing) = specialized.backing_node_class() {
            self.registry.publish(backing.clone());
        }
        Ok(match self.publish_shared(specialized) {
            Some(shared) => shared,
            None => NodeClassRef::Class(self.registry.register(node_class)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::VecEventSink;
    use crate::generic::GenericTypeDetails;
    use crate::module_details::build_specialized_module_details;
    use crate::node_class::EntryPoints;
    use crate::port::PortClass;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    /// Counts compiles; optionally slow or failing
    struct CountingCompiler {
        count: AtomicUsize,
        delay: Duration,
        fail: AtomicBool,
    }

    impl CountingCompiler {
        fn new(delay: Duration) -> Self {
            Self {
                count: AtomicUsize::new(0),
                delay,
                fail: AtomicBool::new(false),
            }
        }

        fn count(&self) -> usize {
            self.count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ModuleCompiler for CountingCompiler {
        async fn compile(&self, request: &CompileRequest) -> std::result::Result<CompiledModule, CompileError> {
            self.count.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail.load(Ordering::SeqCst) {
                return Err(CompileError::failed(&request.fingerprint, "error: unknown type name"));
            }
            Ok(CompiledModule::new(
                request.fingerprint.clone(),
                request.module_details.clone(),
                EntryPoints::for_node_class(&request.node_class),
            ))
        }
    }

    fn hold() -> NodeClass {
        NodeClass::new("vuo.data.hold.VuoGenericType1")
            .with_title("Hold Value")
            .with_port(PortClass::data_input("newValue", "VuoGenericType1"))
            .with_port(PortClass::data_output("heldValue", "VuoGenericType1"))
            .with_source("VuoModuleMetadata({});\nvoid nodeEvent(VuoInputData(VuoGenericType1) newValue);\n")
    }

    fn op() -> NodeClass {
        NodeClass::new("vuo.example.op.VuoGenericType1.VuoGenericType2")
            .with_port(PortClass::data_input("a", "VuoGenericType1"))
            .with_port(PortClass::data_output("out", "VuoGenericType2"))
            .with_generic_type(
                "VuoGenericType1",
                GenericTypeDetails {
                    default_type: None,
                    compatible_types: vec!["VuoInteger".to_string(), "VuoReal".to_string()],
                },
            )
    }

    fn resolver(compiler: Arc<CountingCompiler>) -> (BackingResolver, Arc<VecEventSink>) {
        let _ = env_logger::builder().is_test(true).try_init();
        let registry = Arc::new(NodeClassRegistry::new());
        registry.register(hold());
        registry.register(op());
        let events = Arc::new(VecEventSink::new());
        let resolver = BackingResolver::new(
            compiler,
            registry,
            Arc::new(TypeRegistry::with_core_types()),
            events.clone(),
            "VuoInteger",
        );
        (resolver, events)
    }

    fn hold_text(resolver: &BackingResolver) -> SpecializedNodeClass {
        let generic = resolver.registry().lookup_node_class("vuo.data.hold.VuoGenericType1").unwrap();
        SpecializedNodeClass::new(
            generic,
            &BTreeMap::from([("VuoGenericType1".to_string(), "VuoText".to_string())]),
        )
    }

    #[test]
    fn test_compile_request_for_specialization() {
        let (resolver, _) = resolver(Arc::new(CountingCompiler::new(Duration::ZERO)));
        let specialized = hold_text(&resolver);
        let request = CompileRequest::for_specialization(&specialized, &hold(), "VuoInteger");

        assert_eq!(request.fingerprint, "vuo.data.hold.VuoText");
        assert_eq!(request.generic_node_class_name, "vuo.data.hold.VuoGenericType1");
        let source = request.specialized_source.as_deref().unwrap();
        assert!(source.starts_with("#define VuoSpecializedNode 1"));
        assert!(source.contains("VuoInputData(VuoText) newValue"));
        assert!(request.dependencies.contains("VuoText"));
        assert_eq!(request.module_details.generic_node_class_name.as_deref(), Some("vuo.data.hold.VuoGenericType1"));
        assert!(request.node_class.module.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_requests_coalesce() {
        let compiler = Arc::new(CountingCompiler::new(Duration::from_millis(50)));
        let (resolver, events) = resolver(compiler.clone());
        let session = CompileSession::new();

        let mut first = hold_text(&resolver);
        let mut second = hold_text(&resolver);
        let (a, b) = tokio::join!(
            first.update_backing_node_class(&resolver, &session),
            second.update_backing_node_class(&resolver, &session),
        );
        assert!(a.unwrap());
        assert!(b.unwrap());
        assert_eq!(compiler.count(), 1);
        assert!(Arc::ptr_eq(
            first.backing_node_class().unwrap(),
            second.backing_node_class().unwrap()
        ));

        let events = events.events();
        let started = events
            .iter()
            .filter(|e| matches!(e, CompilerEvent::BuildStarted { .. }))
            .count();
        assert_eq!(started, 1);
        assert!(events.iter().any(|e| matches!(e, CompilerEvent::BuildCoalesced { .. })));

        // Already backed: no further work
        assert!(first.update_backing_node_class(&resolver, &session).await.unwrap());
        let mut third = hold_text(&resolver);
        assert!(third.update_backing_node_class(&resolver, &session).await.unwrap());
        assert_eq!(compiler.count(), 1);
    }

    #[tokio::test]
    async fn test_failed_build_not_published() {
        let compiler = Arc::new(CountingCompiler::new(Duration::ZERO));
        compiler.fail.store(true, Ordering::SeqCst);
        let (resolver, events) = resolver(compiler.clone());
        let session = CompileSession::new();

        let mut specialized = hold_text(&resolver);
        let err = specialized
            .update_backing_node_class(&resolver, &session)
            .await
            .unwrap_err();
        match err {
            CompilerError::Compile(err) => assert_eq!(err.diagnostics, vec!["error: unknown type name"]),
            other => panic!("unexpected error: {other}"),
        }
        assert!(specialized.backing_node_class().is_none());
        assert!(resolver.registry().lookup_node_class("vuo.data.hold.VuoText").is_none());
        assert!(events.events().iter().any(|e| matches!(e, CompilerEvent::BuildFailed { .. })));

        // The next request compiles again
        compiler.fail.store(false, Ordering::SeqCst);
        assert!(specialized.update_backing_node_class(&resolver, &session).await.unwrap());
        assert_eq!(compiler.count(), 2);
        assert!(resolver.registry().lookup_node_class("vuo.data.hold.VuoText").is_some());
    }

    #[tokio::test]
    async fn test_cancelled_session_stops_waiting() {
        let compiler = Arc::new(CountingCompiler::new(Duration::from_millis(500)));
        let (resolver, events) = resolver(compiler.clone());
        let session = CompileSession::new();
        let canceller = session.clone();

        let mut specialized = hold_text(&resolver);
        let (result, _) = tokio::join!(specialized.update_backing_node_class(&resolver, &session), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        assert!(matches!(result, Err(CompilerError::Cancelled(_))));
        assert!(resolver.registry().lookup_node_class("vuo.data.hold.VuoText").is_none());
        assert!(events.events().iter().any(|e| matches!(e, CompilerEvent::BuildCancelled { .. })));

        // Cancelled up front
        let err = resolver.new_node_class("vuo.data.hold.VuoText", &session).await.unwrap_err();
        assert!(matches!(err, CompilerError::Cancelled(_)));

        // The abandoned build leaves nothing behind to join
        let fresh = CompileSession::new();
        assert!(specialized.update_backing_node_class(&resolver, &fresh).await.unwrap());
        assert_eq!(compiler.count(), 2);
        let events = events.events();
        assert!(!events.iter().any(|e| matches!(e, CompilerEvent::BuildCoalesced { .. })));
        let started = events
            .iter()
            .filter(|e| matches!(e, CompilerEvent::BuildStarted { .. }))
            .count();
        assert_eq!(started, 2);
    }

    #[tokio::test]
    async fn test_cancelled_waiter_keeps_shared_build() {
        let compiler = Arc::new(CountingCompiler::new(Duration::from_millis(200)));
        let (resolver, _) = resolver(compiler.clone());
        let cancelled = CompileSession::new();
        let canceller = cancelled.clone();
        let patient = CompileSession::new();

        let mut first = hold_text(&resolver);
        let mut second = hold_text(&resolver);
        let (a, b, _) = tokio::join!(
            first.update_backing_node_class(&resolver, &cancelled),
            second.update_backing_node_class(&resolver, &patient),
            async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                canceller.cancel();
            },
        );

        assert!(matches!(a, Err(CompilerError::Cancelled(_))));
        assert!(b.unwrap());
        assert!(resolver.registry().lookup_node_class("vuo.data.hold.VuoText").is_some());
    }

    #[tokio::test]
    async fn test_make_list_is_cached_by_identity() {
        let compiler = Arc::new(CountingCompiler::new(Duration::ZERO));
        let (resolver, _) = resolver(compiler.clone());
        let session = CompileSession::new();

        let first = resolver.new_node_class("vuo.list.make.3.VuoText", &session).await.unwrap().unwrap();
        let second = resolver.new_node_class("vuo.list.make.3.VuoText", &session).await.unwrap().unwrap();
        match (&first, &second) {
            (NodeClassRef::Shared(a), NodeClassRef::Shared(b)) => assert!(Arc::ptr_eq(a, b)),
            _ => panic!("make list classes should be shared"),
        }
        assert_eq!(first.name(), "vuo.list.make.3.VuoText");
        assert!(first.implementation().is_some());
        assert_eq!(compiler.count(), 0);

        let pending = resolver.new_node_class("vuo.list.make.2.VuoGenericType1", &session).await.unwrap().unwrap();
        assert!(!pending.is_shared());
        assert!(pending.implementation().is_none());
    }

    #[tokio::test]
    async fn test_new_node_class_specializations() {
        let compiler = Arc::new(CountingCompiler::new(Duration::ZERO));
        let (resolver, _) = resolver(compiler.clone());
        let session = CompileSession::new();

        let full = resolver.new_node_class("vuo.data.hold.VuoText", &session).await.unwrap().unwrap();
        assert!(full.is_shared());
        assert!(full.implementation().is_some());
        let again = resolver.new_node_class("vuo.data.hold.VuoText", &session).await.unwrap().unwrap();
        assert!(matches!((&full, &again), (NodeClassRef::Shared(a), NodeClassRef::Shared(b)) if Arc::ptr_eq(a, b)));
        assert_eq!(compiler.count(), 1);

        let partial = resolver
            .new_node_class("vuo.example.op.VuoGenericType1.VuoReal", &session)
            .await
            .unwrap()
            .unwrap();
        assert!(!partial.is_shared());
        assert!(partial.implementation().is_none());
        assert_eq!(compiler.count(), 1);

        let generic = resolver.new_node_class("vuo.data.hold.VuoGenericType1", &session).await.unwrap().unwrap();
        assert!(matches!(generic, NodeClassRef::Class(_)));

        // Incompatible and unknown types resolve to nothing
        assert!(resolver.new_node_class("vuo.example.op.VuoText.VuoReal", &session).await.unwrap().is_none());
        assert!(resolver.new_node_class("vuo.data.hold.VuoNoSuchType", &session).await.unwrap().is_none());
        assert!(resolver.new_node_class("vuo.nothing.here", &session).await.unwrap().is_none());
    }

    #[test]
    fn test_node_class_from_module_uses_details() {
        let (resolver, _) = resolver(Arc::new(CountingCompiler::new(Duration::ZERO)));
        let map = BTreeMap::from([("VuoGenericType1".to_string(), "VuoReal".to_string())]);
        let details = build_specialized_module_details(&map, "vuo.data.hold.VuoGenericType1");

        let mut compiled = NodeClass::new("vuo.data.hold.VuoReal")
            .with_port(PortClass::data_input("newValue", "VuoReal"))
            .with_port(PortClass::data_output("heldValue", "VuoReal"));
        compiled.details = details.clone();
        let entry_points = EntryPoints::for_node_class(&compiled);
        let compiled = compiled.with_module(CompiledModule::new("vuo.data.hold.VuoReal", details, entry_points));

        let loaded = resolver.node_class_from_module(compiled).unwrap();
        let specialized = loaded.specialized().unwrap();
        assert!(loaded.is_shared());
        assert!(specialized.has_current_backing());
        assert_eq!(specialized.original_generic_node_class_name(), "vuo.data.hold.VuoGenericType1");
        assert!(resolver.registry().lookup_specialization("vuo.data.hold.VuoReal").is_some());

        let plain = resolver.node_class_from_module(NodeClass::new("vuo.event.fire")).unwrap();
        assert!(matches!(plain, NodeClassRef::Class(_)));

        // Two specializations of this class would share one name
        let hidden = NodeClass::new("vuo.example.convert.VuoGenericType1")
            .with_port(PortClass::data_input("in", "VuoGenericType1"))
            .with_port(PortClass::data_output("out", "VuoGenericType2"));
        let err = resolver.node_class_from_module(hidden).unwrap_err();
        assert!(matches!(err, CompilerError::InvalidNodeClass { ref name, .. } if name == "vuo.example.convert.VuoGenericType1"));
        assert!(!resolver.registry().has_node_class("vuo.example.convert.VuoGenericType1"));
    }
}
