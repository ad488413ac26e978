//! Node registry: arena of registered nodes with identity memoization
//!
//! Registration is keyed by the collaborator's data pointer, so registering
//! the same instance twice — directly or through an adapter convenience —
//! always yields the same handle. The topology's handle-based lookups stay
//! consistent no matter how many times a collaborator is wrapped during
//! configuration. The arena is populated while the topology is being built
//! and only read during dispatch.

use std::sync::{Arc, PoisonError, RwLock};

use dashmap::DashMap;

use super::adapter::{
    EnricherNode, MapperNode, RecordEnricher, RecordMapper, RecordSink, RecordSource, SinkNode,
    SourceNode,
};
use super::Node;

/// Stable index of a registered node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(pub(crate) usize);

impl std::fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Arena of registered nodes
#[derive(Default)]
pub struct NodeRegistry {
    nodes: RwLock<Vec<Arc<dyn Node>>>,
    by_identity: DashMap<usize, NodeHandle>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node, returning its handle
    ///
    /// Registering the same instance again returns the existing handle.
    pub fn register(&self, node: Arc<dyn Node>) -> NodeHandle {
        let key = Arc::as_ptr(&node).cast::<()>() as usize;
        self.register_keyed(key, node)
    }

    /// Wrap and register a source collaborator
    pub fn register_source(&self, source: Arc<dyn RecordSource>) -> NodeHandle {
        let key = Arc::as_ptr(&source).cast::<()>() as usize;
        self.register_keyed(key, Arc::new(SourceNode::new(source)))
    }

    /// Wrap and register a record mapper collaborator
    pub fn register_mapper(&self, mapper: Arc<dyn RecordMapper>) -> NodeHandle {
        let key = Arc::as_ptr(&mapper).cast::<()>() as usize;
        self.register_keyed(key, Arc::new(MapperNode::new(mapper)))
    }

    /// Wrap and register an enricher collaborator
    pub fn register_enricher(&self, enricher: Arc<dyn RecordEnricher>) -> NodeHandle {
        let key = Arc::as_ptr(&enricher).cast::<()>() as usize;
        self.register_keyed(key, Arc::new(EnricherNode::new(enricher)))
    }

    /// Wrap and register a sink collaborator
    pub fn register_sink(&self, sink: Arc<dyn RecordSink>) -> NodeHandle {
        let key = Arc::as_ptr(&sink).cast::<()>() as usize;
        self.register_keyed(key, Arc::new(SinkNode::new(sink)))
    }

    fn register_keyed(&self, key: usize, node: Arc<dyn Node>) -> NodeHandle {
        if let Some(existing) = self.by_identity.get(&key) {
            return *existing;
        }
        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        let handle = NodeHandle(nodes.len());
        nodes.push(node);
        drop(nodes);
        self.by_identity.insert(key, handle);
        handle
    }

    /// Get a registered node
    pub fn get(&self, handle: NodeHandle) -> Option<Arc<dyn Node>> {
        self.nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(handle.0)
            .cloned()
    }

    /// Identifier of a registered node, if it exposes one
    pub fn node_id(&self, handle: NodeHandle) -> Option<String> {
        self.get(handle)
            .and_then(|node| node.id().map(str::to_string))
    }

    /// Display label: the node's identifier, or a generic handle label
    pub fn label(&self, handle: NodeHandle) -> String {
        self.node_id(handle).unwrap_or_else(|| handle.to_string())
    }

    /// Handles of every registered node, in registration order
    pub fn handles(&self) -> Vec<NodeHandle> {
        (0..self.len()).map(NodeHandle).collect()
    }

    /// Number of registered nodes
    pub fn len(&self) -> usize {
        self.nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("len", &self.len())
            .finish()
    }
}
