//! The uniform node contract and the registry/adapter layer around it
//!
//! Every external collaborator — readers, writers, record processors,
//! enrichers — is presented to the topology and the router through the
//! single [`Node`] trait. The [`NodeRegistry`] arena hands out stable
//! [`NodeHandle`]s; the adapter wrappers in [`adapter`] lift plain
//! collaborator traits into nodes.

mod adapter;
mod registry;

pub use adapter::{
    Disposition, EnricherNode, MapperNode, RecordEnricher, RecordMapper, RecordSink,
    RecordSource, SinkNode, SourceNode,
};
pub use registry::{NodeHandle, NodeRegistry};

use crate::fault::Fault;
use crate::message::{Message, Response};

/// How a node participates in a topology
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    /// Produces messages; takes no input from the topology
    Source,
    /// Accepts messages and emits a mix of result batches
    Processor,
    /// Delivers messages externally; emits nothing further
    Sink,
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeRole::Source => f.write_str("source"),
            NodeRole::Processor => f.write_str("processor"),
            NodeRole::Sink => f.write_str("sink"),
        }
    }
}

/// A configuration problem reported by a node's self-check
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    /// Identifier of the node reporting the issue
    pub node: String,
    /// What is wrong
    pub detail: String,
}

impl ValidationIssue {
    pub fn new(node: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            detail: detail.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.node, self.detail)
    }
}

/// The uniform contract every routable entity implements
///
/// `process` may fail; the router treats an `Err` exactly like a response
/// containing a single exception batch with that fault.
pub trait Node: Send + Sync {
    /// Optional identifier used for logging, history, and sender resolution.
    /// Nodes without one are recorded generically.
    fn id(&self) -> Option<&str> {
        None
    }

    fn role(&self) -> NodeRole {
        NodeRole::Processor
    }

    /// Process one message, returning categorized result batches
    fn process(&self, message: &Message) -> Result<Response, Fault>;

    /// Configuration self-check, run once before any dispatch.
    /// Issues are accumulated, never thrown.
    fn validate(&self, _issues: &mut Vec<ValidationIssue>) {}
}

/// A named node that accepts anything and emits nothing
///
/// Used as a stand-in when validating a topology offline, and handy as a
/// terminal node in tests.
#[derive(Debug)]
pub struct InertNode {
    id: String,
    role: NodeRole,
}

impl InertNode {
    pub fn named(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: NodeRole::Processor,
        }
    }

    pub fn with_role(mut self, role: NodeRole) -> Self {
        self.role = role;
        self
    }
}

impl Node for InertNode {
    fn id(&self) -> Option<&str> {
        Some(&self.id)
    }

    fn role(&self) -> NodeRole {
        self.role
    }

    fn process(&self, _message: &Message) -> Result<Response, Fault> {
        Ok(Response::new())
    }
}
