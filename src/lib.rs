//! Trellis: Message-Routing Core for Pipeline Data Integration
//!
//! Given a topology describing which processing nodes feed which other
//! nodes, Trellis dispatches a unit of work (a [`Message`]) through the
//! graph: each node's results are collated into output, discard, and
//! exception batches, and every batch is routed onward according to the
//! topology — forward for outputs, sideways for discards, and to fault
//! handlers (or a fatal abort) for failures.
//!
//! # Core Concepts
//!
//! - **Message**: the unit of work — payload records, sender, optional
//!   transaction handle and metadata
//! - **Response**: categorized batches produced by one node processing one
//!   message
//! - **RoutingMap**: the static topology, built once and read-only during
//!   dispatch
//! - **Router**: the synchronous dispatcher driving the traversal
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use trellis::{
//!     FaultCatalog, InertNode, Message, NodeRegistry, Record, Router,
//!     RouterConfig, RoutingMap,
//! };
//!
//! let registry = Arc::new(NodeRegistry::new());
//! let catalog = Arc::new(FaultCatalog::new());
//! let reader = registry.register(Arc::new(InertNode::named("reader")));
//! let writer = registry.register(Arc::new(InertNode::named("writer")));
//!
//! let mut map = RoutingMap::new(registry, catalog);
//! map.set_process_destinations(reader, vec![writer]);
//!
//! let router = Router::new(Arc::new(map), RouterConfig::default()).unwrap();
//! router
//!     .dispatch(Message::new(vec![Record::from("row-1")], reader))
//!     .unwrap();
//! ```

mod fault;
mod message;
pub mod analysis;
pub mod config;
pub mod node;
pub mod routing;

pub use fault::{CatalogError, Fault, FaultCatalog, FaultKind, ROOT_KIND};
pub use message::{Batch, Message, Metadata, Record, Response, Transaction, HISTORY_KEY};
pub use node::{
    Disposition, InertNode, Node, NodeHandle, NodeRegistry, NodeRole, RecordEnricher,
    RecordMapper, RecordSink, RecordSource, ValidationIssue,
};
pub use routing::{
    ConfigError, DispatchError, MetricsSnapshot, Pipeline, Router, RouterConfig, RoutingMap,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
