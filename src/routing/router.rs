//! Router: drives a message through the topology
//!
//! Dispatch is synchronous on the calling thread. The traversal that the
//! original design expressed as recursive fan-out runs here as an explicit
//! LIFO work stack, which bounds stack usage while keeping the same
//! depth-first order: a destination's entire subtree is processed before
//! its next sibling, and a fatal failure abandons every sibling that has
//! not started yet.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::map::{ConfigError, RoutingMap};
use super::metrics::{MetricsSnapshot, RouterMetrics};
use crate::fault::Fault;
use crate::message::{Batch, Message, Response};
use crate::node::NodeHandle;

/// Behavior flags for a router; all default to off
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Give each fan-out destination an independent metadata copy instead
    /// of a shared one
    pub branch_metadata_on_fanout: bool,
    /// Log discarded records at info instead of debug
    pub log_discard_as_info: bool,
    /// Downgrade unrouted failures raised by fault handlers to a warning
    pub ignore_handler_faults: bool,
    /// Record the chain of visited nodes in message metadata
    pub history_enabled: bool,
    /// Count dispatch activity in [`RouterMetrics`]
    pub metrics_enabled: bool,
}

/// Fatal dispatch failures; everything recoverable is routed, not raised
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no route for fault kind '{kind}' raised by {node}")]
    UnroutableFault { kind: String, node: String },

    #[error("fault handler {node} failed with kind '{kind}'")]
    HandlerFault { kind: String, node: String },

    #[error("message addressed to unregistered {0}")]
    UnknownNode(String),
}

struct WorkItem {
    message: Message,
    destination: NodeHandle,
}

/// Synchronous dispatcher over an immutable [`RoutingMap`]
#[derive(Debug)]
pub struct Router {
    map: Arc<RoutingMap>,
    config: RouterConfig,
    /// Identifier-keyed lookup used to resolve the logical sender even when
    /// the raw handle in a message is not the registered one.
    ids: HashMap<String, NodeHandle>,
    metrics: RouterMetrics,
}

impl Router {
    /// Build a router over a finished topology
    ///
    /// Rejects cyclic topologies outright and runs every node's
    /// configuration self-check, logging accumulated issues.
    pub fn new(map: Arc<RoutingMap>, config: RouterConfig) -> Result<Self, ConfigError> {
        map.ensure_acyclic()?;
        for issue in map.validate_nodes() {
            warn!(node = %issue.node, detail = %issue.detail, "node validation issue");
        }

        let mut ids = HashMap::new();
        for handle in map.known_nodes() {
            if let Some(id) = map.registry().node_id(handle) {
                // First registration wins on identifier collisions.
                ids.entry(id).or_insert(handle);
            }
        }

        Ok(Self {
            map,
            config,
            ids,
            metrics: RouterMetrics::new(),
        })
    }

    pub fn map(&self) -> &Arc<RoutingMap> {
        &self.map
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Dispatch one externally produced message through the topology
    ///
    /// Returns an empty response on success: every real result has already
    /// been routed onward by the time this returns.
    pub fn dispatch(&self, mut message: Message) -> Result<Response, DispatchError> {
        let sender = self.resolve_sender(&message);
        let message_id = message.id();

        if self.config.metrics_enabled {
            self.metrics.dispatch_started(message_id);
        }
        if self.config.history_enabled {
            let label = self.map.registry().label(sender);
            if let Some(metadata) = message.metadata_mut() {
                metadata.push_history(&label);
            }
        }

        debug!(
            message = %message_id,
            sender = %self.map.registry().label(sender),
            records = message.payload().len(),
            "dispatching message"
        );

        let mut stack = Vec::new();
        let mut pending = Vec::new();
        self.fan_out(&mut pending, message, self.map.process_destinations(sender));
        stack.extend(pending.into_iter().rev());

        let mut result = Ok(Response::new());
        while let Some(item) = stack.pop() {
            if let Err(err) = self.process_one(&mut stack, item) {
                result = Err(err);
                break;
            }
        }

        if self.config.metrics_enabled {
            self.metrics.dispatch_finished(message_id);
        }
        result
    }

    /// Resolve the logical originating node for a message
    ///
    /// If the sender exposes an identifier that maps to a registered node,
    /// that node is used; otherwise the raw handle passes through unchanged.
    fn resolve_sender(&self, message: &Message) -> NodeHandle {
        if let Some(id) = self.map.registry().node_id(message.sender()) {
            if let Some(&resolved) = self.ids.get(&id) {
                return resolved;
            }
        }
        message.sender()
    }

    /// Append one work item per destination, in destination order
    ///
    /// With more than one destination and metadata branching enabled, each
    /// destination gets an independent metadata copy; otherwise they all
    /// share the original storage. History is recorded on the copy the
    /// destination will actually see.
    fn fan_out(&self, pending: &mut Vec<WorkItem>, message: Message, destinations: &[NodeHandle]) {
        if destinations.is_empty() {
            return;
        }
        let branch = destinations.len() > 1 && self.config.branch_metadata_on_fanout;
        for &destination in destinations {
            let mut next = message.clone();
            if branch {
                let branched = next.metadata().map(|metadata| metadata.branch());
                if let Some(metadata) = branched {
                    next.set_metadata(Some(metadata));
                }
            }
            if self.config.history_enabled {
                let label = self.map.registry().label(destination);
                if let Some(metadata) = next.metadata_mut() {
                    metadata.push_history(&label);
                }
            }
            pending.push(WorkItem {
                message: next,
                destination,
            });
        }
    }

    fn process_one(&self, stack: &mut Vec<WorkItem>, item: WorkItem) -> Result<(), DispatchError> {
        let WorkItem {
            message,
            destination,
        } = item;
        let Some(node) = self.map.registry().get(destination) else {
            return Err(DispatchError::UnknownNode(destination.to_string()));
        };
        let label = self.map.registry().label(destination);

        if self.config.metrics_enabled {
            self.metrics.node_invoked();
        }
        debug!(
            node = %label,
            message = %message.id(),
            records = message.payload().len(),
            "delivering message"
        );

        // A failed call is routed exactly like an exception batch.
        let response = node
            .process(&message)
            .unwrap_or_else(Response::from_fault);

        let mut pending = Vec::new();
        for batch in response.into_batches() {
            match batch {
                Batch::Output(records) => {
                    let next = message.derive(records, destination);
                    self.fan_out(&mut pending, next, self.map.process_destinations(destination));
                }
                Batch::Discard(records) => {
                    if self.config.log_discard_as_info {
                        info!(node = %label, count = records.len(), "records discarded");
                    } else {
                        debug!(node = %label, count = records.len(), "records discarded");
                    }
                    if self.config.metrics_enabled {
                        self.metrics.records_discarded(records.len());
                    }
                    let next = message.derive(records, destination);
                    self.fan_out(&mut pending, next, self.map.discard_destinations(destination));
                }
                Batch::Exception(faults) => {
                    for fault in faults {
                        self.route_fault(&mut pending, &message, destination, &label, fault)?;
                    }
                }
            }
        }
        stack.extend(pending.into_iter().rev());
        Ok(())
    }

    fn route_fault(
        &self,
        pending: &mut Vec<WorkItem>,
        message: &Message,
        node: NodeHandle,
        label: &str,
        fault: Fault,
    ) -> Result<(), DispatchError> {
        let kind = self.map.catalog().name(fault.kind());

        // A fault handler may still escalate through its own fault table;
        // only the wildcard fallback is off-limits to it, so a wildcard
        // registration cannot loop a handler's faults back into itself.
        let destinations: &[NodeHandle] =
            if !self.map.has_fault_table(node) && self.map.is_fault_handler(node) {
                &[]
            } else {
                self.map.fault_destinations(node, &fault)
            };

        if !destinations.is_empty() {
            if self.config.metrics_enabled {
                self.metrics.fault_routed();
            }
            debug!(node = %label, kind = %kind, "routing fault");
            let payload = vec![fault.to_record(self.map.catalog())];
            let next = message.derive_bare(payload, node);
            self.fan_out(pending, next, destinations);
            return Ok(());
        }

        if self.map.is_fault_handler(node) {
            if self.config.ignore_handler_faults {
                warn!(
                    node = %label,
                    kind = %kind,
                    detail = %fault.message(),
                    "ignoring unrouted fault raised by fault handler"
                );
                if self.config.metrics_enabled {
                    self.metrics.handler_fault_ignored();
                }
                return Ok(());
            }
            error!(node = %label, kind = %kind, "fault handler failed");
            return Err(DispatchError::HandlerFault {
                kind,
                node: label.to_string(),
            });
        }

        error!(
            node = %label,
            kind = %kind,
            detail = %fault.message(),
            "no route for fault"
        );
        Err(DispatchError::UnroutableFault {
            kind,
            node: label.to_string(),
        })
    }
}
