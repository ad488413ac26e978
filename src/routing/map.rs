//! RoutingMap: the static topology consulted during dispatch
//!
//! Three tables keyed by node handle — process destinations, discard
//! destinations, and fault destinations. Fault tables preserve registration
//! order because resolution is order-sensitive: after an exact kind match,
//! the first-registered ancestor wins, not the most specific one. That
//! tie-break is an observable, compatibility-relevant behavior and is kept
//! exactly as is.
//!
//! The map is built once, before any dispatch, and read-only afterwards.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use thiserror::Error;

use crate::fault::{CatalogError, Fault, FaultCatalog, FaultKind};
use crate::node::{NodeHandle, NodeRegistry, NodeRole, ValidationIssue};

/// Errors raised while building a topology. Never raised at dispatch time.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("topology contains a cycle through {node}")]
    CyclicTopology { node: String },

    #[error("unknown node '{0}'")]
    UnknownNode(String),

    #[error("a pipeline needs at least two nodes, got {0}")]
    PipelineTooShort(usize),

    #[error("pipeline {position} node {node} must be a {expected}, found {found}")]
    PipelineEndpoint {
        position: &'static str,
        node: String,
        expected: NodeRole,
        found: NodeRole,
    },

    #[error("unsupported topology file format '{0}' (expected yaml or json)")]
    UnsupportedFormat(String),

    #[error("failed to parse topology file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to parse topology file: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

type FaultTable = Vec<(FaultKind, Vec<NodeHandle>)>;

/// Static routing configuration: who feeds whom
#[derive(Debug)]
pub struct RoutingMap {
    registry: Arc<NodeRegistry>,
    catalog: Arc<FaultCatalog>,
    process: HashMap<NodeHandle, Vec<NodeHandle>>,
    discard: HashMap<NodeHandle, Vec<NodeHandle>>,
    node_faults: HashMap<NodeHandle, FaultTable>,
    wildcard_faults: FaultTable,
}

impl RoutingMap {
    pub fn new(registry: Arc<NodeRegistry>, catalog: Arc<FaultCatalog>) -> Self {
        Self {
            registry,
            catalog,
            process: HashMap::new(),
            discard: HashMap::new(),
            node_faults: HashMap::new(),
            wildcard_faults: Vec::new(),
        }
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn catalog(&self) -> &Arc<FaultCatalog> {
        &self.catalog
    }

    /// Replace the process destination list for a node
    pub fn set_process_destinations(&mut self, node: NodeHandle, destinations: Vec<NodeHandle>) {
        self.process.insert(node, destinations);
    }

    /// Replace the discard destination list for a node
    pub fn set_discard_destinations(&mut self, node: NodeHandle, destinations: Vec<NodeHandle>) {
        self.discard.insert(node, destinations);
    }

    /// Register wildcard fault destinations for a kind
    ///
    /// Applies to any node without a node-specific fault table. Registration
    /// order across calls is preserved; re-registering a kind replaces its
    /// destinations in place.
    pub fn set_wildcard_fault_destinations(
        &mut self,
        kind_name: &str,
        destinations: Vec<NodeHandle>,
    ) -> Result<(), ConfigError> {
        let kind = self.catalog.resolve_required(kind_name)?;
        Self::upsert_registration(&mut self.wildcard_faults, kind, destinations);
        Ok(())
    }

    /// Register node-specific fault destinations for a kind
    pub fn set_fault_destinations(
        &mut self,
        node: NodeHandle,
        kind_name: &str,
        destinations: Vec<NodeHandle>,
    ) -> Result<(), ConfigError> {
        let kind = self.catalog.resolve_required(kind_name)?;
        let table = self.node_faults.entry(node).or_default();
        Self::upsert_registration(table, kind, destinations);
        Ok(())
    }

    fn upsert_registration(table: &mut FaultTable, kind: FaultKind, destinations: Vec<NodeHandle>) {
        if let Some(entry) = table.iter_mut().find(|(registered, _)| *registered == kind) {
            entry.1 = destinations;
        } else {
            table.push((kind, destinations));
        }
    }

    /// Process destinations for a node; empty when none are configured
    pub fn process_destinations(&self, node: NodeHandle) -> &[NodeHandle] {
        self.process.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Discard destinations for a node; empty when none are configured
    pub fn discard_destinations(&self, node: NodeHandle) -> &[NodeHandle] {
        self.discard.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Resolve the destinations for a fault raised by `node`
    ///
    /// The node-specific table is consulted when present, otherwise the
    /// wildcard table; a node with its own table never falls back to the
    /// wildcard. Within the chosen table an exact kind match wins, then the
    /// first registration (in registration order) whose kind covers the
    /// fault's kind. No match resolves to an empty list.
    pub fn fault_destinations(&self, node: NodeHandle, fault: &Fault) -> &[NodeHandle] {
        let table = match self.node_faults.get(&node) {
            Some(table) => table.as_slice(),
            None => self.wildcard_faults.as_slice(),
        };

        if let Some((_, destinations)) = table.iter().find(|(kind, _)| *kind == fault.kind()) {
            return destinations;
        }
        for (kind, destinations) in table {
            if self.catalog.is_assignable(*kind, fault.kind()) {
                return destinations;
            }
        }
        &[]
    }

    /// Whether a node has its own fault table
    pub fn has_fault_table(&self, node: NodeHandle) -> bool {
        self.node_faults.contains_key(&node)
    }

    /// Whether a node is registered anywhere as a fault destination
    pub fn is_fault_handler(&self, node: NodeHandle) -> bool {
        self.wildcard_faults
            .iter()
            .any(|(_, destinations)| destinations.contains(&node))
            || self
                .node_faults
                .values()
                .any(|table| table.iter().any(|(_, d)| d.contains(&node)))
    }

    /// Every node mentioned anywhere in the map, as key or destination
    pub fn known_nodes(&self) -> Vec<NodeHandle> {
        let mut nodes = BTreeSet::new();
        for (node, destinations) in self.process.iter().chain(self.discard.iter()) {
            nodes.insert(*node);
            nodes.extend(destinations.iter().copied());
        }
        for (node, table) in &self.node_faults {
            nodes.insert(*node);
            for (_, destinations) in table {
                nodes.extend(destinations.iter().copied());
            }
        }
        for (_, destinations) in &self.wildcard_faults {
            nodes.extend(destinations.iter().copied());
        }
        nodes.into_iter().collect()
    }

    /// Directly configured outgoing edges of a node (wildcard excluded)
    pub fn outgoing(&self, node: NodeHandle) -> Vec<NodeHandle> {
        let mut edges = Vec::new();
        edges.extend_from_slice(self.process_destinations(node));
        edges.extend_from_slice(self.discard_destinations(node));
        if let Some(table) = self.node_faults.get(&node) {
            for (_, destinations) in table {
                edges.extend_from_slice(destinations);
            }
        }
        edges
    }

    /// All nodes reachable through the wildcard fault table
    pub fn wildcard_targets(&self) -> Vec<NodeHandle> {
        let mut targets = Vec::new();
        for (_, destinations) in &self.wildcard_faults {
            targets.extend_from_slice(destinations);
        }
        targets
    }

    /// Reject topologies whose routing graph contains a cycle
    ///
    /// Dispatch is an exhaustive traversal, so a cycle would never
    /// terminate. Edges considered: process, discard, node-specific fault
    /// registrations, and wildcard fault registrations from every node that
    /// is not itself a fault handler (the wildcard fallback never applies
    /// to a handler).
    pub fn ensure_acyclic(&self) -> Result<(), ConfigError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        let nodes = self.known_nodes();
        let wildcard_targets = self.wildcard_targets();
        let edges_of = |node: NodeHandle| {
            let mut edges = self.outgoing(node);
            if !self.has_fault_table(node) && !self.is_fault_handler(node) {
                edges.extend_from_slice(&wildcard_targets);
            }
            edges
        };

        let mut marks: HashMap<NodeHandle, Mark> = HashMap::new();
        for root in nodes {
            if marks.contains_key(&root) {
                continue;
            }
            // Iterative DFS; the second visit of a frame finalizes it.
            let mut stack = vec![(root, false)];
            while let Some((node, expanded)) = stack.pop() {
                if expanded {
                    marks.insert(node, Mark::Done);
                    continue;
                }
                match marks.get(&node) {
                    Some(Mark::Done) => continue,
                    Some(Mark::Visiting) => {
                        return Err(ConfigError::CyclicTopology {
                            node: self.registry.label(node),
                        });
                    }
                    None => {}
                }
                marks.insert(node, Mark::Visiting);
                stack.push((node, true));
                for next in edges_of(node) {
                    match marks.get(&next) {
                        Some(Mark::Visiting) => {
                            return Err(ConfigError::CyclicTopology {
                                node: self.registry.label(next),
                            });
                        }
                        Some(Mark::Done) => {}
                        None => stack.push((next, false)),
                    }
                }
            }
        }
        Ok(())
    }

    /// Run every known node's configuration self-check
    pub fn validate_nodes(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        for handle in self.known_nodes() {
            if let Some(node) = self.registry.get(handle) {
                node.validate(&mut issues);
            }
        }
        issues
    }
}
