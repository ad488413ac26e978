//! Offline topology analyser
//!
//! Classifies every registered node by its position in the routing graph
//! and flags suspicious configurations. Purely advisory: the router never
//! consults it.

use std::collections::HashSet;
use std::fmt;

use crate::node::{NodeHandle, NodeRegistry, NodeRole};
use crate::routing::RoutingMap;

/// Where a node sits in the routing graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodePosition {
    /// Emits into the graph, receives nothing
    Source,
    /// Receives from the graph, emits nothing
    Sink,
    /// Both receives and emits
    Interior,
    /// Mentioned in the topology but wired to nothing
    Isolated,
}

impl fmt::Display for NodePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodePosition::Source => f.write_str("source"),
            NodePosition::Sink => f.write_str("sink"),
            NodePosition::Interior => f.write_str("interior"),
            NodePosition::Isolated => f.write_str("isolated"),
        }
    }
}

/// A suspicious configuration worth a human look
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub node: String,
    pub detail: String,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.node, self.detail)
    }
}

/// Result of analysing a topology
#[derive(Debug, Clone)]
pub struct TopologyReport {
    /// (label, position) per known node, sorted by label
    pub classifications: Vec<(String, NodePosition)>,
    pub findings: Vec<Finding>,
}

impl TopologyReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn position_of(&self, label: &str) -> Option<NodePosition> {
        self.classifications
            .iter()
            .find(|(name, _)| name == label)
            .map(|(_, position)| *position)
    }
}

impl fmt::Display for TopologyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "nodes:")?;
        for (label, position) in &self.classifications {
            writeln!(f, "  {label}: {position}")?;
        }
        if self.findings.is_empty() {
            writeln!(f, "no findings")?;
        } else {
            writeln!(f, "findings:")?;
            for finding in &self.findings {
                writeln!(f, "  {finding}")?;
            }
        }
        Ok(())
    }
}

/// Analyse a built topology
///
/// Every registered node is classified, not just the ones the map wires
/// up: a node that was registered but never referenced by any table shows
/// up as isolated instead of disappearing from the report.
pub fn analyse(map: &RoutingMap, registry: &NodeRegistry) -> TopologyReport {
    let nodes = registry.handles();

    // A node has inputs when any edge points at it; wildcard fault targets
    // can be fed by any non-handler node, so they count as receiving.
    let mut has_inputs: HashSet<NodeHandle> = HashSet::new();
    for &node in &nodes {
        for destination in map.outgoing(node) {
            has_inputs.insert(destination);
        }
    }
    for target in map.wildcard_targets() {
        has_inputs.insert(target);
    }

    let mut classifications = Vec::with_capacity(nodes.len());
    let mut findings = Vec::new();

    for &node in &nodes {
        let label = registry.label(node);
        let receives = has_inputs.contains(&node);
        let emits = !map.outgoing(node).is_empty();
        let position = match (receives, emits) {
            (true, true) => NodePosition::Interior,
            (false, true) => NodePosition::Source,
            (true, false) => NodePosition::Sink,
            (false, false) => NodePosition::Isolated,
        };
        classifications.push((label.clone(), position));

        let Some(role) = registry.get(node).map(|n| n.role()) else {
            continue;
        };
        if position == NodePosition::Isolated {
            findings.push(Finding {
                node: label,
                detail: "wired to nothing: neither receives nor emits".to_string(),
            });
        } else if !receives && role != NodeRole::Source {
            findings.push(Finding {
                node: label,
                detail: format!("has no inputs but is a {role}, not a source"),
            });
        } else if emits && role == NodeRole::Sink {
            findings.push(Finding {
                node: label,
                detail: "sink has outgoing destinations".to_string(),
            });
        } else if receives && role == NodeRole::Source {
            findings.push(Finding {
                node: label,
                detail: "source receives input from other nodes".to_string(),
            });
        }
    }

    classifications.sort_by(|a, b| a.0.cmp(&b.0));
    findings.sort_by(|a, b| a.node.cmp(&b.node));

    TopologyReport {
        classifications,
        findings,
    }
}
