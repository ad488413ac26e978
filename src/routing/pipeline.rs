//! Pipeline: linear-chain convenience builder
//!
//! Turns an ordered list of nodes into a topology that links each node to
//! the next, with an optional catch-all fault handler registered under the
//! root kind.

use std::sync::Arc;

use crate::fault::{FaultCatalog, ROOT_KIND};
use crate::node::{NodeHandle, NodeRegistry, NodeRole};

use super::map::{ConfigError, RoutingMap};

/// Builder for a straight source-to-sink chain
#[derive(Debug)]
pub struct Pipeline {
    nodes: Vec<NodeHandle>,
    handler: Option<NodeHandle>,
}

impl Pipeline {
    pub fn new(nodes: Vec<NodeHandle>) -> Self {
        Self {
            nodes,
            handler: None,
        }
    }

    /// Catch-all fault handler, registered for the root kind so it matches
    /// every fault
    pub fn with_fault_handler(mut self, handler: NodeHandle) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Build the routing map, failing fast on malformed chains
    ///
    /// The first node must be a source and the last a sink; anything else
    /// is a configuration error.
    pub fn build(
        self,
        registry: Arc<NodeRegistry>,
        catalog: Arc<FaultCatalog>,
    ) -> Result<RoutingMap, ConfigError> {
        if self.nodes.len() < 2 {
            return Err(ConfigError::PipelineTooShort(self.nodes.len()));
        }

        let first = self.nodes[0];
        let last = self.nodes[self.nodes.len() - 1];
        Self::expect_role(&registry, first, "first", NodeRole::Source)?;
        Self::expect_role(&registry, last, "last", NodeRole::Sink)?;

        let mut map = RoutingMap::new(registry, catalog);
        for pair in self.nodes.windows(2) {
            map.set_process_destinations(pair[0], vec![pair[1]]);
        }
        if let Some(handler) = self.handler {
            map.set_wildcard_fault_destinations(ROOT_KIND, vec![handler])?;
        }
        Ok(map)
    }

    fn expect_role(
        registry: &NodeRegistry,
        handle: NodeHandle,
        position: &'static str,
        expected: NodeRole,
    ) -> Result<(), ConfigError> {
        let found = registry
            .get(handle)
            .map(|node| node.role())
            .ok_or_else(|| ConfigError::UnknownNode(handle.to_string()))?;
        if found != expected {
            return Err(ConfigError::PipelineEndpoint {
                position,
                node: registry.label(handle),
                expected,
                found,
            });
        }
        Ok(())
    }
}
