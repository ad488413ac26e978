//! Declarative topology configuration
//!
//! A [`TopologyConfig`] describes a routing graph by node name, in YAML or
//! JSON, and builds into a [`RoutingMap`] plus [`RouterConfig`] once the
//! names are resolved to actual nodes through a [`NodeResolver`]. The
//! [`StubResolver`] stands in inert nodes for offline validation, which is
//! what the CLI uses.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::fault::{FaultCatalog, ROOT_KIND};
use crate::node::{InertNode, Node, NodeHandle, NodeRegistry, NodeRole};
use crate::routing::{ConfigError, RouterConfig, RoutingMap};

/// Destination value: a single node name or a list of them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn names(&self) -> Vec<&str> {
        match self {
            OneOrMany::One(name) => vec![name.as_str()],
            OneOrMany::Many(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

/// Declared flavor of a named node, for offline validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleDecl {
    Source,
    Processor,
    Sink,
}

impl From<RoleDecl> for NodeRole {
    fn from(role: RoleDecl) -> Self {
        match role {
            RoleDecl::Source => NodeRole::Source,
            RoleDecl::Processor => NodeRole::Processor,
            RoleDecl::Sink => NodeRole::Sink,
        }
    }
}

/// A fault kind declaration; parent defaults to the root kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KindDecl {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
}

/// One fault routing registration
///
/// Registrations are a list, not a map: their order in the file is the
/// registration order the resolver's ancestor scan depends on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultRoute {
    /// Node the registration applies to; `"*"` for the wildcard table
    #[serde(default = "wildcard_node")]
    pub node: String,
    pub kind: String,
    pub to: OneOrMany,
}

fn wildcard_node() -> String {
    "*".to_string()
}

/// Serializable description of a topology
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    /// Declared node roles, used when stubbing nodes offline
    pub nodes: HashMap<String, RoleDecl>,
    /// Node name -> process destination name(s)
    pub process: HashMap<String, OneOrMany>,
    /// Node name -> discard destination name(s)
    pub discard: HashMap<String, OneOrMany>,
    /// Ordered fault routing registrations
    pub faults: Vec<FaultRoute>,
    /// Fault kinds to register, in declaration order
    pub kinds: Vec<KindDecl>,
    /// Router behavior flags
    pub flags: RouterConfig,
}

/// Resolves a configured node name to a node instance
///
/// Must return the same instance for repeated calls with the same name, so
/// registry memoization yields a single handle per name.
pub trait NodeResolver {
    fn resolve(&self, name: &str) -> Option<Arc<dyn Node>>;
}

/// Resolver that fabricates inert named nodes, honoring declared roles
pub struct StubResolver {
    roles: HashMap<String, NodeRole>,
    cache: DashMap<String, Arc<dyn Node>>,
}

impl StubResolver {
    pub fn new() -> Self {
        Self {
            roles: HashMap::new(),
            cache: DashMap::new(),
        }
    }

    /// Seed roles from a config's `nodes` section
    pub fn from_config(config: &TopologyConfig) -> Self {
        Self {
            roles: config
                .nodes
                .iter()
                .map(|(name, role)| (name.clone(), NodeRole::from(*role)))
                .collect(),
            cache: DashMap::new(),
        }
    }
}

impl Default for StubResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeResolver for StubResolver {
    fn resolve(&self, name: &str) -> Option<Arc<dyn Node>> {
        let node = self
            .cache
            .entry(name.to_string())
            .or_insert_with(|| {
                let role = self
                    .roles
                    .get(name)
                    .copied()
                    .unwrap_or(NodeRole::Processor);
                Arc::new(InertNode::named(name).with_role(role)) as Arc<dyn Node>
            })
            .clone();
        Some(node)
    }
}

/// Everything a built configuration yields
#[derive(Debug)]
pub struct BuiltTopology {
    pub map: RoutingMap,
    pub registry: Arc<NodeRegistry>,
    pub catalog: Arc<FaultCatalog>,
    pub router: RouterConfig,
}

impl TopologyConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load from a file, picking the format by extension
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match extension.as_str() {
            "yaml" | "yml" => Self::from_yaml_str(&text),
            "json" => Self::from_json_str(&text),
            other => Err(ConfigError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Resolve names and build the topology
    pub fn build(&self, resolver: &dyn NodeResolver) -> Result<BuiltTopology, ConfigError> {
        let registry = Arc::new(NodeRegistry::new());
        let catalog = Arc::new(FaultCatalog::new());

        // Kinds first: later declarations may use earlier ones as parents.
        for decl in &self.kinds {
            let parent_name = decl.parent.as_deref().unwrap_or(ROOT_KIND);
            let parent = catalog.resolve_required(parent_name)?;
            catalog.register(decl.name.clone(), parent)?;
        }

        let handle_for = |name: &str| -> Result<NodeHandle, ConfigError> {
            resolver
                .resolve(name)
                .map(|node| registry.register(node))
                .ok_or_else(|| ConfigError::UnknownNode(name.to_string()))
        };

        // Every declared node is registered, referenced or not, so the
        // analyser can flag the unwired ones.
        for name in self.nodes.keys() {
            handle_for(name)?;
        }

        let mut map = RoutingMap::new(registry.clone(), catalog.clone());
        for (name, destinations) in &self.process {
            let node = handle_for(name)?;
            let resolved = destinations
                .names()
                .into_iter()
                .map(handle_for)
                .collect::<Result<Vec<_>, _>>()?;
            map.set_process_destinations(node, resolved);
        }
        for (name, destinations) in &self.discard {
            let node = handle_for(name)?;
            let resolved = destinations
                .names()
                .into_iter()
                .map(handle_for)
                .collect::<Result<Vec<_>, _>>()?;
            map.set_discard_destinations(node, resolved);
        }
        for route in &self.faults {
            let resolved = route
                .to
                .names()
                .into_iter()
                .map(handle_for)
                .collect::<Result<Vec<_>, _>>()?;
            if route.node == "*" {
                map.set_wildcard_fault_destinations(&route.kind, resolved)?;
            } else {
                let node = handle_for(&route.node)?;
                map.set_fault_destinations(node, &route.kind, resolved)?;
            }
        }

        Ok(BuiltTopology {
            map,
            registry,
            catalog,
            router: self.flags.clone(),
        })
    }
}
