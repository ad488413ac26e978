//! Fault taxonomy: a closed, application-registered tree of error-kind tags.
//!
//! Routable failures carry a [`FaultKind`] handle instead of an open-ended
//! error type. Kinds form a single-inheritance tree rooted at [`ROOT_KIND`],
//! so destination tables can match either a kind exactly or any of its
//! ancestors. All kinds are registered up front, during topology
//! construction; an unknown kind name is a configuration error, never a
//! dispatch-time surprise.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use thiserror::Error;

use crate::message::Record;

/// Name of the pre-seeded root kind. Every registered kind descends from it.
pub const ROOT_KIND: &str = "fault";

/// Stable handle to a registered fault kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FaultKind(usize);

/// Errors raised while registering or resolving fault kinds
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("unknown fault kind '{0}'")]
    UnknownKind(String),

    #[error("fault kind '{0}' is already registered with a different parent")]
    KindConflict(String),
}

#[derive(Debug)]
struct KindEntry {
    name: String,
    parent: Option<FaultKind>,
}

#[derive(Debug, Default)]
struct CatalogInner {
    kinds: Vec<KindEntry>,
    by_name: HashMap<String, FaultKind>,
}

/// Registry of fault kinds, shared by the topology and every node that can fail
///
/// The catalog is populated once while the topology is being built and is
/// read-only during dispatch.
#[derive(Debug)]
pub struct FaultCatalog {
    inner: RwLock<CatalogInner>,
}

impl Default for FaultCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl FaultCatalog {
    /// Create a catalog pre-seeded with the root kind
    pub fn new() -> Self {
        let mut inner = CatalogInner::default();
        inner.kinds.push(KindEntry {
            name: ROOT_KIND.to_string(),
            parent: None,
        });
        inner.by_name.insert(ROOT_KIND.to_string(), FaultKind(0));
        Self {
            inner: RwLock::new(inner),
        }
    }

    /// Handle of the root kind
    pub fn root(&self) -> FaultKind {
        FaultKind(0)
    }

    /// Register a kind under the given parent
    ///
    /// Re-registering the same name with the same parent returns the existing
    /// handle; the same name with a different parent is a conflict. The
    /// pre-seeded root has no parent, so re-registering its name always
    /// conflicts.
    pub fn register(
        &self,
        name: impl Into<String>,
        parent: FaultKind,
    ) -> Result<FaultKind, CatalogError> {
        let name = name.into();
        let mut inner = self.write();
        if let Some(&existing) = inner.by_name.get(&name) {
            if inner.kinds[existing.0].parent == Some(parent) {
                return Ok(existing);
            }
            return Err(CatalogError::KindConflict(name));
        }
        let handle = FaultKind(inner.kinds.len());
        inner.kinds.push(KindEntry {
            name: name.clone(),
            parent: Some(parent),
        });
        inner.by_name.insert(name, handle);
        Ok(handle)
    }

    /// Look up a kind by name
    pub fn resolve(&self, name: &str) -> Option<FaultKind> {
        self.read().by_name.get(name).copied()
    }

    /// Like [`resolve`](Self::resolve) but with a catalog error for setup paths
    pub fn resolve_required(&self, name: &str) -> Result<FaultKind, CatalogError> {
        self.resolve(name)
            .ok_or_else(|| CatalogError::UnknownKind(name.to_string()))
    }

    /// Display name of a kind
    pub fn name(&self, kind: FaultKind) -> String {
        self.read()
            .kinds
            .get(kind.0)
            .map(|entry| entry.name.clone())
            .unwrap_or_else(|| format!("kind#{}", kind.0))
    }

    /// Whether a registration for `registered` also covers `actual`
    ///
    /// True when the kinds are equal or `registered` is an ancestor of
    /// `actual` in the kind tree.
    pub fn is_assignable(&self, registered: FaultKind, actual: FaultKind) -> bool {
        if registered == actual {
            return true;
        }
        let inner = self.read();
        let mut cursor = inner.kinds.get(actual.0).and_then(|entry| entry.parent);
        while let Some(kind) = cursor {
            if kind == registered {
                return true;
            }
            cursor = inner.kinds.get(kind.0).and_then(|entry| entry.parent);
        }
        false
    }

    /// Number of registered kinds, root included
    pub fn len(&self) -> usize {
        self.read().kinds.len()
    }

    /// Always false: the root kind is seeded at construction
    pub fn is_empty(&self) -> bool {
        false
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, CatalogInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, CatalogInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A routable failure: what went wrong, tagged with its kind, plus the
/// record that provoked it when one is known
#[derive(Debug, Clone, PartialEq)]
pub struct Fault {
    kind: FaultKind,
    message: String,
    record: Option<Record>,
}

impl Fault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            record: None,
        }
    }

    /// Attach the record that caused the failure
    pub fn with_record(mut self, record: Record) -> Self {
        self.record = Some(record);
        self
    }

    pub fn kind(&self) -> FaultKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn record(&self) -> Option<&Record> {
        self.record.as_ref()
    }

    /// Serialize the fault into a record so it can travel as a payload
    /// to fault destinations
    pub fn to_record(&self, catalog: &FaultCatalog) -> Record {
        Record::new(serde_json::json!({
            "kind": catalog.name(self.kind),
            "message": self.message,
            "record": self.record.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_is_seeded() {
        let catalog = FaultCatalog::new();
        assert_eq!(catalog.resolve(ROOT_KIND), Some(catalog.root()));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_register_and_resolve() {
        let catalog = FaultCatalog::new();
        let io = catalog.register("io", catalog.root()).unwrap();
        let timeout = catalog.register("io.timeout", io).unwrap();

        assert_eq!(catalog.resolve("io"), Some(io));
        assert_eq!(catalog.resolve("io.timeout"), Some(timeout));
        assert_eq!(catalog.resolve("missing"), None);
        assert_eq!(catalog.name(timeout), "io.timeout");
    }

    #[test]
    fn test_reregistration_is_idempotent() {
        let catalog = FaultCatalog::new();
        let a = catalog.register("io", catalog.root()).unwrap();
        let b = catalog.register("io", catalog.root()).unwrap();
        assert_eq!(a, b);
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_conflicting_parent_rejected() {
        let catalog = FaultCatalog::new();
        let io = catalog.register("io", catalog.root()).unwrap();
        catalog.register("io.timeout", io).unwrap();

        let err = catalog.register("io.timeout", catalog.root()).unwrap_err();
        assert!(matches!(err, CatalogError::KindConflict(_)));
    }

    #[test]
    fn test_root_name_cannot_be_reparented() {
        let catalog = FaultCatalog::new();
        let io = catalog.register("io", catalog.root()).unwrap();

        let err = catalog.register(ROOT_KIND, io).unwrap_err();
        assert!(matches!(err, CatalogError::KindConflict(_)));
        // The root has no parent, so even claiming the root as its own
        // parent is a conflict.
        let err = catalog.register(ROOT_KIND, catalog.root()).unwrap_err();
        assert!(matches!(err, CatalogError::KindConflict(_)));
    }

    #[test]
    fn test_assignability_walks_ancestors() {
        let catalog = FaultCatalog::new();
        let io = catalog.register("io", catalog.root()).unwrap();
        let timeout = catalog.register("io.timeout", io).unwrap();
        let runtime = catalog.register("runtime", catalog.root()).unwrap();

        assert!(catalog.is_assignable(timeout, timeout));
        assert!(catalog.is_assignable(io, timeout));
        assert!(catalog.is_assignable(catalog.root(), timeout));
        assert!(!catalog.is_assignable(runtime, timeout));
        assert!(!catalog.is_assignable(timeout, io));
    }

    #[test]
    fn test_fault_to_record_names_kind() {
        let catalog = FaultCatalog::new();
        let io = catalog.register("io", catalog.root()).unwrap();
        let fault = Fault::new(io, "connection dropped").with_record(Record::from("row-7"));

        let record = fault.to_record(&catalog);
        let value = record.as_value();
        assert_eq!(value["kind"], "io");
        assert_eq!(value["message"], "connection dropped");
        assert_eq!(value["record"], "row-7");
    }
}
