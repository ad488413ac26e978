//! Message: the unit of work passed between nodes

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::metadata::Metadata;
use crate::node::NodeHandle;

/// A single payload record, opaque to the routing core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Value);

impl Record {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_str()
    }
}

impl From<Value> for Record {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl From<&str> for Record {
    fn from(text: &str) -> Self {
        Self(Value::String(text.to_string()))
    }
}

impl From<String> for Record {
    fn from(text: String) -> Self {
        Self(Value::String(text))
    }
}

/// Opaque transactional handle threaded through a chain unchanged
///
/// The routing core never begins or commits a transaction; it only carries
/// the handle so downstream connectors can enlist in it.
#[derive(Clone)]
pub struct Transaction(Arc<dyn Any + Send + Sync>);

impl Transaction {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn downcast_ref<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }

    /// Whether two handles refer to the same underlying transaction
    pub fn same_handle(&self, other: &Transaction) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Transaction(<opaque>)")
    }
}

/// The unit of work dispatched through the topology
///
/// A message is created fresh at every hop: the router wraps each result
/// batch in a new message whose sender is the node that produced the batch.
/// The transaction handle and metadata are carried over unchanged.
#[derive(Debug, Clone)]
pub struct Message {
    id: Uuid,
    payload: Vec<Record>,
    sender: NodeHandle,
    transaction: Option<Transaction>,
    metadata: Option<Metadata>,
}

impl Message {
    pub fn new(payload: Vec<Record>, sender: NodeHandle) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload,
            sender,
            transaction: None,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_transaction(mut self, transaction: Transaction) -> Self {
        self.transaction = Some(transaction);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn payload(&self) -> &[Record] {
        &self.payload
    }

    pub fn sender(&self) -> NodeHandle {
        self.sender
    }

    pub fn transaction(&self) -> Option<&Transaction> {
        self.transaction.as_ref()
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    pub fn metadata_mut(&mut self) -> Option<&mut Metadata> {
        self.metadata.as_mut()
    }

    pub fn set_metadata(&mut self, metadata: Option<Metadata>) {
        self.metadata = metadata;
    }

    /// Build the next-hop message for a result batch produced by `sender`
    ///
    /// Gets a fresh id; carries the transaction handle and the (shared)
    /// metadata over from this message.
    pub fn derive(&self, payload: Vec<Record>, sender: NodeHandle) -> Message {
        Message {
            id: Uuid::new_v4(),
            payload,
            sender,
            transaction: self.transaction.clone(),
            metadata: self.metadata.clone(),
        }
    }

    /// Build a fault-carrier message: same transaction, no metadata
    pub fn derive_bare(&self, payload: Vec<Record>, sender: NodeHandle) -> Message {
        Message {
            id: Uuid::new_v4(),
            payload,
            sender,
            transaction: self.transaction.clone(),
            metadata: None,
        }
    }
}
