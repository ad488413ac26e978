//! Adapter layer: lifts plain collaborator traits into the [`Node`] contract
//!
//! External collaborators come in four flavors — sources, per-record
//! mappers, metadata-aware enrichers, and sinks. Each gets a thin wrapper
//! node so the topology and the router only ever see the uniform contract.
//! Wrappers are created through [`NodeRegistry`](super::NodeRegistry)'s
//! `register_*` methods, which memoize on the collaborator instance.

use std::sync::Arc;

use crate::fault::Fault;
use crate::message::{Message, Metadata, Record, Response};

use super::{Node, NodeRole};

/// What a mapper decided to do with one record
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    /// Emit zero or more replacement records
    Emit(Vec<Record>),
    /// Reject the record into the discard stream
    Discard,
}

/// A collaborator that produces records on demand
pub trait RecordSource: Send + Sync {
    fn id(&self) -> Option<&str> {
        None
    }

    fn poll(&self) -> Result<Vec<Record>, Fault>;
}

/// A collaborator that transforms records one at a time
pub trait RecordMapper: Send + Sync {
    fn id(&self) -> Option<&str> {
        None
    }

    fn map(&self, record: &Record) -> Result<Disposition, Fault>;
}

/// A mapper with read access to the message metadata
pub trait RecordEnricher: Send + Sync {
    fn id(&self) -> Option<&str> {
        None
    }

    fn enrich(&self, record: &Record, metadata: Option<&Metadata>) -> Result<Vec<Record>, Fault>;
}

/// A collaborator that delivers records externally
pub trait RecordSink: Send + Sync {
    fn id(&self) -> Option<&str> {
        None
    }

    fn deliver(&self, records: &[Record]) -> Result<(), Fault>;
}

/// Node wrapper for a [`RecordSource`]; emits a single output batch
pub struct SourceNode {
    source: Arc<dyn RecordSource>,
}

impl SourceNode {
    pub fn new(source: Arc<dyn RecordSource>) -> Self {
        Self { source }
    }
}

impl Node for SourceNode {
    fn id(&self) -> Option<&str> {
        self.source.id()
    }

    fn role(&self) -> NodeRole {
        NodeRole::Source
    }

    fn process(&self, _message: &Message) -> Result<Response, Fault> {
        Ok(Response::output(self.source.poll()?))
    }
}

/// Node wrapper for a [`RecordMapper`]; walks the payload record by record
///
/// A per-record fault does not abort the batch: it becomes an exception
/// entry carrying the offending record, in emit order relative to the
/// surrounding results.
pub struct MapperNode {
    mapper: Arc<dyn RecordMapper>,
}

impl MapperNode {
    pub fn new(mapper: Arc<dyn RecordMapper>) -> Self {
        Self { mapper }
    }
}

impl Node for MapperNode {
    fn id(&self) -> Option<&str> {
        self.mapper.id()
    }

    fn process(&self, message: &Message) -> Result<Response, Fault> {
        let mut response = Response::new();
        for record in message.payload() {
            match self.mapper.map(record) {
                Ok(Disposition::Emit(records)) => {
                    for emitted in records {
                        response.push_output(emitted);
                    }
                }
                Ok(Disposition::Discard) => response.push_discard(record.clone()),
                Err(fault) => response.push_exception(fault.with_record(record.clone())),
            }
        }
        Ok(response)
    }
}

/// Node wrapper for a [`RecordEnricher`]
pub struct EnricherNode {
    enricher: Arc<dyn RecordEnricher>,
}

impl EnricherNode {
    pub fn new(enricher: Arc<dyn RecordEnricher>) -> Self {
        Self { enricher }
    }
}

impl Node for EnricherNode {
    fn id(&self) -> Option<&str> {
        self.enricher.id()
    }

    fn process(&self, message: &Message) -> Result<Response, Fault> {
        let mut response = Response::new();
        for record in message.payload() {
            match self.enricher.enrich(record, message.metadata()) {
                Ok(records) => {
                    for emitted in records {
                        response.push_output(emitted);
                    }
                }
                Err(fault) => response.push_exception(fault.with_record(record.clone())),
            }
        }
        Ok(response)
    }
}

/// Node wrapper for a [`RecordSink`]; returns an empty response on success
pub struct SinkNode {
    sink: Arc<dyn RecordSink>,
}

impl SinkNode {
    pub fn new(sink: Arc<dyn RecordSink>) -> Self {
        Self { sink }
    }
}

impl Node for SinkNode {
    fn id(&self) -> Option<&str> {
        self.sink.id()
    }

    fn role(&self) -> NodeRole {
        NodeRole::Sink
    }

    fn process(&self, message: &Message) -> Result<Response, Fault> {
        self.sink.deliver(message.payload())?;
        Ok(Response::new())
    }
}
