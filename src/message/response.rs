//! Response: the categorized result of one node processing one message

use crate::fault::Fault;
use crate::message::Record;

/// One run of same-category results within a response
#[derive(Debug, Clone, PartialEq)]
pub enum Batch {
    /// Records to forward to the node's process destinations
    Output(Vec<Record>),
    /// Records the node rejected; diverted to its discard destinations
    Discard(Vec<Record>),
    /// Failures, each carrying the record that provoked it when known
    Exception(Vec<Fault>),
}

impl Batch {
    pub fn len(&self) -> usize {
        match self {
            Batch::Output(records) | Batch::Discard(records) => records.len(),
            Batch::Exception(faults) => faults.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ordered sequence of result batches
///
/// Consecutive appends of the same category collapse into the trailing
/// batch; a category change starts a new batch. This preserves the relative
/// order in which a node emitted mixed results. An empty response is the
/// normal terminal case for sink nodes: nothing further to route.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    batches: Vec<Batch>,
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    /// A response holding a single output batch
    pub fn output(records: Vec<Record>) -> Self {
        if records.is_empty() {
            return Self::new();
        }
        Self {
            batches: vec![Batch::Output(records)],
        }
    }

    /// A response holding a single exception batch with one fault
    pub fn from_fault(fault: Fault) -> Self {
        Self {
            batches: vec![Batch::Exception(vec![fault])],
        }
    }

    pub fn push_output(&mut self, record: Record) {
        match self.batches.last_mut() {
            Some(Batch::Output(records)) => records.push(record),
            _ => self.batches.push(Batch::Output(vec![record])),
        }
    }

    pub fn push_discard(&mut self, record: Record) {
        match self.batches.last_mut() {
            Some(Batch::Discard(records)) => records.push(record),
            _ => self.batches.push(Batch::Discard(vec![record])),
        }
    }

    pub fn push_exception(&mut self, fault: Fault) {
        match self.batches.last_mut() {
            Some(Batch::Exception(faults)) => faults.push(fault),
            _ => self.batches.push(Batch::Exception(vec![fault])),
        }
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn into_batches(self) -> Vec<Batch> {
        self.batches
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}
