//! Shared test nodes for routing integration tests
//!
//! Every node here records what it sees so a test can assert on the
//! messages that actually flowed, not just on the final outcome.

use std::sync::{Arc, Mutex};

use trellis::{Fault, FaultKind, Message, Node, NodeRole, Record, Response};

/// Inert named source; useful as a sender anchor for dispatched messages
pub struct Origin {
    id: String,
}

impl Origin {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self { id: id.to_string() })
    }
}

impl Node for Origin {
    fn id(&self) -> Option<&str> {
        Some(&self.id)
    }

    fn role(&self) -> NodeRole {
        NodeRole::Source
    }

    fn process(&self, _message: &Message) -> Result<Response, Fault> {
        Ok(Response::new())
    }
}

/// Passes its payload through unchanged and captures every message it sees
pub struct Relay {
    id: String,
    seen: Mutex<Vec<Message>>,
}

impl Relay {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn seen(&self) -> Vec<Message> {
        self.seen.lock().unwrap().clone()
    }
}

impl Node for Relay {
    fn id(&self) -> Option<&str> {
        Some(&self.id)
    }

    fn process(&self, message: &Message) -> Result<Response, Fault> {
        self.seen.lock().unwrap().push(message.clone());
        Ok(Response::output(message.payload().to_vec()))
    }
}

/// Rejects its entire payload into the discard stream
pub struct Rejector {
    id: String,
    seen: Mutex<Vec<Message>>,
}

impl Rejector {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn seen(&self) -> Vec<Message> {
        self.seen.lock().unwrap().clone()
    }
}

impl Node for Rejector {
    fn id(&self) -> Option<&str> {
        Some(&self.id)
    }

    fn process(&self, message: &Message) -> Result<Response, Fault> {
        self.seen.lock().unwrap().push(message.clone());
        let mut response = Response::new();
        for record in message.payload() {
            response.push_discard(record.clone());
        }
        Ok(response)
    }
}

/// Fails every call with a fault of the configured kind
pub struct Failing {
    id: String,
    kind: FaultKind,
}

impl Failing {
    pub fn new(id: &str, kind: FaultKind) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            kind,
        })
    }
}

impl Node for Failing {
    fn id(&self) -> Option<&str> {
        Some(&self.id)
    }

    fn process(&self, _message: &Message) -> Result<Response, Fault> {
        Err(Fault::new(self.kind, "induced failure"))
    }
}

/// Terminal node: captures messages and routes nothing further
pub struct Terminal {
    id: String,
    seen: Mutex<Vec<Message>>,
}

impl Terminal {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn seen(&self) -> Vec<Message> {
        self.seen.lock().unwrap().clone()
    }

    pub fn records(&self) -> Vec<Record> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .flat_map(|message| message.payload().to_vec())
            .collect()
    }
}

impl Node for Terminal {
    fn id(&self) -> Option<&str> {
        Some(&self.id)
    }

    fn role(&self) -> NodeRole {
        NodeRole::Sink
    }

    fn process(&self, message: &Message) -> Result<Response, Fault> {
        self.seen.lock().unwrap().push(message.clone());
        Ok(Response::new())
    }
}
