//! Core message data structures

mod envelope;
mod metadata;
mod response;

pub use envelope::{Message, Record, Transaction};
pub use metadata::{Metadata, HISTORY_KEY};
pub use response::{Batch, Response};
