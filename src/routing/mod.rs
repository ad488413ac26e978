//! Topology, dispatcher, and the linear-chain builder

mod map;
mod metrics;
mod pipeline;
mod router;

pub use map::{ConfigError, RoutingMap};
pub use metrics::{MetricsSnapshot, RouterMetrics};
pub use pipeline::Pipeline;
pub use router::{DispatchError, Router, RouterConfig};
