//! DHT module
//!
//! The store engine the proxy fronts: keys, values, node statistics, the
//! async [`NodeHandle`] client interface and a local [`DhtRunner`].

pub mod infohash;
pub mod node;
pub mod routing;
pub mod stats;
pub mod value;
pub mod handle;
pub mod runner;

// Re-exports for convenience
pub use infohash::InfoHash;
pub use node::{Family, Node};
pub use routing::{KBucket, RoutingTable};
pub use stats::{NodeInfo, NodeStats, StorageStats};
pub use value::Value;
pub use handle::{Expiry, Lookup, LookupEvent, LookupSink, NodeHandle, PutCompletion, PutResolver};
pub use runner::{DhtRunner, RunnerConfig};
