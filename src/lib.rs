//! dht-proxy
//!
//! HTTP/JSON gateway in front of a DHT node: node statistics, streamed
//! lookups and single-shot puts over plain HTTP.

pub mod dht;
pub mod proxy;
pub mod cli;
pub mod error;

pub use error::ProxyError;

pub use dht::{
    DhtRunner, Expiry, InfoHash, Lookup, LookupEvent, NodeHandle, NodeInfo, NodeStats,
    PutCompletion, RunnerConfig, Value,
};
pub use proxy::{create_router, DhtProxyServer, ProxyConfig, ProxyState};
pub use cli::{CliArgs, Config};
