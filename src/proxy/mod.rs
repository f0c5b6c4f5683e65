//! Proxy module
//!
//! HTTP/JSON gateway exposing a DHT node: routes, handlers, the streaming
//! response bridge and the server lifecycle.

pub mod cache;
pub mod handlers;
pub mod response;
pub mod router;
pub mod server;
pub mod stream;

#[cfg(test)]
pub(crate) mod mock;

// Re-exports for convenience
pub use cache::NodeInfoCache;
pub use handlers::ProxyState;
pub use router::create_router;
pub use server::{default_threads, DhtProxyServer, ProxyConfig};
pub use stream::ResponseStream;
