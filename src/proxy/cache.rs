//! Node statistics cache
//!
//! `GET /` may be polled often; asking the node for fresh statistics every time
//! is wasteful. The cache only queries the node while the cached snapshot says
//! the node is disconnected (no good peer in either family). Once the node has
//! peers, the snapshot is served as is, however old it gets.

use crate::dht::{NodeHandle, NodeInfo};
use tokio::sync::Mutex;
use tracing::debug;

/// Lazily refreshed node statistics
#[derive(Debug, Default)]
pub struct NodeInfoCache {
    snapshot: Mutex<NodeInfo>,
}

impl NodeInfoCache {
    /// Create an empty cache; the first read always queries the node
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot, refreshed from `node` while it reads as disconnected.
    ///
    /// The refresh runs under the lock, so concurrent readers wait for it and
    /// never observe a half-written snapshot.
    pub async fn get(&self, node: &dyn NodeHandle) -> NodeInfo {
        let mut snapshot = self.snapshot.lock().await;
        if snapshot.is_disconnected() {
            debug!("Node info cache empty, querying node");
            *snapshot = node.node_info().await;
        }
        snapshot.clone()
    }
}
