//! Node statistics reported by the store engine

use crate::dht::infohash::InfoHash;
use serde::ser::{Serialize, SerializeStruct, Serializer};

/// Routing table health for one address family
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeStats {
    /// Confirmed nodes heard from recently
    pub good_nodes: usize,
    /// Known nodes that are not (or no longer) good
    pub dubious_nodes: usize,
    /// Non-empty buckets
    pub buckets: usize,
}

impl NodeStats {
    /// All nodes the table knows about
    pub fn known_nodes(&self) -> usize {
        self.good_nodes + self.dubious_nodes
    }
}

impl Serialize for NodeStats {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("NodeStats", 4)?;
        state.serialize_field("good", &self.good_nodes)?;
        state.serialize_field("dubious", &self.dubious_nodes)?;
        state.serialize_field("known", &self.known_nodes())?;
        state.serialize_field("buckets", &self.buckets)?;
        state.end()
    }
}

/// Local storage counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct StorageStats {
    pub keys: usize,
    pub values: usize,
}

/// Snapshot of a node's state, as served by `GET /`
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct NodeInfo {
    /// Node id
    pub id: InfoHash,
    pub ipv4: NodeStats,
    pub ipv6: NodeStats,
    pub storage: StorageStats,
}

impl NodeInfo {
    /// True when neither family has a good node, i.e. the node is not (yet)
    /// connected or the snapshot was never filled.
    pub fn is_disconnected(&self) -> bool {
        self.ipv4.good_nodes == 0 && self.ipv6.good_nodes == 0
    }
}
