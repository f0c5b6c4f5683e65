//! DHT node module
//!
//! Represents a peer known to the local routing table.

use crate::dht::infohash::InfoHash;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// How long a confirmed node stays good without being heard from
pub const NODE_GOOD_TIME: Duration = Duration::from_secs(15 * 60);

/// Address family of a peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Ipv4,
    Ipv6,
}

impl Family {
    /// Family of a socket address; IPv4-mapped IPv6 addresses count as IPv4
    pub fn of(addr: &SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(_) => Family::Ipv4,
            SocketAddr::V6(v6) if v6.ip().to_ipv4_mapped().is_some() => Family::Ipv4,
            SocketAddr::V6(_) => Family::Ipv6,
        }
    }
}

/// Represents a DHT node
#[derive(Debug, Clone)]
pub struct Node {
    /// Node identifier
    pub id: InfoHash,
    /// Node address
    pub addr: SocketAddr,
    /// When the node was last heard from
    pub last_seen: Instant,
    /// Whether the node ever answered us
    pub confirmed: bool,
}

impl Node {
    /// Create a node that answered us
    pub fn new(id: InfoHash, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            confirmed: true,
        }
    }

    /// Create a node we only know about (e.g. from a bootstrap list)
    pub fn unconfirmed(id: InfoHash, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            confirmed: false,
        }
    }

    /// Node id for an address we have no id for yet
    pub fn id_for_addr(addr: &SocketAddr) -> InfoHash {
        InfoHash::get(addr.to_string())
    }

    /// Address family of this node
    pub fn family(&self) -> Family {
        Family::of(&self.addr)
    }

    /// Check if node is responsive (confirmed and seen within 15 minutes)
    pub fn is_good(&self) -> bool {
        self.confirmed && self.last_seen.elapsed() < NODE_GOOD_TIME
    }

    /// Record that the node answered us
    pub fn update_last_seen(&mut self) {
        self.last_seen = Instant::now();
        self.confirmed = true;
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Node {}

impl std::hash::Hash for Node {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
