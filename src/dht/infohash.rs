//! DHT key module
//!
//! 160-bit identifiers used both for stored keys and for node ids.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha1::{Digest, Sha1};
use std::fmt;

/// Width of an identifier in bytes
pub const HASH_LEN: usize = 20;

/// DHT identifier (20 bytes)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InfoHash(pub [u8; HASH_LEN]);

impl InfoHash {
    /// Create a new InfoHash from bytes
    pub fn new(id: [u8; HASH_LEN]) -> Self {
        Self(id)
    }

    /// Generate a random InfoHash
    pub fn random() -> Self {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let mut id = [0u8; HASH_LEN];
        rng.fill(&mut id);
        Self(id)
    }

    /// Hash arbitrary data into the identifier space
    pub fn get(data: impl AsRef<[u8]>) -> Self {
        let digest = Sha1::digest(data.as_ref());
        let mut id = [0u8; HASH_LEN];
        id.copy_from_slice(&digest);
        Self(id)
    }

    /// Derive a key from a request path segment.
    ///
    /// A 40 digit hex string is taken verbatim; anything else (including the
    /// all-zero id, which is not a valid key) is hashed with SHA-1. Never fails.
    pub fn parse_or_hash(raw: &str) -> Self {
        Self::from_hex(raw)
            .filter(|hash| !hash.is_zero())
            .unwrap_or_else(|| Self::get(raw))
    }

    /// Check whether every byte is zero
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Get the InfoHash as a hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse an InfoHash from a hex string
    pub fn from_hex(hex_str: &str) -> Option<Self> {
        hex::decode(hex_str)
            .ok()
            .and_then(|bytes| {
                if bytes.len() == HASH_LEN {
                    let mut id = [0u8; HASH_LEN];
                    id.copy_from_slice(&bytes);
                    Some(Self(id))
                } else {
                    None
                }
            })
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for InfoHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for InfoHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex_str = String::deserialize(deserializer)?;
        InfoHash::from_hex(&hex_str)
            .ok_or_else(|| serde::de::Error::custom("expected 40 hex digits"))
    }
}
