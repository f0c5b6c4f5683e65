//! Store-engine client interface
//!
//! The proxy talks to the DHT through [`NodeHandle`]. Results come back as
//! typed continuations instead of callbacks:
//!
//! - a lookup hands out a [`Lookup`] receiver; the engine keeps the matching
//!   [`LookupSink`], delivers zero or more values through it and finally
//!   consumes it with [`LookupSink::done`]. Deliveries and the terminal event
//!   travel over one FIFO channel, so every value is observed before the end.
//! - a put hands out a [`PutCompletion`] resolved exactly once, with the
//!   value as actually stored (the engine may assign its id).
//!
//! Either side may go away early. A dropped [`Lookup`] makes
//! [`LookupSink::deliver`] return `false`, telling the engine to stop. A
//! dropped sink or completion sender reads as a failed operation.

use crate::dht::infohash::InfoHash;
use crate::dht::stats::NodeInfo;
use crate::dht::value::Value;
use crate::error::ProxyError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};

/// How long a stored value should live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Keep until the store's own policy drops it
    Never,
    /// Drop at this instant
    At(Instant),
}

impl Expiry {
    /// Whether the deadline has passed
    pub fn is_expired(&self, now: Instant) -> bool {
        match self {
            Expiry::Never => false,
            Expiry::At(at) => *at <= now,
        }
    }

    /// The earlier of two expiries
    pub fn earliest(self, other: Expiry) -> Expiry {
        match (self, other) {
            (Expiry::Never, e) | (e, Expiry::Never) => e,
            (Expiry::At(a), Expiry::At(b)) => Expiry::At(a.min(b)),
        }
    }
}

/// Event observed by the consumer of a lookup
#[derive(Debug, Clone)]
pub enum LookupEvent {
    /// One matching value
    Value(Arc<Value>),
    /// The lookup is over; `false` when it was abandoned or failed
    Done(bool),
}

/// Consumer side of a lookup
#[derive(Debug)]
pub struct Lookup {
    key: InfoHash,
    rx: mpsc::UnboundedReceiver<LookupEvent>,
    finished: bool,
}

/// Engine side of a lookup
#[derive(Debug)]
pub struct LookupSink {
    key: InfoHash,
    tx: mpsc::UnboundedSender<LookupEvent>,
}

impl Lookup {
    /// Create a connected lookup pair for `key`
    pub fn channel(key: InfoHash) -> (LookupSink, Lookup) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            LookupSink { key, tx },
            Lookup { key, rx, finished: false },
        )
    }

    /// Key being looked up
    pub fn key(&self) -> InfoHash {
        self.key
    }

    /// Next event. Yields exactly one `Done`, then `None` forever.
    ///
    /// A sink dropped without calling `done` is reported as `Done(false)`.
    pub async fn next(&mut self) -> Option<LookupEvent> {
        if self.finished {
            return None;
        }
        match self.rx.recv().await {
            Some(LookupEvent::Done(ok)) => {
                self.finished = true;
                Some(LookupEvent::Done(ok))
            }
            Some(event) => Some(event),
            None => {
                self.finished = true;
                Some(LookupEvent::Done(false))
            }
        }
    }
}

impl LookupSink {
    /// Key being looked up
    pub fn key(&self) -> InfoHash {
        self.key
    }

    /// Deliver one value. Returns `false` once the consumer is gone and the
    /// engine should stop looking.
    pub fn deliver(&self, value: Arc<Value>) -> bool {
        self.tx.send(LookupEvent::Value(value)).is_ok()
    }

    /// Terminate the lookup
    pub fn done(self, ok: bool) {
        let _ = self.tx.send(LookupEvent::Done(ok));
    }
}

/// Single completion of a put
#[derive(Debug)]
pub struct PutCompletion {
    key: InfoHash,
    rx: oneshot::Receiver<Result<Arc<Value>, ProxyError>>,
}

/// Engine side of a [`PutCompletion`]
pub type PutResolver = oneshot::Sender<Result<Arc<Value>, ProxyError>>;

impl PutCompletion {
    /// Create a connected completion pair for `key`
    pub fn channel(key: InfoHash) -> (PutResolver, PutCompletion) {
        let (tx, rx) = oneshot::channel();
        (tx, PutCompletion { key, rx })
    }

    /// A completion that already failed
    pub fn failed(key: InfoHash, err: ProxyError) -> PutCompletion {
        let (tx, completion) = Self::channel(key);
        let _ = tx.send(Err(err));
        completion
    }

    /// Wait for the store's answer
    pub async fn wait(self) -> Result<Arc<Value>, ProxyError> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(ProxyError::dht_error_with_key(
                "Put abandoned by the node",
                self.key.to_hex(),
            )),
        }
    }
}

/// Async client of a DHT node.
///
/// Implementations must be safe to call concurrently from many HTTP handlers;
/// results are produced on the node's own threads.
#[async_trait]
pub trait NodeHandle: Send + Sync + 'static {
    /// Look up every value stored under `key`
    fn get(&self, key: InfoHash) -> Lookup;

    /// Store `value` under `key`
    fn put(&self, key: InfoHash, value: Value, expiry: Expiry, permanent: bool) -> PutCompletion;

    /// Current routing table and storage statistics
    async fn node_info(&self) -> NodeInfo;

    /// Resolve `host:port` and add the addresses as bootstrap nodes.
    /// Returns how many nodes were added.
    async fn bootstrap(&self, host: &str, port: u16) -> Result<usize, ProxyError>;

    /// Stop the node and wait for its background thread. Idempotent.
    fn join(&self);
}
