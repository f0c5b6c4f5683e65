//! In-memory [`NodeHandle`] for gateway tests.
//!
//! Results are produced from freshly spawned OS threads, the way a real node
//! answers from its own worker threads.

use crate::dht::{Expiry, InfoHash, Lookup, NodeHandle, NodeInfo, NodeStats, PutCompletion, Value};
use crate::error::ProxyError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
pub struct MockNode {
    values: Mutex<HashMap<InfoHash, Vec<Arc<Value>>>>,
    info: Mutex<NodeInfo>,
    info_calls: AtomicUsize,
    joins: AtomicUsize,
    fail_puts: AtomicBool,
    delivery_delay: Mutex<Duration>,
    last_put: Mutex<Option<(InfoHash, Expiry, bool)>>,
}

impl MockNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: InfoHash, value: Value) {
        self.values.lock().entry(key).or_default().push(Arc::new(value));
    }

    pub fn set_ipv4(&self, stats: NodeStats) {
        self.info.lock().ipv4 = stats;
    }

    pub fn fail_puts(&self) {
        self.fail_puts.store(true, Ordering::SeqCst);
    }

    pub fn set_delivery_delay(&self, delay: Duration) {
        *self.delivery_delay.lock() = delay;
    }

    pub fn info_calls(&self) -> usize {
        self.info_calls.load(Ordering::SeqCst)
    }

    pub fn joins(&self) -> usize {
        self.joins.load(Ordering::SeqCst)
    }

    pub fn stored(&self, key: &InfoHash) -> usize {
        self.values.lock().get(key).map_or(0, Vec::len)
    }

    pub fn last_put(&self) -> Option<(InfoHash, Expiry, bool)> {
        *self.last_put.lock()
    }
}

#[async_trait]
impl NodeHandle for MockNode {
    fn get(&self, key: InfoHash) -> Lookup {
        let (sink, lookup) = Lookup::channel(key);
        let values = self.values.lock().get(&key).cloned().unwrap_or_default();
        let delay = *self.delivery_delay.lock();
        std::thread::spawn(move || {
            for value in values {
                std::thread::sleep(delay);
                if !sink.deliver(value) {
                    return;
                }
            }
            sink.done(true);
        });
        lookup
    }

    fn put(&self, key: InfoHash, mut value: Value, expiry: Expiry, permanent: bool) -> PutCompletion {
        *self.last_put.lock() = Some((key, expiry, permanent));
        if self.fail_puts.load(Ordering::SeqCst) {
            return PutCompletion::failed(key, ProxyError::dht_error_with_key("mock put failure", key.to_hex()));
        }
        if value.id == 0 {
            value.id = 1;
        }
        let value = Arc::new(value);
        self.values.lock().entry(key).or_default().push(value.clone());
        let (reply, completion) = PutCompletion::channel(key);
        std::thread::spawn(move || {
            let _ = reply.send(Ok(value));
        });
        completion
    }

    async fn node_info(&self) -> NodeInfo {
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        self.info.lock().clone()
    }

    async fn bootstrap(&self, _host: &str, _port: u16) -> Result<usize, ProxyError> {
        Ok(0)
    }

    fn join(&self) {
        self.joins.fetch_add(1, Ordering::SeqCst);
    }
}
