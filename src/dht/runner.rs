//! DHT runner module
//!
//! An in-process [`NodeHandle`] implementation. The node state lives on a
//! dedicated worker thread driving its own single-threaded tokio runtime;
//! callers talk to it through a command channel and receive results through
//! the typed continuations of [`crate::dht::handle`].

use crate::dht::handle::{Expiry, Lookup, LookupSink, NodeHandle, PutCompletion, PutResolver};
use crate::dht::infohash::InfoHash;
use crate::dht::node::{Family, Node};
use crate::dht::routing::RoutingTable;
use crate::dht::stats::{NodeInfo, StorageStats};
use crate::dht::value::{Value, INVALID_ID};
use crate::error::ProxyError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::time::interval;
use tracing::{debug, error, info, trace, warn};

/// Store-engine settings
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Lifetime of a non-permanent value
    pub value_lifetime: Duration,
    /// Maximum number of values kept under one key
    pub max_values_per_key: usize,
    /// How often expired values are dropped
    pub sweep_interval: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            value_lifetime: Duration::from_secs(10 * 60),
            max_values_per_key: 64,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

enum Command {
    Get {
        sink: LookupSink,
    },
    Put {
        key: InfoHash,
        value: Value,
        expiry: Expiry,
        permanent: bool,
        reply: PutResolver,
    },
    NodeInfo {
        reply: oneshot::Sender<NodeInfo>,
    },
    AddNodes {
        nodes: Vec<Node>,
        reply: Option<oneshot::Sender<usize>>,
    },
}

/// Handle to a running local DHT node
pub struct DhtRunner {
    id: InfoHash,
    commands: Mutex<Option<mpsc::UnboundedSender<Command>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DhtRunner {
    /// Start a node with a random id on its own worker thread
    pub fn run(config: RunnerConfig) -> Result<Arc<Self>, ProxyError> {
        let id = InfoHash::random();
        let (tx, rx) = mpsc::unbounded_channel();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ProxyError::dht_error_full("Failed to build node runtime", id.to_hex(), e.to_string()))?;

        let worker = std::thread::Builder::new()
            .name("dht-node".to_string())
            .spawn(move || {
                runtime.block_on(NodeWorker::new(id, config).run(rx));
            })
            .map_err(|e| ProxyError::dht_error_full("Failed to spawn node thread", id.to_hex(), e.to_string()))?;

        info!("DHT node running with ID: {}", id);
        Ok(Arc::new(Self {
            id,
            commands: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        }))
    }

    /// Our node id
    pub fn id(&self) -> InfoHash {
        self.id
    }

    /// Whether the worker thread still accepts commands
    pub fn is_running(&self) -> bool {
        self.commands.lock().as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Record a peer that answered us
    pub fn insert_node(&self, node: Node) {
        if self.send(Command::AddNodes { nodes: vec![node], reply: None }).is_err() {
            warn!("Dropping node update: DHT node is stopped");
        }
    }

    fn send(&self, command: Command) -> Result<(), ProxyError> {
        match self.commands.lock().as_ref() {
            Some(tx) => tx
                .send(command)
                .map_err(|_| ProxyError::dht_error("DHT node worker has exited")),
            None => Err(ProxyError::dht_error("DHT node is stopped")),
        }
    }
}

#[async_trait]
impl NodeHandle for DhtRunner {
    fn get(&self, key: InfoHash) -> Lookup {
        let (sink, lookup) = Lookup::channel(key);
        if let Err(e) = self.send(Command::Get { sink }) {
            // The sink went down with the command, the lookup reads Done(false).
            debug!("Lookup for {} not started: {}", key, e);
        }
        lookup
    }

    fn put(&self, key: InfoHash, value: Value, expiry: Expiry, permanent: bool) -> PutCompletion {
        let (reply, completion) = PutCompletion::channel(key);
        let command = Command::Put { key, value, expiry, permanent, reply };
        match self.send(command) {
            Ok(()) => completion,
            Err(e) => PutCompletion::failed(key, e.with_context(format!("put {}", key))),
        }
    }

    async fn node_info(&self) -> NodeInfo {
        let (reply, rx) = oneshot::channel();
        if self.send(Command::NodeInfo { reply }).is_err() {
            return NodeInfo { id: self.id, ..Default::default() };
        }
        rx.await.unwrap_or_else(|_| NodeInfo { id: self.id, ..Default::default() })
    }

    async fn bootstrap(&self, host: &str, port: u16) -> Result<usize, ProxyError> {
        info!("Bootstrapping from {}:{}", host, port);
        let addrs = tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| ProxyError::network_error_full("Failed to resolve bootstrap host", format!("{}:{}", host, port), e.to_string()))?;

        let nodes: Vec<Node> = addrs
            .map(|addr| Node::unconfirmed(Node::id_for_addr(&addr), addr))
            .collect();
        if nodes.is_empty() {
            return Err(ProxyError::network_error_full(
                "Bootstrap host resolved to no address",
                format!("{}:{}", host, port),
                "empty lookup",
            ));
        }

        let (reply, rx) = oneshot::channel();
        self.send(Command::AddNodes { nodes, reply: Some(reply) })?;
        let added = rx
            .await
            .map_err(|_| ProxyError::dht_error("DHT node stopped during bootstrap"))?;
        info!("Added {} bootstrap nodes", added);
        Ok(added)
    }

    fn join(&self) {
        // Closing the channel ends the worker loop.
        let had_sender = self.commands.lock().take().is_some();
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                error!("DHT node worker panicked");
            }
            info!("DHT node {} stopped", self.id);
        } else if had_sender {
            warn!("DHT node had no worker thread to join");
        }
    }
}

impl Drop for DhtRunner {
    fn drop(&mut self) {
        self.join();
    }
}

struct StoredValue {
    value: Arc<Value>,
    expiry: Expiry,
}

/// State owned by the worker thread
struct NodeWorker {
    config: RunnerConfig,
    storage: HashMap<InfoHash, Vec<StoredValue>>,
    ipv4: RoutingTable,
    ipv6: RoutingTable,
    id: InfoHash,
}

impl NodeWorker {
    fn new(id: InfoHash, config: RunnerConfig) -> Self {
        Self {
            config,
            storage: HashMap::new(),
            ipv4: RoutingTable::new(id),
            ipv6: RoutingTable::new(id),
            id,
        }
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        debug!("DHT node worker started");
        let mut sweep_interval = interval(self.config.sweep_interval);

        loop {
            tokio::select! {
                command = commands.recv() => {
                    match command {
                        Some(command) => self.handle(command),
                        None => break,
                    }
                }
                _ = sweep_interval.tick() => {
                    self.expire_values(Instant::now());
                }
            }
        }

        debug!("DHT node worker loop finished");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Get { sink } => self.lookup(sink),
            Command::Put { key, value, expiry, permanent, reply } => {
                let result = self.store(key, value, expiry, permanent, Instant::now());
                if let Err(e) = &result {
                    warn!("Put on {} failed: {}", key, e);
                }
                let _ = reply.send(result);
            }
            Command::NodeInfo { reply } => {
                let _ = reply.send(self.node_info());
            }
            Command::AddNodes { nodes, reply } => {
                let mut added = 0;
                for node in nodes {
                    if self.add_node(node) {
                        added += 1;
                    }
                }
                if let Some(reply) = reply {
                    let _ = reply.send(added);
                }
            }
        }
    }

    fn lookup(&mut self, sink: LookupSink) {
        let key = sink.key();
        let now = Instant::now();
        let values: Vec<Arc<Value>> = self
            .storage
            .get(&key)
            .map(|stored| {
                stored
                    .iter()
                    .filter(|s| !s.expiry.is_expired(now))
                    .map(|s| s.value.clone())
                    .collect()
            })
            .unwrap_or_default();

        debug!("Lookup {}: {} local values", key, values.len());
        for value in values {
            trace!("Delivering {} for {}", value, key);
            if !sink.deliver(value) {
                debug!("Lookup {} abandoned by consumer", key);
                return;
            }
        }
        sink.done(true);
    }

    fn store(
        &mut self,
        key: InfoHash,
        mut value: Value,
        expiry: Expiry,
        permanent: bool,
        now: Instant,
    ) -> Result<Arc<Value>, ProxyError> {
        let expiry = if permanent {
            expiry
        } else {
            expiry.earliest(Expiry::At(now + self.config.value_lifetime))
        };

        let values = self.storage.entry(key).or_default();
        values.retain(|s| !s.expiry.is_expired(now));

        if value.id == INVALID_ID {
            value.id = loop {
                let id = rand::random::<u64>();
                if id != INVALID_ID && values.iter().all(|s| s.value.id != id) {
                    break id;
                }
            };
        }

        if let Some(existing) = values.iter_mut().find(|s| s.value.id == value.id) {
            if value.seq < existing.value.seq {
                return Err(ProxyError::dht_error_with_key(
                    format!("Sequence number {} is older than stored {}", value.seq, existing.value.seq),
                    key.to_hex(),
                ));
            }
            let value = Arc::new(value);
            existing.value = value.clone();
            existing.expiry = expiry;
            debug!("Updated {} under {}", value, key);
            return Ok(value);
        }

        if values.len() >= self.config.max_values_per_key {
            return Err(ProxyError::dht_error_with_key(
                format!("Key already holds {} values", values.len()),
                key.to_hex(),
            ));
        }

        let value = Arc::new(value);
        values.push(StoredValue { value: value.clone(), expiry });
        debug!("Stored {} under {}{}", value, key, if permanent { " (permanent)" } else { "" });
        Ok(value)
    }

    fn expire_values(&mut self, now: Instant) {
        let initial_count: usize = self.storage.values().map(|v| v.len()).sum();
        for values in self.storage.values_mut() {
            values.retain(|s| !s.expiry.is_expired(now));
        }
        self.storage.retain(|_, values| !values.is_empty());

        let removed = initial_count - self.storage.values().map(|v| v.len()).sum::<usize>();
        if removed > 0 {
            debug!("Expired {} values", removed);
        }
    }

    fn add_node(&mut self, node: Node) -> bool {
        match node.family() {
            Family::Ipv4 => self.ipv4.add_node(node),
            Family::Ipv6 => self.ipv6.add_node(node),
        }
    }

    fn node_info(&self) -> NodeInfo {
        NodeInfo {
            id: self.id,
            ipv4: self.ipv4.stats(),
            ipv6: self.ipv6.stats(),
            storage: StorageStats {
                keys: self.storage.len(),
                values: self.storage.values().map(|v| v.len()).sum(),
            },
        }
    }
}
