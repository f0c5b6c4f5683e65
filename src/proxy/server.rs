//! Proxy server lifecycle
//!
//! [`DhtProxyServer`] binds the listener, then runs the HTTP engine on a
//! dedicated thread with its own multi-threaded runtime. [`DhtProxyServer::stop`]
//! may be called from any other thread: it closes the listener, lets in-flight
//! requests (streamed lookups included) drain for a bounded time, joins the
//! engine thread and finally joins the node, which must outlive every request
//! that references it.

use crate::dht::NodeHandle;
use crate::error::ProxyError;
use crate::proxy::handlers::ProxyState;
use crate::proxy::router::create_router;
use axum::Router;
use parking_lot::Mutex;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Server settings
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Address to listen on
    pub listen_addr: SocketAddr,
    /// HTTP worker threads
    pub threads: usize,
    /// Limit for a handler to produce its response
    pub request_timeout: Duration,
    /// How long in-flight requests may run after `stop()` before being cut
    pub drain_timeout: Duration,
    /// Advertise signed/encrypted operations
    pub identity: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            threads: default_threads(),
            request_timeout: Duration::from_secs(10),
            drain_timeout: Duration::from_secs(10),
            identity: false,
        }
    }
}

/// One core is left to the DHT node
pub fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
        .saturating_sub(1)
        .max(1)
}

/// HTTP gateway in front of a DHT node
pub struct DhtProxyServer {
    node: Arc<dyn NodeHandle>,
    state: Arc<ProxyState>,
    local_addr: SocketAddr,
    running: Arc<AtomicBool>,
    engine: Mutex<Option<Engine>>,
}

/// What `stop()` tears down, taken as one unit
struct Engine {
    shutdown: watch::Sender<bool>,
    thread: JoinHandle<()>,
}

impl DhtProxyServer {
    /// Bind `config.listen_addr` and start serving on a new thread
    pub fn new(node: Arc<dyn NodeHandle>, config: ProxyConfig) -> Result<Self, ProxyError> {
        let listener = std::net::TcpListener::bind(config.listen_addr).map_err(|e| {
            ProxyError::network_error_full("Failed to bind HTTP listener", config.listen_addr.to_string(), e.to_string())
        })?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let threads = config.threads.max(1);
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(threads)
            .thread_name("dht-proxy-http")
            .enable_all()
            .build()
            .map_err(|e| ProxyError::network_error_full("Failed to build HTTP runtime", local_addr.to_string(), e.to_string()))?;

        let state = Arc::new(ProxyState::new(node.clone(), config.identity));
        let router = create_router(state.clone(), config.request_timeout);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let running = Arc::new(AtomicBool::new(true));
        let drain_timeout = config.drain_timeout;

        let server_thread = std::thread::Builder::new()
            .name("dht-proxy".to_string())
            .spawn({
                let running = running.clone();
                move || {
                    info!("Running on {} with {} HTTP threads", local_addr, threads);
                    if let Err(e) = runtime.block_on(serve(listener, router, shutdown_rx, drain_timeout)) {
                        error!("Error: {}", e);
                    }
                    running.store(false, Ordering::SeqCst);
                    // Cuts whatever outlived the drain window.
                    runtime.shutdown_timeout(Duration::from_secs(1));
                    info!("HTTP engine on {} stopped", local_addr);
                }
            })
            .map_err(|e| ProxyError::network_error_full("Failed to spawn HTTP thread", local_addr.to_string(), e.to_string()))?;

        Ok(Self {
            node,
            state,
            local_addr,
            running,
            engine: Mutex::new(Some(Engine { shutdown: shutdown_tx, thread: server_thread })),
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Whether the engine loop is still serving
    pub fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Approximate number of preflight requests served
    pub fn request_count(&self) -> u64 {
        self.state.request_count()
    }

    /// Close the listener, drain, join the engine thread, then join the node.
    ///
    /// Blocks the calling thread; must not be called from a request handler.
    /// Concurrent callers all return once shutdown has finished; later calls
    /// are no-ops.
    pub fn stop(&self) {
        // Held until the node is joined so no caller returns early.
        let mut engine = self.engine.lock();
        if let Some(Engine { shutdown, thread }) = engine.take() {
            info!("Stopping proxy on {}", self.local_addr);
            let _ = shutdown.send(true);
            if thread.join().is_err() {
                error!("HTTP engine thread panicked");
            }
            self.node.join();
        }
    }
}

impl Drop for DhtProxyServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn serve(
    listener: std::net::TcpListener,
    router: Router,
    shutdown: watch::Receiver<bool>,
    drain_timeout: Duration,
) -> Result<(), ProxyError> {
    let listener = tokio::net::TcpListener::from_std(listener)?;
    let local_addr = listener.local_addr()?;

    let mut close_signal = shutdown.clone();
    let mut drain_signal = shutdown;

    let graceful = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .tcp_nodelay(true)
    .with_graceful_shutdown(async move {
        // A dropped sender also counts as a stop request.
        let _ = close_signal.wait_for(|stop| *stop).await;
        info!("Listener closed, draining in-flight requests");
    })
    .into_future();

    tokio::select! {
        result = graceful => {
            result.map_err(|e| ProxyError::network_error_full("HTTP serve loop failed", local_addr.to_string(), e.to_string()))
        }
        _ = async {
            let _ = drain_signal.wait_for(|stop| *stop).await;
            tokio::time::sleep(drain_timeout).await;
        } => {
            warn!("Requests still running after {:?}, force-closing", drain_timeout);
            Ok(())
        }
    }
}
