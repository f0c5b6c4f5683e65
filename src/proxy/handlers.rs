//! Route handlers
//!
//! `OPTIONS /` and `GET /` answer synchronously. `GET /:hash` commits a 200
//! streaming response at once and leaves a [`PendingLookup`] task to feed it;
//! `POST /:hash` waits on the store's single completion through a
//! [`PendingPut`]. Neither blocks an engine thread while the store works.

use crate::dht::{Expiry, InfoHash, Lookup, LookupEvent, NodeHandle, NodeInfo, Value};
use crate::proxy::cache::NodeInfoCache;
use crate::proxy::response::{
    error_response, ALLOWED_METHODS, ALLOWED_METHODS_IDENTITY, PREFLIGHT_MAX_AGE,
    RESP_MSG_JSON_INCORRECT, RESP_MSG_MISSING_PARAMS, RESP_MSG_PUT_FAILED,
};
use crate::proxy::stream::ResponseStream;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_MAX_AGE,
};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// State shared by all handlers
pub struct ProxyState {
    node: Arc<dyn NodeHandle>,
    cache: NodeInfoCache,
    request_count: AtomicU64,
    identity: bool,
}

impl ProxyState {
    pub fn new(node: Arc<dyn NodeHandle>, identity: bool) -> Self {
        Self {
            node,
            cache: NodeInfoCache::new(),
            request_count: AtomicU64::new(0),
            identity,
        }
    }

    /// Approximate number of requests counted so far
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }
}

/// `OPTIONS /`: CORS preflight
pub async fn options(State(state): State<Arc<ProxyState>>) -> Response {
    let count = state.request_count.fetch_add(1, Ordering::Relaxed) + 1;
    debug!("OPTIONS / (request #{})", count);

    let methods = if state.identity {
        ALLOWED_METHODS_IDENTITY
    } else {
        ALLOWED_METHODS
    };
    (
        StatusCode::OK,
        [
            (ACCESS_CONTROL_ALLOW_METHODS, methods),
            (ACCESS_CONTROL_ALLOW_HEADERS, "content-type"),
            (ACCESS_CONTROL_MAX_AGE, PREFLIGHT_MAX_AGE),
        ],
    )
        .into_response()
}

#[derive(Serialize)]
struct NodeInfoBody {
    #[serde(flatten)]
    info: NodeInfo,
    public_ip: String,
}

/// `GET /`: node statistics plus the caller's address as we see it
pub async fn node_info(
    State(state): State<Arc<ProxyState>>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
) -> Response {
    debug!("GET / from {}", remote);
    let info = state.cache.get(state.node.as_ref()).await;

    // SocketAddr brackets IPv6 hosts: [::1]:port
    let body = NodeInfoBody { info, public_ip: remote.to_string() };
    match serde_json::to_string(&body) {
        Ok(mut output) => {
            output.push('\n');
            (StatusCode::OK, output).into_response()
        }
        Err(e) => {
            error!("Failed to serialize node info: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// `GET /:hash`: stream every value stored under the key
pub async fn get(State(state): State<Arc<ProxyState>>, Path(hash): Path<String>) -> Response {
    let key = InfoHash::parse_or_hash(&hash);
    debug!("GET {}", key);

    let (stream, response) = ResponseStream::open(StatusCode::OK);
    let pending = PendingLookup {
        lookup: state.node.get(key),
        stream,
    };
    tokio::spawn(pending.run());
    response
}

/// One in-flight `GET /:hash`
struct PendingLookup {
    lookup: Lookup,
    stream: ResponseStream,
}

impl PendingLookup {
    async fn run(self) {
        let PendingLookup { mut lookup, mut stream } = self;
        let key = lookup.key();

        while let Some(event) = lookup.next().await {
            match event {
                LookupEvent::Value(value) => {
                    if !stream.append_chunk(value.to_json_line()).await {
                        // Dropping the lookup tells the node to stop.
                        debug!("Client left during lookup {}", key);
                        break;
                    }
                }
                LookupEvent::Done(ok) => {
                    debug!("Lookup {} done (ok: {}, {} values)", key, ok, stream.chunks());
                }
            }
        }
        stream.done();
    }
}

/// `POST /:hash`: store one value
pub async fn put(
    State(state): State<Arc<ProxyState>>,
    Path(hash): Path<String>,
    body: Bytes,
) -> Response {
    let key = InfoHash::parse_or_hash(&hash);

    if body.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, RESP_MSG_MISSING_PARAMS);
    }

    let doc: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(doc) => doc,
        Err(e) => {
            warn!("Rejecting put on {}: {}", key, e);
            return error_response(StatusCode::BAD_REQUEST, RESP_MSG_JSON_INCORRECT);
        }
    };
    let value = match Value::from_json(&doc) {
        Ok(value) => value,
        Err(e) => {
            warn!("Rejecting put on {}: {}", key, e);
            return error_response(StatusCode::BAD_REQUEST, RESP_MSG_JSON_INCORRECT);
        }
    };
    let permanent = is_permanent(&doc);
    info!("Got put {} {}{}", key, value, if permanent { " permanent" } else { "" });

    PendingPut { key, value, permanent }.complete(state.node.as_ref()).await
}

/// The `permanent` member: present means permanent unless it is literally `false`
fn is_permanent(doc: &serde_json::Value) -> bool {
    match doc.get("permanent") {
        None => false,
        Some(flag) => flag.as_bool().unwrap_or(true),
    }
}

/// One in-flight `POST /:hash`
struct PendingPut {
    key: InfoHash,
    value: Value,
    permanent: bool,
}

impl PendingPut {
    async fn complete(self, node: &dyn NodeHandle) -> Response {
        let key = self.key;
        match node.put(key, self.value, Expiry::Never, self.permanent).wait().await {
            Ok(stored) => {
                debug!("Put on {} stored {}", key, stored);
                (StatusCode::OK, stored.to_json_line()).into_response()
            }
            Err(e) => {
                warn!("Put on {} failed: {}", key, e);
                error_response(StatusCode::BAD_GATEWAY, RESP_MSG_PUT_FAILED)
            }
        }
    }
}
