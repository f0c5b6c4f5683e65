//! Route table
//!
//! | Method  | Path     | Handler                       |
//! |---------|----------|-------------------------------|
//! | OPTIONS | `/`      | [`handlers::options`]         |
//! | GET     | `/`      | [`handlers::node_info`]       |
//! | GET     | `/:hash` | [`handlers::get`] (streamed)  |
//! | POST    | `/:hash` | [`handlers::put`]             |
//!
//! Anything else gets the engine's default 404/405.

use crate::proxy::handlers::{self, ProxyState};
use crate::proxy::response::with_common_headers;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Build the proxy router.
///
/// `request_timeout` bounds how long a handler may take to produce its
/// response head; a streamed body is not cut by it.
pub fn create_router(state: Arc<ProxyState>, request_timeout: Duration) -> Router {
    let router = Router::new()
        .route("/", get(handlers::node_info).options(handlers::options))
        .route("/:hash", get(handlers::get).post(handlers::put))
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http());
    with_common_headers(router)
}
