//! Response shaping shared by every route
//!
//! All responses, errors and engine defaults included, go out as JSON with
//! permissive CORS, and with keep-alive unless the client asked to close.

use axum::extract::Request;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_ORIGIN, CONNECTION, CONTENT_TYPE, SERVER,
};
use axum::http::{HeaderMap, HeaderValue, StatusCode, Version};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

/// Value of the `Server` header
pub const SERVER_NAME: &str = concat!("dht-proxy/", env!("CARGO_PKG_VERSION"));

/// Methods advertised by `OPTIONS /`
pub const ALLOWED_METHODS: &str = "OPTIONS, GET, POST, LISTEN";

/// Methods advertised by `OPTIONS /` when signed/encrypted puts are enabled
pub const ALLOWED_METHODS_IDENTITY: &str = "OPTIONS, GET, POST, LISTEN, SIGN, ENCRYPT";

/// Preflight cache lifetime, in seconds
pub const PREFLIGHT_MAX_AGE: &str = "86400";

pub const RESP_MSG_MISSING_PARAMS: &str = "{\"err\":\"Missing parameters\"}";
pub const RESP_MSG_JSON_INCORRECT: &str = "{\"err\":\"Incorrect JSON\"}";
pub const RESP_MSG_PUT_FAILED: &str = "{\"err\":\"Put failed\"}";

/// A response with a fixed body
pub fn error_response(status: StatusCode, message: &'static str) -> Response {
    (status, message).into_response()
}

/// Whether the client expects the connection to close after this exchange
fn wants_close(version: Version, headers: &HeaderMap) -> bool {
    let mut tokens = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim);
    if version == Version::HTTP_10 {
        !tokens.any(|t| t.eq_ignore_ascii_case("keep-alive"))
    } else {
        tokens.any(|t| t.eq_ignore_ascii_case("close"))
    }
}

/// `Connection: keep-alive` on connections the client keeps open.
///
/// The engine itself marks closing connections, so the header is left alone
/// when the client asked to close.
async fn keep_alive(request: Request, next: Next) -> Response {
    let close = wants_close(request.version(), request.headers());
    let mut response = next.run(request).await;
    if !close {
        response
            .headers_mut()
            .insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    }
    response
}

/// Add the common headers to every response produced by `router`
pub fn with_common_headers(router: Router) -> Router {
    router
        .layer(middleware::from_fn(keep_alive))
        .layer(SetResponseHeaderLayer::overriding(
            SERVER,
            HeaderValue::from_static(SERVER_NAME),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
}
