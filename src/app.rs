//! Sample application served over the connector.
//!
//! # Routes
//! - `GET /` → plain `Hello World`
//! - `GET /protocol` → JSON description of the negotiated connection

use axum::extract::{Extension, Request};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::http::request::request_host;
use crate::http::SecureRequest;

pub fn router() -> Router {
    Router::new()
        .route("/", get(hello))
        .route("/protocol", get(protocol))
        .layer(TraceLayer::new_for_http())
}

async fn hello() -> &'static str {
    "Hello World"
}

async fn protocol(Extension(secure): Extension<SecureRequest>, request: Request) -> Json<Value> {
    let origin = request_host(&request).map(|host| secure.origin(host));

    Json(json!({
        "protocol": secure.protocol,
        "http_version": format!("{:?}", request.version()),
        "scheme": secure.scheme,
        "port": secure.port,
        "cipher_suite": secure.cipher_suite,
        "origin": origin,
        "url": secure.absolute_url(&request),
        "connection_id": secure.connection_id,
    }))
}
