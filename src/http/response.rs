//! Response handling and transformation.
//!
//! # Responsibilities
//! - Add `Server` and `X-Powered-By` headers when enabled
//!
//! # Design Decisions
//! - Headers set by the application win (`if_not_present`)

use axum::http::{header, HeaderName, HeaderValue};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::HttpConfig;

/// Value of the `Server` header.
pub const SERVER_VERSION: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Value of the `X-Powered-By` header.
pub const POWERED_BY: &str = "hyper";

pub static X_POWERED_BY: HeaderName = HeaderName::from_static("x-powered-by");

/// Wrap `router` with the response headers `http` asks for.
pub fn with_server_headers(router: Router, http: &HttpConfig) -> Router {
    let mut router = router;
    if http.send_server_version {
        router = router.layer(SetResponseHeaderLayer::if_not_present(
            header::SERVER,
            HeaderValue::from_static(SERVER_VERSION),
        ));
    }
    if http.send_x_powered_by {
        router = router.layer(SetResponseHeaderLayer::if_not_present(
            X_POWERED_BY.clone(),
            HeaderValue::from_static(POWERED_BY),
        ));
    }
    router
}
