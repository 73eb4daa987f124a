use axum::http::{header, HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

use super::auth::AUTH_TOKEN_HEADER;

const MAX_AGE_SECS: u64 = 3600;

/// CORS for the browser dashboard. An unparseable origin falls back to
/// same-origin only.
pub fn build_cors_layer(allowed_origin: &str) -> CorsLayer {
    let origin = match allowed_origin.parse::<HeaderValue>() {
        Ok(value) => AllowOrigin::exact(value),
        Err(e) => {
            warn!("Ignoring invalid CORS origin {allowed_origin:?}: {e}");
            AllowOrigin::list(Vec::<HeaderValue>::new())
        }
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(AUTH_TOKEN_HEADER),
        ])
        .max_age(std::time::Duration::from_secs(MAX_AGE_SECS))
}
