use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::CorsLayer;

/// Build a CORS layer from the `ATTACHE_CORS_ORIGINS` env var.
///
/// - Unset: fully permissive (any origin), the development default.
/// - Set: comma-separated origin list, GET/POST/OPTIONS, Content-Type header.
pub fn build_cors_layer() -> CorsLayer {
    let Ok(origins_str) = std::env::var("ATTACHE_CORS_ORIGINS") else {
        return CorsLayer::permissive();
    };

    let origins: Vec<HeaderValue> = origins_str
        .split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<HeaderValue>().ok()
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([HeaderName::from_static("content-type")])
        .max_age(std::time::Duration::from_secs(3600))
}
