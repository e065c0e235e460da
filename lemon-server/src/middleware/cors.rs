use axum::http::{HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Builds a permissive-by-default CORS layer, narrowed to `origins` when the
/// operator configures `LEMON_CORS_ORIGINS`.
pub fn layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| HeaderValue::from_str(o).ok())
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(tower_http::cors::Any)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_origins_allows_any() {
        let _ = layer(&[]);
    }

    #[test]
    fn explicit_origins_are_parsed() {
        let _ = layer(&["http://localhost:3000".to_string()]);
    }
}
