pub mod api;
pub mod state;

use crate::error::{Result, WardenError};
use crate::middleware::{RequestValidator, validate_request};
use axum::{Router, middleware, routing::get};
use state::AppState;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Address used when neither the command line nor `SPECWARDEN_BIND` names one
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";

/// Resolve the listen address: explicit value, then environment, then default
pub fn bind_address(explicit: Option<&str>) -> Result<SocketAddr> {
    let raw = explicit
        .map(str::to_string)
        .or_else(|| std::env::var("SPECWARDEN_BIND").ok())
        .unwrap_or_else(|| DEFAULT_BIND.to_string());
    raw.parse()
        .map_err(|e| WardenError::InvalidArgument(format!("Invalid bind address {}: {}", raw, e)))
}

/// Router with request validation in front of a stub handler
pub fn router(validator: RequestValidator, source: &str) -> Router {
    let state = AppState::new(validator.clone(), source);

    Router::new()
        .route("/api-docs", get(api::get_api_docs))
        .fallback(api::accept_request)
        .layer(middleware::from_fn_with_state(validator, validate_request))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the validating server
pub async fn start_server(addr: SocketAddr, validator: RequestValidator, source: &str) -> Result<()> {
    let app = router(validator, source);

    tracing::info!("Starting server on http://{}", addr);
    tracing::info!("Resolved document at http://{}/api-docs", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_address() {
        assert_eq!(
            bind_address(Some("0.0.0.0:8080")).unwrap(),
            "0.0.0.0:8080".parse::<SocketAddr>().unwrap()
        );
        assert!(bind_address(Some("not an address")).is_err());
    }
}
