use axum::{
    Json,
    extract::State,
    http::{Method, Uri},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::state::AppState;

/// Response of the stub handler behind the validation middleware
#[derive(Debug, Serialize, Deserialize)]
pub struct AcceptedResponse {
    pub message: String,
    pub method: String,
    pub path: String,
}

/// GET /api-docs - The resolved document
pub async fn get_api_docs(State(state): State<AppState>) -> Json<Value> {
    tracing::debug!(source = %state.source, version = %state.version, "Serving API docs");
    Json(state.validator.resolved().clone())
}

/// Fallback for every request that passed validation
pub async fn accept_request(method: Method, uri: Uri) -> Json<AcceptedResponse> {
    Json(AcceptedResponse {
        message: "Request is valid".to_string(),
        method: method.to_string(),
        path: uri.path().to_string(),
    })
}
