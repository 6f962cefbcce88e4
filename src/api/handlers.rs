use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, warn};

use super::AppState;
use crate::search::{SearchError, SearchResponse};

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    /// Optional so a missing field gets our own 400 instead of a generic rejection
    pub query: Option<String>,
    pub k: Option<usize>,
}

/// Error body `{ "error": "..." }` with a status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<SearchError> for ApiError {
    fn from(e: SearchError) -> Self {
        let status = match &e {
            SearchError::EmptyQuery | SearchError::InvalidK => StatusCode::BAD_REQUEST,
            SearchError::CollectionNotFound(_) => StatusCode::NOT_FOUND,
            SearchError::Embedding(_) | SearchError::Index(_) | SearchError::Task(_) => {
                error!("Search failed: {e}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

pub async fn search(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Json(req) = payload.map_err(|rejection| {
        warn!("Rejected search body: {rejection}");
        ApiError::bad_request(rejection.body_text())
    })?;

    let query = req.query.unwrap_or_default();
    let response = state.search.search(&query, req.k).await?;
    Ok(Json(response))
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
