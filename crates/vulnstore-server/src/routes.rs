// HTTP routes
// POST /scan triggers ingestion, POST /query lists vulnerabilities by severity

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use vulnstore_lib::models::Vulnerability;
use vulnstore_lib::repositories::VulnerabilityRepository;
use vulnstore_lib::services::ingest::{BatchSummary, CancelHandle, IngestDispatcher};

use crate::response::{ApiReply, ApiResponse};

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: IngestDispatcher,
    pub vulnerabilities: Arc<VulnerabilityRepository>,
    /// Used when a scan request omits `repo`
    pub default_source: Option<String>,
    /// Fired on shutdown to stop in-flight batches
    pub cancel: Arc<CancelHandle>,
}

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub files: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub filters: Option<QueryFilters>,
}

#[derive(Debug, Deserialize)]
pub struct QueryFilters {
    #[serde(default)]
    pub severity: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(handle_ping))
        .route("/scan", post(handle_scan))
        .route("/query", post(handle_query))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET /ping
async fn handle_ping() -> ApiReply {
    ApiResponse::success("pong", None)
}

/// POST /scan
/// The batch runs on its own task so a dropped connection does not abort it
async fn handle_scan(
    State(state): State<AppState>,
    payload: Result<Json<ScanRequest>, JsonRejection>,
) -> ApiReply<BatchSummary> {
    let Json(request) = match payload {
        Ok(request) => request,
        Err(e) => {
            log::warn!("[server] Rejected /scan payload: {}", e);
            return ApiResponse::error(StatusCode::BAD_REQUEST, "Invalid request payload");
        }
    };

    let source = request
        .repo
        .filter(|repo| !repo.trim().is_empty())
        .or_else(|| state.default_source.clone());
    let files = request.files.unwrap_or_default();

    let Some(source) = source.filter(|_| !files.is_empty()) else {
        return ApiResponse::error(StatusCode::BAD_REQUEST, "Repo and files are required");
    };

    let batch = state
        .dispatcher
        .spawn_batch(source.clone(), files, state.cancel.signal());

    match batch.await {
        Ok(Ok(summary)) => {
            log::info!(
                "[server] Scan of {} finished: {} succeeded, {} failed",
                source,
                summary.files_succeeded,
                summary.files_failed
            );
            ApiResponse::success("Scan completed successfully", Some(summary))
        }
        Ok(Err(e)) => {
            log::error!("[server] Scan of {} failed [{}]: {}", source, e.code().as_str(), e);
            ApiResponse::error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to process scan")
        }
        Err(e) => {
            log::error!("[server] Scan task for {} did not complete: {}", source, e);
            ApiResponse::error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to process scan")
        }
    }
}

/// POST /query
async fn handle_query(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> ApiReply<Vec<Vulnerability>> {
    let Json(request) = match payload {
        Ok(request) => request,
        Err(e) => {
            log::warn!("[server] Rejected /query payload: {}", e);
            return ApiResponse::error(StatusCode::BAD_REQUEST, "Invalid request payload");
        }
    };

    let Some(severity) = request
        .filters
        .and_then(|filters| filters.severity)
        .filter(|severity| !severity.is_empty())
    else {
        return ApiResponse::error(StatusCode::BAD_REQUEST, "Severity filter is required");
    };

    let repo = state.vulnerabilities.clone();
    let result = tokio::task::spawn_blocking(move || repo.list_by_severity(&severity))
        .await
        .map_err(|e| e.to_string())
        .and_then(|listed| listed);

    match result {
        Ok(vulnerabilities) => {
            ApiResponse::success("Vulnerabilities fetched successfully", Some(vulnerabilities))
        }
        Err(e) => {
            log::error!("[server] Query failed: {}", e);
            ApiResponse::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch vulnerabilities",
            )
        }
    }
}
