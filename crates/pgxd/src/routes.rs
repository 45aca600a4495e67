//! API routes for pgxd

use crate::error::ApiError;
use crate::pipeline;
use crate::server::AppState;
use axum::{
    extract::{
        multipart::{Field, MultipartRejection},
        Multipart, State,
    },
    routing::{get, post},
    Extension, Json, Router,
};
use pgx_common::{AnalysisReport, ExplanationMode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

type AppStateArc = Arc<AppState>;

// ============================================================================
// Analyze Routes
// ============================================================================

pub fn analyze_routes() -> Router<AppStateArc> {
    Router::new().route("/api/analyze", post(analyze))
}

/// Largest accepted `file` field, in bytes
#[derive(Debug, Clone, Copy)]
pub struct UploadLimit(pub usize);

/// Fields pulled out of the multipart form
#[derive(Debug, Default)]
struct AnalyzeForm {
    file: Option<Vec<u8>>,
    drug: Option<String>,
    mode: Option<String>,
}

/// Read a field chunk by chunk, failing as soon as it grows past `limit`
async fn read_capped(mut field: Field<'_>, limit: usize) -> Result<Vec<u8>, ApiError> {
    let mut data = Vec::new();
    while let Some(chunk) = field.chunk().await? {
        if data.len() + chunk.len() > limit {
            return Err(ApiError::PayloadTooLarge);
        }
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}

async fn read_form(mut multipart: Multipart, limit: UploadLimit) -> Result<AnalyzeForm, ApiError> {
    let mut form = AnalyzeForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => form.file = Some(read_capped(field, limit.0).await?),
            Some("drug") => form.drug = Some(field.text().await?),
            Some("mode") => form.mode = Some(field.text().await?),
            other => debug!("Ignoring form field {:?}", other),
        }
    }
    Ok(form)
}

async fn analyze(
    State(state): State<AppStateArc>,
    Extension(limit): Extension<UploadLimit>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalysisReport>, ApiError> {
    // A request that is not multipart carries no file
    let multipart = multipart.map_err(|e| {
        debug!("Multipart rejected: {}", e);
        ApiError::MissingFile
    })?;
    let form = read_form(multipart, limit).await?;

    let file = form.file.ok_or(ApiError::MissingFile)?;
    let drug = form
        .drug
        .filter(|d| !d.trim().is_empty())
        .ok_or(ApiError::MissingDrug)?;
    let mode = form
        .mode
        .as_deref()
        .map(ExplanationMode::parse)
        .unwrap_or_default();

    info!(
        "  Analyze request: drug={} mode={} upload={} bytes",
        drug.trim(),
        mode,
        file.len()
    );

    let vcf_text = String::from_utf8_lossy(&file);
    let report = pipeline::analyze(&state, &vcf_text, &drug, mode).await;
    Ok(Json(report))
}

// ============================================================================
// Health Routes
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub supported_drugs: Vec<String>,
    pub cache_entries: usize,
}

pub fn health_routes() -> Router<AppStateArc> {
    Router::new().route("/api/health", get(health_check))
}

async fn health_check(State(state): State<AppStateArc>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        supported_drugs: state.engine.supported_drugs(),
        cache_entries: state.cache.len().await,
    })
}
