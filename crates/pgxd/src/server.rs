//! HTTP server for pgxd

use crate::cache::ExplanationCache;
use crate::config::Config;
use crate::error::{handle_panic, payload_too_large_as_json};
use crate::routes::{self, UploadLimit};
use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::{middleware, Extension, Router};
use pgx_common::{ExplanationClient, HttpExplanationClient, LookupTables, RuleEngine};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Headroom over the file cap for multipart boundaries and the other fields
pub const FORM_ENVELOPE_BYTES: usize = 64 * 1024;

/// Application state shared across handlers
pub struct AppState {
    pub engine: RuleEngine,
    pub cache: ExplanationCache,
    pub explainer: Arc<dyn ExplanationClient>,
    /// Upper bound on one explanation generation
    pub explain_timeout: Duration,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        engine: RuleEngine,
        explainer: Arc<dyn ExplanationClient>,
        explain_timeout: Duration,
        cache_capacity: usize,
    ) -> Self {
        Self {
            engine,
            cache: ExplanationCache::new(cache_capacity),
            explainer,
            explain_timeout,
            start_time: Instant::now(),
        }
    }

    /// Build state from configuration: lookup tables, LLM client, cache
    pub fn from_config(config: &Config) -> Result<Self> {
        let tables = match &config.data.tables_dir {
            Some(dir) => {
                info!("  Loading lookup tables from {}", dir.display());
                LookupTables::load_dir(dir)?
            }
            None => LookupTables::builtin()?,
        };
        info!("  {} drugs supported", tables.drugs().len());

        let explainer = HttpExplanationClient::new(config.llm.clone())
            .context("Failed to build LLM client")?;
        if config.llm.enabled {
            info!("  LLM: {} @ {}", config.llm.model, config.llm.endpoint);
        } else {
            info!("  LLM disabled, serving fallback explanations");
        }

        Ok(Self::new(
            RuleEngine::with_tables(Arc::new(tables)),
            Arc::new(explainer),
            config.llm.timeout(),
            config.cache.capacity,
        ))
    }
}

/// Router with all API routes and middleware.
///
/// `max_upload_bytes` caps the `file` field; the whole request body may
/// exceed it by `FORM_ENVELOPE_BYTES`.
pub fn build_router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .merge(routes::analyze_routes())
        .merge(routes::health_routes())
        .with_state(state)
        .layer(Extension(UploadLimit(max_upload_bytes)))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(
            max_upload_bytes.saturating_add(FORM_ENVELOPE_BYTES),
        ))
        .layer(middleware::map_response(payload_too_large_as_json))
        .layer(CorsLayer::permissive())
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP server
pub async fn run(state: AppState, config: &Config) -> Result<()> {
    let app = build_router(Arc::new(state), config.server.max_upload_bytes);

    let addr = &config.server.bind_addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("  Listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
