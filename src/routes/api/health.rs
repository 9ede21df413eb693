use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::{ApiResponse, ApiResult, Ctx, cache::CacheStats};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub active_provider: String,
    pub running_downloads: usize,
    pub cache: CacheStats,
}

/// GET /api/health
async fn health(State(ctx): State<Ctx>) -> ApiResult<HealthResponse> {
    let snapshot = ctx.downloads.snapshot().await;
    let running_downloads = snapshot
        .active
        .iter()
        .filter(|d| d.state == crate::download::DownloadState::Downloading)
        .count();

    Ok(Json(ApiResponse::ok(
        "OK",
        HealthResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            active_provider: ctx.registry().active_name(),
            running_downloads,
            cache: ctx.cache().stats().await,
        },
    )))
}

pub fn mount() -> Router<Ctx> {
    Router::new().route("/health", get(health))
}
