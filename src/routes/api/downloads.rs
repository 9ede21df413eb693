use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    ApiResponse, ApiResult, AppError, Ctx,
    download::{Download, DownloadRequest, DownloadSnapshot, NetworkKind},
};

#[derive(Debug, Deserialize)]
pub struct NetworkRequest {
    pub kind: NetworkKind,
}

#[derive(Debug, Serialize)]
pub struct NetworkResponse {
    pub kind: NetworkKind,
    pub snapshot: DownloadSnapshot,
}

/// GET /api/downloads
async fn list(State(ctx): State<Ctx>) -> ApiResult<DownloadSnapshot> {
    Ok(Json(ApiResponse::ok(
        "Downloads",
        ctx.downloads.snapshot().await,
    )))
}

/// POST /api/downloads
async fn create(
    State(ctx): State<Ctx>,
    Json(req): Json<DownloadRequest>,
) -> ApiResult<Download> {
    if req.link.url.trim().is_empty() {
        return Err(AppError::BadRequest("Stream link URL is required".to_string()));
    }
    let download = ctx.downloads.enqueue(req).await?;
    Ok(Json(ApiResponse::ok(
        format!("Download {}", download.state),
        download,
    )))
}

/// POST /api/downloads/{id}/pause
async fn pause(State(ctx): State<Ctx>, Path(id): Path<Uuid>) -> ApiResult<Download> {
    let download = ctx.downloads.pause(id).await?;
    Ok(Json(ApiResponse::ok("Download paused", download)))
}

/// POST /api/downloads/{id}/resume
async fn resume(State(ctx): State<Ctx>, Path(id): Path<Uuid>) -> ApiResult<Download> {
    let download = ctx.downloads.resume(id).await?;
    Ok(Json(ApiResponse::ok(
        format!("Download {}", download.state),
        download,
    )))
}

/// POST /api/downloads/{id}/cancel
async fn cancel(State(ctx): State<Ctx>, Path(id): Path<Uuid>) -> ApiResult<Download> {
    let download = ctx.downloads.cancel(id).await?;
    Ok(Json(ApiResponse::ok("Download cancelled", download)))
}

/// POST /api/downloads/{id}/retry
async fn retry(State(ctx): State<Ctx>, Path(id): Path<Uuid>) -> ApiResult<Download> {
    let download = ctx.downloads.retry(id).await?;
    Ok(Json(ApiResponse::ok(
        format!("Download {}", download.state),
        download,
    )))
}

/// DELETE /api/downloads/{id}
async fn delete(State(ctx): State<Ctx>, Path(id): Path<Uuid>) -> ApiResult<()> {
    ctx.downloads.delete(id).await?;
    Ok(Json(ApiResponse {
        code: 200,
        message: "Download deleted".to_string(),
        data: None,
    }))
}

/// POST /api/downloads/network
async fn network(
    State(ctx): State<Ctx>,
    Json(req): Json<NetworkRequest>,
) -> ApiResult<NetworkResponse> {
    ctx.downloads.apply_network(req.kind).await;
    Ok(Json(ApiResponse::ok(
        "Network state applied",
        NetworkResponse {
            kind: req.kind,
            snapshot: ctx.downloads.snapshot().await,
        },
    )))
}

pub fn mount() -> Router<Ctx> {
    Router::new()
        .route("/downloads", get(list).post(create))
        .route("/downloads/network", post(network))
        .route("/downloads/{id}", axum::routing::delete(delete))
        .route("/downloads/{id}/pause", post(pause))
        .route("/downloads/{id}/resume", post(resume))
        .route("/downloads/{id}/cancel", post(cancel))
        .route("/downloads/{id}/retry", post(retry))
}
