use axum::{
    Json, Router,
    extract::State,
    routing::{get, put},
};
use serde::{Deserialize, Serialize};

use crate::{ApiResponse, ApiResult, AppError, Ctx};

#[derive(Debug, Serialize)]
pub struct ProvidersResponse {
    pub providers: Vec<String>,
    pub active: String,
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub name: String,
}

fn current(ctx: &Ctx) -> ProvidersResponse {
    let registry = ctx.registry();
    ProvidersResponse {
        providers: registry.provider_names(),
        active: registry.active_name(),
    }
}

/// GET /api/providers
async fn list_providers(State(ctx): State<Ctx>) -> ApiResult<ProvidersResponse> {
    Ok(Json(ApiResponse::ok("Providers", current(&ctx))))
}

/// PUT /api/providers/active
async fn set_active(
    State(ctx): State<Ctx>,
    Json(req): Json<SetActiveRequest>,
) -> ApiResult<ProvidersResponse> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Provider name is required".to_string()));
    }
    if !ctx.registry().contains(name) {
        return Err(AppError::BadRequest(format!("Unknown provider: {name}")));
    }

    ctx.registry().set_active(name).await?;
    Ok(Json(ApiResponse::ok("Active provider updated", current(&ctx))))
}

pub fn mount() -> Router<Ctx> {
    Router::new()
        .route("/providers", get(list_providers))
        .route("/providers/active", put(set_active))
}
