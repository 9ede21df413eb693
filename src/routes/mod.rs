use axum::Router;

use crate::Ctx;

pub mod api;

/// Application router; all endpoints live under `/api`
pub fn router() -> Router<Ctx> {
    Router::new().nest("/api", api::mount())
}
