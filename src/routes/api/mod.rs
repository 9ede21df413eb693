use axum::Router;

use crate::Ctx;

pub mod catalog;
pub mod downloads;
pub mod health;
pub mod providers;

/// Mount all API routes
pub fn mount() -> Router<Ctx> {
    Router::new()
        .merge(health::mount())
        .merge(providers::mount())
        .merge(catalog::mount())
        .merge(downloads::mount())
}
