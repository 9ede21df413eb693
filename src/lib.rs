pub mod app;
pub mod cache;
pub mod config;
pub mod download;
pub mod error;
pub mod logging;
pub mod routes;
pub mod scraper;
pub mod services;
pub mod storage;

pub use app::{Ctx, build_context};
pub use error::AppError;

use serde::Serialize;

/// Envelope for every JSON response
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub code: u16,
    pub message: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            code: 200,
            message: message.into(),
            data: Some(data),
        }
    }
}

pub type ApiResult<T> = Result<axum::Json<ApiResponse<T>>, AppError>;
