use crate::{ApiResponse, download::DownloadError, scraper::ScraperError, storage::StorageError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

/// Error surfaced by HTTP handlers, rendered as an [`ApiResponse`] with no data
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Scraper(#[from] ScraperError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Scraper(e) => match e {
                ScraperError::InvalidConfiguration(_) => StatusCode::SERVICE_UNAVAILABLE,
                ScraperError::NoSourcesFound
                | ScraperError::ExtractionFailed(_)
                | ScraperError::NotFound(_) => StatusCode::NOT_FOUND,
                ScraperError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Download(e) => match e {
                DownloadError::NotFound(_) => StatusCode::NOT_FOUND,
                DownloadError::InvalidTransition { .. } | DownloadError::MissingLink(_) => {
                    StatusCode::CONFLICT
                }
                DownloadError::OutsideDirectory(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Storage(StorageError::InvalidKey(_)) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {self}");
        }

        let body = ApiResponse::<()> {
            code: status.as_u16(),
            message: self.to_string(),
            data: None,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::from(ScraperError::InvalidConfiguration("x".into())).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::from(ScraperError::NoSourcesFound).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(ScraperError::ExtractionFailed("x".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(DownloadError::InvalidTransition {
                id: Uuid::nil(),
                state: crate::download::DownloadState::Completed,
                action: "pause",
            })
            .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(DownloadError::OutsideDirectory("/tmp/x".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::BadRequest("page".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(ScraperError::Crypto("x".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
