//! Bounded-concurrency download queue with persisted buckets

mod manager;
mod model;
mod transfer;

pub use manager::{
    ACTIVE_BUCKET_KEY, COMPLETED_BUCKET_KEY, DownloadConfig, DownloadManager, FAILED_BUCKET_KEY,
    QUEUED_BUCKET_KEY,
};
pub use model::{
    Download, DownloadRequest, DownloadSnapshot, DownloadState, EpisodeRef, NetworkKind,
};
pub use transfer::{
    HttpTransfer, ProgressSink, Transfer, TransferControl, TransferJob, best_variant,
    master_variants, media_segments,
};

use std::path::PathBuf;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, DownloadError>;

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("Download not found: {0}")]
    NotFound(Uuid),

    #[error("Cannot {action} download {id} while {state}")]
    InvalidTransition {
        id: Uuid,
        state: DownloadState,
        action: &'static str,
    },

    #[error("Download {0} has no stream link to resume from")]
    MissingLink(Uuid),

    #[error("Destination {} is outside the download directory", .0.display())]
    OutsideDirectory(PathBuf),

    #[error("Transfer failed: {0}")]
    Transfer(String),

    /// The transfer was told to stop; the manager decides what that means
    #[error("Transfer interrupted")]
    Interrupted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
