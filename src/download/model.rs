use crate::scraper::{ExtractedLink, StreamType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Download life-cycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadState {
    Queued,
    Downloading,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl DownloadState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for DownloadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Queued => "queued",
            Self::Downloading => "downloading",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeRef {
    pub season: u32,
    pub episode: u32,
}

/// What a caller hands to the queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadRequest {
    /// Catalog id of the movie or show
    pub content_ref: String,
    pub title: String,
    #[serde(default)]
    pub episode: Option<EpisodeRef>,
    pub link: ExtractedLink,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Download {
    pub id: Uuid,
    pub content_ref: String,
    pub title: String,
    pub episode: Option<EpisodeRef>,
    pub state: DownloadState,
    /// 0.0 ..= 1.0
    pub progress: f64,
    pub quality: String,
    pub local_path: Option<PathBuf>,
    /// Kept so an explicit resume after a restart can restart the transfer
    #[serde(default)]
    pub link: Option<ExtractedLink>,
    #[serde(default)]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Download {
    pub fn from_request(request: DownloadRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            content_ref: request.content_ref,
            title: request.title,
            episode: request.episode,
            state: DownloadState::Queued,
            progress: 0.0,
            quality: request.link.quality.clone(),
            local_path: None,
            link: Some(request.link),
            error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub(crate) fn set_state(&mut self, state: DownloadState) {
        self.state = state;
        self.updated_at = Utc::now();
    }

    /// `Title_S01E02_1080p_1a2b3c4d.mp4`; HLS downloads are written as MPEG-TS.
    ///
    /// Caller-supplied parts are reduced to alphanumerics and `_`, so the name never
    /// carries a path separator or `..`.
    pub fn file_name(&self) -> String {
        let stem = file_component(&self.title).unwrap_or_else(|| "download".to_string());
        let quality = file_component(&self.quality).unwrap_or_else(|| "unknown".to_string());

        let episode = self
            .episode
            .map(|ep| format!("_S{:02}E{:02}", ep.season, ep.episode))
            .unwrap_or_default();

        let short_id = &self.id.simple().to_string()[..8];
        format!("{stem}{episode}_{quality}_{short_id}.{}", self.extension())
    }

    fn extension(&self) -> &'static str {
        let Some(link) = &self.link else {
            return "mp4";
        };
        if link.stream_type == StreamType::Hls {
            return "ts";
        }

        let path = link.url.split(['?', '#']).next().unwrap_or_default().to_lowercase();
        ["mkv", "webm", "mov", "m4v", "avi", "ts"]
            .into_iter()
            .find(|ext| path.ends_with(&format!(".{ext}")))
            .unwrap_or("mp4")
    }
}

/// Runs of anything but alphanumerics collapse to a single `_`; `None` when nothing is left
fn file_component(raw: &str) -> Option<String> {
    let cleaned = raw
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .split('_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Reported connectivity, used to hold back downloads on metered or absent networks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkKind {
    Wifi,
    Wired,
    Cellular,
    Offline,
}

/// All four buckets as stored and as returned to callers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DownloadSnapshot {
    pub active: Vec<Download>,
    pub queued: Vec<Download>,
    pub completed: Vec<Download>,
    pub failed: Vec<Download>,
}
