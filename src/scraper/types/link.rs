use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Transport format of a playable link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamType {
    /// A single progressive file (mp4, mkv, ...)
    Direct,
    /// An HLS playlist
    Hls,
}

impl StreamType {
    pub fn from_url(url: &str) -> Self {
        if url.to_lowercase().contains(".m3u8") {
            Self::Hls
        } else {
            Self::Direct
        }
    }
}

/// Subtitle track attached to a link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtitle {
    pub url: String,
    pub language: Option<String>,
    pub label: Option<String>,
}

/// A playable media URL produced by an extraction call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedLink {
    pub url: String,
    /// Canonical quality label ("4K", "1080p", "Auto", "Unknown", ...)
    pub quality: String,
    /// Human-readable origin name
    pub server: String,
    pub requires_referer: bool,
    pub headers: BTreeMap<String, String>,
    #[serde(rename = "type")]
    pub stream_type: StreamType,
    #[serde(default)]
    pub subtitles: Option<Vec<Subtitle>>,
}

impl ExtractedLink {
    pub fn new(url: impl Into<String>, quality: impl Into<String>, server: impl Into<String>) -> Self {
        let url = url.into();
        let stream_type = StreamType::from_url(&url);
        Self {
            url,
            quality: quality.into(),
            server: server.into(),
            requires_referer: false,
            headers: BTreeMap::new(),
            stream_type,
            subtitles: None,
        }
    }

    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_referer_required(mut self, required: bool) -> Self {
        self.requires_referer = required;
        self
    }

    pub fn with_subtitles(mut self, subtitles: Vec<Subtitle>) -> Self {
        self.subtitles = (!subtitles.is_empty()).then_some(subtitles);
        self
    }

    pub fn is_hls(&self) -> bool {
        self.stream_type == StreamType::Hls
    }
}
