use crate::scraper::{
    Result,
    types::{ContentCarousel, ContentSearchResult, ContentSummary, ExtractedLink, MediaType},
};
use async_trait::async_trait;

/// What an extraction call is asking for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaTarget {
    Movie,
    Episode { season: u32, episode: u32 },
}

impl MediaTarget {
    /// Both ids absent means a movie; if either is present the other defaults to 1.
    pub fn from_ids(season: Option<u32>, episode: Option<u32>) -> Self {
        match (season, episode) {
            (None, None) => Self::Movie,
            (season, episode) => Self::Episode {
                season: season.unwrap_or(1),
                episode: episode.unwrap_or(1),
            },
        }
    }

    pub fn media_type(&self) -> MediaType {
        match self {
            Self::Movie => MediaType::Movie,
            Self::Episode { .. } => MediaType::Tv,
        }
    }

    /// Path segment used by most embed/API routes
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Episode { .. } => "tv",
        }
    }
}

/// Capability set every streaming source implements
#[async_trait]
pub trait StreamingProvider: Send + Sync {
    /// Unique registry name (e.g., "VidSrc")
    fn name(&self) -> &str;

    /// Hero/trending/popular/top-rated carousels. Groupings that fail are omitted.
    async fn fetch_home_content(&self) -> Result<Vec<ContentCarousel>>;

    /// Search the catalog. Blank queries return an empty page without a network call.
    async fn search(&self, query: &str, page: u32) -> Result<ContentSearchResult>;

    /// Details for one item; an unknown type tries movie first, then show.
    async fn fetch_content_details(
        &self,
        id: &str,
        media_type: Option<MediaType>,
    ) -> Result<ContentSummary>;

    /// Resolve playable links, deduplicated and sorted best first
    async fn extract_streaming_links(
        &self,
        content_id: &str,
        season: Option<u32>,
        episode: Option<u32>,
    ) -> Result<Vec<ExtractedLink>>;
}
