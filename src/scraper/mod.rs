mod crypto;
mod normalizer;
mod patterns;
mod provider;
mod registry;
mod types;
mod walker;

#[cfg(test)]
mod tests;

pub use crypto::{CbcObfuscator, DecryptionOracle};
pub use normalizer::{
    canonical_quality, normalize_links, quality_from_height, quality_rank, requires_referer,
    resolve_quality,
};
pub use provider::{
    BROWSER_USER_AGENT, CatalogPage, HttpClient, MediaTarget, MetadataCatalog, MetadataSource,
    MultiServerConfig, MultiServerProvider, PageFetcher, StreamingProvider, TmdbClient,
    VidLinkConfig, VidLinkProvider, VidSrcConfig, VidSrcProvider,
};
pub use registry::{ACTIVE_PROVIDER_KEY, ProviderRegistry};
pub use types::{
    CarouselCategory, ContentCarousel, ContentSearchResult, ContentSummary, ExtractedLink,
    MediaType, StreamType, Subtitle,
};
pub use walker::{StreamCandidate, collect_stream_candidates, collect_subtitles};

/// Scraper result type
pub type Result<T> = std::result::Result<T, ScraperError>;

/// Scraper error types
#[derive(Debug, thiserror::Error)]
pub enum ScraperError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Parsing failed: {0}")]
    ParsingFailed(String),

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("No streaming sources found")]
    NoSourcesFound,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Crypto error: {0}")]
    Crypto(String),
}
