//! Embed-page provider resolved through a chain of nested player pages.
//!
//! embed page -> player iframe -> nested `src: '...'` page -> `file: '...'` URL.
//! If an embed domain shows no player iframe the whole chain is retried on the
//! next configured domain.

use super::{
    MediaTarget, MetadataCatalog, PageFetcher, StreamingProvider, origin_of, playback_headers,
};
use crate::scraper::{
    Result, ScraperError,
    normalizer::{normalize_links, requires_referer, resolve_quality},
    patterns::PATTERNS,
    types::{ContentCarousel, ContentSearchResult, ContentSummary, ExtractedLink, MediaType, StreamType},
};
use async_trait::async_trait;
use ::scraper::{Html, Selector};
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

const NAME: &str = "VidSrc";

static PLAYER_IFRAME: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("iframe#player_iframe, iframe[src]").expect("Invalid iframe selector")
});

#[derive(Debug, Clone)]
pub struct VidSrcConfig {
    /// Embed domains in priority order; later entries are fallbacks
    pub domains: Vec<String>,
    /// Hosts whose direct files also need Referer/Origin
    pub gated_hosts: Vec<String>,
}

impl Default for VidSrcConfig {
    fn default() -> Self {
        Self {
            domains: vec![
                "https://vidsrc.xyz".to_string(),
                "https://vidsrc.net".to_string(),
            ],
            gated_hosts: Vec::new(),
        }
    }
}

pub struct VidSrcProvider {
    catalog: MetadataCatalog,
    fetcher: Arc<dyn PageFetcher>,
    config: VidSrcConfig,
}

impl VidSrcProvider {
    pub fn new(catalog: MetadataCatalog, fetcher: Arc<dyn PageFetcher>, config: VidSrcConfig) -> Self {
        Self {
            catalog,
            fetcher,
            config,
        }
    }

    fn embed_url(domain: &str, content_id: &str, target: MediaTarget) -> String {
        let domain = domain.trim_end_matches('/');
        let id = urlencoding::encode(content_id);
        match target {
            MediaTarget::Movie => format!("{domain}/embed/movie?tmdb={id}"),
            MediaTarget::Episode { season, episode } => {
                format!("{domain}/embed/tv?tmdb={id}&season={season}&episode={episode}")
            }
        }
    }

    /// First hop: the embed page's player iframe
    async fn find_embed(&self, content_id: &str, target: MediaTarget) -> Result<(String, String)> {
        for domain in &self.config.domains {
            let embed_url = Self::embed_url(domain, content_id, target);

            match self.fetcher.fetch_text(&embed_url, &[("Referer", domain.as_str())]).await {
                Ok(html) => match find_player_iframe(&html) {
                    Some(src) => {
                        debug!("{NAME}: player iframe found on {domain}");
                        return Ok((embed_url, src));
                    }
                    None => debug!("{NAME}: no player iframe on {domain}"),
                },
                Err(e) => warn!("{NAME}: embed page on {domain} failed: {e}"),
            }
        }

        Err(ScraperError::ExtractionFailed(format!(
            "No player iframe for {content_id} on any embed domain"
        )))
    }

    async fn resolve_chain(&self, content_id: &str, target: MediaTarget) -> Result<ExtractedLink> {
        let (embed_url, iframe_src) = self.find_embed(content_id, target).await?;

        let iframe_url = resolve_against(&embed_url, &iframe_src)?;
        let iframe_html = self
            .fetcher
            .fetch_text(&iframe_url, &[("Referer", embed_url.as_str())])
            .await?;
        let nested_src = find_nested_src(&iframe_html).ok_or_else(|| {
            ScraperError::ExtractionFailed("No nested player source in iframe page".to_string())
        })?;

        let player_url = resolve_against(&iframe_url, &nested_src)?;
        let player_html = self
            .fetcher
            .fetch_text(&player_url, &[("Referer", iframe_url.as_str())])
            .await?;
        let file = find_file(&player_html).ok_or_else(|| {
            ScraperError::ExtractionFailed("No file entry in player page".to_string())
        })?;

        let origin = origin_of(&iframe_url)
            .ok_or_else(|| ScraperError::InvalidUrl(iframe_url.clone()))?;
        let gated: Vec<&str> = self.config.gated_hosts.iter().map(String::as_str).collect();
        let quality = resolve_quality(None, &[], &file, StreamType::from_url(&file));
        let referer_required = requires_referer(&file, &gated);

        Ok(ExtractedLink::new(file, quality, NAME)
            .with_headers(playback_headers(&origin))
            .with_referer_required(referer_required))
    }
}

/// DOM query for the player iframe; falls back to a raw regex when the markup is broken
pub(crate) fn find_player_iframe(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    document
        .select(&PLAYER_IFRAME)
        .find_map(|el| el.value().attr("src"))
        .map(str::trim)
        .filter(|src| !src.is_empty())
        .map(str::to_string)
        .or_else(|| capture(&PATTERNS.iframe_src, html))
}

/// `src: '...'` inside the iframe page's inline script
pub(crate) fn find_nested_src(html: &str) -> Option<String> {
    capture(&PATTERNS.nested_src, html)
}

/// `file: '...'` inside the player script. Alternatives separated by " or " keep the first URL.
pub(crate) fn find_file(html: &str) -> Option<String> {
    let file = capture(&PATTERNS.file, html)?;
    file.split(" or ")
        .map(str::trim)
        .find(|candidate| candidate.starts_with("http"))
        .map(str::to_string)
}

fn capture(regex: &regex::Regex, haystack: &str) -> Option<String> {
    regex
        .captures(haystack)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Resolve a possibly relative or protocol-relative reference against the page it came from
fn resolve_against(base: &str, reference: &str) -> Result<String> {
    let base = reqwest::Url::parse(base).map_err(|e| ScraperError::InvalidUrl(format!("{base}: {e}")))?;
    base.join(reference)
        .map(String::from)
        .map_err(|e| ScraperError::InvalidUrl(format!("{reference}: {e}")))
}

#[async_trait]
impl StreamingProvider for VidSrcProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn fetch_home_content(&self) -> Result<Vec<ContentCarousel>> {
        Ok(self.catalog.home_content(NAME).await)
    }

    async fn search(&self, query: &str, page: u32) -> Result<ContentSearchResult> {
        self.catalog.search(NAME, query, page).await
    }

    async fn fetch_content_details(
        &self,
        id: &str,
        media_type: Option<MediaType>,
    ) -> Result<ContentSummary> {
        self.catalog.content_details(NAME, id, media_type).await
    }

    async fn extract_streaming_links(
        &self,
        content_id: &str,
        season: Option<u32>,
        episode: Option<u32>,
    ) -> Result<Vec<ExtractedLink>> {
        let target = MediaTarget::from_ids(season, episode);
        let link = self.resolve_chain(content_id, target).await?;
        Ok(normalize_links(vec![link]))
    }
}
