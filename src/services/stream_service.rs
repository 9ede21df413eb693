use crate::{
    cache::{CacheKey, ContentCache},
    scraper::{
        ContentCarousel, ContentSearchResult, ContentSummary, ExtractedLink, MediaType,
        ProviderRegistry, Result,
    },
};
use std::sync::Arc;
use tracing::debug;

/// Cache-fronted access to the active provider.
///
/// Every key embeds the active provider name, so switching providers never
/// serves another provider's entries.
#[derive(Clone)]
pub struct StreamService {
    registry: Arc<ProviderRegistry>,
    cache: Arc<ContentCache>,
}

impl StreamService {
    #[must_use]
    pub const fn new(registry: Arc<ProviderRegistry>, cache: Arc<ContentCache>) -> Self {
        Self { registry, cache }
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    pub async fn home_content(&self) -> Result<Vec<ContentCarousel>> {
        let key = CacheKey::home(&self.registry.active_name());
        if let Some(carousels) = self.cache.get::<Vec<ContentCarousel>>(&key).await {
            return Ok(carousels);
        }

        let carousels = self.registry.fetch_home_content().await?;
        if carousels.is_empty() {
            debug!("Not caching empty home content for {key}");
        } else {
            self.cache.set(&key, &carousels).await;
        }
        Ok(carousels)
    }

    pub async fn search(&self, query: &str, page: u32) -> Result<ContentSearchResult> {
        let page = page.max(1);
        let key = CacheKey::search(&self.registry.active_name(), query, page);
        if let Some(result) = self.cache.get::<ContentSearchResult>(&key).await {
            return Ok(result);
        }

        let result = self.registry.search(query, page).await?;
        if !result.is_empty() {
            self.cache.set(&key, &result).await;
        }
        Ok(result)
    }

    pub async fn content_details(
        &self,
        id: &str,
        media_type: Option<MediaType>,
    ) -> Result<ContentSummary> {
        let key = CacheKey::details(&self.registry.active_name(), id, media_type);
        if let Some(summary) = self.cache.get::<ContentSummary>(&key).await {
            return Ok(summary);
        }

        let summary = self.registry.fetch_content_details(id, media_type).await?;
        self.cache.set(&key, &summary).await;
        Ok(summary)
    }

    /// Extraction failures propagate; only successful, non-empty link sets are cached
    pub async fn streaming_links(
        &self,
        content_id: &str,
        season: Option<u32>,
        episode: Option<u32>,
    ) -> Result<Vec<ExtractedLink>> {
        let key = CacheKey::links(&self.registry.active_name(), content_id, season, episode);
        if let Some(links) = self.cache.get::<Vec<ExtractedLink>>(&key).await {
            return Ok(links);
        }

        let links = self
            .registry
            .extract_streaming_links(content_id, season, episode)
            .await?;
        if !links.is_empty() {
            self.cache.set(&key, &links).await;
        }
        Ok(links)
    }
}
