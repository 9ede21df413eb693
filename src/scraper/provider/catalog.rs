//! Shared catalog behaviour for providers that delegate metadata to TMDB

use super::tmdb::CatalogPage;
use crate::scraper::{
    Result,
    types::{CarouselCategory, ContentCarousel, ContentSearchResult, ContentSummary, MediaType},
};
use async_trait::async_trait;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, warn};

const HERO_ITEMS: usize = 5;

/// Well-formed metadata API used as a building block by streaming providers
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Trending movies and shows; `window` is "day" or "week"
    async fn trending(&self, window: &str) -> Result<Vec<ContentSummary>>;

    async fn popular_movies(&self) -> Result<Vec<ContentSummary>>;

    async fn top_rated_movies(&self) -> Result<Vec<ContentSummary>>;

    async fn search_movies(&self, query: &str, page: u32) -> Result<CatalogPage>;

    async fn search_tv(&self, query: &str, page: u32) -> Result<CatalogPage>;

    async fn movie_details(&self, id: &str) -> Result<ContentSummary>;

    async fn tv_details(&self, id: &str) -> Result<ContentSummary>;
}

/// Carousel, search and detail assembly on top of a [`MetadataSource`]
#[derive(Clone)]
pub struct MetadataCatalog {
    source: Arc<dyn MetadataSource>,
}

impl MetadataCatalog {
    pub fn new(source: Arc<dyn MetadataSource>) -> Self {
        Self { source }
    }

    fn retag(items: Vec<ContentSummary>, provider: &str) -> Vec<ContentSummary> {
        items
            .into_iter()
            .map(|mut item| {
                item.provider = provider.to_string();
                item
            })
            .collect()
    }

    /// Fetch all four groupings in parallel. A failing grouping is dropped, never the whole call.
    pub async fn home_content(&self, provider: &str) -> Vec<ContentCarousel> {
        let (hero, trending, popular, top_rated) = tokio::join!(
            self.source.trending("day"),
            self.source.trending("week"),
            self.source.popular_movies(),
            self.source.top_rated_movies(),
        );

        let hero = hero.map(|items| {
            items
                .into_iter()
                .filter(|item| item.backdrop_url.is_some())
                .take(HERO_ITEMS)
                .collect::<Vec<_>>()
        });

        [
            (CarouselCategory::Hero, hero),
            (CarouselCategory::Trending, trending),
            (CarouselCategory::Popular, popular),
            (CarouselCategory::TopRated, top_rated),
        ]
        .into_iter()
        .filter_map(|(category, result)| match result {
            Ok(items) if !items.is_empty() => Some(ContentCarousel::new(
                category,
                Self::retag(items, provider),
            )),
            Ok(_) => {
                debug!("{provider}: {category:?} carousel is empty");
                None
            }
            Err(e) => {
                warn!("{provider}: {category:?} carousel failed: {e}");
                None
            }
        })
        .collect()
    }

    /// Movie and show search in parallel, merged and ordered by popularity.
    ///
    /// A failing branch contributes nothing, so both failing yields an empty result.
    pub async fn search(&self, provider: &str, query: &str, page: u32) -> Result<ContentSearchResult> {
        let page = page.max(1);
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Ok(ContentSearchResult::empty(provider, query, page));
        }

        let (movies, shows) = tokio::join!(
            self.source.search_movies(trimmed, page),
            self.source.search_tv(trimmed, page),
        );

        let movies = Self::page_or_empty(movies, provider, "movie");
        let shows = Self::page_or_empty(shows, provider, "tv");

        let mut items = Self::retag(movies.items, provider);
        items.extend(Self::retag(shows.items, provider));
        items.sort_by(|a, b| {
            b.popularity
                .unwrap_or(0.0)
                .partial_cmp(&a.popularity.unwrap_or(0.0))
                .unwrap_or(Ordering::Equal)
        });

        Ok(ContentSearchResult {
            id: ContentSearchResult::derive_id(provider, query, page),
            items,
            total_results: movies.total_results + shows.total_results,
            page,
            total_pages: movies.total_pages.max(shows.total_pages),
        })
    }

    fn page_or_empty(result: Result<CatalogPage>, provider: &str, branch: &str) -> CatalogPage {
        result.unwrap_or_else(|e| {
            warn!("{provider}: {branch} search failed: {e}");
            CatalogPage::default()
        })
    }

    /// Type-directed detail lookup; unknown types try movie first, then show
    pub async fn content_details(
        &self,
        provider: &str,
        id: &str,
        media_type: Option<MediaType>,
    ) -> Result<ContentSummary> {
        let mut summary = match media_type.unwrap_or_default() {
            MediaType::Movie => self.source.movie_details(id).await?,
            MediaType::Tv => self.source.tv_details(id).await?,
            MediaType::Unknown => match self.source.movie_details(id).await {
                Ok(summary) => summary,
                Err(e) => {
                    debug!("{provider}: movie lookup for {id} failed ({e}), trying tv");
                    self.source.tv_details(id).await?
                }
            },
        };

        summary.provider = provider.to_string();
        Ok(summary)
    }
}
