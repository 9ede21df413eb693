use async_trait::async_trait;
use super::api_types::{MovieResult, PagedResponse, TrendingResult, TvResult};
use crate::scraper::{
    Result, ScraperError,
    provider::{HttpClient, MetadataSource},
    types::{ContentSummary, MediaType},
};

const TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";
const TMDB_IMAGE_BASE: &str = "https://image.tmdb.org/t/p";
const SOURCE: &str = "tmdb";

/// One page of catalog results with the paging totals reported by TMDB
#[derive(Debug, Clone, Default)]
pub struct CatalogPage {
    pub items: Vec<ContentSummary>,
    pub total_results: u32,
    pub total_pages: u32,
}

/// Client for the TMDB metadata API.
///
/// Summaries come back tagged with provider "tmdb"; the catalog retags them
/// with the name of the streaming provider that asked.
pub struct TmdbClient {
    client: HttpClient,
    api_key: String,
    language: String,
}

impl TmdbClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(TMDB_BASE_URL, api_key)
    }

    pub fn with_base_url(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: HttpClient::new(base_url),
            api_key: api_key.into(),
            language: "en-US".to_string(),
        }
    }

    fn image_url(path: Option<&str>, size: &str) -> Option<String> {
        path.map(|p| format!("{TMDB_IMAGE_BASE}/{size}{p}"))
    }

    fn year_of(date: Option<&String>) -> Option<i32> {
        date.and_then(|d| d.split('-').next())
            .and_then(|y| y.parse().ok())
    }

    async fn request<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        extra_params: &[(&str, &str)],
    ) -> Result<T> {
        if self.api_key.is_empty() {
            return Err(ScraperError::InvalidConfiguration(
                "TMDB API key is not configured".to_string(),
            ));
        }

        let mut params: Vec<(&str, &str)> = vec![
            ("api_key", self.api_key.as_str()),
            ("language", self.language.as_str()),
        ];
        params.extend_from_slice(extra_params);

        self.client.get_with_params(endpoint, &params).await
    }

    pub(crate) fn movie_to_summary(movie: MovieResult) -> ContentSummary {
        let year = Self::year_of(movie.release_date.as_ref());

        ContentSummary::new(movie.id.to_string(), movie.title, SOURCE)
            .with_type(MediaType::Movie)
            .with_year(year)
            .with_original_title(movie.original_title)
            .with_images(
                Self::image_url(movie.poster_path.as_deref(), "w500"),
                Self::image_url(movie.backdrop_path.as_deref(), "original"),
            )
            .with_overview(movie.overview)
            .with_scores(movie.vote_average, movie.popularity)
    }

    pub(crate) fn tv_to_summary(tv: TvResult) -> ContentSummary {
        let year = Self::year_of(tv.first_air_date.as_ref());

        ContentSummary::new(tv.id.to_string(), tv.name, SOURCE)
            .with_type(MediaType::Tv)
            .with_year(year)
            .with_original_title(tv.original_name)
            .with_images(
                Self::image_url(tv.poster_path.as_deref(), "w500"),
                Self::image_url(tv.backdrop_path.as_deref(), "original"),
            )
            .with_overview(tv.overview)
            .with_scores(tv.vote_average, tv.popularity)
    }
}

#[async_trait]
impl MetadataSource for TmdbClient {
    /// Trending movies and shows; `window` is "day" or "week"
    async fn trending(&self, window: &str) -> Result<Vec<ContentSummary>> {
        let endpoint = format!("/trending/all/{window}");
        let response: PagedResponse<TrendingResult> = self.request(&endpoint, &[]).await?;

        Ok(response
            .results
            .into_iter()
            .filter_map(|r| match r {
                TrendingResult::Movie(m) => Some(Self::movie_to_summary(m)),
                TrendingResult::Tv(t) => Some(Self::tv_to_summary(t)),
                TrendingResult::Other => None,
            })
            .collect())
    }

    async fn popular_movies(&self) -> Result<Vec<ContentSummary>> {
        let response: PagedResponse<MovieResult> = self.request("/movie/popular", &[]).await?;
        Ok(response.results.into_iter().map(Self::movie_to_summary).collect())
    }

    async fn top_rated_movies(&self) -> Result<Vec<ContentSummary>> {
        let response: PagedResponse<MovieResult> = self.request("/movie/top_rated", &[]).await?;
        Ok(response.results.into_iter().map(Self::movie_to_summary).collect())
    }

    async fn search_movies(&self, query: &str, page: u32) -> Result<CatalogPage> {
        let page = page.to_string();
        let response: PagedResponse<MovieResult> = self
            .request("/search/movie", &[("query", query), ("page", &page)])
            .await?;

        Ok(CatalogPage {
            total_results: response.total_results,
            total_pages: response.total_pages,
            items: response.results.into_iter().map(Self::movie_to_summary).collect(),
        })
    }

    async fn search_tv(&self, query: &str, page: u32) -> Result<CatalogPage> {
        let page = page.to_string();
        let response: PagedResponse<TvResult> = self
            .request("/search/tv", &[("query", query), ("page", &page)])
            .await?;

        Ok(CatalogPage {
            total_results: response.total_results,
            total_pages: response.total_pages,
            items: response.results.into_iter().map(Self::tv_to_summary).collect(),
        })
    }

    async fn movie_details(&self, id: &str) -> Result<ContentSummary> {
        let endpoint = format!("/movie/{}", urlencoding::encode(id));
        let movie: MovieResult = self.request(&endpoint, &[]).await?;
        Ok(Self::movie_to_summary(movie))
    }

    async fn tv_details(&self, id: &str) -> Result<ContentSummary> {
        let endpoint = format!("/tv/{}", urlencoding::encode(id));
        let tv: TvResult = self.request(&endpoint, &[]).await?;
        Ok(Self::tv_to_summary(tv))
    }
}
