use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use serde::Deserialize;

use crate::{
    ApiResponse, ApiResult, AppError, Ctx,
    scraper::{ContentCarousel, ContentSearchResult, ContentSummary, ExtractedLink, MediaType},
};

/// Search request parameters
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    /// 1-based page (default: 1)
    pub page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct DetailsQuery {
    /// movie or tv; omitted tries movie first
    #[serde(rename = "type")]
    pub media_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LinksQuery {
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

/// GET /api/catalog/home
async fn home(State(ctx): State<Ctx>) -> ApiResult<Vec<ContentCarousel>> {
    let carousels = ctx.streams.home_content().await?;
    Ok(Json(ApiResponse::ok("Home content", carousels)))
}

/// GET /api/catalog/search?query=...&page=...
async fn search(
    State(ctx): State<Ctx>,
    Query(params): Query<SearchQuery>,
) -> ApiResult<ContentSearchResult> {
    let page = params.page.unwrap_or(1);
    if page == 0 {
        return Err(AppError::BadRequest("page starts at 1".to_string()));
    }

    let result = ctx.streams.search(&params.query, page).await?;
    Ok(Json(ApiResponse::ok("Search completed", result)))
}

/// GET /api/catalog/details/{id}?type=movie|tv
async fn details(
    State(ctx): State<Ctx>,
    Path(id): Path<String>,
    Query(params): Query<DetailsQuery>,
) -> ApiResult<ContentSummary> {
    let media_type = params
        .media_type
        .as_deref()
        .map(str::parse::<MediaType>)
        .transpose()
        .map_err(AppError::BadRequest)?;

    let summary = ctx.streams.content_details(&id, media_type).await?;
    Ok(Json(ApiResponse::ok("Details", summary)))
}

/// GET /api/catalog/links/{id}?season=..&episode=..
async fn links(
    State(ctx): State<Ctx>,
    Path(id): Path<String>,
    Query(params): Query<LinksQuery>,
) -> ApiResult<Vec<ExtractedLink>> {
    let links = ctx
        .streams
        .streaming_links(&id, params.season, params.episode)
        .await?;
    Ok(Json(ApiResponse::ok(
        format!("{} links", links.len()),
        links,
    )))
}

pub fn mount() -> Router<Ctx> {
    Router::new()
        .route("/catalog/home", get(home))
        .route("/catalog/search", get(search))
        .route("/catalog/details/{id}", get(details))
        .route("/catalog/links/{id}", get(links))
}
