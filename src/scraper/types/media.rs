use serde::{Deserialize, Serialize};

/// Media type classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Unknown,
    Movie,
    Tv,
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Movie => write!(f, "movie"),
            Self::Tv => write!(f, "tv"),
        }
    }
}

impl std::str::FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "movie" | "film" => Ok(Self::Movie),
            "tv" | "show" | "tvshow" | "series" => Ok(Self::Tv),
            "unknown" | "" => Ok(Self::Unknown),
            _ => Err(format!("Unknown media type: {s}")),
        }
    }
}

/// Metadata summary shared by carousels, search results and detail lookups.
///
/// Only the fields needed to render a row, key a cache entry or label a
/// download are carried; richer metadata stays with the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentSummary {
    /// Catalog id (a TMDB id for every built-in provider)
    pub id: String,
    pub title: String,
    pub original_title: Option<String>,
    pub media_type: MediaType,
    pub year: Option<i32>,
    pub poster_url: Option<String>,
    pub backdrop_url: Option<String>,
    pub overview: Option<String>,
    /// 0-10
    pub rating: Option<f64>,
    /// Orders merged movie/show searches
    pub popularity: Option<f64>,
    /// Provider that produced the summary
    pub provider: String,
}

impl ContentSummary {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            original_title: None,
            media_type: MediaType::Unknown,
            year: None,
            poster_url: None,
            backdrop_url: None,
            overview: None,
            rating: None,
            popularity: None,
            provider: provider.into(),
        }
    }

    pub fn with_type(mut self, media_type: MediaType) -> Self {
        self.media_type = media_type;
        self
    }

    pub fn with_year(mut self, year: Option<i32>) -> Self {
        self.year = year;
        self
    }

    pub fn with_original_title(mut self, original: Option<String>) -> Self {
        // Identical originals add nothing
        self.original_title = original.filter(|o| *o != self.title);
        self
    }

    /// Poster and backdrop image URLs
    pub fn with_images(mut self, poster: Option<String>, backdrop: Option<String>) -> Self {
        self.poster_url = poster;
        self.backdrop_url = backdrop;
        self
    }

    pub fn with_overview(mut self, overview: Option<String>) -> Self {
        self.overview = overview.filter(|o| !o.trim().is_empty());
        self
    }

    /// Vote average and popularity as reported by the catalog
    pub fn with_scores(mut self, rating: Option<f64>, popularity: Option<f64>) -> Self {
        self.rating = rating;
        self.popularity = popularity;
        self
    }
}
