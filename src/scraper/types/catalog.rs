use super::ContentSummary;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Grouping tag for home screen carousels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CarouselCategory {
    Hero,
    Trending,
    Popular,
    TopRated,
}

impl CarouselCategory {
    pub fn title(self) -> &'static str {
        match self {
            Self::Hero => "Featured",
            Self::Trending => "Trending This Week",
            Self::Popular => "Popular Movies",
            Self::TopRated => "Top Rated",
        }
    }
}

/// One titled row of content on the home screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentCarousel {
    pub title: String,
    pub items: Vec<ContentSummary>,
    pub category: CarouselCategory,
}

impl ContentCarousel {
    pub fn new(category: CarouselCategory, items: Vec<ContentSummary>) -> Self {
        Self {
            title: category.title().to_string(),
            items,
            category,
        }
    }
}

/// A page of search results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentSearchResult {
    /// Stable identifier derived from (provider, query, page)
    pub id: String,
    pub items: Vec<ContentSummary>,
    pub total_results: u32,
    pub page: u32,
    pub total_pages: u32,
}

impl ContentSearchResult {
    /// Derive the result id. The same inputs always produce the same id.
    pub fn derive_id(provider: &str, query: &str, page: u32) -> String {
        let name = format!("{provider}\u{1f}{}\u{1f}{page}", query.trim().to_lowercase());
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
    }

    /// Result for a blank query; built without touching the network.
    pub fn empty(provider: &str, query: &str, page: u32) -> Self {
        Self {
            id: Self::derive_id(provider, query, page),
            items: Vec::new(),
            total_results: 0,
            page,
            total_pages: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_id_is_reproducible() {
        let a = ContentSearchResult::derive_id("VidSrc", "Dune", 2);
        let b = ContentSearchResult::derive_id("VidSrc", "  dune ", 2);
        assert_eq!(a, b);

        assert_ne!(a, ContentSearchResult::derive_id("VidSrc", "Dune", 3));
        assert_ne!(a, ContentSearchResult::derive_id("VidLink", "Dune", 2));
    }

    #[test]
    fn test_carousel_title_follows_category() {
        let carousel = ContentCarousel::new(CarouselCategory::TopRated, Vec::new());
        assert_eq!(carousel.title, "Top Rated");
    }
}
