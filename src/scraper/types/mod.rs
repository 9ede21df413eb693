mod catalog;
mod link;
mod media;

pub use catalog::{CarouselCategory, ContentCarousel, ContentSearchResult};
pub use link::{ExtractedLink, StreamType, Subtitle};
pub use media::{ContentSummary, MediaType};
