use regex::Regex;
use std::sync::LazyLock;

/// Pre-compiled regex patterns for quality detection and embed page scraping
pub struct Patterns {
    // Quality patterns
    pub dimensions: Regex,     // 1920x1080
    pub height_suffix: Regex,  // 720p, 1080P

    // Embed chain hops
    pub iframe_src: Regex,     // <iframe ... src="...">
    pub nested_src: Regex,     // src: '/prorcp/...'
    pub file: Regex,           // file: 'https://...m3u8'
}

impl Patterns {
    pub fn new() -> Self {
        Self {
            dimensions: Regex::new(r"(?i)(?:^|[^0-9])\d{3,4}\s*x\s*(\d{3,4})(?:[^0-9]|$)")
                .expect("Invalid dimensions regex"),
            height_suffix: Regex::new(r"(?i)(?:^|[^0-9])(\d{3,4})\s*[px](?:[^a-z0-9]|$)")
                .expect("Invalid height_suffix regex"),

            iframe_src: Regex::new(r#"(?i)<iframe[^>]*\ssrc\s*=\s*["']([^"']+)["']"#)
                .expect("Invalid iframe_src regex"),
            nested_src: Regex::new(r"src:\s*'([^']*)'").expect("Invalid nested_src regex"),
            file: Regex::new(r"file:\s*'([^']*)'").expect("Invalid file regex"),
        }
    }
}

impl Default for Patterns {
    fn default() -> Self {
        Self::new()
    }
}

/// Global singleton for patterns
pub static PATTERNS: LazyLock<Patterns> = LazyLock::new(Patterns::new);
