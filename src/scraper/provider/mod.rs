pub mod catalog;
pub mod http;
pub mod multiserver;
pub mod tmdb;
pub mod traits;
pub mod vidlink;
pub mod vidsrc;

pub use catalog::{MetadataCatalog, MetadataSource};
pub use http::{BROWSER_USER_AGENT, HttpClient, PageFetcher};
pub use multiserver::{MultiServerConfig, MultiServerProvider};
pub use tmdb::{CatalogPage, TmdbClient};
pub use traits::{MediaTarget, StreamingProvider};
pub use vidlink::{VidLinkConfig, VidLinkProvider};
pub use vidsrc::{VidSrcConfig, VidSrcProvider};

use crate::scraper::{
    normalizer::{requires_referer, resolve_quality},
    types::{ExtractedLink, StreamType},
    walker::{collect_stream_candidates, collect_subtitles},
};
use serde_json::Value;
use std::collections::BTreeMap;

/// `scheme://host[:port]` of an absolute URL
pub(crate) fn origin_of(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{}://{host}:{port}", parsed.scheme()),
        None => format!("{}://{host}", parsed.scheme()),
    })
}

/// Headers a player must replay for links served behind `origin`
pub(crate) fn playback_headers(origin: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("User-Agent".to_string(), BROWSER_USER_AGENT.to_string()),
        ("Referer".to_string(), format!("{}/", origin.trim_end_matches('/'))),
        ("Origin".to_string(), origin.trim_end_matches('/').to_string()),
    ])
}

/// Turn a provider JSON payload into links using the tolerant walk.
///
/// Subtitles found anywhere in the payload are attached to every link.
pub(crate) fn links_from_payload(
    payload: &Value,
    server: &str,
    headers: &BTreeMap<String, String>,
    gated_hosts: &[String],
) -> Vec<ExtractedLink> {
    let gated: Vec<&str> = gated_hosts.iter().map(String::as_str).collect();
    let subtitles = collect_subtitles(payload);

    collect_stream_candidates(payload)
        .into_iter()
        .map(|candidate| {
            let stream_type = StreamType::from_url(&candidate.url);
            let quality = resolve_quality(
                candidate.height,
                &candidate.label_refs(),
                &candidate.url,
                stream_type,
            );
            let gated_link = requires_referer(&candidate.url, &gated);

            ExtractedLink::new(candidate.url, quality, server)
                .with_headers(headers.clone())
                .with_referer_required(gated_link)
                .with_subtitles(subtitles.clone())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_origin_of() {
        assert_eq!(
            origin_of("https://cloudnestra.com/rcp/abc?x=1").as_deref(),
            Some("https://cloudnestra.com")
        );
        assert_eq!(
            origin_of("http://127.0.0.1:8080/a").as_deref(),
            Some("http://127.0.0.1:8080")
        );
        assert_eq!(origin_of("/relative"), None);
    }

    #[test]
    fn test_links_from_payload() {
        let payload = json!({
            "stream": {
                "playlist": "https://cdn.example.com/master.m3u8",
                "captions": [{ "url": "https://cdn.example.com/en.vtt", "language": "English" }]
            },
            "downloads": [{ "url": "https://files.example.com/movie_1080p.mp4" }]
        });
        let headers = playback_headers("https://provider.example.com");

        let links = links_from_payload(&payload, "Test", &headers, &["files.example.com".to_string()]);
        assert_eq!(links.len(), 2);

        let hls = links.iter().find(|l| l.is_hls()).unwrap();
        assert_eq!(hls.quality, "Auto");
        assert!(hls.requires_referer);
        assert_eq!(hls.subtitles.as_ref().map(Vec::len), Some(1));
        assert_eq!(
            hls.headers.get("Referer").map(String::as_str),
            Some("https://provider.example.com/")
        );

        let file = links.iter().find(|l| !l.is_hls()).unwrap();
        assert_eq!(file.quality, "1080p");
        assert!(file.requires_referer);
    }
}
