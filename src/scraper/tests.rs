//! Provider, catalog and registry tests against canned pages

use crate::scraper::{
    ACTIVE_PROVIDER_KEY, CarouselCategory, CatalogPage, ContentCarousel, ContentSearchResult,
    ContentSummary, ExtractedLink, MediaType, MetadataCatalog, MetadataSource,
    MultiServerConfig, MultiServerProvider, PageFetcher, ProviderRegistry, Result, ScraperError,
    StreamingProvider, VidLinkConfig, VidLinkProvider, VidSrcConfig, VidSrcProvider,
};
use crate::storage::{DurableStore, MemoryStore};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Answers requests from substring rules; the first matching rule wins
#[derive(Default)]
struct CannedFetcher {
    pages: Vec<(&'static str, String)>,
    posts: Vec<(&'static str, Value)>,
    requested: Mutex<Vec<String>>,
}

impl CannedFetcher {
    fn page(mut self, pattern: &'static str, body: impl Into<String>) -> Self {
        self.pages.push((pattern, body.into()));
        self
    }

    fn post(mut self, pattern: &'static str, response: Value) -> Self {
        self.posts.push((pattern, response));
        self
    }

    fn requested(&self) -> Vec<String> {
        self.requested.lock().clone()
    }
}

#[async_trait]
impl PageFetcher for CannedFetcher {
    async fn fetch_text(&self, url: &str, _headers: &[(&str, &str)]) -> Result<String> {
        self.requested.lock().push(url.to_string());
        self.pages
            .iter()
            .find(|(pattern, _)| url.contains(pattern))
            .map(|(_, body)| body.clone())
            .ok_or_else(|| ScraperError::NotFound(url.to_string()))
    }

    async fn post_json(&self, url: &str, _body: &Value) -> Result<Value> {
        self.requested.lock().push(url.to_string());
        self.posts
            .iter()
            .find(|(pattern, _)| url.contains(pattern))
            .map(|(_, response)| response.clone())
            .ok_or_else(|| ScraperError::NotFound(url.to_string()))
    }
}

/// Metadata source with canned results; operations named in `failing` return an API error
#[derive(Default)]
struct StubSource {
    failing: Vec<&'static str>,
    calls: AtomicUsize,
}

impl StubSource {
    fn failing(ops: &[&'static str]) -> Self {
        Self {
            failing: ops.to_vec(),
            calls: AtomicUsize::new(0),
        }
    }

    fn check(&self, op: &'static str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&op) {
            return Err(ScraperError::Api {
                status: 500,
                message: op.to_string(),
            });
        }
        Ok(())
    }
}

fn summary(id: &str, media_type: MediaType, popularity: f64) -> ContentSummary {
    ContentSummary::new(id, format!("Title {id}"), "tmdb")
        .with_type(media_type)
        .with_scores(None, Some(popularity))
}

#[async_trait]
impl MetadataSource for StubSource {
    async fn trending(&self, _window: &str) -> Result<Vec<ContentSummary>> {
        self.check("trending")?;
        Ok(vec![
            summary("1", MediaType::Movie, 90.0)
                .with_images(None, Some("https://img.test/1.jpg".to_string())),
            summary("2", MediaType::Tv, 70.0),
        ])
    }

    async fn popular_movies(&self) -> Result<Vec<ContentSummary>> {
        self.check("popular")?;
        Ok(vec![summary("3", MediaType::Movie, 60.0)])
    }

    async fn top_rated_movies(&self) -> Result<Vec<ContentSummary>> {
        self.check("top_rated")?;
        Ok(vec![summary("4", MediaType::Movie, 20.0)])
    }

    async fn search_movies(&self, _query: &str, _page: u32) -> Result<CatalogPage> {
        self.check("search_movies")?;
        Ok(CatalogPage {
            items: vec![
                summary("10", MediaType::Movie, 10.0),
                summary("11", MediaType::Movie, 80.0),
            ],
            total_results: 2,
            total_pages: 1,
        })
    }

    async fn search_tv(&self, _query: &str, _page: u32) -> Result<CatalogPage> {
        self.check("search_tv")?;
        Ok(CatalogPage {
            items: vec![summary("20", MediaType::Tv, 40.0)],
            total_results: 1,
            total_pages: 3,
        })
    }

    async fn movie_details(&self, id: &str) -> Result<ContentSummary> {
        self.check("movie_details")?;
        Ok(summary(id, MediaType::Movie, 1.0))
    }

    async fn tv_details(&self, id: &str) -> Result<ContentSummary> {
        self.check("tv_details")?;
        Ok(summary(id, MediaType::Tv, 1.0))
    }
}

fn catalog() -> MetadataCatalog {
    MetadataCatalog::new(Arc::new(StubSource::default()))
}

mod catalog_tests {
    use super::*;

    #[tokio::test]
    async fn test_blank_search_makes_no_calls() {
        let source = Arc::new(StubSource::default());
        let catalog = MetadataCatalog::new(source.clone());

        let result = catalog.search("VidSrc", "   ", 0).await.unwrap();
        assert!(result.is_empty());
        assert_eq!(result.page, 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_search_merges_by_popularity() {
        let result = catalog().search("VidSrc", "dune", 1).await.unwrap();

        let ids: Vec<&str> = result.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["11", "20", "10"]);
        assert!(result.items.iter().all(|i| i.provider == "VidSrc"));
        assert_eq!(result.total_results, 3);
        assert_eq!(result.total_pages, 3);
        assert_eq!(result.id, ContentSearchResult::derive_id("VidSrc", "dune", 1));
    }

    #[tokio::test]
    async fn test_search_survives_one_failing_branch() {
        let catalog = MetadataCatalog::new(Arc::new(StubSource::failing(&["search_tv"])));
        let result = catalog.search("VidSrc", "dune", 1).await.unwrap();

        assert_eq!(result.items.len(), 2);
        assert!(result.items.iter().all(|i| i.media_type == MediaType::Movie));
    }

    #[tokio::test]
    async fn test_search_is_empty_when_both_branches_fail() {
        let catalog = MetadataCatalog::new(Arc::new(StubSource::failing(&[
            "search_movies",
            "search_tv",
        ])));
        let result = catalog.search("VidSrc", "Dune ", 1).await.unwrap();

        assert!(result.is_empty());
        assert_eq!(result.page, 1);
        assert_eq!(result.total_results, 0);
        assert_eq!(result.id, ContentSearchResult::derive_id("VidSrc", "dune", 1));
    }

    #[tokio::test]
    async fn test_home_omits_failing_grouping() {
        let catalog = MetadataCatalog::new(Arc::new(StubSource::failing(&["popular"])));
        let carousels = catalog.home_content("VidLink").await;

        let categories: Vec<CarouselCategory> = carousels.iter().map(|c| c.category).collect();
        assert_eq!(
            categories,
            vec![
                CarouselCategory::Hero,
                CarouselCategory::Trending,
                CarouselCategory::TopRated
            ]
        );

        // Hero keeps only items with a backdrop
        assert_eq!(carousels[0].items.len(), 1);
        assert_eq!(carousels[0].items[0].id, "1");
        assert!(
            carousels
                .iter()
                .flat_map(|c| &c.items)
                .all(|i| i.provider == "VidLink")
        );
    }

    #[tokio::test]
    async fn test_details_unknown_type_falls_back_to_tv() {
        let catalog = MetadataCatalog::new(Arc::new(StubSource::failing(&["movie_details"])));

        let details = catalog.content_details("VidSrc", "1399", None).await.unwrap();
        assert_eq!(details.media_type, MediaType::Tv);
        assert_eq!(details.provider, "VidSrc");

        let err = catalog
            .content_details("VidSrc", "1399", Some(MediaType::Movie))
            .await
            .unwrap_err();
        assert!(matches!(err, ScraperError::Api { .. }));
    }
}

mod vidsrc_tests {
    use super::*;

    const NO_PLAYER: &str = "<html><body><p>This media is unavailable</p></body></html>";
    const EMBED: &str = r#"<html><body><iframe id="player_iframe" src="//player.test/rcp/abc"></iframe></body></html>"#;
    const IFRAME: &str = "<script>loadIframe({ src: '/prorcp/xyz', frameborder: 0 });</script>";
    const PLAYER: &str = "var player = new Playerjs({ id: 'p', file: 'https://cdn.test/hls/master.m3u8' });";

    fn provider(fetcher: Arc<CannedFetcher>) -> VidSrcProvider {
        VidSrcProvider::new(
            catalog(),
            fetcher,
            VidSrcConfig {
                domains: vec![
                    "https://primary.test".to_string(),
                    "https://fallback.test".to_string(),
                ],
                gated_hosts: Vec::new(),
            },
        )
    }

    fn player_pages(fetcher: CannedFetcher) -> CannedFetcher {
        fetcher
            .page("player.test/rcp/abc", IFRAME)
            .page("player.test/prorcp/xyz", PLAYER)
    }

    #[tokio::test]
    async fn test_chain_resolves_on_primary_domain() {
        let fetcher = Arc::new(player_pages(
            CannedFetcher::default().page("primary.test/embed/movie", EMBED),
        ));
        let links = provider(fetcher.clone())
            .extract_streaming_links("550", None, None)
            .await
            .unwrap();

        assert_eq!(links.len(), 1);
        let link = &links[0];
        assert_eq!(link.url, "https://cdn.test/hls/master.m3u8");
        assert_eq!(link.quality, "Auto");
        assert_eq!(link.server, "VidSrc");
        assert!(link.requires_referer);
        assert_eq!(
            link.headers.get("Referer").map(String::as_str),
            Some("https://player.test/")
        );

        let requested = fetcher.requested();
        assert_eq!(requested[0], "https://primary.test/embed/movie?tmdb=550");
        assert!(requested.iter().all(|url| !url.contains("fallback.test")));
    }

    #[tokio::test]
    async fn test_missing_iframe_falls_back_to_next_domain() {
        let fetcher = Arc::new(player_pages(
            CannedFetcher::default()
                .page("primary.test/embed", NO_PLAYER)
                .page("fallback.test/embed/tv", EMBED),
        ));
        let links = provider(fetcher.clone())
            .extract_streaming_links("1399", Some(2), Some(3))
            .await
            .unwrap();

        assert_eq!(links[0].url, "https://cdn.test/hls/master.m3u8");
        let requested = fetcher.requested();
        assert_eq!(
            &requested[..2],
            &[
                "https://primary.test/embed/tv?tmdb=1399&season=2&episode=3".to_string(),
                "https://fallback.test/embed/tv?tmdb=1399&season=2&episode=3".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_no_iframe_anywhere_is_extraction_failure() {
        let fetcher = Arc::new(
            CannedFetcher::default()
                .page("primary.test", NO_PLAYER)
                .page("fallback.test", NO_PLAYER),
        );
        let err = provider(fetcher)
            .extract_streaming_links("550", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ScraperError::ExtractionFailed(_)));
    }

    #[tokio::test]
    async fn test_missing_file_entry_fails() {
        let fetcher = Arc::new(
            CannedFetcher::default()
                .page("primary.test/embed", EMBED)
                .page("player.test/rcp/abc", IFRAME)
                .page("player.test/prorcp/xyz", "<html>no player config</html>"),
        );
        let err = provider(fetcher)
            .extract_streaming_links("550", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ScraperError::ExtractionFailed(_)));
    }
}

mod vidlink_tests {
    use super::*;
    use crate::scraper::MediaTarget;

    fn provider(fetcher: Arc<CannedFetcher>) -> VidLinkProvider {
        VidLinkProvider::new(
            catalog(),
            fetcher,
            VidLinkConfig {
                base_url: "https://vidlink.test".to_string(),
                passphrase: "test passphrase".to_string(),
                gated_hosts: vec!["files.test".to_string()],
            },
        )
    }

    #[test]
    fn test_api_url_encrypts_only_the_id() {
        let provider = provider(Arc::new(CannedFetcher::default()));

        let movie = provider.api_url("550", MediaTarget::Movie).unwrap();
        assert!(movie.starts_with("https://vidlink.test/api/b/movie/"));
        assert!(!movie.ends_with("/550"));

        let episode = provider
            .api_url("1399", MediaTarget::Episode { season: 1, episode: 2 })
            .unwrap();
        assert!(episode.starts_with("https://vidlink.test/api/b/tv/"));
        assert!(episode.ends_with("/1/2"));
    }

    #[tokio::test]
    async fn test_links_are_deduplicated_and_ranked() {
        let payload = json!({
            "stream": {
                "qualities": {
                    "720": { "type": "mp4", "url": "https://files.test/movie_720.mp4" },
                    "1080": { "type": "mp4", "url": "https://files.test/movie_1080.mp4" }
                },
                "playlist": "https://cdn.test/master.m3u8",
                "captions": [{ "url": "https://cdn.test/en.vtt", "language": "English" }]
            },
            "mirror": { "url": "https://files.test/movie_720.mp4" }
        });
        let fetcher = Arc::new(
            CannedFetcher::default().page("vidlink.test/api/b/movie/", payload.to_string()),
        );

        let links = provider(fetcher)
            .extract_streaming_links("550", None, None)
            .await
            .unwrap();

        let qualities: Vec<&str> = links.iter().map(|l| l.quality.as_str()).collect();
        assert_eq!(qualities, vec!["Auto", "1080p", "720p"]);
        assert!(links.iter().all(|l| l.server == "VidLink"));
        assert!(links.iter().all(|l| l.requires_referer));
        assert!(links.iter().all(|l| l.subtitles.as_ref().is_some_and(|s| s.len() == 1)));
    }

    #[tokio::test]
    async fn test_empty_payload_is_no_sources() {
        let fetcher = Arc::new(
            CannedFetcher::default().page("vidlink.test/api/b/tv/", r#"{"stream": null}"#),
        );
        let err = provider(fetcher)
            .extract_streaming_links("1399", Some(1), Some(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ScraperError::NoSourcesFound));
    }
}

mod multiserver_tests {
    use super::*;

    fn provider(fetcher: Arc<CannedFetcher>) -> MultiServerProvider {
        MultiServerProvider::new(
            catalog(),
            fetcher,
            MultiServerConfig {
                base_url: "https://multi.test".to_string(),
                servers: vec!["alpha".to_string(), "beta".to_string(), "gamma".to_string()],
                secret_passphrase: "secret".to_string(),
                oracle_url: "https://oracle.test/decrypt".to_string(),
                oracle_passphrase: "oracle pw".to_string(),
                gated_hosts: Vec::new(),
            },
        )
    }

    #[tokio::test]
    async fn test_merges_plain_and_oracle_decrypted_servers() {
        let decrypted = json!({ "sources": [{ "url": "https://cdn.test/beta/movie_720.mp4" }] });
        let fetcher = Arc::new(
            CannedFetcher::default()
                .page(
                    "service=alpha",
                    json!({ "data": { "sources": [{ "url": "https://cdn.test/alpha/master.m3u8" }] } })
                        .to_string(),
                )
                .page(
                    "service=beta",
                    json!({ "encrypted": true, "data": "CIPHERTEXT" }).to_string(),
                )
                .post(
                    "oracle.test/decrypt",
                    json!({ "decrypted": decrypted.to_string() }),
                ),
        );

        let links = provider(fetcher.clone())
            .extract_streaming_links("550", None, None)
            .await
            .unwrap();

        assert_eq!(links.len(), 2);
        assert_eq!(links[0].url, "https://cdn.test/alpha/master.m3u8");
        assert_eq!(links[0].server, "MultiServer (alpha)");
        assert_eq!(links[1].quality, "720p");
        assert_eq!(links[1].server, "MultiServer (beta)");

        // gamma has no canned page; its failure is swallowed
        assert!(fetcher.requested().iter().any(|u| u.contains("service=gamma")));
    }

    #[tokio::test]
    async fn test_episode_requests_use_tv_provider() {
        let fetcher = Arc::new(CannedFetcher::default().page(
            "service=alpha",
            json!({ "url": "https://cdn.test/ep/master.m3u8" }).to_string(),
        ));

        let links = provider(fetcher.clone())
            .extract_streaming_links("1399", Some(1), Some(4))
            .await
            .unwrap();
        assert_eq!(links.len(), 1);

        let requested = fetcher.requested();
        assert!(requested.iter().all(|u| u.contains("requestID=tvVideoProvider")));
        assert!(requested.iter().all(|u| u.contains("season=1&episode=4")));
    }

    #[tokio::test]
    async fn test_all_servers_failing_is_no_sources() {
        let fetcher = Arc::new(
            CannedFetcher::default()
                .page("service=alpha", "not json")
                .page("service=beta", json!({ "encrypted": true, "data": "X" }).to_string()),
        );
        let err = provider(fetcher)
            .extract_streaming_links("550", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ScraperError::NoSourcesFound));
    }
}

mod registry_tests {
    use super::*;

    struct NamedProvider {
        name: &'static str,
    }

    #[async_trait]
    impl StreamingProvider for NamedProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch_home_content(&self) -> Result<Vec<ContentCarousel>> {
            Ok(Vec::new())
        }

        async fn search(&self, query: &str, page: u32) -> Result<ContentSearchResult> {
            Ok(ContentSearchResult::empty(self.name, query, page))
        }

        async fn fetch_content_details(
            &self,
            id: &str,
            _media_type: Option<MediaType>,
        ) -> Result<ContentSummary> {
            Ok(ContentSummary::new(id, "Title", self.name))
        }

        async fn extract_streaming_links(
            &self,
            content_id: &str,
            _season: Option<u32>,
            _episode: Option<u32>,
        ) -> Result<Vec<ExtractedLink>> {
            Ok(vec![ExtractedLink::new(
                format!("https://{}.test/{content_id}.m3u8", self.name),
                "Auto",
                self.name,
            )])
        }
    }

    fn registry(store: Arc<MemoryStore>) -> ProviderRegistry {
        let registry = ProviderRegistry::new(store, "alpha");
        registry.register(Arc::new(NamedProvider { name: "alpha" }));
        registry.register(Arc::new(NamedProvider { name: "beta" }));
        registry
    }

    #[tokio::test]
    async fn test_register_replaces_same_name() {
        let registry = registry(Arc::new(MemoryStore::new()));
        registry.register(Arc::new(NamedProvider { name: "beta" }));

        assert_eq!(registry.provider_names(), vec!["alpha", "beta"]);
    }

    #[tokio::test]
    async fn test_set_active_is_persisted_and_restored() {
        let store = Arc::new(MemoryStore::new());
        let registry = registry(store.clone());

        registry.set_active("beta").await.unwrap();
        assert_eq!(registry.active_name(), "beta");
        assert_eq!(
            store.read(ACTIVE_PROVIDER_KEY).await.unwrap().as_deref(),
            Some(b"beta".as_slice())
        );

        let reloaded = ProviderRegistry::load(store, "alpha").await;
        assert_eq!(reloaded.active_name(), "beta");
    }

    #[tokio::test]
    async fn test_unknown_name_is_rejected() {
        let registry = registry(Arc::new(MemoryStore::new()));

        let err = registry.set_active("gamma").await.unwrap_err();
        assert!(matches!(err, ScraperError::InvalidConfiguration(_)));
        assert_eq!(registry.active_name(), "alpha");
    }

    #[tokio::test]
    async fn test_unregistered_active_is_configuration_error() {
        let store: Arc<dyn DurableStore> = Arc::new(MemoryStore::new());
        let registry = ProviderRegistry::new(store, "missing");

        assert!(matches!(
            registry.active(),
            Err(ScraperError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            registry.extract_streaming_links("1", None, None).await,
            Err(ScraperError::InvalidConfiguration(_))
        ));
    }

    #[tokio::test]
    async fn test_blank_persisted_name_uses_default() {
        let store = Arc::new(MemoryStore::new());
        store.write(ACTIVE_PROVIDER_KEY, b"  \n").await.unwrap();

        let registry = ProviderRegistry::load(store, "alpha").await;
        assert_eq!(registry.active_name(), "alpha");
    }

    #[tokio::test]
    async fn test_calls_route_to_active_provider() {
        let registry = registry(Arc::new(MemoryStore::new()));

        let links = registry.extract_streaming_links("7", None, None).await.unwrap();
        assert_eq!(links[0].server, "alpha");

        registry.set_active("beta").await.unwrap();
        let links = registry.extract_streaming_links("7", None, None).await.unwrap();
        assert_eq!(links[0].server, "beta");
    }
}
