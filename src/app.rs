//! Composition root: every service is built here and handed to handlers through [`Ctx`]

use crate::{
    cache::{CacheConfig, ContentCache},
    config::AppConfig,
    download::{DownloadConfig, DownloadManager, HttpTransfer},
    scraper::{
        HttpClient, MetadataCatalog, MultiServerProvider, PageFetcher, ProviderRegistry,
        TmdbClient, VidLinkProvider, VidSrcProvider,
    },
    services::StreamService,
    storage::{DurableStore, FileStore},
};
use anyhow::Context as _;
use std::sync::Arc;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct Ctx {
    pub config: Arc<AppConfig>,
    pub streams: StreamService,
    pub downloads: DownloadManager,
}

impl Ctx {
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        self.streams.registry()
    }

    pub fn cache(&self) -> &Arc<ContentCache> {
        self.streams.cache()
    }
}

pub async fn build_context(config: AppConfig) -> anyhow::Result<Ctx> {
    let data_dir = &config.storage.data_dir;
    tokio::fs::create_dir_all(data_dir)
        .await
        .with_context(|| format!("creating data directory {}", data_dir.display()))?;
    let store: Arc<dyn DurableStore> = Arc::new(FileStore::new(data_dir));

    let cache = Arc::new(ContentCache::new(
        store.clone(),
        CacheConfig::from(&config.cache),
    ));
    let purged = cache.purge_expired().await;
    info!("Cache ready ({purged} expired entries purged)");

    let providers = &config.providers;
    if providers.tmdb_api_key.is_empty() {
        warn!("No TMDB API key configured; catalog calls will fail");
    }
    let tmdb = match &providers.tmdb_base_url {
        Some(base) => TmdbClient::with_base_url(base.clone(), providers.tmdb_api_key.clone()),
        None => TmdbClient::new(providers.tmdb_api_key.clone()),
    };
    let catalog = MetadataCatalog::new(Arc::new(tmdb));
    let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpClient::default());

    let registry =
        Arc::new(ProviderRegistry::load(store.clone(), providers.default_provider.clone()).await);
    registry.register(Arc::new(VidSrcProvider::new(
        catalog.clone(),
        fetcher.clone(),
        providers.vidsrc(),
    )));
    registry.register(Arc::new(VidLinkProvider::new(
        catalog.clone(),
        fetcher.clone(),
        providers.vidlink(),
    )));
    registry.register(Arc::new(MultiServerProvider::new(
        catalog,
        fetcher,
        providers.multiserver(),
    )));

    if !registry.contains(&registry.active_name()) {
        warn!(
            "Active provider {} is not registered; switch providers before use",
            registry.active_name()
        );
    }
    info!(
        "Providers: {} (active: {})",
        registry.provider_names().join(", "),
        registry.active_name()
    );

    let download_config = DownloadConfig::from(&config.downloads);
    tokio::fs::create_dir_all(&download_config.directory)
        .await
        .with_context(|| {
            format!(
                "creating download directory {}",
                download_config.directory.display()
            )
        })?;
    let downloads =
        DownloadManager::load(store, Arc::new(HttpTransfer::new()), download_config).await;

    Ok(Ctx {
        config: Arc::new(config),
        streams: StreamService::new(registry, cache),
        downloads,
    })
}
