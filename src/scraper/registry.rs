//! Name-keyed provider table with a persisted active selection

use crate::scraper::{
    Result, ScraperError,
    provider::StreamingProvider,
    types::{ContentCarousel, ContentSearchResult, ContentSummary, ExtractedLink, MediaType},
};
use crate::storage::DurableStore;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Storage key holding the selected provider name
pub const ACTIVE_PROVIDER_KEY: &str = "settings/active_provider";

pub struct ProviderRegistry {
    providers: DashMap<String, Arc<dyn StreamingProvider>>,
    active: RwLock<String>,
    store: Arc<dyn DurableStore>,
}

impl ProviderRegistry {
    /// Empty registry whose selection starts at `default_name`
    pub fn new(store: Arc<dyn DurableStore>, default_name: impl Into<String>) -> Self {
        Self {
            providers: DashMap::new(),
            active: RwLock::new(default_name.into()),
            store,
        }
    }

    /// Like [`Self::new`], but restores a previously persisted selection
    pub async fn load(store: Arc<dyn DurableStore>, default_name: impl Into<String>) -> Self {
        let default_name = default_name.into();
        let active = match store.read(ACTIVE_PROVIDER_KEY).await {
            Ok(Some(bytes)) => String::from_utf8(bytes)
                .ok()
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .unwrap_or(default_name),
            Ok(None) => default_name,
            Err(e) => {
                warn!("Failed to read active provider, using {default_name}: {e}");
                default_name
            }
        };

        debug!("Active provider: {active}");
        Self::new(store, active)
    }

    /// Register an adapter under its own name; an existing entry with that name is replaced
    pub fn register(&self, provider: Arc<dyn StreamingProvider>) {
        let name = provider.name().to_string();
        if self.providers.insert(name.clone(), provider).is_some() {
            debug!("Replaced provider {name}");
        }
    }

    /// Registered names, sorted
    pub fn provider_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    pub fn active_name(&self) -> String {
        self.active.read().clone()
    }

    /// Switch the active provider. The name must be registered; a failed save only logs.
    pub async fn set_active(&self, name: &str) -> Result<()> {
        if !self.contains(name) {
            return Err(ScraperError::InvalidConfiguration(format!(
                "Unknown provider: {name}"
            )));
        }

        let previous = std::mem::replace(&mut *self.active.write(), name.to_string());
        info!("Active provider: {previous} -> {name}");

        if let Err(e) = self.store.write(ACTIVE_PROVIDER_KEY, name.as_bytes()).await {
            warn!("Failed to persist active provider {name}: {e}");
        }
        Ok(())
    }

    /// The adapter behind the current selection
    pub fn active(&self) -> Result<Arc<dyn StreamingProvider>> {
        let name = self.active_name();
        self.providers
            .get(&name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                ScraperError::InvalidConfiguration(format!("No provider registered as {name}"))
            })
    }

    pub async fn fetch_home_content(&self) -> Result<Vec<ContentCarousel>> {
        self.active()?.fetch_home_content().await
    }

    pub async fn search(&self, query: &str, page: u32) -> Result<ContentSearchResult> {
        self.active()?.search(query, page).await
    }

    pub async fn fetch_content_details(
        &self,
        id: &str,
        media_type: Option<MediaType>,
    ) -> Result<ContentSummary> {
        self.active()?.fetch_content_details(id, media_type).await
    }

    pub async fn extract_streaming_links(
        &self,
        content_id: &str,
        season: Option<u32>,
        episode: Option<u32>,
    ) -> Result<Vec<ExtractedLink>> {
        self.active()?
            .extract_streaming_links(content_id, season, episode)
            .await
    }
}
