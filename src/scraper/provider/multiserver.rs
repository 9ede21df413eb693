//! Provider backed by several independently named servers queried concurrently.
//!
//! Each server answers with either a plain JSON payload or an encrypted blob that is
//! unwrapped by the remote decryption oracle. A server that fails for any reason
//! contributes no links; it never fails the whole extraction.

use super::{
    MediaTarget, MetadataCatalog, PageFetcher, StreamingProvider, links_from_payload,
    playback_headers,
};
use crate::scraper::{
    Result, ScraperError,
    crypto::{CbcObfuscator, DecryptionOracle},
    normalizer::normalize_links,
    types::{ContentCarousel, ContentSearchResult, ContentSummary, ExtractedLink, MediaType},
};
use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

const NAME: &str = "MultiServer";

#[derive(Debug, Clone)]
pub struct MultiServerConfig {
    pub base_url: String,
    pub servers: Vec<String>,
    /// Passphrase for the CBC-obfuscated request secret
    pub secret_passphrase: String,
    pub oracle_url: String,
    pub oracle_passphrase: String,
    pub gated_hosts: Vec<String>,
}

impl Default for MultiServerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://rivestream.org".to_string(),
            servers: ["flowcast", "primevids", "guru", "shadow"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            secret_passphrase: String::new(),
            oracle_url: String::new(),
            oracle_passphrase: String::new(),
            gated_hosts: Vec::new(),
        }
    }
}

pub struct MultiServerProvider {
    catalog: MetadataCatalog,
    fetcher: Arc<dyn PageFetcher>,
    obfuscator: CbcObfuscator,
    oracle: DecryptionOracle,
    config: MultiServerConfig,
}

impl MultiServerProvider {
    pub fn new(
        catalog: MetadataCatalog,
        fetcher: Arc<dyn PageFetcher>,
        config: MultiServerConfig,
    ) -> Self {
        Self {
            catalog,
            obfuscator: CbcObfuscator::new(&config.secret_passphrase),
            oracle: DecryptionOracle::new(
                fetcher.clone(),
                config.oracle_url.clone(),
                config.oracle_passphrase.clone(),
            ),
            fetcher,
            config,
        }
    }

    /// Per-server request. The secret is id, season and episode concatenated, then encrypted.
    pub(crate) fn server_url(
        &self,
        server: &str,
        content_id: &str,
        target: MediaTarget,
    ) -> Result<String> {
        let base = self.config.base_url.trim_end_matches('/');
        let id = urlencoding::encode(content_id);

        let url = match target {
            MediaTarget::Movie => {
                let secret = self.obfuscator.encrypt_for_url(content_id)?;
                format!(
                    "{base}/api/backendfetch?requestID=movieVideoProvider&id={id}&service={server}&secretKey={secret}"
                )
            }
            MediaTarget::Episode { season, episode } => {
                let secret = self
                    .obfuscator
                    .encrypt_for_url(&format!("{content_id}{season}{episode}"))?;
                format!(
                    "{base}/api/backendfetch?requestID=tvVideoProvider&id={id}&season={season}&episode={episode}&service={server}&secretKey={secret}"
                )
            }
        };

        Ok(url)
    }

    async fn fetch_server(
        &self,
        server: &str,
        content_id: &str,
        target: MediaTarget,
    ) -> Result<Vec<ExtractedLink>> {
        let url = self.server_url(server, content_id, target)?;
        let headers = playback_headers(&self.config.base_url);
        let referer = headers.get("Referer").cloned().unwrap_or_default();

        let payload = self
            .fetcher
            .fetch_json(&url, &[("Referer", referer.as_str())])
            .await?;

        let payload = match encrypted_blob(&payload) {
            Some(ciphertext) => {
                debug!("{NAME}: {server} response is encrypted, asking oracle");
                self.oracle.decrypt(ciphertext).await?
            }
            None => payload,
        };

        let label = format!("{NAME} ({server})");
        Ok(links_from_payload(
            &payload,
            &label,
            &headers,
            &self.config.gated_hosts,
        ))
    }
}

/// Ciphertext of a response flagged as encrypted
pub(crate) fn encrypted_blob(payload: &Value) -> Option<&str> {
    let flagged = ["encrypted", "isEncrypted"]
        .iter()
        .any(|key| payload.get(*key).and_then(Value::as_bool) == Some(true));

    if !flagged {
        return None;
    }

    ["data", "encryptedData", "payload"]
        .iter()
        .find_map(|key| payload.get(*key).and_then(Value::as_str))
}

#[async_trait]
impl StreamingProvider for MultiServerProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn fetch_home_content(&self) -> Result<Vec<ContentCarousel>> {
        Ok(self.catalog.home_content(NAME).await)
    }

    async fn search(&self, query: &str, page: u32) -> Result<ContentSearchResult> {
        self.catalog.search(NAME, query, page).await
    }

    async fn fetch_content_details(
        &self,
        id: &str,
        media_type: Option<MediaType>,
    ) -> Result<ContentSummary> {
        self.catalog.content_details(NAME, id, media_type).await
    }

    async fn extract_streaming_links(
        &self,
        content_id: &str,
        season: Option<u32>,
        episode: Option<u32>,
    ) -> Result<Vec<ExtractedLink>> {
        let target = MediaTarget::from_ids(season, episode);

        let branches = self.config.servers.iter().map(|server| async move {
            match self.fetch_server(server, content_id, target).await {
                Ok(links) => {
                    debug!("{NAME}: {server} returned {} links", links.len());
                    links
                }
                Err(e) => {
                    warn!("{NAME}: {server} failed: {e}");
                    Vec::new()
                }
            }
        });

        let links: Vec<ExtractedLink> = join_all(branches).await.into_iter().flatten().collect();

        if links.is_empty() {
            return Err(ScraperError::NoSourcesFound);
        }

        Ok(normalize_links(links))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encrypted_blob_detection() {
        assert_eq!(
            encrypted_blob(&json!({ "encrypted": true, "data": "abc" })),
            Some("abc")
        );
        assert_eq!(
            encrypted_blob(&json!({ "isEncrypted": true, "encryptedData": "xyz" })),
            Some("xyz")
        );
        assert_eq!(encrypted_blob(&json!({ "encrypted": false, "data": "abc" })), None);
        assert_eq!(encrypted_blob(&json!({ "encrypted": "yes", "data": "abc" })), None);
        assert_eq!(encrypted_blob(&json!(["encrypted"])), None);
    }
}
