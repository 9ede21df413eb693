use crate::scraper::{Result, ScraperError};
use async_trait::async_trait;
use reqwest::{Client, header::HeaderMap, header::HeaderName, header::HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

/// Desktop browser identity sent to providers that reject non-browser clients
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Network seam for resolution chains.
///
/// Every hop an adapter makes goes through this trait so chains can run
/// against canned pages as well as the real network.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// GET an absolute URL and return the body as text
    async fn fetch_text(&self, url: &str, headers: &[(&str, &str)]) -> Result<String>;

    /// POST a JSON body to an absolute URL and return the parsed JSON response
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value>;

    /// GET an absolute URL and parse the body as JSON
    async fn fetch_json(&self, url: &str, headers: &[(&str, &str)]) -> Result<Value> {
        let text = self.fetch_text(url, headers).await?;
        serde_json::from_str(&text)
            .map_err(|e| ScraperError::ParsingFailed(format!("JSON parse error: {e}")))
    }
}

/// HTTP client wrapper for providers
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
}

impl HttpClient {
    /// Client rooted at `base_url`; relative endpoints are appended to it
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Build full URL from endpoint
    #[must_use]
    pub fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Execute GET request with query parameters
    pub async fn get_with_params<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let url = self.url(endpoint);
        let response = self
            .client
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(ScraperError::Network)?;

        let response = Self::check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ScraperError::ParsingFailed(format!("JSON parse error: {e}")))
    }

    fn header_map(headers: &[(&str, &str)]) -> Result<HeaderMap> {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ScraperError::InvalidUrl(format!("Invalid header name {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ScraperError::InvalidUrl(format!("Invalid header value: {e}")))?;
            map.insert(name, value);
        }
        Ok(map)
    }

    /// Reject non-success responses, keeping the body as the error message
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();

        if !status.is_success() {
            let status_code = status.as_u16();
            let message = response.text().await.unwrap_or_default();

            return Err(ScraperError::Api {
                status: status_code,
                message,
            });
        }

        Ok(response)
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new("")
    }
}

#[async_trait]
impl PageFetcher for HttpClient {
    async fn fetch_text(&self, url: &str, headers: &[(&str, &str)]) -> Result<String> {
        reqwest::Url::parse(url).map_err(|e| ScraperError::InvalidUrl(format!("{url}: {e}")))?;

        let response = self
            .client
            .get(url)
            .headers(Self::header_map(headers)?)
            .send()
            .await
            .map_err(ScraperError::Network)?;

        let response = Self::check_status(response).await?;
        response.text().await.map_err(ScraperError::Network)
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        reqwest::Url::parse(url).map_err(|e| ScraperError::InvalidUrl(format!("{url}: {e}")))?;

        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await
            .map_err(ScraperError::Network)?;

        let response = Self::check_status(response).await?;
        response
            .json::<Value>()
            .await
            .map_err(|e| ScraperError::ParsingFailed(format!("JSON parse error: {e}")))
    }
}
