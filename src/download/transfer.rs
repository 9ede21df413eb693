use super::{DownloadError, Result};
use crate::scraper::{BROWSER_USER_AGENT, ExtractedLink};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{
    Client, RequestBuilder, StatusCode,
    header::{CONTENT_LENGTH, RANGE},
};
use std::path::PathBuf;
use std::time::Duration;
use tokio::{fs::OpenOptions, io::AsyncWriteExt, sync::watch};
use tracing::{debug, info};

/// Signal from the manager to a running transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferControl {
    Run,
    Stop,
}

/// Receives progress in `0.0..=1.0`
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report(&self, fraction: f64);
}

#[derive(Debug, Clone)]
pub struct TransferJob {
    pub link: ExtractedLink,
    pub destination: PathBuf,
}

/// Moves the bytes behind one link onto disk
#[async_trait]
pub trait Transfer: Send + Sync {
    /// Returns the written file. Must return [`DownloadError::Interrupted`] promptly once
    /// `control` flips to [`TransferControl::Stop`], leaving any partial file in place.
    async fn run(
        &self,
        job: TransferJob,
        progress: &dyn ProgressSink,
        control: watch::Receiver<TransferControl>,
    ) -> Result<PathBuf>;
}

/// reqwest-backed transfer for progressive files and HLS playlists
#[derive(Clone)]
pub struct HttpTransfer {
    client: Client,
}

impl HttpTransfer {
    pub fn new() -> Self {
        let client = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .connect_timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { client }
    }

    fn get(&self, url: &str, link: &ExtractedLink) -> RequestBuilder {
        link.headers
            .iter()
            .fold(self.client.get(url), |req, (name, value)| {
                req.header(name.as_str(), value.as_str())
            })
    }

    async fn direct(
        &self,
        job: &TransferJob,
        progress: &dyn ProgressSink,
        control: &mut watch::Receiver<TransferControl>,
    ) -> Result<PathBuf> {
        let existing = tokio::fs::metadata(&job.destination)
            .await
            .map(|m| m.len())
            .unwrap_or(0);

        let mut request = self.get(&job.link.url, &job.link);
        if existing > 0 {
            request = request.header(RANGE, format!("bytes={existing}-"));
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::RANGE_NOT_SATISFIABLE && existing > 0 {
            debug!("{} already complete on disk", job.destination.display());
            progress.report(1.0).await;
            return Ok(job.destination.clone());
        }
        if !status.is_success() {
            return Err(DownloadError::Transfer(format!("{} returned {status}", job.link.url)));
        }

        // A server that ignores Range sends the whole body again
        let resumed = status == StatusCode::PARTIAL_CONTENT;
        let offset = if resumed { existing } else { 0 };
        let total = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(|len| len + offset);

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(resumed)
            .truncate(!resumed)
            .open(&job.destination)
            .await?;

        let mut written = offset;
        let mut reported = 0u32;
        let mut stream = response.bytes_stream();

        loop {
            tokio::select! {
                changed = control.changed() => {
                    if changed.is_err() || *control.borrow() == TransferControl::Stop {
                        file.flush().await?;
                        return Err(DownloadError::Interrupted);
                    }
                }
                next = stream.next() => {
                    let Some(chunk) = next else { break };
                    let chunk = chunk?;
                    file.write_all(&chunk).await?;
                    written += chunk.len() as u64;

                    if let Some(total) = total.filter(|t| *t > 0) {
                        let percent = ((written * 100) / total).min(100) as u32;
                        if percent > reported {
                            reported = percent;
                            progress.report(f64::from(percent) / 100.0).await;
                        }
                    }
                }
            }
        }

        file.flush().await?;
        progress.report(1.0).await;
        Ok(job.destination.clone())
    }

    async fn hls(
        &self,
        job: &TransferJob,
        progress: &dyn ProgressSink,
        control: &mut watch::Receiver<TransferControl>,
    ) -> Result<PathBuf> {
        let mut playlist_url = job.link.url.clone();
        let mut playlist = self.fetch_text(&playlist_url, &job.link).await?;

        if let Some(variant) = best_variant(&playlist) {
            playlist_url = join_url(&playlist_url, &variant)?;
            debug!("HLS variant selected: {playlist_url}");
            playlist = self.fetch_text(&playlist_url, &job.link).await?;
        }

        if playlist
            .lines()
            .any(|l| l.starts_with("#EXT-X-KEY") && !l.contains("METHOD=NONE"))
        {
            return Err(DownloadError::Transfer("Encrypted HLS is not supported".to_string()));
        }

        let segments = media_segments(&playlist);
        if segments.is_empty() {
            return Err(DownloadError::Transfer("HLS playlist has no segments".to_string()));
        }

        // Segments are not resumable individually; the output is rebuilt from the start
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&job.destination)
            .await?;

        for (index, segment) in segments.iter().enumerate() {
            if *control.borrow() == TransferControl::Stop {
                file.flush().await?;
                return Err(DownloadError::Interrupted);
            }

            let url = join_url(&playlist_url, segment)?;
            let response = loop {
                tokio::select! {
                    changed = control.changed() => {
                        if changed.is_err() || *control.borrow() == TransferControl::Stop {
                            file.flush().await?;
                            return Err(DownloadError::Interrupted);
                        }
                    }
                    response = self.get(&url, &job.link).send() => break response?,
                }
            };

            if !response.status().is_success() {
                return Err(DownloadError::Transfer(format!(
                    "Segment {index} returned {}",
                    response.status()
                )));
            }
            let bytes = response.bytes().await?;
            file.write_all(&bytes).await?;

            progress.report((index + 1) as f64 / segments.len() as f64).await;
        }

        file.flush().await?;
        info!("HLS download assembled from {} segments", segments.len());
        Ok(job.destination.clone())
    }

    async fn fetch_text(&self, url: &str, link: &ExtractedLink) -> Result<String> {
        let response = self.get(url, link).send().await?;
        if !response.status().is_success() {
            return Err(DownloadError::Transfer(format!("{url} returned {}", response.status())));
        }
        Ok(response.text().await?)
    }
}

impl Default for HttpTransfer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transfer for HttpTransfer {
    async fn run(
        &self,
        job: TransferJob,
        progress: &dyn ProgressSink,
        mut control: watch::Receiver<TransferControl>,
    ) -> Result<PathBuf> {
        if let Some(parent) = job.destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        if job.link.is_hls() {
            self.hls(&job, progress, &mut control).await
        } else {
            self.direct(&job, progress, &mut control).await
        }
    }
}

fn join_url(base: &str, reference: &str) -> Result<String> {
    let base = reqwest::Url::parse(base)
        .map_err(|e| DownloadError::Transfer(format!("Invalid playlist URL {base}: {e}")))?;
    base.join(reference)
        .map(String::from)
        .map_err(|e| DownloadError::Transfer(format!("Invalid playlist entry {reference}: {e}")))
}

/// `(bandwidth, uri)` for every `#EXT-X-STREAM-INF` entry of a master playlist
pub fn master_variants(playlist: &str) -> Vec<(u64, String)> {
    let mut variants = Vec::new();
    let mut lines = playlist.lines().map(str::trim);

    while let Some(line) = lines.next() {
        let Some(attributes) = line.strip_prefix("#EXT-X-STREAM-INF:") else {
            continue;
        };
        let bandwidth = attributes
            .split(',')
            .filter_map(|attr| attr.trim().strip_prefix("BANDWIDTH="))
            .find_map(|v| v.parse::<u64>().ok())
            .unwrap_or(0);

        if let Some(uri) = lines.by_ref().find(|l| !l.is_empty() && !l.starts_with('#')) {
            variants.push((bandwidth, uri.to_string()));
        }
    }
    variants
}

/// Highest-bandwidth variant; `None` for a media playlist
pub fn best_variant(playlist: &str) -> Option<String> {
    master_variants(playlist)
        .into_iter()
        .max_by_key(|(bandwidth, _)| *bandwidth)
        .map(|(_, uri)| uri)
}

/// Segment URIs of a media playlist, in order
pub fn media_segments(playlist: &str) -> Vec<String> {
    playlist
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}
