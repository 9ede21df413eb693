use super::{
    DownloadError, Result,
    model::{Download, DownloadRequest, DownloadSnapshot, DownloadState, NetworkKind},
    transfer::{ProgressSink, Transfer, TransferControl, TransferJob},
};
use crate::storage::DurableStore;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const ACTIVE_BUCKET_KEY: &str = "downloads/active.json";
pub const QUEUED_BUCKET_KEY: &str = "downloads/queued.json";
pub const COMPLETED_BUCKET_KEY: &str = "downloads/completed.json";
pub const FAILED_BUCKET_KEY: &str = "downloads/failed.json";

#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Transfers running at once
    pub max_concurrent: usize,
    pub directory: PathBuf,
    /// When false a cellular network pauses everything
    pub allow_cellular: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            directory: dirs::download_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("StreamVault"),
            allow_cellular: false,
        }
    }
}

struct Running {
    control: watch::Sender<TransferControl>,
    generation: u64,
}

/// Everything guarded by the single writer lock
#[derive(Default)]
struct QueueState {
    /// Downloading and paused records
    active: Vec<Download>,
    /// FIFO wait list
    queued: VecDeque<Download>,
    completed: Vec<Download>,
    failed: Vec<Download>,
    /// Live transfers; its size is the number of occupied slots
    running: HashMap<Uuid, Running>,
    next_generation: u64,
}

impl QueueState {
    fn snapshot(&self) -> DownloadSnapshot {
        DownloadSnapshot {
            active: self.active.clone(),
            queued: self.queued.iter().cloned().collect(),
            completed: self.completed.clone(),
            failed: self.failed.clone(),
        }
    }

    fn find(&self, id: Uuid) -> Option<&Download> {
        self.active
            .iter()
            .chain(self.queued.iter())
            .chain(self.completed.iter())
            .chain(self.failed.iter())
            .find(|d| d.id == id)
    }

    fn take_active(&mut self, id: Uuid) -> Option<Download> {
        let index = self.active.iter().position(|d| d.id == id)?;
        Some(self.active.remove(index))
    }

    fn take_queued(&mut self, id: Uuid) -> Option<Download> {
        let index = self.queued.iter().position(|d| d.id == id)?;
        self.queued.remove(index)
    }

    fn take_terminal(&mut self, id: Uuid) -> Option<Download> {
        if let Some(index) = self.completed.iter().position(|d| d.id == id) {
            return Some(self.completed.remove(index));
        }
        let index = self.failed.iter().position(|d| d.id == id)?;
        Some(self.failed.remove(index))
    }

    fn stop(&mut self, id: Uuid) {
        if let Some(running) = self.running.remove(&id) {
            let _ = running.control.send(TransferControl::Stop);
        }
    }

    fn owns(&self, id: Uuid, generation: u64) -> bool {
        self.running
            .get(&id)
            .is_some_and(|r| r.generation == generation)
    }
}

struct Inner {
    state: Mutex<QueueState>,
    transfer: Arc<dyn Transfer>,
    store: Arc<dyn DurableStore>,
    config: DownloadConfig,
    network_blocked: AtomicBool,
}

/// Download queue manager.
///
/// All bucket mutations happen under one async lock and are followed by a full flush of
/// the four buckets. Persistence failures are logged and never undo the in-memory change.
#[derive(Clone)]
pub struct DownloadManager {
    inner: Arc<Inner>,
}

struct RecordProgress {
    manager: DownloadManager,
    id: Uuid,
    generation: u64,
}

#[async_trait]
impl ProgressSink for RecordProgress {
    async fn report(&self, fraction: f64) {
        self.manager
            .record_progress(self.id, self.generation, fraction)
            .await;
    }
}

impl DownloadManager {
    /// Restore persisted buckets.
    ///
    /// Completed records whose file is gone are dropped. Active and queued records are
    /// reloaded untouched and nothing is restarted until an explicit resume.
    pub async fn load(
        store: Arc<dyn DurableStore>,
        transfer: Arc<dyn Transfer>,
        config: DownloadConfig,
    ) -> Self {
        let active = read_bucket(store.as_ref(), ACTIVE_BUCKET_KEY).await;
        let queued = read_bucket(store.as_ref(), QUEUED_BUCKET_KEY).await;
        let stored_completed = read_bucket(store.as_ref(), COMPLETED_BUCKET_KEY).await;
        let failed = read_bucket(store.as_ref(), FAILED_BUCKET_KEY).await;

        let mut completed = Vec::with_capacity(stored_completed.len());
        let mut dropped = 0usize;
        for download in stored_completed {
            if file_exists(download.local_path.as_deref()).await {
                completed.push(download);
            } else {
                info!("Dropping completed download {} ({}): file missing", download.id, download.title);
                dropped += 1;
            }
        }

        info!(
            "Loaded downloads: {} active, {} queued, {} completed, {} failed",
            active.len(),
            queued.len(),
            completed.len(),
            failed.len()
        );

        let manager = Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState {
                    active,
                    queued: queued.into(),
                    completed,
                    failed,
                    ..QueueState::default()
                }),
                transfer,
                store,
                config,
                network_blocked: AtomicBool::new(false),
            }),
        };

        if dropped > 0 {
            let state = manager.inner.state.lock().await;
            manager.persist(&state).await;
        }
        manager
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.inner.config
    }

    fn has_capacity(&self, state: &QueueState) -> bool {
        !self.inner.network_blocked.load(Ordering::SeqCst)
            && state.running.len() < self.inner.config.max_concurrent
    }

    /// Start a transfer for `download` and place it in the active bucket
    fn start(&self, state: &mut QueueState, mut download: Download) -> Result<Download> {
        let link = download
            .link
            .clone()
            .ok_or(DownloadError::MissingLink(download.id))?;

        let destination = download
            .local_path
            .clone()
            .unwrap_or_else(|| self.inner.config.directory.join(download.file_name()));
        if destination.parent() != Some(self.inner.config.directory.as_path()) {
            let err = DownloadError::OutsideDirectory(destination);
            warn!("Refusing download {}: {err}", download.id);
            // A retry picks a fresh name inside the directory
            download.local_path = None;
            download.error = Some(err.to_string());
            download.set_state(DownloadState::Failed);
            state.failed.push(download);
            return Err(err);
        }
        download.local_path = Some(destination.clone());
        download.error = None;
        download.set_state(DownloadState::Downloading);

        let generation = state.next_generation;
        state.next_generation += 1;
        let (control, rx) = watch::channel(TransferControl::Run);
        state.running.insert(download.id, Running { control, generation });
        state.active.push(download.clone());

        info!("Starting download {} ({})", download.id, download.title);

        let manager = self.clone();
        let id = download.id;
        let job = TransferJob { link, destination };
        tokio::spawn(async move {
            let sink = RecordProgress {
                manager: manager.clone(),
                id,
                generation,
            };
            let result = manager.inner.transfer.run(job, &sink, rx).await;
            manager.finish(id, generation, result).await;
        });

        Ok(download)
    }

    /// Start or queue depending on free slots
    fn admit(&self, state: &mut QueueState, mut download: Download) -> Result<Download> {
        if self.has_capacity(state) {
            return self.start(state, download);
        }
        download.set_state(DownloadState::Queued);
        state.queued.push_back(download.clone());
        debug!("Queued download {} ({} waiting)", download.id, state.queued.len());
        Ok(download)
    }

    /// Fill free slots from the front of the wait list. Records without a link stay queued.
    fn promote(&self, state: &mut QueueState) {
        let mut held = Vec::new();
        while self.has_capacity(state) {
            let Some(next) = state.queued.pop_front() else {
                break;
            };
            if next.link.is_none() {
                warn!("Download {} has no stream link; leaving it queued", next.id);
                held.push(next);
                continue;
            }
            if let Err(e) = self.start(state, next) {
                warn!("Failed to start queued download: {e}");
            }
        }
        for download in held.into_iter().rev() {
            state.queued.push_front(download);
        }
    }

    async fn finish(&self, id: Uuid, generation: u64, result: Result<PathBuf>) {
        let mut guard = self.inner.state.lock().await;
        let state = &mut *guard;

        // Paused, cancelled or restarted since this transfer began
        if !state.owns(id, generation) {
            debug!("Ignoring stale transfer result for {id}");
            return;
        }
        state.running.remove(&id);

        if let Some(mut download) = state.take_active(id) {
            match result {
                Ok(path) => {
                    info!("Download {id} completed: {}", path.display());
                    download.local_path = Some(path);
                    download.progress = 1.0;
                    download.completed_at = Some(Utc::now());
                    download.set_state(DownloadState::Completed);
                    state.completed.push(download);
                }
                Err(e) => {
                    warn!("Download {id} failed: {e}");
                    download.error = Some(e.to_string());
                    download.set_state(DownloadState::Failed);
                    state.failed.push(download);
                }
            }
        }

        self.promote(state);
        self.persist(state).await;
    }

    async fn record_progress(&self, id: Uuid, generation: u64, fraction: f64) {
        let mut guard = self.inner.state.lock().await;
        if !guard.owns(id, generation) {
            return;
        }
        if let Some(download) = guard.active.iter_mut().find(|d| d.id == id) {
            download.progress = fraction.clamp(0.0, 1.0);
            download.updated_at = Utc::now();
        }
        self.persist(&guard).await;
    }

    async fn persist(&self, state: &QueueState) {
        let buckets: [(&str, Vec<&Download>); 4] = [
            (ACTIVE_BUCKET_KEY, state.active.iter().collect()),
            (QUEUED_BUCKET_KEY, state.queued.iter().collect()),
            (COMPLETED_BUCKET_KEY, state.completed.iter().collect()),
            (FAILED_BUCKET_KEY, state.failed.iter().collect()),
        ];

        for (key, downloads) in buckets {
            let bytes = match serde_json::to_vec(&downloads) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("Failed to encode {key}: {e}");
                    continue;
                }
            };
            if let Err(e) = self.inner.store.write(key, &bytes).await {
                warn!("Failed to persist {key}: {e}");
            }
        }
    }

    fn not_allowed(download: &Download, action: &'static str) -> DownloadError {
        DownloadError::InvalidTransition {
            id: download.id,
            state: download.state,
            action,
        }
    }

    pub async fn enqueue(&self, request: DownloadRequest) -> Result<Download> {
        let mut guard = self.inner.state.lock().await;
        let download = self.admit(&mut guard, Download::from_request(request))?;
        self.persist(&guard).await;
        Ok(download)
    }

    /// Stop a running transfer and free its slot; the partial file is kept
    pub async fn pause(&self, id: Uuid) -> Result<Download> {
        let mut guard = self.inner.state.lock().await;
        let state = &mut *guard;

        let Some(index) = state.active.iter().position(|d| d.id == id) else {
            return Err(match state.find(id) {
                Some(other) => Self::not_allowed(other, "pause"),
                None => DownloadError::NotFound(id),
            });
        };
        let running = state.running.contains_key(&id);
        let download = &mut state.active[index];
        if download.state != DownloadState::Downloading || !running {
            return Err(Self::not_allowed(download, "pause"));
        }

        download.set_state(DownloadState::Paused);
        let paused = download.clone();
        state.stop(id);
        info!("Paused download {id}");

        self.promote(state);
        self.persist(state).await;
        Ok(paused)
    }

    /// Restart a paused (or reloaded, no longer running) download, or queue it when no slot is free
    pub async fn resume(&self, id: Uuid) -> Result<Download> {
        let mut guard = self.inner.state.lock().await;
        let state = &mut *guard;

        if let Some(queued) = state.queued.iter().find(|d| d.id == id) {
            return Ok(queued.clone());
        }
        let Some(current) = state.active.iter().find(|d| d.id == id) else {
            return Err(match state.find(id) {
                Some(other) => Self::not_allowed(other, "resume"),
                None => DownloadError::NotFound(id),
            });
        };
        if state.running.contains_key(&id) {
            return Ok(current.clone());
        }
        if current.link.is_none() {
            return Err(DownloadError::MissingLink(id));
        }

        let Some(download) = state.take_active(id) else {
            return Err(DownloadError::NotFound(id));
        };
        let resumed = self.admit(state, download);
        self.persist(state).await;
        resumed
    }

    /// Remove a non-terminal download and its partial file
    pub async fn cancel(&self, id: Uuid) -> Result<Download> {
        let mut guard = self.inner.state.lock().await;
        let state = &mut *guard;

        let taken = state.take_active(id).or_else(|| state.take_queued(id));
        let Some(mut download) = taken else {
            return Err(match state.find(id) {
                Some(other) => Self::not_allowed(other, "cancel"),
                None => DownloadError::NotFound(id),
            });
        };

        state.stop(id);
        download.set_state(DownloadState::Cancelled);
        remove_file(download.local_path.as_deref()).await;
        info!("Cancelled download {id}");

        self.promote(state);
        self.persist(state).await;
        Ok(download)
    }

    /// Remove a completed or failed download and its file
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let mut guard = self.inner.state.lock().await;
        let state = &mut *guard;

        let Some(download) = state.take_terminal(id) else {
            return Err(match state.find(id) {
                Some(other) => Self::not_allowed(other, "delete"),
                None => DownloadError::NotFound(id),
            });
        };

        remove_file(download.local_path.as_deref()).await;
        info!("Deleted download {id} ({})", download.title);

        self.persist(state).await;
        Ok(())
    }

    /// Re-admit a failed download
    pub async fn retry(&self, id: Uuid) -> Result<Download> {
        let mut guard = self.inner.state.lock().await;
        let state = &mut *guard;

        let Some(index) = state.failed.iter().position(|d| d.id == id) else {
            return Err(match state.find(id) {
                Some(other) => Self::not_allowed(other, "retry"),
                None => DownloadError::NotFound(id),
            });
        };
        if state.failed[index].link.is_none() {
            return Err(DownloadError::MissingLink(id));
        }

        let mut download = state.failed.remove(index);
        download.progress = 0.0;
        download.error = None;
        let retried = self.admit(state, download);

        self.persist(state).await;
        retried
    }

    /// Pause every running transfer; returns how many were paused
    pub async fn pause_all(&self) -> usize {
        let mut guard = self.inner.state.lock().await;
        let state = &mut *guard;

        let ids: Vec<Uuid> = state.running.keys().copied().collect();
        for id in &ids {
            if let Some(download) = state.active.iter_mut().find(|d| d.id == *id) {
                download.set_state(DownloadState::Paused);
            }
            state.stop(*id);
        }

        if !ids.is_empty() {
            info!("Paused {} downloads", ids.len());
            self.persist(state).await;
        }
        ids.len()
    }

    /// Resume every paused or orphaned active record, then fill free slots from the queue.
    /// Returns how many records were resumed or re-queued.
    pub async fn resume_all(&self) -> usize {
        let mut guard = self.inner.state.lock().await;
        let state = &mut *guard;

        let idle: Vec<Uuid> = state
            .active
            .iter()
            .filter(|d| !state.running.contains_key(&d.id))
            .map(|d| d.id)
            .collect();

        for id in &idle {
            let Some(mut download) = state.take_active(*id) else {
                continue;
            };
            if download.link.is_none() {
                warn!("Download {id} has no stream link; moving it to the queue");
                download.set_state(DownloadState::Queued);
                state.queued.push_back(download);
                continue;
            }
            if let Err(e) = self.admit(state, download) {
                warn!("Failed to resume download {id}: {e}");
            }
        }

        self.promote(state);
        self.persist(state).await;
        idle.len()
    }

    /// React to a connectivity change: offline, or cellular when not allowed, pauses everything
    pub async fn apply_network(&self, kind: NetworkKind) {
        let blocked = match kind {
            NetworkKind::Offline => true,
            NetworkKind::Cellular => !self.inner.config.allow_cellular,
            NetworkKind::Wifi | NetworkKind::Wired => false,
        };
        let was_blocked = self.inner.network_blocked.swap(blocked, Ordering::SeqCst);
        info!("Network changed to {kind:?} (downloads blocked: {blocked})");

        if blocked {
            self.pause_all().await;
        } else if was_blocked {
            self.resume_all().await;
        }
    }

    pub async fn get(&self, id: Uuid) -> Option<Download> {
        self.inner.state.lock().await.find(id).cloned()
    }

    pub async fn snapshot(&self) -> DownloadSnapshot {
        self.inner.state.lock().await.snapshot()
    }
}

async fn read_bucket(store: &dyn DurableStore, key: &str) -> Vec<Download> {
    match store.read(key).await {
        Ok(Some(bytes)) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            warn!("Discarding unreadable {key}: {e}");
            Vec::new()
        }),
        Ok(None) => Vec::new(),
        Err(e) => {
            warn!("Failed to read {key}: {e}");
            Vec::new()
        }
    }
}

async fn file_exists(path: Option<&Path>) -> bool {
    match path {
        Some(path) => tokio::fs::try_exists(path).await.unwrap_or(false),
        None => false,
    }
}

/// Missing files are fine: a record without a file is still removable
async fn remove_file(path: Option<&Path>) {
    let Some(path) = path else {
        return;
    };
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {e}", path.display()),
    }
}
