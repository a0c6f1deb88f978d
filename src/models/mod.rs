//! Stale-while-revalidate cache for the Copilot models listing.
//!
//! [`ModelsCache`] holds one [`ModelsBlob`] plus the instant it was
//! committed. Reads never touch the network:
//!
//! - **fresh** (age ≤ TTL): the cached blob is returned.
//! - **stale**: a background refresh is spawned and the stale blob is
//!   returned immediately.
//! - **absent** (only for [`ModelsCache::empty()`] before any success): a
//!   background refresh is spawned and the read fails with
//!   [`GatewayError::Unavailable`].
//!
//! # Refresh protocol
//!
//! A refresh asks the [`TokenProvider`] for a bearer token, sends one GET to
//! the models endpoint, requires a 2xx response whose body is a JSON object,
//! and then swaps blob and timestamp together under the write lock. Any
//! failure leaves the stored state untouched: last known good keeps serving.
//!
//! Background refreshes run on a detached task bounded by
//! [`ModelsCacheConfig::refresh_timeout`], independent of the reader that
//! triggered them. At most one background refresh is in flight per cache;
//! explicit [`ModelsCache::refresh()`] calls are never suppressed.
//!
//! # Persistence
//!
//! [`ModelsCache::save_to_file()`] writes the raw blob bytes (no envelope);
//! [`ModelsCache::load_from_file()`] re-validates them and commits them as
//! if freshly fetched.

mod blob;

pub use blob::ModelsBlob;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use reqwest::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::auth::TokenProvider;
use crate::telemetry;
use crate::{GatewayError, Result};

/// Default upstream models endpoint.
pub const DEFAULT_MODELS_URL: &str = "https://api.githubcopilot.com/models";

/// Client-identification headers the Copilot API expects.
const EDITOR_VERSION: &str = "vscode/1.95.0";
const COPILOT_INTEGRATION_ID: &str = "vscode-chat";

/// Configuration for the models cache.
///
/// ```rust
/// # use copilot_gateway::ModelsCacheConfig;
/// # use std::time::Duration;
/// let config = ModelsCacheConfig::new()
///     .ttl(Duration::from_secs(300))
///     .refresh_timeout(Duration::from_secs(10));
/// assert!(config.endpoint.ends_with("/models"));
/// ```
#[derive(Debug, Clone)]
pub struct ModelsCacheConfig {
    /// Maximum age before the cached blob is stale. Default: 10 minutes.
    pub ttl: Duration,
    /// Models endpoint URL. Default: [`DEFAULT_MODELS_URL`].
    pub endpoint: String,
    /// Deadline for a single refresh. Default: 30 seconds.
    pub refresh_timeout: Duration,
}

impl Default for ModelsCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(600),
            endpoint: DEFAULT_MODELS_URL.to_string(),
            refresh_timeout: Duration::from_secs(30),
        }
    }
}

impl ModelsCacheConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the time-to-live for the cached blob.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Point the cache at a different models endpoint.
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = url.into();
        self
    }

    /// Set the deadline for each refresh.
    pub fn refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }
}

/// Point-in-time view of the cache, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStatus {
    /// Whether a read right now would be served without a refresh.
    pub fresh: bool,
    /// Time since the current blob was committed; `None` if never.
    pub age: Option<Duration>,
    /// Size of the current blob in bytes (0 if none).
    pub len: usize,
}

/// What started a refresh. Used as a metric label.
#[derive(Debug, Clone, Copy)]
enum Trigger {
    Init,
    Background,
    Manual,
}

impl Trigger {
    fn as_str(self) -> &'static str {
        match self {
            Trigger::Init => "init",
            Trigger::Background => "background",
            Trigger::Manual => "manual",
        }
    }
}

/// A committed blob and when it was committed.
///
/// Held as one value so the blob and its timestamp can only change together.
#[derive(Clone)]
struct Snapshot {
    blob: ModelsBlob,
    fetched_at: Instant,
}

impl Snapshot {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() <= ttl
    }
}

struct Inner {
    state: RwLock<Option<Snapshot>>,
    config: ModelsCacheConfig,
    tokens: Arc<dyn TokenProvider>,
    http: Client,
    background_in_flight: AtomicBool,
}

/// Owns the background refresh slot and clears the in-flight flag on drop.
///
/// Created before the task is spawned and moved into it, so the flag is
/// released even when the task is dropped without ever being polled (for
/// example when the runtime that spawned it shuts down).
struct InFlightGuard(Arc<Inner>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.background_in_flight.store(false, Ordering::Release);
    }
}

/// Thread-safe, stale-while-revalidate cache of the Copilot models listing.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct ModelsCache {
    inner: Arc<Inner>,
}

impl ModelsCache {
    /// Create a cache and seed it with one synchronous refresh.
    ///
    /// Fails with [`GatewayError::Initialization`] wrapping the refresh
    /// error when that first fetch fails; no cache is produced.
    pub async fn new(
        config: ModelsCacheConfig,
        tokens: Arc<dyn TokenProvider>,
        http: Client,
    ) -> Result<Self> {
        let cache = Self::empty(config, tokens, http);
        cache
            .inner
            .refresh(Trigger::Init)
            .await
            .map_err(|e| GatewayError::Initialization(Box::new(e)))?;
        Ok(cache)
    }

    /// Create a cache without the initial fetch.
    ///
    /// Reads fail with [`GatewayError::Unavailable`] until a refresh or
    /// [`load_from_file()`](Self::load_from_file) succeeds. Prefer
    /// [`new()`](Self::new) unless the cache is about to be restored from a
    /// snapshot.
    pub fn empty(config: ModelsCacheConfig, tokens: Arc<dyn TokenProvider>, http: Client) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(None),
                config,
                tokens,
                http,
                background_in_flight: AtomicBool::new(false),
            }),
        }
    }

    /// Current models listing.
    ///
    /// Never waits on the network. A stale or missing blob schedules a
    /// background refresh; a stale blob is still returned.
    pub async fn models(&self) -> Result<ModelsBlob> {
        let snapshot = self.inner.state.read().await.clone();
        match snapshot {
            Some(snapshot) if snapshot.is_fresh(self.inner.config.ttl) => {
                metrics::counter!(telemetry::MODELS_READS_TOTAL, "state" => "fresh").increment(1);
                Ok(snapshot.blob)
            }
            Some(snapshot) => {
                metrics::counter!(telemetry::MODELS_READS_TOTAL, "state" => "stale").increment(1);
                debug!(
                    age_ms = snapshot.fetched_at.elapsed().as_millis() as u64,
                    "serving stale models while revalidating"
                );
                self.spawn_refresh();
                Ok(snapshot.blob)
            }
            None => {
                metrics::counter!(telemetry::MODELS_READS_TOTAL, "state" => "unavailable")
                    .increment(1);
                self.spawn_refresh();
                Err(GatewayError::Unavailable)
            }
        }
    }

    /// Fetch the listing now and wait for the result.
    ///
    /// On failure the previously cached blob stays in place.
    pub async fn refresh(&self) -> Result<()> {
        self.inner.refresh(Trigger::Manual).await
    }

    /// Freshness, age and size of the current blob.
    pub async fn status(&self) -> CacheStatus {
        let state = self.inner.state.read().await;
        match state.as_ref() {
            Some(snapshot) => CacheStatus {
                fresh: snapshot.is_fresh(self.inner.config.ttl),
                age: Some(snapshot.fetched_at.elapsed()),
                len: snapshot.blob.len(),
            },
            None => CacheStatus {
                fresh: false,
                age: None,
                len: 0,
            },
        }
    }

    /// Write the current blob verbatim to `path` (atomic write via tmp + rename).
    ///
    /// Fails with [`GatewayError::NoData`] if nothing has been cached yet.
    pub async fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let blob = self
            .inner
            .state
            .read()
            .await
            .as_ref()
            .map(|snapshot| snapshot.blob.clone())
            .ok_or(GatewayError::NoData)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp_path = tmp_path_for(path);
        tokio::fs::write(&tmp_path, blob.as_bytes()).await?;
        tokio::fs::rename(&tmp_path, path).await?;

        debug!(path = %path.display(), bytes = blob.len(), "saved models snapshot");
        Ok(())
    }

    /// Replace the cached blob with the contents of `path`.
    ///
    /// The file must hold a JSON object; otherwise
    /// [`GatewayError::InvalidPayload`] is returned and the cache is
    /// unchanged. A successful load counts as a fetch made now.
    pub async fn load_from_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let blob = ModelsBlob::parse(tokio::fs::read(path).await?)?;
        let len = blob.len();
        self.inner.commit(blob).await;
        debug!(path = %path.display(), bytes = len, "loaded models snapshot");
        Ok(())
    }

    /// Spawn a detached background refresh unless one is already running.
    fn spawn_refresh(&self) {
        if self
            .inner
            .background_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("models refresh already in flight");
            return;
        }

        let guard = InFlightGuard(Arc::clone(&self.inner));
        tokio::spawn(async move {
            if let Err(e) = guard.0.refresh(Trigger::Background).await {
                warn!(error = %e, "background models refresh failed, keeping cached models");
            }
        });
    }
}

impl Inner {
    /// Run one bounded refresh and record its outcome.
    async fn refresh(&self, trigger: Trigger) -> Result<()> {
        let start = std::time::Instant::now();
        let timeout = self.config.refresh_timeout;
        let result = match tokio::time::timeout(timeout, self.fetch()).await {
            Ok(Ok(blob)) => {
                let len = blob.len();
                self.commit(blob).await;
                info!(
                    trigger = trigger.as_str(),
                    bytes = len,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "refreshed models"
                );
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(GatewayError::Timeout(timeout)),
        };

        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(telemetry::MODELS_REFRESH_TOTAL,
            "trigger" => trigger.as_str(),
            "status" => status,
        )
        .increment(1);
        metrics::histogram!(telemetry::MODELS_REFRESH_DURATION_SECONDS,
            "trigger" => trigger.as_str(),
        )
        .record(start.elapsed().as_secs_f64());

        result
    }

    /// Fetch and validate the listing. Does not touch the cached state.
    async fn fetch(&self) -> Result<ModelsBlob> {
        let token = self.tokens.token().await.map_err(|e| match e {
            GatewayError::Auth(msg) => GatewayError::Auth(msg),
            other => GatewayError::Auth(other.to_string()),
        })?;

        let response = self
            .http
            .get(&self.config.endpoint)
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header("Editor-Version", EDITOR_VERSION)
            .header("Copilot-Integration-Id", COPILOT_INTEGRATION_ID)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        ModelsBlob::parse(bytes.to_vec())
    }

    /// Swap in a new blob and timestamp together.
    async fn commit(&self, blob: ModelsBlob) {
        let mut state = self.state.write().await;
        *state = Some(Snapshot {
            blob,
            fetched_at: Instant::now(),
        });
    }
}

/// `models.json` → `models.json.tmp`.
fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = ModelsCacheConfig::default();
        assert_eq!(config.ttl, Duration::from_secs(600));
        assert_eq!(config.refresh_timeout, Duration::from_secs(30));
        assert_eq!(config.endpoint, "https://api.githubcopilot.com/models");
    }

    #[test]
    fn config_builder_pattern() {
        let config = ModelsCacheConfig::new()
            .ttl(Duration::from_secs(5))
            .endpoint("http://localhost:1234/models")
            .refresh_timeout(Duration::from_millis(250));
        assert_eq!(config.ttl, Duration::from_secs(5));
        assert_eq!(config.endpoint, "http://localhost:1234/models");
        assert_eq!(config.refresh_timeout, Duration::from_millis(250));
    }

    #[test]
    fn tmp_path_appends_suffix() {
        assert_eq!(
            tmp_path_for(Path::new("/var/cache/models.json")),
            PathBuf::from("/var/cache/models.json.tmp")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_freshness_boundary() {
        let snapshot = Snapshot {
            blob: ModelsBlob::parse(b"{}".to_vec()).unwrap(),
            fetched_at: Instant::now(),
        };
        let ttl = Duration::from_secs(60);

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(snapshot.is_fresh(ttl));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(!snapshot.is_fresh(ttl));
    }

    fn unseeded_inner() -> Arc<Inner> {
        let cache = ModelsCache::empty(
            ModelsCacheConfig::new().endpoint("http://127.0.0.1:1/models"),
            Arc::new(crate::auth::StaticTokenProvider::new("t")),
            Client::new(),
        );
        cache.inner
    }

    #[test]
    fn in_flight_guard_clears_flag() {
        let inner = unseeded_inner();
        inner.background_in_flight.store(true, Ordering::Release);
        drop(InFlightGuard(Arc::clone(&inner)));
        assert!(!inner.background_in_flight.load(Ordering::Acquire));
    }

    #[test]
    fn unpolled_refresh_task_releases_flag() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let cache = ModelsCache {
            inner: unseeded_inner(),
        };

        // block_on returns before the spawned task is ever polled.
        rt.block_on(async { cache.spawn_refresh() });
        assert!(cache.inner.background_in_flight.load(Ordering::Acquire));

        drop(rt);
        assert!(!cache.inner.background_in_flight.load(Ordering::Acquire));
    }
}
