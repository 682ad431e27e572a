//! Offline cache controller: lifecycle hooks and per-category fetch routing.

use color_eyre::{eyre::eyre, Result};
use futures::future::try_join_all;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::fetch::NetworkFetcher;
use crate::manifest;
use crate::request::{RequestCategory, ResourceRequest};

use super::snapshot::ResponseSnapshot;
use super::storage::CacheStorage;

/// Body of the synthesized response for unreachable, uncached audio.
const AUDIO_UNAVAILABLE: &str = "Audio not available";

/// Mediates every resource request between the application shell and the
/// network, and manages the versioned namespace lifecycle.
///
/// One controller exists per process: `main` builds it from config and hands
/// it to whichever subcommand hosts it. It exposes the three lifecycle hooks
/// the host drives: [`install`](Self::install), [`activate`](Self::activate)
/// and [`intercept`](Self::intercept).
pub struct CacheController<S: CacheStorage, N: NetworkFetcher> {
  storage: Arc<S>,
  fetcher: N,
  origin: Url,
  version: String,
  /// Outstanding fire-and-forget snapshot writes, awaited by `settle`.
  writes: Mutex<Vec<JoinHandle<()>>>,
}

impl<S, N> CacheController<S, N>
where
  S: CacheStorage + 'static,
  N: NetworkFetcher,
{
  /// Create a controller for the current cache version.
  ///
  /// `origin` is the application origin manifest paths resolve against.
  pub fn new(storage: S, fetcher: N, origin: Url) -> Self {
    Self {
      storage: Arc::new(storage),
      fetcher,
      origin,
      version: manifest::CACHE_VERSION.to_string(),
      writes: Mutex::new(Vec::new()),
    }
  }

  /// Override the active version tag.
  #[allow(dead_code)]
  pub fn with_version(mut self, version: &str) -> Self {
    self.version = version.to_string();
    self
  }

  /// Storage backend, for host-side reporting.
  pub fn storage(&self) -> &S {
    &self.storage
  }

  fn static_namespace(&self) -> String {
    manifest::static_namespace(&self.version)
  }

  fn dynamic_namespace(&self) -> String {
    manifest::dynamic_namespace(&self.version)
  }

  /// Join a manifest path against the configured origin.
  fn manifest_request(&self, path: &str) -> Result<ResourceRequest> {
    let url = self
      .origin
      .join(path)
      .map_err(|e| eyre!("Invalid manifest path {}: {}", path, e))?;

    Ok(ResourceRequest::subresource(url))
  }

  /// Install phase: seed the static namespace with every manifest entry.
  ///
  /// All-or-nothing: nothing is written until every entry has been fetched
  /// with a success status, so a failed install leaves no namespace behind
  /// for the new version and the prior version keeps serving.
  pub async fn install(&self) -> Result<()> {
    let paths = manifest::cache_manifest();
    info!(version = %self.version, assets = paths.len(), "pre-caching static files");

    let fetches = paths.iter().map(|path| async move {
      let request = self.manifest_request(path)?;
      let snapshot = self
        .fetcher
        .fetch(&request)
        .await
        .map_err(|e| eyre!("Failed to pre-cache {}: {}", path, e))?;

      if !snapshot.is_ok() {
        return Err(eyre!("Failed to pre-cache {}: status {}", path, snapshot.status));
      }

      Ok::<_, color_eyre::eyre::Report>((path.as_str(), snapshot))
    });
    let snapshots = try_join_all(fetches).await?;

    let namespace = self.static_namespace();
    for (path, snapshot) in &snapshots {
      if let Err(err) = self.storage.put(&namespace, path, snapshot) {
        // A half-seeded namespace must never become activatable.
        if let Err(cleanup) = self.storage.delete_namespace(&namespace) {
          warn!(namespace = %namespace, error = %cleanup, "failed to remove partial namespace");
        }
        return Err(eyre!("Failed to store pre-cached {}: {}", path, err));
      }
    }

    info!(version = %self.version, "install complete, skipping waiting");
    Ok(())
  }

  /// Activate phase: evict every namespace left over from prior versions.
  ///
  /// A namespace that fails to delete is logged and skipped; it stays
  /// eligible for eviction at the next activation.
  pub async fn activate(&self) -> Result<()> {
    for namespace in self.storage.list_namespaces()? {
      if namespace.contains(self.version.as_str()) {
        continue;
      }

      match self.storage.delete_namespace(&namespace) {
        Ok(()) => info!(namespace = %namespace, "removed old cache"),
        Err(err) => warn!(namespace = %namespace, error = %err, "failed to remove old cache"),
      }
    }

    info!(version = %self.version, "activation complete, claiming clients");
    Ok(())
  }

  /// Fetch phase: route one intercepted request through its category strategy.
  pub async fn intercept(&self, request: &ResourceRequest) -> Result<ResponseSnapshot> {
    if !request.method().is_read() {
      // Writes are never cached; hand them straight to the network.
      return self.fetcher.fetch(request).await;
    }

    match RequestCategory::classify(request) {
      RequestCategory::Audio => self.fetch_audio(request).await,
      RequestCategory::Navigation => {
        self
          .network_first(request, Some(manifest::SHELL_DOCUMENT))
          .await
      }
      RequestCategory::ScriptOrStyle => self.network_first(request, None).await,
      RequestCategory::Other => self.cache_first(request).await,
    }
  }

  /// Audio: network-first and never cached. Some mobile engines serve
  /// corrupted cached audio, so freshness wins over offline availability.
  async fn fetch_audio(&self, request: &ResourceRequest) -> Result<ResponseSnapshot> {
    match self.fetcher.fetch(request).await {
      Ok(snapshot) => Ok(snapshot),
      Err(err) => {
        debug!(key = request.key(), error = %err, "audio fetch failed, trying cache");

        if let Some(snapshot) = self.lookup(request.key()) {
          info!(key = request.key(), "serving audio from cache");
          return Ok(snapshot);
        }

        info!(key = request.key(), "audio file not available");
        Ok(ResponseSnapshot::not_found(AUDIO_UNAVAILABLE))
      }
    }
  }

  /// Network-first with opportunistic re-caching, for navigations and
  /// script/style assets. `shell_fallback` is the last-resort key consulted
  /// when the exact request has no stored snapshot.
  async fn network_first(
    &self,
    request: &ResourceRequest,
    shell_fallback: Option<&str>,
  ) -> Result<ResponseSnapshot> {
    match self.fetcher.fetch(request).await {
      Ok(snapshot) => {
        self.store_snapshot(request.key(), snapshot.clone());
        Ok(snapshot)
      }
      Err(err) => {
        debug!(key = request.key(), error = %err, "network fetch failed, trying cache");

        if let Some(snapshot) = self.lookup(request.key()) {
          return Ok(snapshot);
        }

        if let Some(shell) = shell_fallback {
          if let Some(snapshot) = self.lookup(shell) {
            return Ok(snapshot);
          }
        }

        Err(err)
      }
    }
  }

  /// Cache-first, for icons, the app manifest and anything unclassified.
  /// A stored snapshot is returned without touching the network.
  async fn cache_first(&self, request: &ResourceRequest) -> Result<ResponseSnapshot> {
    if let Some(snapshot) = self.lookup(request.key()) {
      return Ok(snapshot);
    }

    let snapshot = self.fetcher.fetch(request).await?;
    if snapshot.is_ok() {
      self.store_snapshot(request.key(), snapshot.clone());
    }

    Ok(snapshot)
  }

  /// Best-effort cache read; a storage error is logged and treated as a miss.
  fn lookup(&self, key: &str) -> Option<ResponseSnapshot> {
    match self.storage.match_any(key) {
      Ok(snapshot) => snapshot,
      Err(err) => {
        warn!(key, error = %err, "cache lookup failed");
        None
      }
    }
  }

  /// Fire-and-forget write into the dynamic namespace. A failure is logged
  /// and never reaches the response already handed back to the caller.
  fn store_snapshot(&self, key: &str, snapshot: ResponseSnapshot) {
    let storage = Arc::clone(&self.storage);
    let namespace = self.dynamic_namespace();
    let key = key.to_string();

    let handle = tokio::spawn(async move {
      if let Err(err) = storage.put(&namespace, &key, &snapshot) {
        warn!(namespace = %namespace, key = %key, error = %err, "failed to store snapshot");
      }
    });

    if let Ok(mut writes) = self.writes.lock() {
      writes.retain(|h| !h.is_finished());
      writes.push(handle);
    }
  }

  /// Wait for outstanding snapshot writes.
  ///
  /// Hosts call this before exiting so a short-lived process does not drop
  /// in-flight writes when the runtime shuts down.
  pub async fn settle(&self) {
    let handles: Vec<JoinHandle<()>> = match self.writes.lock() {
      Ok(mut writes) => writes.drain(..).collect(),
      Err(_) => return,
    };

    for handle in handles {
      let _ = handle.await;
    }
  }
}
