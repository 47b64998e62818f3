//! Read-through cache in front of fetch operations.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::traits::{CacheEntry, ExecutionContext, FetchOptions};
use crate::error::FetchError;
use crate::query::{Resource, ResourceState};

type Entries = Arc<Mutex<HashMap<String, CacheEntry>>>;

/// A repeatable fetch operation.
type Fetcher<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, FetchError>> + Send + Sync>;

fn lock(entries: &Entries) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
  // Entries are replaced whole, so a poisoned map is still consistent.
  entries.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory read-through cache with stale-while-revalidate support.
///
/// Owned by the application and passed to whoever needs it. Clones share the
/// same entries. Entries live until overwritten or until the last clone is
/// dropped; there is no size bound.
#[derive(Clone)]
pub struct ResourceCache {
  entries: Entries,
  focus: broadcast::Sender<()>,
  context: ExecutionContext,
}

impl ResourceCache {
  pub fn new() -> Self {
    Self::with_context(ExecutionContext::Interactive)
  }

  pub fn with_context(context: ExecutionContext) -> Self {
    let (focus, _) = broadcast::channel(16);
    Self {
      entries: Arc::new(Mutex::new(HashMap::new())),
      focus,
      context,
    }
  }

  /// Fetch `key` through the cache.
  ///
  /// 1. Headless: call the fetcher, never cache; fall back on failure
  /// 2. Live entry: return it immediately, revalidating in the background
  ///    when `stale_while_revalidate` is set
  /// 3. Otherwise fetch, store on success, and surface the error on failure
  ///    (the resource then holds `fallback` and the error)
  pub async fn get<T, F, Fut>(
    &self,
    key: &str,
    fetcher: F,
    fallback: T,
    options: FetchOptions,
  ) -> Resource<T>
  where
    T: Clone + Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
  {
    let fetcher: Fetcher<T> = Arc::new(move || fetcher().boxed());
    let caching = self.context == ExecutionContext::Interactive;

    if caching {
      if let Some(data) = self.live::<T>(key) {
        debug!(key, "cache hit");
        let resource = self.resource(key, fetcher, options, ResourceState::cached(data), true);

        if options.stale_while_revalidate {
          let revalidator = resource.revalidator().clone();
          tokio::spawn(async move {
            if let Err(error) = revalidator.revalidate().await {
              debug!(key = %revalidator.key(), %error, "background revalidation failed");
            }
          });
          self.watch_focus(resource.revalidator().clone());
        }

        return resource;
      }
      debug!(key, "cache miss");
    }

    let mut resource = self.resource(
      key,
      fetcher,
      options,
      ResourceState::fallback(fallback),
      caching,
    );
    resource.refresh().await;
    resource.mark_seen();

    if caching && options.stale_while_revalidate {
      self.watch_focus(resource.revalidator().clone());
    }

    resource
  }

  /// Signal that the consuming context regained focus.
  ///
  /// Every live stale-while-revalidate resource refetches. Returns how many
  /// resources were listening.
  pub fn notify_focus(&self) -> usize {
    self.focus.send(()).unwrap_or_default()
  }

  #[cfg(test)]
  pub fn focus_listeners(&self) -> usize {
    self.focus.receiver_count()
  }

  #[cfg(test)]
  pub fn entry(&self, key: &str) -> Option<CacheEntry> {
    lock(&self.entries).get(key).cloned()
  }

  #[cfg(test)]
  pub fn len(&self) -> usize {
    lock(&self.entries).len()
  }

  #[cfg(test)]
  pub fn is_empty(&self) -> bool {
    lock(&self.entries).is_empty()
  }

  fn live<T: Clone + 'static>(&self, key: &str) -> Option<T> {
    let entries = lock(&self.entries);
    let entry = entries.get(key)?;
    if !entry.is_live(Instant::now()) {
      return None;
    }

    let data = entry.payload::<T>();
    if data.is_none() {
      warn!(key, "cached entry holds a different type, refetching");
    }
    data
  }

  fn resource<T: Clone + Send + Sync + 'static>(
    &self,
    key: &str,
    fetcher: Fetcher<T>,
    options: FetchOptions,
    initial: ResourceState<T>,
    caching: bool,
  ) -> Resource<T> {
    let (tx, rx) = watch::channel(initial);
    let revalidator = Revalidator {
      key: key.to_string(),
      fetcher,
      entries: caching.then(|| Arc::clone(&self.entries)),
      options,
      state: Arc::new(tx),
    };
    Resource::new(revalidator, rx)
  }

  /// Revalidate on every focus signal until the resource is dropped.
  fn watch_focus<T: Clone + Send + Sync + 'static>(&self, revalidator: Revalidator<T>) {
    let mut focus = self.focus.subscribe();

    tokio::spawn(async move {
      loop {
        tokio::select! {
          _ = revalidator.closed() => break,
          signal = focus.recv() => match signal {
            Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
              if let Err(error) = revalidator.revalidate().await {
                debug!(key = %revalidator.key(), %error, "focus revalidation failed");
              }
            }
            Err(broadcast::error::RecvError::Closed) => break,
          },
        }
      }
    });
  }
}

impl Default for ResourceCache {
  fn default() -> Self {
    Self::new()
  }
}

/// Re-runs a resource's fetcher and publishes the outcome.
pub(crate) struct Revalidator<T> {
  key: String,
  fetcher: Fetcher<T>,
  /// `None` when the resource is not cached (headless)
  entries: Option<Entries>,
  options: FetchOptions,
  state: Arc<watch::Sender<ResourceState<T>>>,
}

impl<T> Revalidator<T> {
  pub(crate) fn key(&self) -> &str {
    &self.key
  }

  pub(crate) fn publish_error(&self, error: FetchError) {
    self.state.send_modify(|state| state.error = Some(error));
  }

  async fn closed(&self) {
    self.state.closed().await
  }
}

impl<T: Clone + Send + Sync + 'static> Revalidator<T> {
  /// Fetch, overwrite the cache entry, and publish the new data.
  ///
  /// On failure nothing is touched and the error is returned.
  pub(crate) async fn revalidate(&self) -> Result<(), FetchError> {
    let data = (self.fetcher)().await?;

    if let Some(entries) = &self.entries {
      let expires_at = self.options.expiry_from(Instant::now());
      lock(entries).insert(
        self.key.clone(),
        CacheEntry::new(&self.key, data.clone(), expires_at),
      );
    }

    self.state.send_replace(ResourceState::network(data));
    Ok(())
  }
}

impl<T> Clone for Revalidator<T> {
  fn clone(&self) -> Self {
    Self {
      key: self.key.clone(),
      fetcher: Arc::clone(&self.fetcher),
      entries: self.entries.clone(),
      options: self.options,
      state: Arc::clone(&self.state),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::CacheSource;
  use std::future::{ready, Ready};
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::time::Duration;

  /// Fetcher that returns `responses[n]` on its n-th call (the last one repeats).
  fn scripted<T: Clone + Send + Sync + 'static>(
    responses: Vec<Result<T, FetchError>>,
  ) -> (
    Arc<AtomicUsize>,
    impl Fn() -> Ready<Result<T, FetchError>> + Send + Sync + 'static,
  ) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let fetcher = move || {
      let n = counter.fetch_add(1, Ordering::SeqCst);
      let idx = n.min(responses.len() - 1);
      ready(responses[idx].clone())
    };
    (calls, fetcher)
  }

  fn ttl_ms(ms: u64) -> FetchOptions {
    FetchOptions::default().with_ttl(Duration::from_millis(ms))
  }

  fn swr() -> FetchOptions {
    FetchOptions::default().with_stale_while_revalidate(true)
  }

  #[tokio::test]
  async fn test_second_get_within_ttl_hits_cache() {
    let cache = ResourceCache::new();
    let (calls, fetcher) = scripted(vec![Ok(vec![1, 2, 3]), Ok(vec![9])]);
    let fetcher = Arc::new(fetcher);

    let f = fetcher.clone();
    let first = cache.get("x", move || f(), Vec::new(), ttl_ms(1000)).await;
    let f = fetcher.clone();
    let second = cache.get("x", move || f(), Vec::new(), ttl_ms(1000)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(first.data(), vec![1, 2, 3]);
    assert_eq!(second.data(), first.data());
    assert_eq!(first.source(), CacheSource::Network);
    assert_eq!(second.source(), CacheSource::Cache);
  }

  #[tokio::test(start_paused = true)]
  async fn test_expired_entry_is_refetched() {
    let cache = ResourceCache::new();
    let (calls, fetcher) = scripted(vec![Ok(vec![1, 2, 3]), Ok(vec![4, 5, 6])]);
    let fetcher = Arc::new(fetcher);

    let f = fetcher.clone();
    let resource = cache.get("x", move || f(), Vec::new(), ttl_ms(1000)).await;
    assert_eq!(resource.data(), vec![1, 2, 3]);

    tokio::time::advance(Duration::from_millis(500)).await;
    let f = fetcher.clone();
    let resource = cache.get("x", move || f(), Vec::new(), ttl_ms(1000)).await;
    assert_eq!(resource.data(), vec![1, 2, 3]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    tokio::time::advance(Duration::from_millis(1000)).await;
    let f = fetcher.clone();
    let resource = cache.get("x", move || f(), Vec::new(), ttl_ms(1000)).await;
    assert_eq!(resource.data(), vec![4, 5, 6]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_expired_entry_is_not_served_when_refetch_fails() {
    let cache = ResourceCache::new();
    let (_, fetcher) = scripted(vec![Ok(7), Err(FetchError::network("down"))]);
    let fetcher = Arc::new(fetcher);

    let f = fetcher.clone();
    cache.get("n", move || f(), 0, ttl_ms(100)).await;

    tokio::time::advance(Duration::from_millis(200)).await;
    let f = fetcher.clone();
    let resource = cache.get("n", move || f(), 0, ttl_ms(100)).await;

    assert_eq!(resource.data(), 0);
    assert_eq!(resource.source(), CacheSource::Fallback);
    assert_eq!(resource.error(), Some(FetchError::network("down")));
  }

  #[tokio::test(start_paused = true)]
  async fn test_stale_while_revalidate_does_not_block_on_slow_fetch() {
    let cache = ResourceCache::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = calls.clone();
    let fetcher = move || {
      let n = counter.fetch_add(1, Ordering::SeqCst);
      async move {
        if n == 0 {
          Ok(1)
        } else {
          tokio::time::sleep(Duration::from_secs(60)).await;
          Err(FetchError::network("gateway timeout"))
        }
      }
    };
    let fetcher = Arc::new(fetcher);

    let f = fetcher.clone();
    cache.get("slow", move || f(), 0, swr()).await;

    let f = fetcher.clone();
    let resource = tokio::time::timeout(
      Duration::from_millis(10),
      cache.get("slow", move || f(), 0, swr()),
    )
    .await
    .expect("cached value should be returned without waiting");
    assert_eq!(resource.data(), 1);

    tokio::time::sleep(Duration::from_secs(61)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(cache.entry("slow").and_then(|e| e.payload::<i32>()), Some(1));
    assert!(!resource.is_error());
  }

  #[tokio::test]
  async fn test_background_revalidation_is_observable() {
    let cache = ResourceCache::new();
    let (calls, fetcher) = scripted(vec![Ok(1), Ok(2)]);
    let fetcher = Arc::new(fetcher);

    let f = fetcher.clone();
    cache.get("k", move || f(), 0, swr()).await;

    let f = fetcher.clone();
    let mut resource = cache.get("k", move || f(), 0, swr()).await;
    assert_eq!(resource.data(), 1);
    assert_eq!(resource.source(), CacheSource::Cache);

    assert!(resource.changed().await);
    assert_eq!(resource.data(), 2);
    assert_eq!(resource.source(), CacheSource::Network);

    let f = fetcher.clone();
    let plain = cache.get("k", move || f(), 0, FetchOptions::default()).await;
    assert_eq!(plain.data(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_focus_triggers_revalidation() {
    let cache = ResourceCache::new();
    let (calls, fetcher) = scripted(vec![Ok("a"), Ok("b")]);

    let mut resource = cache.get("focus", fetcher, "", swr()).await;
    assert_eq!(resource.data(), "a");

    assert_eq!(cache.notify_focus(), 1);
    assert!(resource.changed().await);

    assert_eq!(resource.data(), "b");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(cache.entry("focus").and_then(|e| e.payload::<&str>()), Some("b"));
  }

  #[tokio::test]
  async fn test_focus_revalidates_resource_served_from_cache() {
    let cache = ResourceCache::new();
    let (calls, fetcher) = scripted(vec![Ok("a"), Ok("b"), Ok("c")]);
    let fetcher = Arc::new(fetcher);

    let f = fetcher.clone();
    let cold = cache.get("menu", move || f(), "", swr()).await;
    drop(cold);

    let f = fetcher.clone();
    let mut resource = cache.get("menu", move || f(), "", swr()).await;
    assert_eq!(resource.data(), "a");
    assert_eq!(resource.source(), CacheSource::Cache);

    // background revalidation started by the hit
    assert!(resource.changed().await);
    assert_eq!(resource.data(), "b");

    for _ in 0..10 {
      if cache.focus_listeners() == 1 {
        break;
      }
      tokio::task::yield_now().await;
    }
    assert_eq!(cache.notify_focus(), 1);
    assert!(resource.changed().await);

    assert_eq!(resource.data(), "c");
    assert_eq!(resource.source(), CacheSource::Network);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(cache.entry("menu").and_then(|e| e.payload::<&str>()), Some("c"));
  }

  #[tokio::test]
  async fn test_focus_listener_stops_when_resource_dropped() {
    let cache = ResourceCache::new();
    let (_, fetcher) = scripted(vec![Ok(1)]);

    let resource = cache.get("gone", fetcher, 0, swr()).await;
    assert_eq!(cache.focus_listeners(), 1);

    drop(resource);
    for _ in 0..10 {
      if cache.focus_listeners() == 0 {
        break;
      }
      tokio::task::yield_now().await;
    }

    assert_eq!(cache.focus_listeners(), 0);
    assert_eq!(cache.notify_focus(), 0);
  }

  #[tokio::test]
  async fn test_failed_revalidation_keeps_last_value() {
    let cache = ResourceCache::new();
    let (calls, fetcher) = scripted(vec![Ok(5), Err(FetchError::network("reset"))]);
    let fetcher = Arc::new(fetcher);

    let f = fetcher.clone();
    cache.get("k", move || f(), 0, swr()).await;
    let f = fetcher.clone();
    let resource = cache.get("k", move || f(), 0, swr()).await;

    for _ in 0..10 {
      if calls.load(Ordering::SeqCst) == 2 {
        break;
      }
      tokio::task::yield_now().await;
    }

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(resource.data(), 5);
    assert!(!resource.is_error());
    assert_eq!(cache.entry("k").and_then(|e| e.payload::<i32>()), Some(5));
  }

  #[tokio::test]
  async fn test_cold_failure_is_surfaced_and_not_cached() {
    let cache = ResourceCache::new();
    let (_, fetcher) = scripted::<Vec<i32>>(vec![Err(FetchError::NotFound(
      "/api/restaurants/9".into(),
    ))]);

    let resource = cache.get("restaurant:9", fetcher, vec![0], FetchOptions::default()).await;

    assert_eq!(resource.data(), vec![0]);
    assert_eq!(resource.source(), CacheSource::Fallback);
    assert_eq!(
      resource.error(),
      Some(FetchError::NotFound("/api/restaurants/9".into()))
    );
    assert!(cache.is_empty());
  }

  #[tokio::test]
  async fn test_headless_bypasses_cache() {
    let cache = ResourceCache::with_context(ExecutionContext::Headless);
    let (calls, fetcher) = scripted(vec![Ok(1), Err(FetchError::network("down"))]);
    let fetcher = Arc::new(fetcher);

    let f = fetcher.clone();
    let first = cache.get("h", move || f(), -1, swr()).await;
    let f = fetcher.clone();
    let second = cache.get("h", move || f(), -1, swr()).await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(first.data(), 1);
    assert_eq!(second.data(), -1);
    assert!(second.is_error());
    assert!(cache.is_empty());
    assert_eq!(cache.focus_listeners(), 0);
  }

  #[tokio::test]
  async fn test_type_mismatch_is_a_miss() {
    let cache = ResourceCache::new();
    let (_, numbers) = scripted(vec![Ok(42u32)]);
    let (calls, words) = scripted(vec![Ok("forty-two".to_string())]);

    cache.get("shared", numbers, 0, FetchOptions::default()).await;
    let resource = cache
      .get("shared", words, String::new(), FetchOptions::default())
      .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(resource.data(), "forty-two");
  }
}
