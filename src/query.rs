//! Observable handle for cached data.
//!
//! A `Resource<T>` is what `ResourceCache::get` hands back to a view: the
//! current data, the last error, and a way to refresh. Background
//! revalidations publish into the same handle, so a view that polls on its
//! tick (or awaits `changed()`) sees new data without calling `get` again.
//!
//! # Example
//!
//! ```ignore
//! let mut restaurants = cache
//!     .get("restaurants", move || api.restaurants(), Vec::new(), options)
//!     .await;
//!
//! // In event loop tick
//! if restaurants.poll() {
//!     // Data changed, trigger re-render
//! }
//!
//! // In render
//! match restaurants.error() {
//!     Some(e) => render_error(&e),
//!     None => render_list(&restaurants.data()),
//! }
//! ```

use tokio::sync::watch;

use crate::cache::{CacheSource, Revalidator};
use crate::error::FetchError;

/// Snapshot of a resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceState<T> {
  pub data: T,
  /// Last fetch failure, cleared by the next successful fetch
  pub error: Option<FetchError>,
  pub source: CacheSource,
}

impl<T> ResourceState<T> {
  pub fn network(data: T) -> Self {
    Self {
      data,
      error: None,
      source: CacheSource::Network,
    }
  }

  pub fn cached(data: T) -> Self {
    Self {
      data,
      error: None,
      source: CacheSource::Cache,
    }
  }

  pub fn fallback(data: T) -> Self {
    Self {
      data,
      error: None,
      source: CacheSource::Fallback,
    }
  }
}

/// Reactive result of a cached fetch.
pub struct Resource<T> {
  state: watch::Receiver<ResourceState<T>>,
  revalidator: Revalidator<T>,
}

impl<T: Clone + Send + Sync + 'static> Resource<T> {
  pub(crate) fn new(revalidator: Revalidator<T>, state: watch::Receiver<ResourceState<T>>) -> Self {
    Self { state, revalidator }
  }

  pub(crate) fn revalidator(&self) -> &Revalidator<T> {
    &self.revalidator
  }

  /// The cache key this resource was requested under.
  pub fn key(&self) -> &str {
    self.revalidator.key()
  }

  /// Current data: fetched, cached, or the caller's fallback.
  pub fn data(&self) -> T {
    self.state.borrow().data.clone()
  }

  pub fn error(&self) -> Option<FetchError> {
    self.state.borrow().error.clone()
  }

  pub fn is_error(&self) -> bool {
    self.state.borrow().error.is_some()
  }

  pub fn source(&self) -> CacheSource {
    self.state.borrow().source
  }

  /// Fetch again now.
  ///
  /// Success replaces the data (and the cache entry, when caching). Failure
  /// keeps the current data and records the error.
  pub async fn refresh(&self) {
    if let Err(error) = self.revalidator.revalidate().await {
      tracing::debug!(key = %self.key(), %error, "refresh failed");
      self.revalidator.publish_error(error);
    }
  }

  /// Refresh in the background. The outcome arrives through `poll`.
  pub fn refetch(&self) {
    let revalidator = self.revalidator.clone();
    tokio::spawn(async move {
      if let Err(error) = revalidator.revalidate().await {
        tracing::debug!(key = %revalidator.key(), %error, "refetch failed");
        revalidator.publish_error(error);
      }
    });
  }

  /// Check for updates published since the last poll.
  ///
  /// Returns `true` if the state changed. Call this in your event loop tick handler.
  pub fn poll(&mut self) -> bool {
    match self.state.has_changed() {
      Ok(true) => {
        self.state.borrow_and_update();
        true
      }
      _ => false,
    }
  }

  /// Wait for the next published update.
  pub async fn changed(&mut self) -> bool {
    self.state.changed().await.is_ok()
  }

  pub(crate) fn mark_seen(&mut self) {
    self.state.borrow_and_update();
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Resource<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Resource")
      .field("key", &self.revalidator.key())
      .field("state", &*self.state.borrow())
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{FetchOptions, ResourceCache};
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Arc;

  #[tokio::test]
  async fn test_refresh_failure_keeps_data() {
    let cache = ResourceCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let resource = cache
      .get(
        "dish:1",
        move || {
          let n = counter.fetch_add(1, Ordering::SeqCst);
          async move {
            if n == 0 {
              Ok("pizza".to_string())
            } else {
              Err(FetchError::network("connection refused"))
            }
          }
        },
        String::new(),
        FetchOptions::default(),
      )
      .await;

    assert_eq!(resource.data(), "pizza");
    assert!(!resource.is_error());

    resource.refresh().await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(resource.data(), "pizza");
    assert_eq!(
      resource.error(),
      Some(FetchError::network("connection refused"))
    );
  }

  #[tokio::test]
  async fn test_refresh_success_clears_error() {
    let cache = ResourceCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let mut resource = cache
      .get(
        "categories",
        move || {
          let n = counter.fetch_add(1, Ordering::SeqCst);
          async move {
            if n == 0 {
              Err(FetchError::network("offline"))
            } else {
              Ok(vec!["pizza".to_string()])
            }
          }
        },
        Vec::new(),
        FetchOptions::default(),
      )
      .await;

    assert!(resource.is_error());
    assert_eq!(resource.source(), CacheSource::Fallback);
    assert!(!resource.poll());

    resource.refresh().await;

    assert!(resource.poll());
    assert!(!resource.is_error());
    assert_eq!(resource.data(), vec!["pizza".to_string()]);
    assert_eq!(resource.source(), CacheSource::Network);
    assert!(cache.entry("categories").is_some());
  }

  #[tokio::test]
  async fn test_refetch_publishes_through_poll() {
    let cache = ResourceCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let mut resource = cache
      .get(
        "restaurants",
        move || {
          let n = counter.fetch_add(1, Ordering::SeqCst);
          async move { Ok(n) }
        },
        usize::MAX,
        FetchOptions::default(),
      )
      .await;
    assert_eq!(resource.data(), 0);

    resource.refetch();
    assert!(resource.changed().await);

    assert_eq!(resource.data(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }
}
