//! Core types for the resource cache.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Where the cache is running.
///
/// Only interactive fetches are cached. A headless caller (a one-shot
/// render, a batch job) goes straight to the fetcher so the server keeps
/// control over freshness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionContext {
  #[default]
  Interactive,
  Headless,
}

/// Per-call caching options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
  /// How long a fetched value stays live. Zero means it never expires.
  pub ttl: Duration,
  /// Serve live entries immediately and refresh them in the background,
  /// and again whenever focus comes back.
  pub stale_while_revalidate: bool,
}

impl FetchOptions {
  pub fn with_ttl(mut self, ttl: Duration) -> Self {
    self.ttl = ttl;
    self
  }

  pub fn with_stale_while_revalidate(mut self, enabled: bool) -> Self {
    self.stale_while_revalidate = enabled;
    self
  }

  /// Expiry for a value fetched at `now`.
  pub(crate) fn expiry_from(&self, now: Instant) -> Option<Instant> {
    if self.ttl.is_zero() {
      None
    } else {
      Some(now + self.ttl)
    }
  }
}

/// A cached payload with its expiry.
#[derive(Clone)]
pub struct CacheEntry {
  pub key: String,
  pub data: Arc<dyn Any + Send + Sync>,
  /// `None` never expires
  pub expires_at: Option<Instant>,
}

impl CacheEntry {
  pub fn new<T: Send + Sync + 'static>(key: &str, data: T, expires_at: Option<Instant>) -> Self {
    Self {
      key: key.to_string(),
      data: Arc::new(data),
      expires_at,
    }
  }

  /// Expiry is a hard cutoff: an entry is live strictly before `expires_at`.
  pub fn is_live(&self, now: Instant) -> bool {
    self.expires_at.map_or(true, |at| now < at)
  }

  /// Clone the payload out if it has type `T`.
  pub fn payload<T: Clone + 'static>(&self) -> Option<T> {
    self.data.downcast_ref::<T>().cloned()
  }
}

impl fmt::Debug for CacheEntry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheEntry")
      .field("key", &self.key)
      .field("expires_at", &self.expires_at)
      .finish_non_exhaustive()
  }
}

/// Indicates where a resource's current data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Live entry served from the cache
  Cache,
  /// The fetch failed and the caller's fallback value is shown
  Fallback,
}
