//! Catalog client that reads restaurants and dishes through the resource cache.

use crate::cache::{FetchOptions, ResourceCache};
use crate::orders::RecordId;
use crate::query::Resource;

use super::client::ApiClient;
use super::types::{Dish, Restaurant};

/// Catalog client with transparent caching.
///
/// Same reads as [`ApiClient`], but each result comes back as a [`Resource`]
/// that starts from the cache when it can and updates itself on revalidation.
#[derive(Clone)]
pub struct CachedCatalog {
  inner: ApiClient,
  cache: ResourceCache,
  options: FetchOptions,
}

impl CachedCatalog {
  pub fn new(inner: ApiClient, cache: ResourceCache, options: FetchOptions) -> Self {
    Self {
      inner,
      cache,
      options,
    }
  }

  pub fn cache(&self) -> &ResourceCache {
    &self.cache
  }

  /// All restaurants, empty until the first successful fetch.
  pub async fn restaurants(&self) -> Resource<Vec<Restaurant>> {
    let inner = self.inner.clone();
    self
      .cache
      .get(
        "restaurants",
        move || {
          let inner = inner.clone();
          async move { inner.restaurants().await }
        },
        Vec::new(),
        self.options,
      )
      .await
  }

  pub async fn restaurant(&self, id: &RecordId) -> Resource<Option<Restaurant>> {
    let inner = self.inner.clone();
    let id = id.clone();
    self
      .cache
      .get(
        &format!("restaurant:{}", id),
        move || {
          let inner = inner.clone();
          let id = id.clone();
          async move { inner.restaurant(&id).await.map(Some) }
        },
        None,
        self.options,
      )
      .await
  }

  pub async fn categories(&self) -> Resource<Vec<String>> {
    let inner = self.inner.clone();
    self
      .cache
      .get(
        "categories",
        move || {
          let inner = inner.clone();
          async move { inner.categories().await }
        },
        Vec::new(),
        self.options,
      )
      .await
  }

  pub async fn dish(&self, id: &RecordId) -> Resource<Option<Dish>> {
    let inner = self.inner.clone();
    let id = id.clone();
    self
      .cache
      .get(
        &format!("dish:{}", id),
        move || {
          let inner = inner.clone();
          let id = id.clone();
          async move { inner.dish(&id).await.map(Some) }
        },
        None,
        self.options,
      )
      .await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheSource, ExecutionContext};
  use crate::config::ApiConfig;
  use crate::error::FetchError;
  use mockito::Server;
  use std::time::Duration;

  fn catalog(server: &Server, context: ExecutionContext, options: FetchOptions) -> CachedCatalog {
    let config = ApiConfig {
      url: server.url(),
      timeout_secs: 5,
    };
    let client = ApiClient::new(&config, None).unwrap();
    CachedCatalog::new(client, ResourceCache::with_context(context), options)
  }

  #[tokio::test]
  async fn test_second_read_is_served_from_cache() {
    let mut server = Server::new_async().await;
    let mock = server
      .mock("GET", "/api/restaurants")
      .with_status(200)
      .with_body(r#"[{"id": 1, "name": "Chez Lulu", "category": "bistro"}]"#)
      .expect(1)
      .create_async()
      .await;

    let options = FetchOptions::default().with_ttl(Duration::from_secs(60));
    let catalog = catalog(&server, ExecutionContext::Interactive, options);

    let first = catalog.restaurants().await;
    assert_eq!(first.source(), CacheSource::Network);
    assert_eq!(first.data()[0].name, "Chez Lulu");

    let second = catalog.restaurants().await;
    assert_eq!(second.source(), CacheSource::Cache);
    assert_eq!(second.data(), first.data());

    mock.assert_async().await;
    assert!(catalog.cache().entry("restaurants").is_some());
  }

  #[tokio::test]
  async fn test_missing_dish_falls_back_to_none() {
    let mut server = Server::new_async().await;
    server
      .mock("GET", "/api/plats/42")
      .with_status(404)
      .create_async()
      .await;

    let catalog = catalog(
      &server,
      ExecutionContext::Interactive,
      FetchOptions::default(),
    );
    let dish = catalog.dish(&RecordId::Number(42)).await;

    assert_eq!(dish.data(), None);
    assert_eq!(dish.source(), CacheSource::Fallback);
    assert_eq!(dish.error(), Some(FetchError::NotFound("/api/plats/42".into())));
    assert!(catalog.cache().entry("dish:42").is_none());
  }

  #[tokio::test]
  async fn test_headless_always_fetches() {
    let mut server = Server::new_async().await;
    let mock = server
      .mock("GET", "/api/restaurants/categories")
      .with_status(200)
      .with_body(r#"["bistro", "pizza"]"#)
      .expect(2)
      .create_async()
      .await;

    let catalog = catalog(&server, ExecutionContext::Headless, FetchOptions::default());
    catalog.categories().await;
    let categories = catalog.categories().await;

    mock.assert_async().await;
    assert_eq!(categories.data(), vec!["bistro", "pizza"]);
    assert!(catalog.cache().is_empty());
  }

  #[tokio::test]
  async fn test_restaurant_keys_are_per_id() {
    let mut server = Server::new_async().await;
    server
      .mock("GET", "/api/restaurants/1")
      .with_status(200)
      .with_body(r#"{"id": 1, "name": "Chez Lulu"}"#)
      .create_async()
      .await;
    server
      .mock("GET", "/api/restaurants/2")
      .with_status(200)
      .with_body(r#"{"id": 2, "name": "Sushi Go"}"#)
      .create_async()
      .await;

    let options = FetchOptions::default().with_stale_while_revalidate(false);
    let catalog = catalog(&server, ExecutionContext::Interactive, options);
    let lulu = catalog.restaurant(&RecordId::Number(1)).await;
    let sushi = catalog.restaurant(&RecordId::Number(2)).await;

    assert_eq!(lulu.data().map(|r| r.name), Some("Chez Lulu".to_string()));
    assert_eq!(sushi.data().map(|r| r.name), Some("Sushi Go".to_string()));
    assert_eq!(catalog.cache().len(), 2);
  }
}
