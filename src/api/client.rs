use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use super::types::{Dish, Restaurant};
use super::OrderApi;
use crate::config::ApiConfig;
use crate::error::FetchError;
use crate::orders::{Order, OrderId, OrderPatch, RecordId};

/// HTTP client for the service's JSON routes
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base_url: Url,
  token: Option<String>,
}

impl ApiClient {
  pub fn new(config: &ApiConfig, token: Option<String>) -> Result<Self> {
    let mut base_url =
      Url::parse(&config.url).map_err(|e| eyre!("Invalid API url {}: {}", config.url, e))?;

    // Keep any path prefix when joining relative routes
    if !base_url.path().ends_with('/') {
      let path = format!("{}/", base_url.path());
      base_url.set_path(&path);
    }

    let http = reqwest::Client::builder()
      .timeout(config.timeout())
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url,
      token,
    })
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  /// List all restaurants
  pub async fn restaurants(&self) -> Result<Vec<Restaurant>, FetchError> {
    self.get("api/restaurants").await
  }

  /// Get a single restaurant by id
  pub async fn restaurant(&self, id: &RecordId) -> Result<Restaurant, FetchError> {
    self.get(&format!("api/restaurants/{}", id)).await
  }

  /// Distinct restaurant categories
  pub async fn categories(&self) -> Result<Vec<String>, FetchError> {
    self.get("api/restaurants/categories").await
  }

  /// Get a single dish by id
  pub async fn dish(&self, id: &RecordId) -> Result<Dish, FetchError> {
    self.get(&format!("api/plats/{}", id)).await
  }

  fn endpoint(&self, path: &str) -> Result<Url, FetchError> {
    self
      .base_url
      .join(path)
      .map_err(|e| FetchError::network(format!("invalid endpoint {}: {}", path, e)))
  }

  async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
    let url = self.endpoint(path)?;
    self.send(self.http.get(url.clone()), &url).await
  }

  async fn send_json<B, T>(&self, method: Method, url: &Url, body: &B) -> Result<T, FetchError>
  where
    B: serde::Serialize + ?Sized,
    T: DeserializeOwned,
  {
    let request = self.http.request(method, url.clone()).json(body);
    self.send(request, url).await
  }

  async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, url: &Url) -> Result<T, FetchError> {
    let request = match &self.token {
      Some(token) => request.bearer_auth(token),
      None => request,
    };

    let response = request.send().await?;
    let status = response.status();

    if status == StatusCode::NOT_FOUND {
      return Err(FetchError::NotFound(url.path().to_string()));
    }
    if !status.is_success() {
      return Err(FetchError::Network(format!(
        "{} returned {}",
        url.path(),
        status
      )));
    }

    let body = response.text().await?;
    if body.trim().is_empty() {
      return Err(FetchError::EmptyResponse(url.path().to_string()));
    }

    serde_json::from_str(&body).map_err(|e| {
      debug!(path = url.path(), error = %e, "Unusable response body");
      FetchError::EmptyResponse(url.path().to_string())
    })
  }
}

/// The service answers errors with a 200 and an `{error}` body, so a record
/// without an id is not a usable answer.
fn require_id(order: Order, url: &Url) -> Result<Order, FetchError> {
  if order.id.is_some() {
    Ok(order)
  } else {
    Err(FetchError::EmptyResponse(url.path().to_string()))
  }
}

#[async_trait]
impl OrderApi for ApiClient {
  async fn list_orders(&self) -> Result<Vec<Order>, FetchError> {
    self.get("api/commandes").await
  }

  async fn create_order(&self, order: &Order) -> Result<Order, FetchError> {
    let url = self.endpoint("api/commandes")?;
    let created = self.send_json(Method::POST, &url, order).await?;
    require_id(created, &url)
  }

  async fn update_order(&self, id: &OrderId, patch: &OrderPatch) -> Result<Order, FetchError> {
    let url = self.endpoint(&format!("api/commandes/{}", id))?;
    let updated = self.send_json(Method::PUT, &url, patch).await?;
    require_id(updated, &url)
  }
}
