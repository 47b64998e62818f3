//! Access to the food-ordering service.

mod cached_client;
mod client;
pub mod types;

pub use cached_client::CachedCatalog;
pub use client::ApiClient;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::orders::{Order, OrderId, OrderPatch};

/// Remote order operations the order store relies on.
#[async_trait]
pub trait OrderApi: Send + Sync {
  async fn list_orders(&self) -> Result<Vec<Order>, FetchError>;

  /// Returns the server's copy of the new order.
  async fn create_order(&self, order: &Order) -> Result<Order, FetchError>;

  /// Returns the server's copy after the patch is applied.
  async fn update_order(&self, id: &OrderId, patch: &OrderPatch) -> Result<Order, FetchError>;
}

/// Order API for working without a server. Every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineApi;

#[async_trait]
impl OrderApi for OfflineApi {
  async fn list_orders(&self) -> Result<Vec<Order>, FetchError> {
    Err(FetchError::network("offline mode"))
  }

  async fn create_order(&self, _order: &Order) -> Result<Order, FetchError> {
    Err(FetchError::network("offline mode"))
  }

  async fn update_order(&self, _id: &OrderId, _patch: &OrderPatch) -> Result<Order, FetchError> {
    Err(FetchError::network("offline mode"))
  }
}

#[async_trait]
impl<A: OrderApi + ?Sized> OrderApi for Box<A> {
  async fn list_orders(&self) -> Result<Vec<Order>, FetchError> {
    (**self).list_orders().await
  }

  async fn create_order(&self, order: &Order) -> Result<Order, FetchError> {
    (**self).create_order(order).await
  }

  async fn update_order(&self, id: &OrderId, patch: &OrderPatch) -> Result<Order, FetchError> {
    (**self).update_order(id, patch).await
  }
}
