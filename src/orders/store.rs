//! Local order list kept in sync with the service when it is reachable.

use color_eyre::{eyre::eyre, Result};
use tracing::{debug, info, warn};

use super::types::{timestamp_now, Order, OrderId, OrderItem, OrderPatch, SyncState};
use crate::api::OrderApi;
use crate::error::FetchError;
use crate::storage::LocalStorage;

/// Storage key holding the serialized order list.
pub const ORDERS_KEY: &str = "orders";

/// Where a persisted list that no longer reads back is moved aside.
pub const UNREADABLE_ORDERS_KEY: &str = "orders.unreadable";

#[derive(Debug, Clone)]
struct TrackedOrder {
  order: Order,
  sync: SyncState,
}

impl TrackedOrder {
  fn confirmed(order: Order) -> Self {
    Self {
      order,
      sync: SyncState::ServerConfirmed,
    }
  }

  fn local(order: Order) -> Self {
    Self {
      order,
      sync: SyncState::LocalOnly,
    }
  }
}

/// A user's orders: authoritative when the server answers, available when
/// it does not.
///
/// Every mutation rewrites the whole list under [`ORDERS_KEY`]. Server
/// failures never drop an order the user created locally.
pub struct OrderStore<A, S> {
  api: A,
  storage: S,
  orders: Vec<TrackedOrder>,
  last_error: Option<FetchError>,
}

impl<A: OrderApi, S: LocalStorage> OrderStore<A, S> {
  /// Create a store, loading any previously persisted orders.
  ///
  /// A list that cannot be read is copied to [`UNREADABLE_ORDERS_KEY`]
  /// before the store starts empty, so the next write does not destroy it.
  pub fn open(api: A, storage: S) -> Result<Self> {
    let orders = match storage.get_item(ORDERS_KEY)? {
      Some(raw) => match serde_json::from_str::<Vec<Order>>(&raw) {
        Ok(orders) => orders,
        Err(e) => {
          storage.set_item(UNREADABLE_ORDERS_KEY, &raw)?;
          warn!(
            error = %e,
            backup = UNREADABLE_ORDERS_KEY,
            "Persisted orders are unreadable, moved them aside"
          );
          Vec::new()
        }
      },
      None => Vec::new(),
    };

    debug!(count = orders.len(), "Loaded persisted orders");

    Ok(Self {
      api,
      storage,
      orders: orders.into_iter().map(TrackedOrder::local).collect(),
      last_error: None,
    })
  }

  pub fn orders(&self) -> impl Iterator<Item = &Order> {
    self.orders.iter().map(|t| &t.order)
  }

  /// Orders paired with their sync state, in list order.
  pub fn entries(&self) -> impl Iterator<Item = (&Order, SyncState)> {
    self.orders.iter().map(|t| (&t.order, t.sync))
  }

  pub fn count(&self) -> usize {
    self.orders.len()
  }

  pub fn get_by_id(&self, id: &OrderId) -> Option<&Order> {
    self.position(id).map(|idx| &self.orders[idx].order)
  }

  pub fn sync_state(&self, id: &OrderId) -> Option<SyncState> {
    self.position(id).map(|idx| self.orders[idx].sync)
  }

  /// Orders the server has not confirmed yet.
  pub fn pending(&self) -> impl Iterator<Item = &Order> {
    self
      .orders
      .iter()
      .filter(|t| t.sync == SyncState::LocalOnly)
      .map(|t| &t.order)
  }

  /// Error from the last failed `fetch_all`, cleared by the next success.
  pub fn last_error(&self) -> Option<&FetchError> {
    self.last_error.as_ref()
  }

  /// Replace the local list with the server's, pushing local-only orders.
  ///
  /// Orders missing from the server listing are created remotely; those the
  /// server still rejects stay in the list as local-only. If the listing
  /// itself fails, nothing changes and the error is kept in `last_error`.
  pub async fn fetch_all(&mut self) -> Result<()> {
    let server = match self.api.list_orders().await {
      Ok(server) => server,
      Err(error) => {
        warn!(%error, "Order sync failed, keeping local orders");
        self.last_error = Some(error);
        return Ok(());
      }
    };
    self.last_error = None;

    let mut merged: Vec<TrackedOrder> = server.into_iter().map(TrackedOrder::confirmed).collect();
    let mut pushed = 0usize;
    let mut kept = 0usize;

    for local in &self.orders {
      let on_server = match &local.order.id {
        Some(id) => merged.iter().any(|m| m.order.has_id(id)),
        None => false,
      };
      if on_server {
        continue;
      }

      match self.api.create_order(&local.order).await {
        Ok(posted) if posted.id.is_some() => {
          merged.push(TrackedOrder::confirmed(posted));
          pushed += 1;
        }
        Ok(_) => {
          debug!(id = ?local.order.id, "Server accepted order without an id, keeping local copy");
          merged.push(TrackedOrder::local(local.order.clone()));
          kept += 1;
        }
        Err(error) => {
          debug!(id = ?local.order.id, %error, "Could not push local order");
          merged.push(TrackedOrder::local(local.order.clone()));
          kept += 1;
        }
      }
    }

    info!(total = merged.len(), pushed, kept, "Orders synced");

    self.orders = merged;
    self.persist()
  }

  /// Create an order, remotely if possible.
  ///
  /// The order gets a synthesized id when it has none. If the server does
  /// not return a record with an id, the order is kept locally as-is.
  /// Returns the id the order is stored under.
  pub async fn create(&mut self, mut order: Order) -> Result<OrderId> {
    check_amounts(Some(order.total), Some(order.items.as_slice()))?;
    let local_id = order.id.get_or_insert_with(OrderId::synthesize).clone();

    let id = match self.api.create_order(&order).await {
      Ok(posted) => match posted.id.clone() {
        Some(id) => {
          self.orders.push(TrackedOrder::confirmed(posted));
          id
        }
        None => {
          warn!(id = %local_id, "Server response has no id, keeping order locally");
          self.orders.push(TrackedOrder::local(order));
          local_id
        }
      },
      Err(error) => {
        warn!(id = %local_id, %error, "Could not create order on server, keeping it locally");
        self.orders.push(TrackedOrder::local(order));
        local_id
      }
    };

    self.persist()?;
    Ok(id)
  }

  /// Update an order. Unknown ids are ignored.
  ///
  /// The server's response replaces the local record. When the server is
  /// unavailable the patch is merged locally and `updated_at` refreshed.
  pub async fn update(&mut self, id: &OrderId, patch: OrderPatch) -> Result<()> {
    check_amounts(patch.total, patch.items.as_deref())?;
    let Some(idx) = self.position(id) else {
      debug!(%id, "Ignoring update for unknown order");
      return Ok(());
    };

    match self.api.update_order(id, &patch).await {
      Ok(updated) if updated.id.is_some() => {
        self.orders[idx] = TrackedOrder::confirmed(updated);
      }
      outcome => {
        if let Err(error) = outcome {
          warn!(%id, %error, "Could not update order on server, patching locally");
        } else {
          warn!(%id, "Server response has no id, patching locally");
        }

        let tracked = &mut self.orders[idx];
        tracked.order.apply(&patch);
        tracked.order.updated_at = Some(timestamp_now());
        if tracked.sync == SyncState::ServerConfirmed {
          tracked.sync = SyncState::LocallyPatched;
        }
      }
    }

    self.persist()
  }

  /// Drop an order from the local list. The server is not contacted.
  pub fn remove(&mut self, id: &OrderId) -> Result<()> {
    self.orders.retain(|t| !t.order.has_id(id));
    self.persist()
  }

  /// Empty the list and delete the persisted copy.
  pub fn clear(&mut self) -> Result<()> {
    self.orders.clear();
    self.storage.remove_item(ORDERS_KEY)
  }

  fn position(&self, id: &OrderId) -> Option<usize> {
    self.orders.iter().position(|t| t.order.has_id(id))
  }

  fn persist(&self) -> Result<()> {
    let orders: Vec<&Order> = self.orders().collect();
    let raw =
      serde_json::to_string(&orders).map_err(|e| eyre!("Failed to serialize orders: {}", e))?;
    self.storage.set_item(ORDERS_KEY, &raw)
  }
}

/// JSON has no NaN or infinity: such an amount would be written as `null`.
fn check_amounts(total: Option<f64>, items: Option<&[OrderItem]>) -> Result<()> {
  let prices = items.into_iter().flatten().map(|item| item.price);
  match total.into_iter().chain(prices).find(|amount| !amount.is_finite()) {
    Some(amount) => Err(eyre!("Refusing non-finite amount {}", amount)),
    None => Ok(()),
  }
}
