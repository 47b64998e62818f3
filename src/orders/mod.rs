//! Orders: domain types and the offline-tolerant order store.

mod store;
mod types;

pub use store::OrderStore;
pub use types::{Order, OrderId, OrderItem, OrderPatch, OrderStatus, RecordId, SyncState};
