use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Identifier that the service sends either as a number or a string.
///
/// Two ids are equal when their string forms are equal, so `7` and `"7"`
/// refer to the same record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
  Number(u64),
  Text(String),
}

pub type OrderId = RecordId;

impl RecordId {
  /// Client-side id for an order created without one: the current time in
  /// milliseconds. Two orders created in the same millisecond collide.
  pub fn synthesize() -> Self {
    Self::Number(Utc::now().timestamp_millis().unsigned_abs())
  }
}

impl fmt::Display for RecordId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Number(n) => write!(f, "{}", n),
      Self::Text(s) => f.write_str(s),
    }
  }
}

impl PartialEq for RecordId {
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      (Self::Number(a), Self::Number(b)) => a == b,
      (Self::Text(a), Self::Text(b)) => a == b,
      _ => self.to_string() == other.to_string(),
    }
  }
}

impl Eq for RecordId {}

impl Hash for RecordId {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.to_string().hash(state);
  }
}

impl FromStr for RecordId {
  type Err = std::convert::Infallible;

  /// Numeric strings become numbers, anything else stays text.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Ok(
      s.parse::<u64>()
        .map(Self::Number)
        .unwrap_or_else(|_| Self::Text(s.to_string())),
    )
  }
}

impl From<u64> for RecordId {
  fn from(n: u64) -> Self {
    Self::Number(n)
  }
}

impl From<&str> for RecordId {
  fn from(s: &str) -> Self {
    Self::Text(s.to_string())
  }
}

/// Order status.
///
/// Any client can write any status, so values this client does not know are
/// kept as `Other` and written back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
  #[default]
  Pending,
  Confirmed,
  Preparing,
  Delivering,
  Delivered,
  Cancelled,
  Other(String),
}

impl OrderStatus {
  pub const ALL: [OrderStatus; 6] = [
    Self::Pending,
    Self::Confirmed,
    Self::Preparing,
    Self::Delivering,
    Self::Delivered,
    Self::Cancelled,
  ];

  pub fn as_str(&self) -> &str {
    match self {
      Self::Pending => "pending",
      Self::Confirmed => "confirmed",
      Self::Preparing => "preparing",
      Self::Delivering => "delivering",
      Self::Delivered => "delivered",
      Self::Cancelled => "cancelled",
      Self::Other(raw) => raw,
    }
  }
}

impl fmt::Display for OrderStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Strict parsing for user input: only the known statuses.
impl FromStr for OrderStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let lower = s.trim().to_lowercase();
    Self::ALL
      .into_iter()
      .find(|status| status.as_str() == lower)
      .ok_or_else(|| {
        format!(
          "unknown status '{}', expected one of: {}",
          s,
          Self::ALL
            .iter()
            .map(OrderStatus::as_str)
            .collect::<Vec<_>>()
            .join(", ")
        )
      })
  }
}

impl From<String> for OrderStatus {
  fn from(raw: String) -> Self {
    Self::ALL
      .into_iter()
      .find(|status| status.as_str() == raw)
      .unwrap_or(Self::Other(raw))
  }
}

impl From<OrderStatus> for String {
  fn from(status: OrderStatus) -> Self {
    match status {
      OrderStatus::Other(raw) => raw,
      known => known.as_str().to_string(),
    }
  }
}

/// Reads an amount the way other clients may have written it: a number, a
/// numeric string, or `null` (what JSON makes of NaN). Anything else is 0.
fn lenient_amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
  let amount = match Value::deserialize(deserializer)? {
    Value::Number(n) => n.as_f64(),
    Value::String(s) => s.trim().parse::<f64>().ok(),
    _ => None,
  };
  Ok(amount.filter(|a| a.is_finite()).unwrap_or_default())
}

/// Timestamps are kept as the text the writer sent; numbers (epoch millis)
/// keep their digits.
fn lenient_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
  Ok(match Value::deserialize(deserializer)? {
    Value::Null => None,
    Value::String(s) => Some(s),
    other => Some(other.to_string()),
  })
}

/// Current time in the service's timestamp format.
pub fn timestamp_now() -> String {
  Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// One dish line in an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
  #[serde(rename = "id", alias = "dishId", default)]
  pub dish_id: Option<RecordId>,
  #[serde(default)]
  pub name: String,
  #[serde(default, deserialize_with = "lenient_amount")]
  pub price: f64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub quantity: Option<u32>,
}

/// An order as exchanged with the service and kept in local storage.
///
/// Fields the client does not know about are kept in `extra` and written
/// back untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Order {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<OrderId>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
  pub user_id: Option<RecordId>,
  #[serde(
    rename = "id_restaurant",
    alias = "restaurantId",
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub restaurant_id: Option<RecordId>,
  #[serde(rename = "plats", alias = "items", default)]
  pub items: Vec<OrderItem>,
  #[serde(default, deserialize_with = "lenient_amount")]
  pub total: f64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub status: Option<OrderStatus>,
  #[serde(
    rename = "createdAt",
    default,
    deserialize_with = "lenient_timestamp",
    skip_serializing_if = "Option::is_none"
  )]
  pub created_at: Option<String>,
  #[serde(
    rename = "updatedAt",
    default,
    deserialize_with = "lenient_timestamp",
    skip_serializing_if = "Option::is_none"
  )]
  pub updated_at: Option<String>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl Order {
  pub fn has_id(&self, id: &OrderId) -> bool {
    self.id.as_ref() == Some(id)
  }

  /// Shallow merge: every field set in `patch` replaces the order's value.
  pub fn apply(&mut self, patch: &OrderPatch) {
    if let Some(name) = &patch.name {
      self.name = Some(name.clone());
    }
    if let Some(user_id) = &patch.user_id {
      self.user_id = Some(user_id.clone());
    }
    if let Some(restaurant_id) = &patch.restaurant_id {
      self.restaurant_id = Some(restaurant_id.clone());
    }
    if let Some(items) = &patch.items {
      self.items = items.clone();
    }
    if let Some(total) = patch.total {
      self.total = total;
    }
    if let Some(status) = &patch.status {
      self.status = Some(status.clone());
    }
  }
}

/// Partial update sent to `PUT /api/commandes/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderPatch {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
  pub user_id: Option<RecordId>,
  #[serde(rename = "id_restaurant", default, skip_serializing_if = "Option::is_none")]
  pub restaurant_id: Option<RecordId>,
  #[serde(rename = "plats", default, skip_serializing_if = "Option::is_none")]
  pub items: Option<Vec<OrderItem>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub total: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub status: Option<OrderStatus>,
}

impl OrderPatch {
  pub fn is_empty(&self) -> bool {
    *self == Self::default()
  }
}

/// Whether the server knows about an order, as far as this client can tell.
///
/// Tracked in memory only; a freshly loaded store treats every order as
/// local until the next successful sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
  /// Created offline or not seen in the last server listing
  LocalOnly,
  /// Matches the server's copy
  ServerConfirmed,
  /// Known to the server, but carries a patch the server never accepted
  LocallyPatched,
}
