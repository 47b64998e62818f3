use serde::{Deserialize, Serialize};

use crate::orders::RecordId;

/// Restaurant as listed by `/api/restaurants`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
  pub id: RecordId,
  pub name: String,
  #[serde(default)]
  pub category: Option<String>,
  #[serde(default)]
  pub city: Option<String>,
  #[serde(default)]
  pub address: Option<String>,
  #[serde(default)]
  pub image: Option<String>,
}

/// Dish ("plat") served by a restaurant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dish {
  pub id: RecordId,
  pub name: String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub price: f64,
  #[serde(rename = "id_restaurant", default)]
  pub restaurant_id: Option<RecordId>,
  #[serde(default)]
  pub image: Option<String>,
}
