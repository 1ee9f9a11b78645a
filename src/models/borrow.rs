// src/models/borrow.rs
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::loose::{self, TreeRecord};

/// Record of the `borrow_requests` collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowRequest {
    #[serde(skip_deserializing)]
    pub id: String,
    #[serde(default, deserialize_with = "loose::text")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "loose::text")]
    pub item_id: Option<String>,
    #[serde(default, deserialize_with = "loose::text")]
    pub item_name: Option<String>,
    #[serde(default, deserialize_with = "loose::text")]
    pub category_id: Option<String>,
    #[serde(default, deserialize_with = "loose::text")]
    pub lab_id: Option<String>,
    #[serde(default, deserialize_with = "loose::text")]
    pub lab_record_id: Option<String>,
    /// Free-text laboratory name typed on the request form
    #[serde(default, deserialize_with = "loose::text")]
    pub laboratory: Option<String>,
    #[serde(default)]
    pub quantity: Option<Value>,
    #[serde(default)]
    pub approved_quantity: Option<Value>,
    #[serde(default)]
    pub quantity_released: Option<Value>,
}

impl BorrowRequest {
    /// Quantity in effect: released, else approved, else requested. The
    /// first of them that is present and numeric is used.
    pub fn resolved_quantity(&self) -> Option<f64> {
        [&self.quantity_released, &self.approved_quantity, &self.quantity]
            .into_iter()
            .flatten()
            .find_map(loose::value_number)
    }
}

impl TreeRecord for BorrowRequest {
    fn set_id(&mut self, id: &str) {
        self.id = id.to_string();
    }
}
