// src/models/damaged_lost.rs
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::loose::{self, TreeRecord};
use super::status::{ItemStatus, SettlementStatus};

/// Record of the `damaged_lost_records` collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DamagedLostRecord {
    #[serde(skip_deserializing, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, deserialize_with = "loose::text", skip_serializing_if = "Option::is_none")]
    pub borrower_id: Option<String>,
    #[serde(default, deserialize_with = "loose::text", skip_serializing_if = "Option::is_none")]
    pub borrower_name: Option<String>,
    #[serde(default, deserialize_with = "loose::text", skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    #[serde(default, deserialize_with = "loose::text", skip_serializing_if = "Option::is_none")]
    pub course_year_section: Option<String>,
    #[serde(default, deserialize_with = "loose::text", skip_serializing_if = "Option::is_none")]
    pub course: Option<String>,
    #[serde(default, deserialize_with = "loose::text", skip_serializing_if = "Option::is_none")]
    pub year_level: Option<String>,
    #[serde(default, deserialize_with = "loose::text", skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, deserialize_with = "loose::text", skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(default, deserialize_with = "loose::text", skip_serializing_if = "Option::is_none")]
    pub item_name: Option<String>,
    #[serde(default, deserialize_with = "loose::text", skip_serializing_if = "Option::is_none")]
    pub item_status: Option<String>,
    #[serde(default, deserialize_with = "loose::text", skip_serializing_if = "Option::is_none")]
    pub damage_description: Option<String>,
    #[serde(default, deserialize_with = "loose::text", skip_serializing_if = "Option::is_none")]
    pub penalty: Option<String>,
    #[serde(default, deserialize_with = "loose::text", skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(default, deserialize_with = "loose::text", skip_serializing_if = "Option::is_none")]
    pub transaction_date: Option<String>,
    #[serde(default, deserialize_with = "loose::text", skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "loose::text", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "loose::text", skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, deserialize_with = "loose::text", skip_serializing_if = "Option::is_none")]
    pub lab_id: Option<String>,
    #[serde(default, deserialize_with = "loose::text", skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(default, deserialize_with = "loose::number", skip_serializing_if = "Option::is_none")]
    pub borrowed_quantity: Option<f64>,
    #[serde(default, deserialize_with = "loose::number", skip_serializing_if = "Option::is_none")]
    pub returned_quantity: Option<f64>,
    #[serde(default, deserialize_with = "loose::number", skip_serializing_if = "Option::is_none")]
    pub missing_quantity: Option<f64>,
    #[serde(default, deserialize_with = "loose::text", skip_serializing_if = "Option::is_none")]
    pub admin_remarks: Option<String>,
    #[serde(default, deserialize_with = "loose::text", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, deserialize_with = "loose::text", skip_serializing_if = "Option::is_none")]
    pub settled_at: Option<String>,
    #[serde(default, deserialize_with = "loose::text", skip_serializing_if = "Option::is_none")]
    pub settled_by: Option<String>,
}

impl DamagedLostRecord {
    /// Exact "Pending" match, the spelling the dashboard writes.
    pub fn is_pending(&self) -> bool {
        self.status.as_deref() == Some(SettlementStatus::Pending.as_str())
    }
}

impl TreeRecord for DamagedLostRecord {
    fn set_id(&mut self, id: &str) {
        self.id = id.to_string();
    }
}

/// Entry of `restricted_users`, keyed by borrower id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestrictionEntry {
    #[serde(skip_deserializing, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, deserialize_with = "loose::text", skip_serializing_if = "Option::is_none")]
    pub borrower_id: Option<String>,
    #[serde(default, deserialize_with = "loose::text", skip_serializing_if = "Option::is_none")]
    pub borrower_name: Option<String>,
    #[serde(default, deserialize_with = "loose::text", skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    #[serde(default, deserialize_with = "loose::text", skip_serializing_if = "Option::is_none")]
    pub restriction_reason: Option<String>,
    #[serde(default, deserialize_with = "loose::text", skip_serializing_if = "Option::is_none")]
    pub restricted_at: Option<String>,
    #[serde(default, deserialize_with = "loose::text", skip_serializing_if = "Option::is_none")]
    pub restricted_by: Option<String>,
    #[serde(default, deserialize_with = "loose::text", skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl RestrictionEntry {
    pub fn is_active(&self) -> bool {
        self.status.as_deref() == Some(super::status::ACTIVE_RESTRICTION)
    }
}

impl TreeRecord for RestrictionEntry {
    fn set_id(&mut self, id: &str) {
        self.id = id.to_string();
    }
}

// ==================== REQUESTS ====================

/// Return transaction that produced the damage/loss.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct ReturnData {
    pub id: Option<String>,
    pub user_id: Option<String>,
    pub transaction_id: Option<String>,
    /// "damaged", "lost", "missing", or anything else
    pub condition: Option<String>,
    #[validate(length(max = 1000, message = "Condition notes cannot exceed 1000 characters"))]
    pub condition_notes: Option<String>,
    #[validate(length(max = 255, message = "Penalty cannot exceed 255 characters"))]
    pub penalty: Option<String>,
    pub return_date: Option<String>,
    pub timestamp: Option<String>,
    pub processed_by: Option<String>,
    pub lab_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct BorrowerInfo {
    pub id: Option<String>,
    pub name: Option<String>,
    pub full_name: Option<String>,
    pub display_name: Option<String>,
    #[validate(email(message = "Invalid borrower email"))]
    pub email: Option<String>,
    pub course_year_section: Option<String>,
    pub course: Option<String>,
    pub year_level: Option<String>,
    pub section: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct ItemInfo {
    pub id: Option<String>,
    pub item_id: Option<String>,
    pub name: Option<String>,
    pub item_name: Option<String>,
    pub title: Option<String>,
    pub lab_id: Option<String>,
    pub category_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateDamagedLostRequest {
    #[validate(nested)]
    pub return_data: ReturnData,
    #[validate(nested)]
    pub borrower: BorrowerInfo,
    #[serde(default)]
    pub item: ItemInfo,
    #[validate(range(min = 0.0, message = "Borrowed quantity must be non-negative"))]
    pub borrowed_quantity: f64,
    #[validate(range(min = 0.0, message = "Returned quantity must be non-negative"))]
    pub returned_quantity: f64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettlementRequest {
    pub status: SettlementStatus,
    #[validate(length(max = 1000, message = "Admin remarks cannot exceed 1000 characters"))]
    #[serde(default)]
    pub admin_remarks: Option<String>,
    #[serde(default)]
    pub settled_by: Option<String>,
}

// ==================== RESPONSES ====================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedDamagedLostRecord {
    pub record_id: String,
    pub item_status: ItemStatus,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementUpdated {
    pub record_id: String,
    pub status: SettlementStatus,
    pub restriction_cleared: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestrictionCheck {
    pub cleared: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowerEligibility {
    pub eligible: bool,
    pub reason: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DamagedLostStatistics {
    pub total_records: usize,
    pub pending_records: usize,
    pub settled_records: usize,
    pub damaged_items: usize,
    pub lost_items: usize,
    pub restricted_borrowers: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_serialization_skips_absent_fields() {
        let record = DamagedLostRecord {
            borrower_id: Some("u1".to_string()),
            status: Some("Pending".to_string()),
            ..Default::default()
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value, json!({"borrowerId": "u1", "status": "Pending"}));
    }

    #[test]
    fn test_record_status_helpers() {
        let record = DamagedLostRecord::from_entry("D1", &json!({"status": "Pending", "itemStatus": "Lost"}));
        assert!(record.is_pending());

        let lowercase = DamagedLostRecord::from_entry("D2", &json!({"status": "pending"}));
        assert!(!lowercase.is_pending());
    }

    #[test]
    fn test_create_request_validation() {
        let request: CreateDamagedLostRequest = serde_json::from_value(json!({
            "returnData": {"userId": "u1", "condition": "damaged"},
            "borrower": {"id": "u1", "email": "not-an-email"},
            "item": {"id": "E1", "name": "Beaker"},
            "borrowedQuantity": 2,
            "returnedQuantity": -1
        })).unwrap();
        assert!(request.validate().is_err());
    }
}
