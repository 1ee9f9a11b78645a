// src/models/laboratory.rs
use serde::{Deserialize, Serialize};

use super::loose::{self, TreeRecord};

/// Record of the `laboratories` collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Laboratory {
    #[serde(skip_deserializing)]
    pub id: String,
    #[serde(default, deserialize_with = "loose::text")]
    pub lab_id: Option<String>,
    #[serde(default, deserialize_with = "loose::text")]
    pub lab_name: Option<String>,
    #[serde(default, deserialize_with = "loose::text")]
    pub manager_user_id: Option<String>,
}

impl Laboratory {
    /// `labId` as used for lookups: trimmed, case preserved.
    pub fn lab_id_key(&self) -> Option<String> {
        self.lab_id.as_deref().map(|id| id.trim().to_string())
    }

    pub fn lab_name_key(&self) -> Option<String> {
        self.lab_name.as_deref().map(loose::normalize)
    }
}

impl TreeRecord for Laboratory {
    fn set_id(&mut self, id: &str) {
        self.id = id.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_laboratory_tolerates_odd_types() {
        let lab = Laboratory::from_entry("L1", &json!({"labId": 12, "labName": {"x": 1}}));
        assert_eq!(lab.id, "L1");
        assert_eq!(lab.lab_id.as_deref(), Some("12"));
        assert!(lab.lab_name.is_none());

        let scalar = Laboratory::from_entry("L2", &json!("garbage"));
        assert_eq!(scalar.id, "L2");
        assert!(scalar.lab_id.is_none());
    }

    #[test]
    fn test_lab_keys() {
        let lab = Laboratory::from_entry("L1", &json!({"labId": " LAB001 ", "labName": " Chem Lab "}));
        assert_eq!(lab.lab_id_key().as_deref(), Some("LAB001"));
        assert_eq!(lab.lab_name_key().as_deref(), Some("chem lab"));
    }
}
