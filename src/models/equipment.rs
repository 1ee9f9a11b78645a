// src/models/equipment.rs
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::loose::{self, TreeRecord};

/// Record of the `equipment_categories` collection. Equipment items are
/// nested under `equipments`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentCategory {
    #[serde(skip_deserializing)]
    pub id: String,
    #[serde(default, deserialize_with = "loose::text")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "loose::text")]
    pub lab_id: Option<String>,
    #[serde(default, deserialize_with = "loose::text")]
    pub lab_record_id: Option<String>,
    #[serde(default, deserialize_with = "loose::children")]
    pub equipments: Map<String, Value>,
}

impl EquipmentCategory {
    pub fn lab_id_key(&self) -> Option<String> {
        self.lab_id.as_deref().map(|id| id.trim().to_string())
    }

    pub fn items(&self) -> Vec<Equipment> {
        loose::collect_records(&self.equipments)
    }
}

impl TreeRecord for EquipmentCategory {
    fn set_id(&mut self, id: &str) {
        self.id = id.to_string();
    }
}

/// Equipment item as stored under its category.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Equipment {
    #[serde(skip_deserializing)]
    pub id: String,
    #[serde(default, deserialize_with = "loose::text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "loose::text")]
    pub item_name: Option<String>,
    #[serde(default, deserialize_with = "loose::text")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "loose::text")]
    pub equipment_name: Option<String>,
    #[serde(default, deserialize_with = "loose::text")]
    pub lab_id: Option<String>,
    #[serde(default, deserialize_with = "loose::text")]
    pub lab_record_id: Option<String>,
}

fn equipment_name(e: &Equipment) -> Option<&str> {
    e.name.as_deref()
}

fn equipment_item_name(e: &Equipment) -> Option<&str> {
    e.item_name.as_deref()
}

fn equipment_title(e: &Equipment) -> Option<&str> {
    e.title.as_deref()
}

fn equipment_equipment_name(e: &Equipment) -> Option<&str> {
    e.equipment_name.as_deref()
}

impl Equipment {
    pub const NAME_FIELDS: &'static [fn(&Equipment) -> Option<&str>] = &[
        equipment_name,
        equipment_item_name,
        equipment_title,
        equipment_equipment_name,
    ];

    pub fn resolved_name(&self) -> Option<String> {
        loose::first_non_empty(self, Self::NAME_FIELDS)
    }
}

impl TreeRecord for Equipment {
    fn set_id(&mut self, id: &str) {
        self.id = id.to_string();
    }
}

/// Equipment item flattened out of its category, carrying the lab identity
/// it inherits (its own values win over the category's).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedEquipment {
    pub id: String,
    pub category_id: String,
    pub category_title: Option<String>,
    pub name: Option<String>,
    pub lab_id: Option<String>,
    pub lab_record_id: Option<String>,
}

impl IndexedEquipment {
    pub fn new(category: &EquipmentCategory, item: &Equipment) -> Self {
        Self {
            id: item.id.clone(),
            category_id: category.id.clone(),
            category_title: category.title.clone(),
            name: item.resolved_name(),
            lab_id: item.lab_id.clone().or_else(|| category.lab_id.clone()),
            lab_record_id: item.lab_record_id.clone().or_else(|| category.lab_record_id.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_category_items() {
        let category = EquipmentCategory::from_entry("C1", &json!({
            "title": "Glassware",
            "labId": "LAB001",
            "equipments": {
                "E1": {"name": "Beaker"},
                "E2": {"itemName": "Flask", "labId": "LAB002"}
            }
        }));

        let items = category.items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "E1");

        let inherited = IndexedEquipment::new(&category, &items[0]);
        assert_eq!(inherited.lab_id.as_deref(), Some("LAB001"));
        assert_eq!(inherited.category_id, "C1");

        let overridden = IndexedEquipment::new(&category, &items[1]);
        assert_eq!(overridden.lab_id.as_deref(), Some("LAB002"));
        assert_eq!(overridden.name.as_deref(), Some("Flask"));
    }

    #[test]
    fn test_name_fallback_order() {
        let item = Equipment::from_entry("E1", &json!({"title": "Scope", "equipmentName": "Microscope"}));
        assert_eq!(item.resolved_name().as_deref(), Some("Scope"));
    }

    #[test]
    fn test_category_without_equipments() {
        let category = EquipmentCategory::from_entry("C1", &json!({"equipments": "none"}));
        assert!(category.items().is_empty());
    }
}
