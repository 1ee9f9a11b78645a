// src/audit/index.rs
//! Lookup structures built fresh from one snapshot for every audit run.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{HashMap, HashSet};

use super::snapshot::Snapshot;
use crate::models::loose::{collect_records, normalize};
use crate::models::{
    BorrowRequest, DamagedLostRecord, EquipmentCategory, IndexedEquipment, Laboratory, RestrictionEntry,
};

lazy_static! {
    static ref LAB_ID_REGEX: Regex = Regex::new(r"(?i)^LAB(\d+)$").unwrap();
}

/// A `labId` claimed by more than one laboratory record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateLabId {
    pub lab_id: String,
    pub record_ids: Vec<String>,
}

/// Lab identity a category hands down to requests that only name it.
#[derive(Debug, Clone, Default)]
pub struct CategoryLab {
    pub lab_id: Option<String>,
    pub lab_record_id: Option<String>,
}

#[derive(Debug, Default)]
pub struct AuditIndex {
    pub labs_by_record_id: HashMap<String, Laboratory>,
    pub labs_by_lab_id: HashMap<String, Laboratory>,
    pub labs_by_name: HashMap<String, Laboratory>,
    pub duplicate_lab_ids: Vec<DuplicateLabId>,
    pub user_ids: HashSet<String>,
    pub categories_by_id: HashMap<String, CategoryLab>,
    pub equipment_by_id: HashMap<String, IndexedEquipment>,
    pub equipment_by_name: HashMap<String, IndexedEquipment>,
    pub equipment_count: usize,
}

impl AuditIndex {
    pub fn build(laboratories: &[Laboratory], categories: &[EquipmentCategory], snapshot: &Snapshot) -> Self {
        let mut index = AuditIndex {
            duplicate_lab_ids: find_duplicate_lab_ids(laboratories),
            user_ids: snapshot.users.keys().cloned().collect(),
            ..Default::default()
        };

        for lab in laboratories {
            index.labs_by_record_id.entry(lab.id.clone()).or_insert_with(|| lab.clone());
            if let Some(key) = lab.lab_id_key().filter(|k| !k.is_empty()) {
                index.labs_by_lab_id.entry(key).or_insert_with(|| lab.clone());
            }
            if let Some(key) = lab.lab_name_key().filter(|k| !k.is_empty()) {
                index.labs_by_name.entry(key).or_insert_with(|| lab.clone());
            }
        }

        for category in categories {
            index.categories_by_id.insert(
                category.id.clone(),
                CategoryLab {
                    lab_id: category.lab_id.clone(),
                    lab_record_id: category.lab_record_id.clone(),
                },
            );

            for item in category.items() {
                let entry = IndexedEquipment::new(category, &item);
                index.equipment_count += 1;

                if let Some(name) = entry.name.as_deref().map(normalize) {
                    index.equipment_by_name.entry(name).or_insert_with(|| entry.clone());
                }
                index.equipment_by_id.entry(entry.id.clone()).or_insert(entry);
            }
        }

        index
    }

    pub fn lab_by_lab_id(&self, lab_id: &str) -> Option<&Laboratory> {
        self.labs_by_lab_id.get(lab_id.trim())
    }

    pub fn lab_by_name(&self, name: &str) -> Option<&Laboratory> {
        self.labs_by_name.get(&normalize(name))
    }

    pub fn user_exists(&self, user_id: &str) -> bool {
        self.user_ids.contains(user_id)
    }
}

/// Groups of laboratories sharing a trimmed `labId`, in order of first
/// appearance, computed over the raw list.
pub fn find_duplicate_lab_ids(laboratories: &[Laboratory]) -> Vec<DuplicateLabId> {
    let mut groups: Vec<DuplicateLabId> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for lab in laboratories {
        let Some(key) = lab.lab_id_key().filter(|k| !k.is_empty()) else { continue };
        match positions.get(&key) {
            Some(&pos) => groups[pos].record_ids.push(lab.id.clone()),
            None => {
                positions.insert(key.clone(), groups.len());
                groups.push(DuplicateLabId { lab_id: key, record_ids: vec![lab.id.clone()] });
            }
        }
    }

    groups.retain(|group| group.record_ids.len() > 1);
    groups
}

/// Proposes `LAB###` identifiers past every claimed one.
///
/// Proposals are added to the claimed set, so repeated calls in one pass
/// hand out distinct, sequential ids before anything is written.
#[derive(Debug, Clone)]
pub struct LabIdGenerator {
    claimed: HashSet<String>,
    highest: u64,
}

impl LabIdGenerator {
    pub fn new<'a>(claimed: impl IntoIterator<Item = &'a str>) -> Self {
        let mut generator = Self { claimed: HashSet::new(), highest: 0 };
        for lab_id in claimed {
            generator.claim(lab_id);
        }
        generator
    }

    fn claim(&mut self, lab_id: &str) {
        let key = lab_id.trim().to_uppercase();
        if let Some(number) = LAB_ID_REGEX
            .captures(&key)
            .map(|caps| caps[1].to_string())
            .filter(|digits| digits.len() <= 18)
            .and_then(|digits| digits.parse::<u64>().ok())
        {
            self.highest = self.highest.max(number);
        }
        self.claimed.insert(key);
    }

    pub fn next_id(&mut self) -> String {
        loop {
            self.highest += 1;
            let candidate = format!("LAB{:03}", self.highest);
            if !self.claimed.contains(&candidate) {
                self.claimed.insert(candidate.clone());
                return candidate;
            }
        }
    }
}

/// Records of one snapshot plus the lookup structures over them.
#[derive(Debug)]
pub struct AuditContext {
    pub laboratories: Vec<Laboratory>,
    pub user_count: usize,
    pub categories: Vec<EquipmentCategory>,
    pub requests: Vec<BorrowRequest>,
    pub damaged_lost: Vec<DamagedLostRecord>,
    pub restrictions: Vec<RestrictionEntry>,
    pub index: AuditIndex,
}

impl AuditContext {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let laboratories: Vec<Laboratory> = collect_records(&snapshot.laboratories);
        let categories: Vec<EquipmentCategory> = collect_records(&snapshot.equipment_categories);
        let index = AuditIndex::build(&laboratories, &categories, snapshot);

        Self {
            laboratories,
            user_count: snapshot.users.len(),
            categories,
            requests: collect_records(&snapshot.borrow_requests),
            damaged_lost: collect_records(&snapshot.damaged_lost_records),
            restrictions: collect_records(&snapshot.restricted_users),
            index,
        }
    }

    pub fn lab_id_generator(&self) -> LabIdGenerator {
        LabIdGenerator::new(self.laboratories.iter().filter_map(|lab| lab.lab_id.as_deref()))
    }
}
