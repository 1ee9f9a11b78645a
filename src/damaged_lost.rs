// src/damaged_lost.rs
//! Damaged/lost item records and the borrowing restrictions they impose.

use chrono::{DateTime, SecondsFormat, Utc};
use futures_util::future::try_join;
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult};
use crate::handlers::path_segment;
use crate::models::loose::{collect_records, first_non_empty};
use crate::models::{
    BorrowerEligibility, BorrowerInfo, CreateDamagedLostRequest, CreatedDamagedLostRecord, DamagedLostRecord,
    DamagedLostStatistics, ItemInfo, ItemStatus, RestrictionCheck, RestrictionEntry, SettlementStatus,
    SettlementUpdated, TreeRecord, UpdateSettlementRequest, ACTIVE_RESTRICTION, DAMAGED_LOST_RECORDS,
    RESTRICTED_USERS,
};
use crate::store::{TreeStore, TreeUpdate};

const DEFAULT_ACTOR: &str = "system";
const DEFAULT_SETTLER: &str = "admin";
const NOT_AVAILABLE: &str = "N/A";
const DEFAULT_RESTRICTION_REASON: &str = "Unsettled damaged or lost items";

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Quantities read back as integers when they are whole.
fn quantity_text(quantity: f64) -> String {
    if quantity.fract() == 0.0 {
        format!("{}", quantity as i64)
    } else {
        quantity.to_string()
    }
}

fn borrower_name(b: &BorrowerInfo) -> Option<String> {
    fn name(b: &BorrowerInfo) -> Option<&str> {
        b.name.as_deref()
    }
    fn full_name(b: &BorrowerInfo) -> Option<&str> {
        b.full_name.as_deref()
    }
    fn display_name(b: &BorrowerInfo) -> Option<&str> {
        b.display_name.as_deref()
    }
    first_non_empty(b, &[name, full_name, display_name])
}

fn item_name(i: &ItemInfo) -> Option<String> {
    fn name(i: &ItemInfo) -> Option<&str> {
        i.name.as_deref()
    }
    fn item_name(i: &ItemInfo) -> Option<&str> {
        i.item_name.as_deref()
    }
    fn title(i: &ItemInfo) -> Option<&str> {
        i.title.as_deref()
    }
    first_non_empty(i, &[name, item_name, title])
}

/// Item status and description for a return.
fn classify(request: &CreateDamagedLostRequest) -> (ItemStatus, String) {
    let condition = present(&request.return_data.condition).map(str::to_lowercase);
    let notes = present(&request.return_data.condition_notes);
    let borrowed = request.borrowed_quantity;
    let returned = request.returned_quantity;

    match condition.as_deref() {
        Some("lost") | Some("missing") => (
            ItemStatus::Lost,
            notes.unwrap_or("Item reported as lost/missing").to_string(),
        ),
        _ if returned < borrowed => {
            let mut description = format!(
                "Insufficient return: {} item(s) missing out of {} borrowed",
                quantity_text(borrowed - returned),
                quantity_text(borrowed)
            );
            if let Some(notes) = notes {
                description.push_str(&format!(". Additional notes: {}", notes));
            }
            (ItemStatus::Lost, description)
        }
        Some("damaged") => (ItemStatus::Damaged, notes.unwrap_or("Item returned damaged").to_string()),
        _ => (ItemStatus::Damaged, notes.unwrap_or_default().to_string()),
    }
}

fn build_record(request: &CreateDamagedLostRequest, borrower_id: &str, status: ItemStatus, description: &str) -> DamagedLostRecord {
    let ret = &request.return_data;
    let borrower = &request.borrower;
    let item = &request.item;
    let now = now_iso();
    let owned = |value: Option<&str>| value.map(str::to_string);

    DamagedLostRecord {
        borrower_id: Some(borrower_id.to_string()),
        borrower_name: borrower_name(borrower),
        email_address: owned(present(&borrower.email)),
        course_year_section: Some(
            present(&borrower.course_year_section)
                .or_else(|| present(&borrower.section))
                .unwrap_or(NOT_AVAILABLE)
                .to_string(),
        ),
        course: owned(present(&borrower.course)),
        year_level: owned(present(&borrower.year_level)),
        section: owned(present(&borrower.section)),
        item_id: owned(present(&item.id).or_else(|| present(&item.item_id))),
        item_name: item_name(item),
        item_status: Some(status.as_str().to_string()),
        damage_description: Some(description.to_string()),
        penalty: Some(present(&ret.penalty).unwrap_or(NOT_AVAILABLE).to_string()),
        transaction_id: owned(present(&ret.transaction_id).or_else(|| present(&ret.id))),
        transaction_date: Some(
            present(&ret.return_date)
                .or_else(|| present(&ret.timestamp))
                .map(str::to_string)
                .unwrap_or_else(|| now.clone()),
        ),
        status: Some(SettlementStatus::Pending.as_str().to_string()),
        created_at: Some(now),
        created_by: Some(present(&ret.processed_by).unwrap_or(DEFAULT_ACTOR).to_string()),
        lab_id: owned(present(&ret.lab_id).or_else(|| present(&item.lab_id))),
        category_id: owned(present(&item.category_id)),
        borrowed_quantity: Some(request.borrowed_quantity),
        returned_quantity: Some(request.returned_quantity),
        missing_quantity: Some((request.borrowed_quantity - request.returned_quantity).max(0.0)),
        ..Default::default()
    }
}

/// Record a damaged or lost item and restrict its borrower, in one write.
pub async fn create_damaged_lost_record(
    store: &dyn TreeStore,
    request: &CreateDamagedLostRequest,
) -> ApiResult<CreatedDamagedLostRecord> {
    let borrower_id = present(&request.return_data.user_id)
        .or_else(|| present(&request.borrower.id))
        .ok_or_else(|| ApiError::bad_request("A borrower id is required"))?;
    let borrower_id = path_segment(borrower_id, "borrower id")?;

    let (item_status, description) = classify(request);
    let record = build_record(request, &borrower_id, item_status, &description);

    let restriction = RestrictionEntry {
        borrower_id: record.borrower_id.clone(),
        borrower_name: record.borrower_name.clone(),
        email_address: record.email_address.clone(),
        restriction_reason: Some(format!(
            "Unsettled {} item: {} ({})",
            item_status.as_str().to_lowercase(),
            record.item_name.as_deref().unwrap_or("unknown item"),
            description
        )),
        restricted_at: record.created_at.clone(),
        restricted_by: record.created_by.clone(),
        status: Some(ACTIVE_RESTRICTION.to_string()),
        ..Default::default()
    };

    let record_id = store.push_key();
    let mut updates = TreeUpdate::new();
    updates.insert(format!("{}/{}", DAMAGED_LOST_RECORDS, record_id), serde_json::to_value(&record)?);
    updates.insert(format!("{}/{}", RESTRICTED_USERS, borrower_id), serde_json::to_value(&restriction)?);

    store.batch_update(updates).await.map_err(|e| {
        log::error!("Failed to create damaged/lost record for borrower {}: {}", borrower_id, e);
        e
    })?;

    log::info!("{} item record {} created; borrower {} restricted", item_status, record_id, borrower_id);

    Ok(CreatedDamagedLostRecord {
        record_id,
        item_status,
        message: format!("{} item record created and borrower restricted successfully", item_status),
    })
}

async fn fetch_restriction(store: &dyn TreeStore, borrower_id: &str) -> ApiResult<Option<RestrictionEntry>> {
    let path = format!("{}/{}", RESTRICTED_USERS, borrower_id);
    Ok(store
        .fetch(&path)
        .await?
        .filter(|value| !value.is_null())
        .map(|value| RestrictionEntry::from_entry(borrower_id, &value)))
}

pub async fn is_borrower_restricted(store: &dyn TreeStore, borrower_id: &str) -> ApiResult<bool> {
    Ok(fetch_restriction(store, borrower_id)
        .await?
        .map_or(false, |entry| entry.is_active()))
}

pub async fn update_item_settlement_status(
    store: &dyn TreeStore,
    record_id: &str,
    request: &UpdateSettlementRequest,
) -> ApiResult<SettlementUpdated> {
    let path = format!("{}/{}", DAMAGED_LOST_RECORDS, record_id);
    let record = store
        .fetch(&path)
        .await?
        .filter(|value| !value.is_null())
        .map(|value| DamagedLostRecord::from_entry(record_id, &value))
        .ok_or_else(|| ApiError::record_not_found(record_id))?;

    let now = now_iso();
    let field = |name: &str| format!("{}/{}", path, name);
    let mut updates = TreeUpdate::new();
    updates.insert(field("status"), json!(request.status.as_str()));
    updates.insert(field("adminRemarks"), json!(request.admin_remarks.clone().unwrap_or_default()));
    updates.insert(field("updatedAt"), json!(now));

    match request.status {
        SettlementStatus::Settled => {
            let settled_by = present(&request.settled_by).unwrap_or(DEFAULT_SETTLER);
            updates.insert(field("settledAt"), json!(now));
            updates.insert(field("settledBy"), json!(settled_by));
        }
        SettlementStatus::Pending => {
            updates.insert(field("settledAt"), Value::Null);
            updates.insert(field("settledBy"), Value::Null);
        }
    }

    store.batch_update(updates).await?;
    log::info!("Damaged/lost record {} marked {}", record_id, request.status);

    let restriction_cleared = match record.borrower_id.as_deref() {
        Some(borrower_id) => check_and_clear_borrower_restriction(store, borrower_id).await?.cleared,
        None => false,
    };

    Ok(SettlementUpdated {
        record_id: record_id.to_string(),
        status: request.status,
        restriction_cleared,
        message: format!("Record status updated to {}", request.status),
    })
}

/// Lift the borrower's restriction once none of their records is pending.
pub async fn check_and_clear_borrower_restriction(store: &dyn TreeStore, borrower_id: &str) -> ApiResult<RestrictionCheck> {
    let records = store.fetch_collection(DAMAGED_LOST_RECORDS).await?;
    let pending = collect_records::<DamagedLostRecord>(&records)
        .iter()
        .filter(|r| r.borrower_id.as_deref() == Some(borrower_id) && r.is_pending())
        .count();

    if pending > 0 {
        return Ok(RestrictionCheck {
            cleared: false,
            message: "Borrower still has pending records".to_string(),
        });
    }

    store.remove(&format!("{}/{}", RESTRICTED_USERS, borrower_id)).await?;
    log::info!("Restriction cleared for borrower {}", borrower_id);

    Ok(RestrictionCheck {
        cleared: true,
        message: "Borrower restriction cleared - all items settled".to_string(),
    })
}

fn created_at(record: &DamagedLostRecord) -> Option<DateTime<Utc>> {
    record
        .created_at
        .as_deref()
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|ts| ts.with_timezone(&Utc))
}

/// A borrower's records, newest first. Records without a readable
/// `createdAt` come last.
pub async fn get_borrower_damaged_lost_records(store: &dyn TreeStore, borrower_id: &str) -> ApiResult<Vec<DamagedLostRecord>> {
    let records = store.fetch_collection(DAMAGED_LOST_RECORDS).await?;
    let mut records: Vec<DamagedLostRecord> = collect_records::<DamagedLostRecord>(&records)
        .into_iter()
        .filter(|r| r.borrower_id.as_deref() == Some(borrower_id))
        .collect();

    records.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
    Ok(records)
}

pub async fn get_all_restricted_borrowers(store: &dyn TreeStore) -> ApiResult<Vec<RestrictionEntry>> {
    let entries = store.fetch_collection(RESTRICTED_USERS).await?;
    Ok(collect_records::<RestrictionEntry>(&entries)
        .into_iter()
        .filter(RestrictionEntry::is_active)
        .collect())
}

pub async fn validate_borrower_eligibility(store: &dyn TreeStore, borrower_id: &str) -> ApiResult<BorrowerEligibility> {
    match fetch_restriction(store, borrower_id).await? {
        Some(entry) if entry.is_active() => Ok(BorrowerEligibility {
            eligible: false,
            reason: Some(
                present(&entry.restriction_reason)
                    .unwrap_or(DEFAULT_RESTRICTION_REASON)
                    .to_string(),
            ),
            message: "Borrower is restricted from requesting items due to unsettled damaged or lost items"
                .to_string(),
        }),
        _ => Ok(BorrowerEligibility {
            eligible: true,
            reason: None,
            message: "Borrower is eligible to request items".to_string(),
        }),
    }
}

pub async fn get_damaged_lost_statistics(store: &dyn TreeStore) -> ApiResult<DamagedLostStatistics> {
    let (records, restrictions) = try_join(
        store.fetch_collection(DAMAGED_LOST_RECORDS),
        store.fetch_collection(RESTRICTED_USERS),
    )
    .await?;

    let mut stats = DamagedLostStatistics {
        total_records: records.len(),
        ..Default::default()
    };

    for record in collect_records::<DamagedLostRecord>(&records) {
        let status = record.status.as_deref();
        if status == Some(SettlementStatus::Pending.as_str()) {
            stats.pending_records += 1;
        } else if status == Some(SettlementStatus::Settled.as_str()) {
            stats.settled_records += 1;
        }

        let item_status = record.item_status.as_deref();
        if item_status == Some(ItemStatus::Damaged.as_str()) {
            stats.damaged_items += 1;
        } else if item_status == Some(ItemStatus::Lost.as_str()) {
            stats.lost_items += 1;
        }
    }

    stats.restricted_borrowers = collect_records::<RestrictionEntry>(&restrictions)
        .iter()
        .filter(|entry| entry.is_active())
        .count();

    Ok(stats)
}
