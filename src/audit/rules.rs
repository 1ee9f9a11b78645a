// src/audit/rules.rs
//! The consistency rules. Each rule reads the shared context and returns its
//! own findings and fixes; no rule sees another's output.

use chrono::Utc;
use serde_json::{json, Value};

use super::index::AuditContext;
use super::{Finding, Fix};
use crate::models::loose::normalize;
use crate::models::{
    BorrowRequest, IndexedEquipment, Severity, ACTIVE_RESTRICTION, BORROW_REQUESTS, DAMAGED_LOST_RECORDS,
    EQUIPMENT_CATEGORIES, LABORATORIES,
};

#[derive(Debug, Default)]
pub struct RuleOutcome {
    pub findings: Vec<Finding>,
    pub fixes: Vec<Fix>,
}

impl RuleOutcome {
    fn finding(&mut self, severity: Severity, title: &str, details: Value) {
        self.findings.push(Finding {
            id: finding_id(),
            severity,
            title: title.to_string(),
            details,
        });
    }

    fn fix(&mut self, path: String, value: &str, reason: &str) {
        self.fixes.push(Fix {
            path,
            value: Value::String(value.trim().to_string()),
            reason: reason.to_string(),
            safe: true,
        });
    }
}

/// `<unix millis>_<random hex>`
pub fn finding_id() -> String {
    format!("{}_{:x}", Utc::now().timestamp_millis(), rand::random::<u64>())
}

pub struct Rule {
    pub name: &'static str,
    pub check: fn(&AuditContext) -> RuleOutcome,
}

pub const RULES: &[Rule] = &[
    Rule { name: "duplicate_lab_id", check: duplicate_lab_id },
    Rule { name: "lab_missing_name", check: lab_missing_name },
    Rule { name: "lab_missing_lab_id", check: lab_missing_lab_id },
    Rule { name: "lab_manager_dangling", check: lab_manager_dangling },
    Rule { name: "category_invalid_lab_record_id", check: category_invalid_lab_record_id },
    Rule { name: "category_missing_lab_record_id", check: category_missing_lab_record_id },
    Rule { name: "category_unknown_lab_id", check: category_unknown_lab_id },
    Rule { name: "request_user_dangling", check: request_user_dangling },
    Rule { name: "request_lab_id_mismatch", check: request_lab_id_mismatch },
    Rule { name: "request_lab_id_missing", check: request_lab_id_missing },
    Rule { name: "request_lab_record_id", check: request_lab_record_id },
    Rule { name: "request_lab_from_name", check: request_lab_from_name },
    Rule { name: "request_non_positive_quantity", check: request_non_positive_quantity },
    Rule { name: "damaged_lost_borrower_dangling", check: damaged_lost_borrower_dangling },
    Rule { name: "damaged_lost_unknown_lab_id", check: damaged_lost_unknown_lab_id },
    Rule { name: "damaged_lost_missing_lab_id", check: damaged_lost_missing_lab_id },
    Rule { name: "restriction_user_missing", check: restriction_user_missing },
    Rule { name: "restriction_not_active", check: restriction_not_active },
];

pub fn run_rules(context: &AuditContext) -> RuleOutcome {
    let mut outcome = RuleOutcome::default();
    for rule in RULES {
        let RuleOutcome { findings, fixes } = (rule.check)(context);
        if !findings.is_empty() || !fixes.is_empty() {
            log::debug!("Rule {}: {} finding(s), {} fix(es)", rule.name, findings.len(), fixes.len());
        }
        outcome.findings.extend(findings);
        outcome.fixes.extend(fixes);
    }
    outcome
}

fn field_path(collection: &str, id: &str, field: &str) -> String {
    format!("{}/{}/{}", collection, id, field)
}

fn differs(stored: &str, expected: &str) -> bool {
    stored.trim() != expected.trim()
}

/// Integral quantities are reported as integers.
fn quantity_value(quantity: f64) -> Value {
    if quantity.fract() == 0.0 && quantity.abs() < i64::MAX as f64 {
        json!(quantity as i64)
    } else {
        json!(quantity)
    }
}

// ==================== LABORATORIES ====================

fn duplicate_lab_id(ctx: &AuditContext) -> RuleOutcome {
    let mut out = RuleOutcome::default();
    for duplicate in &ctx.index.duplicate_lab_ids {
        out.finding(
            Severity::Error,
            "Duplicate Laboratory ID",
            json!({
                "labId": duplicate.lab_id,
                "laboratoryRecordIds": duplicate.record_ids,
            }),
        );
    }
    out
}

fn lab_missing_name(ctx: &AuditContext) -> RuleOutcome {
    let mut out = RuleOutcome::default();
    for lab in ctx.laboratories.iter().filter(|lab| lab.lab_name.is_none()) {
        out.finding(
            Severity::Warning,
            "Laboratory missing labName",
            json!({ "laboratoryRecordId": lab.id }),
        );
    }
    out
}

fn lab_missing_lab_id(ctx: &AuditContext) -> RuleOutcome {
    let mut out = RuleOutcome::default();
    let mut generator = ctx.lab_id_generator();

    for lab in ctx.laboratories.iter().filter(|lab| lab.lab_id.is_none()) {
        out.finding(
            Severity::Warning,
            "Laboratory missing labId",
            json!({
                "laboratoryRecordId": lab.id,
                "labName": lab.lab_name,
            }),
        );
        let new_id = generator.next_id();
        out.fix(field_path(LABORATORIES, &lab.id, "labId"), &new_id, "Assign missing labId");
    }
    out
}

fn lab_manager_dangling(ctx: &AuditContext) -> RuleOutcome {
    let mut out = RuleOutcome::default();
    for lab in &ctx.laboratories {
        let Some(manager) = lab.manager_user_id.as_deref() else { continue };
        if !ctx.index.user_exists(manager) {
            out.finding(
                Severity::Warning,
                "Laboratory managerUserId does not exist",
                json!({
                    "laboratoryRecordId": lab.id,
                    "managerUserId": manager,
                }),
            );
        }
    }
    out
}

// ==================== EQUIPMENT CATEGORIES ====================

fn category_invalid_lab_record_id(ctx: &AuditContext) -> RuleOutcome {
    let mut out = RuleOutcome::default();
    for category in &ctx.categories {
        let Some(record_id) = category.lab_record_id.as_deref() else { continue };
        if ctx.index.labs_by_record_id.contains_key(record_id) {
            continue;
        }

        out.finding(
            Severity::Error,
            "Equipment category has invalid labRecordId",
            json!({
                "categoryId": category.id,
                "labRecordId": record_id,
            }),
        );
        if let Some(lab) = category.lab_id.as_deref().and_then(|id| ctx.index.lab_by_lab_id(id)) {
            out.fix(
                field_path(EQUIPMENT_CATEGORIES, &category.id, "labRecordId"),
                &lab.id,
                "Fix category labRecordId from labId",
            );
        }
    }
    out
}

fn category_missing_lab_record_id(ctx: &AuditContext) -> RuleOutcome {
    let mut out = RuleOutcome::default();
    for category in ctx.categories.iter().filter(|c| c.lab_record_id.is_none()) {
        let Some(lab_id) = category.lab_id.as_deref() else { continue };
        let Some(lab) = ctx.index.lab_by_lab_id(lab_id) else { continue };

        out.finding(
            Severity::Warning,
            "Equipment category missing labRecordId",
            json!({
                "categoryId": category.id,
                "labId": lab_id,
            }),
        );
        out.fix(
            field_path(EQUIPMENT_CATEGORIES, &category.id, "labRecordId"),
            &lab.id,
            "Populate missing labRecordId from labId",
        );
    }
    out
}

fn category_unknown_lab_id(ctx: &AuditContext) -> RuleOutcome {
    let mut out = RuleOutcome::default();
    for category in &ctx.categories {
        let Some(lab_id) = category.lab_id.as_deref() else { continue };
        if ctx.index.lab_by_lab_id(lab_id).is_some() {
            continue;
        }

        out.finding(
            Severity::Warning,
            "Equipment category references unknown labId",
            json!({
                "categoryId": category.id,
                "labId": lab_id,
            }),
        );

        let resolved = category
            .lab_record_id
            .as_deref()
            .and_then(|record_id| ctx.index.labs_by_record_id.get(record_id))
            .and_then(|lab| lab.lab_id_key())
            .filter(|id| !id.is_empty());
        if let Some(resolved) = resolved {
            out.fix(
                field_path(EQUIPMENT_CATEGORIES, &category.id, "labId"),
                &resolved,
                "Fix category labId from labRecordId",
            );
        }
    }
    out
}

// ==================== BORROW REQUESTS ====================

/// Lab identity a request should carry, from its equipment (by id, then by
/// name) falling back to its category.
#[derive(Debug, Default)]
struct ExpectedLab {
    lab_id: Option<String>,
    lab_record_id: Option<String>,
}

impl ExpectedLab {
    fn is_empty(&self) -> bool {
        self.lab_id.is_none() && self.lab_record_id.is_none()
    }
}

fn resolve_equipment<'a>(ctx: &'a AuditContext, request: &BorrowRequest) -> Option<&'a IndexedEquipment> {
    request
        .item_id
        .as_deref()
        .and_then(|id| ctx.index.equipment_by_id.get(id))
        .or_else(|| {
            request
                .item_name
                .as_deref()
                .and_then(|name| ctx.index.equipment_by_name.get(&normalize(name)))
        })
}

fn expected_lab(ctx: &AuditContext, request: &BorrowRequest) -> ExpectedLab {
    let equipment = resolve_equipment(ctx, request);
    let category = request
        .category_id
        .as_deref()
        .and_then(|id| ctx.index.categories_by_id.get(id));

    let pick = |from_equipment: Option<&String>, from_category: Option<&String>| {
        from_equipment
            .or(from_category)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    ExpectedLab {
        lab_id: pick(
            equipment.and_then(|e| e.lab_id.as_ref()),
            category.and_then(|c| c.lab_id.as_ref()),
        ),
        lab_record_id: pick(
            equipment.and_then(|e| e.lab_record_id.as_ref()),
            category.and_then(|c| c.lab_record_id.as_ref()),
        ),
    }
}

fn request_user_dangling(ctx: &AuditContext) -> RuleOutcome {
    let mut out = RuleOutcome::default();
    for request in &ctx.requests {
        let Some(user_id) = request.user_id.as_deref() else { continue };
        if !ctx.index.user_exists(user_id) {
            out.finding(
                Severity::Warning,
                "Borrow request userId does not exist",
                json!({
                    "requestId": request.id,
                    "userId": user_id,
                }),
            );
        }
    }
    out
}

fn request_lab_id_mismatch(ctx: &AuditContext) -> RuleOutcome {
    let mut out = RuleOutcome::default();
    for request in &ctx.requests {
        let Some(stored) = request.lab_id.as_deref() else { continue };
        let Some(expected) = expected_lab(ctx, request).lab_id else { continue };
        if !differs(stored, &expected) {
            continue;
        }

        out.finding(
            Severity::Warning,
            "Borrow request labId does not match equipment/category labId",
            json!({
                "requestId": request.id,
                "requestLabId": stored,
                "expectedLabId": expected,
            }),
        );
        out.fix(
            field_path(BORROW_REQUESTS, &request.id, "labId"),
            &expected,
            "Fix request labId from equipment/category",
        );
    }
    out
}

fn request_lab_id_missing(ctx: &AuditContext) -> RuleOutcome {
    let mut out = RuleOutcome::default();
    for request in ctx.requests.iter().filter(|r| r.lab_id.is_none()) {
        let Some(expected) = expected_lab(ctx, request).lab_id else { continue };

        out.finding(
            Severity::Warning,
            "Borrow request missing labId",
            json!({
                "requestId": request.id,
                "expectedLabId": expected,
            }),
        );
        out.fix(
            field_path(BORROW_REQUESTS, &request.id, "labId"),
            &expected,
            "Populate missing request labId from equipment/category",
        );
    }
    out
}

fn request_lab_record_id(ctx: &AuditContext) -> RuleOutcome {
    let mut out = RuleOutcome::default();
    for request in &ctx.requests {
        let Some(expected) = expected_lab(ctx, request).lab_record_id else { continue };
        let path = field_path(BORROW_REQUESTS, &request.id, "labRecordId");

        match request.lab_record_id.as_deref() {
            Some(stored) if differs(stored, &expected) => {
                out.finding(
                    Severity::Warning,
                    "Borrow request labRecordId does not match equipment/category labRecordId",
                    json!({
                        "requestId": request.id,
                        "requestLabRecordId": stored,
                        "expectedLabRecordId": expected,
                    }),
                );
                out.fix(path, &expected, "Fix request labRecordId from equipment/category");
            }
            Some(_) => {}
            None => {
                out.finding(
                    Severity::Warning,
                    "Borrow request missing labRecordId",
                    json!({
                        "requestId": request.id,
                        "expectedLabRecordId": expected,
                    }),
                );
                out.fix(path, &expected, "Populate missing request labRecordId from equipment/category");
            }
        }
    }
    out
}

fn request_lab_from_name(ctx: &AuditContext) -> RuleOutcome {
    let mut out = RuleOutcome::default();
    for request in &ctx.requests {
        let Some(laboratory) = request.laboratory.as_deref() else { continue };
        if !expected_lab(ctx, request).is_empty() {
            continue;
        }
        let Some(lab) = ctx.index.lab_by_name(laboratory) else { continue };

        let inferred_lab_id = lab.lab_id_key().filter(|id| !id.is_empty());
        let lab_id_fix = inferred_lab_id
            .as_deref()
            .filter(|inferred| request.lab_id.as_deref().map_or(true, |stored| differs(stored, inferred)));
        let record_id_fix = Some(lab.id.as_str())
            .filter(|id| request.lab_record_id.as_deref().map_or(true, |stored| differs(stored, id)));

        if lab_id_fix.is_none() && record_id_fix.is_none() {
            continue;
        }

        out.finding(
            Severity::Warning,
            "Borrow request labId inferred from laboratory name",
            json!({
                "requestId": request.id,
                "laboratory": laboratory,
                "inferredLabId": inferred_lab_id,
                "inferredLabRecordId": lab.id,
            }),
        );
        if let Some(lab_id) = lab_id_fix {
            out.fix(
                field_path(BORROW_REQUESTS, &request.id, "labId"),
                lab_id,
                "Infer request labId from laboratory name",
            );
        }
        if let Some(record_id) = record_id_fix {
            out.fix(
                field_path(BORROW_REQUESTS, &request.id, "labRecordId"),
                record_id,
                "Infer request labRecordId from laboratory name",
            );
        }
    }
    out
}

fn request_non_positive_quantity(ctx: &AuditContext) -> RuleOutcome {
    let mut out = RuleOutcome::default();
    for request in &ctx.requests {
        let Some(quantity) = request.resolved_quantity() else { continue };
        if quantity <= 0.0 {
            out.finding(
                Severity::Warning,
                "Borrow request has non-positive quantity",
                json!({
                    "requestId": request.id,
                    "quantity": quantity_value(quantity),
                }),
            );
        }
    }
    out
}

// ==================== DAMAGED / LOST ====================

fn damaged_lost_borrower_dangling(ctx: &AuditContext) -> RuleOutcome {
    let mut out = RuleOutcome::default();
    for record in &ctx.damaged_lost {
        let Some(borrower_id) = record.borrower_id.as_deref() else { continue };
        if !ctx.index.user_exists(borrower_id) {
            out.finding(
                Severity::Warning,
                "Damaged/Lost record borrowerId does not exist",
                json!({
                    "recordId": record.id,
                    "borrowerId": borrower_id,
                }),
            );
        }
    }
    out
}

fn equipment_lab_id(ctx: &AuditContext, item_id: Option<&str>) -> Option<String> {
    item_id
        .and_then(|id| ctx.index.equipment_by_id.get(id))
        .and_then(|item| item.lab_id.as_deref())
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
}

fn damaged_lost_unknown_lab_id(ctx: &AuditContext) -> RuleOutcome {
    let mut out = RuleOutcome::default();
    for record in &ctx.damaged_lost {
        let Some(lab_id) = record.lab_id.as_deref() else { continue };
        if ctx.index.lab_by_lab_id(lab_id).is_some() {
            continue;
        }

        out.finding(
            Severity::Warning,
            "Damaged/Lost record references unknown labId",
            json!({
                "recordId": record.id,
                "labId": lab_id,
            }),
        );
        if let Some(expected) = equipment_lab_id(ctx, record.item_id.as_deref()).filter(|e| differs(lab_id, e)) {
            out.fix(
                field_path(DAMAGED_LOST_RECORDS, &record.id, "labId"),
                &expected,
                "Fix damaged/lost labId from equipment",
            );
        }
    }
    out
}

fn damaged_lost_missing_lab_id(ctx: &AuditContext) -> RuleOutcome {
    let mut out = RuleOutcome::default();
    for record in ctx.damaged_lost.iter().filter(|r| r.lab_id.is_none()) {
        let Some(expected) = equipment_lab_id(ctx, record.item_id.as_deref()) else { continue };

        out.finding(
            Severity::Warning,
            "Damaged/Lost record missing labId",
            json!({
                "recordId": record.id,
                "expectedLabId": expected,
            }),
        );
        out.fix(
            field_path(DAMAGED_LOST_RECORDS, &record.id, "labId"),
            &expected,
            "Populate damaged/lost labId from equipment",
        );
    }
    out
}

// ==================== RESTRICTED USERS ====================

fn restriction_user_missing(ctx: &AuditContext) -> RuleOutcome {
    let mut out = RuleOutcome::default();
    for entry in ctx.restrictions.iter().filter(|e| !ctx.index.user_exists(&e.id)) {
        out.finding(
            Severity::Warning,
            "Restricted user entry refers to missing user",
            json!({ "borrowerId": entry.id }),
        );
    }
    out
}

fn restriction_not_active(ctx: &AuditContext) -> RuleOutcome {
    let mut out = RuleOutcome::default();
    for entry in &ctx.restrictions {
        let Some(status) = entry.status.as_deref() else { continue };
        if status.to_lowercase() != ACTIVE_RESTRICTION {
            out.finding(
                Severity::Info,
                "Restricted user entry has non-active status",
                json!({
                    "borrowerId": entry.id,
                    "status": status,
                }),
            );
        }
    }
    out
}
