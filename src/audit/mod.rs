// src/audit/mod.rs
//! Data-consistency audit: load a snapshot of the six collections, index it,
//! run the rule table, and report findings with proposed fixes.

pub mod apply;
pub mod index;
pub mod rules;
pub mod snapshot;

pub use apply::{apply_data_consistency_fixes, FixRequest};
use index::AuditContext;
pub use snapshot::{load_snapshot, Snapshot};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiResult;
use crate::models::Severity;
use crate::store::TreeStore;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Finding {
    pub id: String,
    pub severity: Severity,
    pub title: String,
    pub details: Value,
}

/// Proposed write of `value` at `path` (`collection/id/field`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Fix {
    pub path: String,
    pub value: Value,
    pub reason: String,
    pub safe: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuditSummary {
    pub laboratories: usize,
    pub users: usize,
    pub equipment_categories: usize,
    pub equipment: usize,
    pub borrow_requests: usize,
    pub damaged_lost_records: usize,
    pub restricted_users: usize,
    pub findings: usize,
    pub fixes: usize,
    pub safe_fixes: usize,
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub summary: AuditSummary,
    pub findings: Vec<Finding>,
    pub fixes: Vec<Fix>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuditOptions {
    /// Echoed back in the report; the audit itself never writes.
    pub dry_run: bool,
}

impl Default for AuditOptions {
    fn default() -> Self {
        Self { dry_run: true }
    }
}

fn summarize(context: &AuditContext, findings: &[Finding], fixes: &[Fix]) -> AuditSummary {
    let count = |severity: Severity| findings.iter().filter(|f| f.severity == severity).count();

    AuditSummary {
        laboratories: context.laboratories.len(),
        users: context.user_count,
        equipment_categories: context.categories.len(),
        equipment: context.index.equipment_count,
        borrow_requests: context.requests.len(),
        damaged_lost_records: context.damaged_lost.len(),
        restricted_users: context.restrictions.len(),
        findings: findings.len(),
        fixes: fixes.len(),
        safe_fixes: fixes.iter().filter(|f| f.safe).count(),
        errors: count(Severity::Error),
        warnings: count(Severity::Warning),
        infos: count(Severity::Info),
    }
}

/// Audit an already loaded snapshot. Pure; never touches the store.
pub fn audit_snapshot(snapshot: &Snapshot, options: &AuditOptions) -> AuditReport {
    let context = AuditContext::from_snapshot(snapshot);
    let outcome = rules::run_rules(&context);
    let summary = summarize(&context, &outcome.findings, &outcome.fixes);

    AuditReport {
        summary,
        findings: outcome.findings,
        fixes: outcome.fixes,
        dry_run: options.dry_run,
    }
}

#[tracing::instrument(skip_all, fields(dry_run = options.dry_run))]
pub async fn audit_data_consistency(store: &dyn TreeStore, options: &AuditOptions) -> ApiResult<AuditReport> {
    let snapshot = load_snapshot(store).await?;
    let report = audit_snapshot(&snapshot, options);

    log::info!(
        "Data consistency audit: {} finding(s) ({} error, {} warning, {} info), {} fix(es) proposed",
        report.summary.findings,
        report.summary.errors,
        report.summary.warnings,
        report.summary.infos,
        report.summary.fixes
    );

    Ok(report)
}
