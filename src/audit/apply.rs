// src/audit/apply.rs
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::Fix;
use crate::error::{ApiError, ApiResult};
use crate::store::{self, TreeStore, TreeUpdate};

/// A fix as sent back by a caller. Anything that is not a usable fix still
/// deserializes; it is dropped before writing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FixRequest {
    /// Present only when the caller sent a JSON string.
    pub path: Option<String>,
    /// `None` when the caller left `value` out; `Some(Value::Null)` deletes.
    pub value: Option<Value>,
    pub safe: bool,
    pub reason: Option<String>,
}

impl FixRequest {
    pub fn from_value(value: &Value) -> Self {
        let Some(fields) = value.as_object() else {
            return Self::default();
        };
        Self {
            path: fields.get("path").and_then(Value::as_str).map(str::to_string),
            value: fields.get("value").cloned(),
            safe: fields.get("safe").and_then(Value::as_bool).unwrap_or(false),
            reason: fields.get("reason").and_then(Value::as_str).map(str::to_string),
        }
    }

    /// Path and value of a fix that can be written.
    fn writable(&self) -> Option<(&str, &Value)> {
        let path = self.path.as_deref().filter(|p| store::is_valid_path(p))?;
        let value = self.value.as_ref()?;
        Some((path, value))
    }
}

impl<'de> Deserialize<'de> for FixRequest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(FixRequest::from_value(&value))
    }
}

impl From<Fix> for FixRequest {
    fn from(fix: Fix) -> Self {
        Self {
            path: Some(fix.path),
            value: Some(fix.value),
            safe: fix.safe,
            reason: Some(fix.reason),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ApplyResult {
    pub success: bool,
    pub applied: usize,
}

/// Write every usable fix in one batched update.
///
/// Later fixes for the same path overwrite earlier ones. `applied` counts the
/// fixes that survived filtering, duplicates included.
#[tracing::instrument(skip_all, fields(requested = fixes.len()))]
pub async fn apply_data_consistency_fixes(store: &dyn TreeStore, fixes: &[FixRequest]) -> ApiResult<ApplyResult> {
    let writable: Vec<(&str, &Value)> = fixes.iter().filter_map(FixRequest::writable).collect();

    let dropped = fixes.len() - writable.len();
    if dropped > 0 {
        log::warn!("Dropping {} fix(es) without a valid path or value", dropped);
    }

    if writable.is_empty() {
        return Ok(ApplyResult { success: true, applied: 0 });
    }

    let mut updates: TreeUpdate = Map::new();
    for (path, value) in &writable {
        updates.insert(path.trim_matches('/').to_string(), (*value).clone());
    }

    if let Err(e) = store.batch_update(updates).await {
        log::error!("Failed to apply {} fix(es): {}", writable.len(), e);
        return Err(match e {
            ApiError::WriteError(_) => e,
            other => ApiError::write_failed(&other),
        });
    }

    log::info!("Applied {} data consistency fix(es)", writable.len());
    Ok(ApplyResult { success: true, applied: writable.len() })
}
