// src/import_export.rs
use actix_web::{web, HttpResponse};
use anyhow::Context;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::handlers::{path_segment, ApiResponse};
use crate::models::ALL_COLLECTIONS;
use crate::store::{self, TreeStore, TreeUpdate};
use crate::AppState;

// ==================== IMPORT MODELS ====================

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    /// Records written per collection
    pub collections: BTreeMap<String, usize>,
    pub total_records: usize,
}

// ==================== TREE IMPORT ====================

/// Replace every top-level collection present in `export` with its content.
///
/// Collections missing from the export are left alone; a collection given as
/// `null` is removed.
pub async fn import_tree(store: &dyn TreeStore, export: Value) -> ApiResult<ImportSummary> {
    let Value::Object(collections) = export else {
        return Err(ApiError::bad_request("Import must be a JSON object of collections"));
    };

    let mut updates = TreeUpdate::new();
    let mut summary = ImportSummary {
        collections: BTreeMap::new(),
        total_records: 0,
    };

    for (name, content) in collections {
        let name = path_segment(&name, "collection name")?;
        if !ALL_COLLECTIONS.contains(&name.as_str()) {
            log::warn!("Importing unrecognised collection '{}'", name);
        }

        let records = store::children_of(&name, Some(content.clone())).len();
        summary.collections.insert(name.clone(), records);
        summary.total_records += records;
        updates.insert(name, content);
    }

    if updates.is_empty() {
        return Ok(summary);
    }

    store.batch_update(updates).await?;
    log::info!(
        "Imported {} record(s) into {} collection(s)",
        summary.total_records,
        summary.collections.len()
    );
    Ok(summary)
}

/// Load a JSON export into the store when every known collection is empty.
/// Returns whether anything was imported.
pub async fn seed_from_file(store: &dyn TreeStore, path: &str) -> anyhow::Result<bool> {
    for collection in ALL_COLLECTIONS {
        if !store.fetch_collection(collection).await?.is_empty() {
            log::info!("Store already holds data; skipping seed file {}", path);
            return Ok(false);
        }
    }

    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read seed file: {}", path))?;
    let export: Value = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse seed file: {}", path))?;

    let summary = import_tree(store, export).await?;
    log::info!("Seeded store from {} ({} record(s))", path, summary.total_records);
    Ok(true)
}

// ==================== HANDLERS ====================

pub async fn import_tree_json(
    app_state: web::Data<Arc<AppState>>,
    body: web::Json<Value>,
) -> ApiResult<HttpResponse> {
    let summary = import_tree(app_state.store.as_ref(), body.into_inner()).await?;
    let message = format!("Imported {} record(s)", summary.total_records);
    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(summary, message)))
}

pub async fn export_collection(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let collection = path_segment(&path.into_inner(), "collection name")?;
    let children: Map<String, Value> = app_state.store.fetch_collection(&collection).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(children)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryTreeStore;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_import_replaces_given_collections_only() {
        let store = MemoryTreeStore::with_tree(json!({
            "users": {"old": {"name": "Gone"}},
            "laboratories": {"L1": {"labId": "LAB001"}}
        }));

        let summary = import_tree(&store, json!({
            "users": {"u1": {"name": "Ana"}, "u2": {"name": "Ben"}},
            "borrow_requests": [null, {"itemId": "E1"}]
        }))
        .await
        .unwrap();

        assert_eq!(summary.total_records, 3);
        assert_eq!(summary.collections["users"], 2);

        let tree = store.snapshot().await;
        assert!(tree["users"].get("old").is_none());
        assert_eq!(tree["laboratories"]["L1"]["labId"], "LAB001");
    }

    #[tokio::test]
    async fn test_import_rejects_non_objects_and_bad_names() {
        let store = MemoryTreeStore::new();
        assert!(matches!(import_tree(&store, json!([1, 2])).await, Err(ApiError::BadRequest(_))));
        assert!(import_tree(&store, json!({"a.b": {}})).await.is_err());
    }

    #[tokio::test]
    async fn test_seed_only_into_empty_store() -> anyhow::Result<()> {
        let mut file = NamedTempFile::new()?;
        file.write_all(br#"{"laboratories": {"L1": {"labName": "Chem"}}}"#)?;
        let path = file.path().to_string_lossy().to_string();

        let empty = MemoryTreeStore::new();
        assert!(seed_from_file(&empty, &path).await?);
        assert_eq!(empty.snapshot().await["laboratories"]["L1"]["labName"], "Chem");

        let populated = MemoryTreeStore::with_tree(json!({"users": {"u1": {}}}));
        assert!(!seed_from_file(&populated, &path).await?);
        assert!(populated.snapshot().await.get("laboratories").is_none());
        Ok(())
    }
}
