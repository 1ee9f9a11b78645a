// src/audit/snapshot.rs
use futures_util::future::try_join_all;
use serde_json::{Map, Value};

use crate::error::{ApiError, ApiResult};
use crate::models::{
    BORROW_REQUESTS, DAMAGED_LOST_RECORDS, EQUIPMENT_CATEGORIES, LABORATORIES, RESTRICTED_USERS, USERS,
};
use crate::store::TreeStore;

/// Read order of the snapshot fields.
const SNAPSHOT_COLLECTIONS: [&str; 6] = [
    LABORATORIES,
    USERS,
    EQUIPMENT_CATEGORIES,
    BORROW_REQUESTS,
    DAMAGED_LOST_RECORDS,
    RESTRICTED_USERS,
];

/// Raw contents of the six collections, all read before any rule runs.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub laboratories: Map<String, Value>,
    pub users: Map<String, Value>,
    pub equipment_categories: Map<String, Value>,
    pub borrow_requests: Map<String, Value>,
    pub damaged_lost_records: Map<String, Value>,
    pub restricted_users: Map<String, Value>,
}

/// Fetch every collection concurrently. The first failure aborts the load.
pub async fn load_snapshot(store: &dyn TreeStore) -> ApiResult<Snapshot> {
    let fetches = SNAPSHOT_COLLECTIONS.map(|collection| fetch(store, collection));
    let [laboratories, users, equipment_categories, borrow_requests, damaged_lost_records, restricted_users]: [Map<String, Value>; 6] =
        try_join_all(fetches)
            .await?
            .try_into()
            .map_err(|_| ApiError::InternalServerError("Snapshot load returned a short read".to_string()))?;

    Ok(Snapshot {
        laboratories,
        users,
        equipment_categories,
        borrow_requests,
        damaged_lost_records,
        restricted_users,
    })
}

#[cfg(test)]
impl Snapshot {
    /// Snapshot of an in-memory tree, without going through a store.
    pub fn from_tree(tree: &Value) -> Self {
        let collection = |name: &str| crate::store::children_of(name, tree.get(name).cloned());
        Self {
            laboratories: collection(LABORATORIES),
            users: collection(USERS),
            equipment_categories: collection(EQUIPMENT_CATEGORIES),
            borrow_requests: collection(BORROW_REQUESTS),
            damaged_lost_records: collection(DAMAGED_LOST_RECORDS),
            restricted_users: collection(RESTRICTED_USERS),
        }
    }
}

async fn fetch(store: &dyn TreeStore, collection: &str) -> ApiResult<Map<String, Value>> {
    match store.fetch_collection(collection).await {
        Ok(children) => {
            log::debug!("Fetched {} record(s) from '{}'", children.len(), collection);
            Ok(children)
        }
        Err(e) => {
            log::error!("Failed to fetch '{}': {}", collection, e);
            Err(ApiError::fetch_failed(collection, &e))
        }
    }
}
