// src/store/memory.rs
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use super::{read_at, split_path, validate_update, write_at, TreeStore, TreeUpdate};
use crate::error::{ApiError, ApiResult};

/// Whole tree held in memory. A batch is applied to a copy and swapped in,
/// so readers never observe half of it.
pub struct MemoryTreeStore {
    root: RwLock<Value>,
    online: AtomicBool,
}

impl MemoryTreeStore {
    pub fn new() -> Self {
        Self::with_tree(Value::Object(Map::new()))
    }

    pub fn with_tree(tree: Value) -> Self {
        Self {
            root: RwLock::new(tree),
            online: AtomicBool::new(true),
        }
    }

    /// Simulate the store becoming unreachable (or coming back).
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub async fn snapshot(&self) -> Value {
        self.root.read().await.clone()
    }

    fn ensure_online(&self) -> ApiResult<()> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ApiError::store_unavailable())
        }
    }
}

impl Default for MemoryTreeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TreeStore for MemoryTreeStore {
    async fn fetch(&self, path: &str) -> ApiResult<Option<Value>> {
        self.ensure_online()?;
        let segments = split_path(path).ok_or_else(|| ApiError::invalid_path(path))?;

        let root = self.root.read().await;
        Ok(read_at(&root, &segments).cloned())
    }

    async fn batch_update(&self, updates: TreeUpdate) -> ApiResult<()> {
        self.ensure_online()?;
        validate_update(&updates)?;

        let mut root = self.root.write().await;
        let mut next = root.clone();
        for (path, value) in updates {
            if let Some(segments) = split_path(&path) {
                write_at(&mut next, &segments, value);
            }
        }
        if next.is_null() {
            next = Value::Object(Map::new());
        }
        *root = next;
        Ok(())
    }

    async fn ping(&self) -> ApiResult<()> {
        self.ensure_online()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_fetch_collection_absent_is_empty() {
        let store = MemoryTreeStore::new();
        assert!(store.fetch_collection("laboratories").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_batch_update_applies_all_paths() {
        let store = MemoryTreeStore::with_tree(json!({
            "laboratories": {"L1": {"labName": "Physics"}}
        }));

        let mut updates = TreeUpdate::new();
        updates.insert("laboratories/L1/labId".to_string(), json!("LAB001"));
        updates.insert("borrow_requests/R1/labId".to_string(), json!("LAB001"));
        store.batch_update(updates).await.unwrap();

        let tree = store.snapshot().await;
        assert_eq!(tree["laboratories"]["L1"]["labId"], "LAB001");
        assert_eq!(tree["laboratories"]["L1"]["labName"], "Physics");
        assert_eq!(tree["borrow_requests"]["R1"]["labId"], "LAB001");
    }

    #[tokio::test]
    async fn test_invalid_path_rejects_whole_batch() {
        let store = MemoryTreeStore::new();
        let mut updates = TreeUpdate::new();
        updates.insert("users/u1/name".to_string(), json!("Ana"));
        updates.insert("users//name".to_string(), json!("Bad"));

        assert!(store.batch_update(updates).await.is_err());
        assert_eq!(store.snapshot().await, json!({}));
    }

    #[tokio::test]
    async fn test_offline_store_fails_reads_and_writes() {
        let store = MemoryTreeStore::new();
        store.set_online(false);
        assert!(store.fetch("users").await.is_err());
        assert!(store.ping().await.is_err());
        assert!(store.remove("users/u1").await.is_err());

        store.set_online(true);
        assert!(store.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_remove() {
        let store = MemoryTreeStore::with_tree(json!({"restricted_users": {"u1": {"status": "active"}}}));
        store.remove("restricted_users/u1").await.unwrap();
        assert!(store.fetch("restricted_users/u1").await.unwrap().is_none());
    }
}
