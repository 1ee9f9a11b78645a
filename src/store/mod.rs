// src/store/mod.rs
//! JSON tree store: the Realtime-Database style key-value tree every
//! collection lives in.
//!
//! Paths are slash-delimited (`collection/id/field`). A batched update maps
//! absolute paths to values and is applied as one unit; a `null` value
//! deletes the node and prunes parents that become empty.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

pub use memory::MemoryTreeStore;
pub use sqlite::SqliteTreeStore;

lazy_static! {
    static ref SEGMENT_REGEX: Regex = Regex::new(r"^[^.#$\[\]/]+$").unwrap();
}

/// Ordered path -> value pairs written by one `batch_update` call.
pub type TreeUpdate = Map<String, Value>;

#[async_trait]
pub trait TreeStore: Send + Sync {
    /// Read the subtree at `path`, `None` when nothing is stored there.
    async fn fetch(&self, path: &str) -> ApiResult<Option<Value>>;

    /// Read the children of `path` as id -> value.
    async fn fetch_collection(&self, path: &str) -> ApiResult<Map<String, Value>> {
        let value = self.fetch(path).await?;
        Ok(children_of(path, value))
    }

    /// Write every path of `updates` as a single unit.
    async fn batch_update(&self, updates: TreeUpdate) -> ApiResult<()>;

    /// Remove the node at `path`.
    async fn remove(&self, path: &str) -> ApiResult<()> {
        let mut updates = TreeUpdate::new();
        updates.insert(path.to_string(), Value::Null);
        self.batch_update(updates).await
    }

    /// Fresh child key for a new record.
    fn push_key(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }

    /// Cheap reachability probe.
    async fn ping(&self) -> ApiResult<()>;
}

// ==================== PATHS ====================

/// Split a store path into segments. Leading and trailing slashes are
/// ignored; empty segments and the characters `. # $ [ ]` are rejected.
pub fn split_path(path: &str) -> Option<Vec<&str>> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return None;
    }

    let segments: Vec<&str> = trimmed.split('/').collect();
    let valid = segments
        .iter()
        .all(|s| !s.trim().is_empty() && SEGMENT_REGEX.is_match(s));

    if valid { Some(segments) } else { None }
}

pub fn is_valid_path(path: &str) -> bool {
    split_path(path).is_some()
}

pub(crate) fn validate_update(updates: &TreeUpdate) -> ApiResult<()> {
    match updates.keys().find(|path| !is_valid_path(path)) {
        Some(path) => Err(ApiError::invalid_path(path)),
        None => Ok(()),
    }
}

// ==================== TREE OPERATIONS ====================

/// Interpret a fetched subtree as a collection of children.
///
/// Arrays (sequential numeric keys) are read as index -> element with null
/// holes skipped; a scalar root has no children.
pub fn children_of(path: &str, value: Option<Value>) -> Map<String, Value> {
    match value {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map,
        Some(Value::Array(items)) => array_to_map(items),
        Some(other) => {
            log::warn!("Collection '{}' holds a scalar value ({}); treating it as empty", path, other);
            Map::new()
        }
    }
}

fn array_to_map(items: Vec<Value>) -> Map<String, Value> {
    items
        .into_iter()
        .enumerate()
        .filter(|(_, item)| !item.is_null())
        .map(|(index, item)| (index.to_string(), item))
        .collect()
}

pub fn read_at<'a>(node: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    let mut current = node;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(*segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    if current.is_null() { None } else { Some(current) }
}

/// Set `value` at `segments` below `node`, creating intermediate objects.
/// A `null` value removes the node instead.
pub fn write_at(node: &mut Value, segments: &[&str], value: Value) {
    if value.is_null() {
        remove_at(node, segments);
        return;
    }

    match segments.split_first() {
        None => *node = value,
        Some((head, rest)) => {
            let map = coerce_object(node);
            let child = map.entry(head.to_string()).or_insert(Value::Null);
            write_at(child, rest, value);
        }
    }
}

fn remove_at(node: &mut Value, segments: &[&str]) {
    let Some((head, rest)) = segments.split_first() else {
        *node = Value::Null;
        return;
    };

    if node.is_array() {
        coerce_object(node);
    }

    if let Value::Object(map) = node {
        let drop_child = match map.get_mut(*head) {
            None => false,
            Some(_) if rest.is_empty() => true,
            Some(child) => {
                remove_at(child, rest);
                is_empty_node(child)
            }
        };

        if drop_child {
            // rebuild instead of swap-removing so sibling order is kept
            let kept: Map<String, Value> = std::mem::take(map)
                .into_iter()
                .filter(|(key, _)| key.as_str() != *head)
                .collect();
            *map = kept;
        }
    }
}

fn coerce_object(node: &mut Value) -> &mut Map<String, Value> {
    let replacement = match std::mem::take(node) {
        Value::Object(map) => map,
        Value::Array(items) => array_to_map(items),
        _ => Map::new(),
    };
    *node = Value::Object(replacement);

    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced by an object"),
    }
}

pub fn is_empty_node(node: &Value) -> bool {
    match node {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_split_path() {
        assert_eq!(split_path("laboratories/L1/labId"), Some(vec!["laboratories", "L1", "labId"]));
        assert_eq!(split_path("/users/u1/"), Some(vec!["users", "u1"]));
        assert!(split_path("").is_none());
        assert!(split_path("/").is_none());
        assert!(split_path("a//b").is_none());
        assert!(split_path("a/ /b").is_none());
        assert!(split_path("users/u.1").is_none());
        assert!(split_path("users/$key").is_none());
    }

    #[test]
    fn test_write_creates_intermediate_objects() {
        let mut root = json!({});
        write_at(&mut root, &["borrow_requests", "R1", "labId"], json!("LAB001"));
        assert_eq!(root, json!({"borrow_requests": {"R1": {"labId": "LAB001"}}}));
    }

    #[test]
    fn test_write_same_value_twice_is_noop() {
        let mut root = json!({"laboratories": {"L1": {"labName": "Chem"}}});
        write_at(&mut root, &["laboratories", "L1", "labId"], json!("LAB003"));
        let once = root.clone();
        write_at(&mut root, &["laboratories", "L1", "labId"], json!("LAB003"));
        assert_eq!(root, once);
    }

    #[test]
    fn test_null_removes_and_prunes_empty_parents() {
        let mut root = json!({
            "restricted_users": {"u1": {"status": "active"}, "u2": {"status": "active"}}
        });
        write_at(&mut root, &["restricted_users", "u1", "status"], Value::Null);
        assert_eq!(root, json!({"restricted_users": {"u2": {"status": "active"}}}));

        write_at(&mut root, &["restricted_users", "u2"], Value::Null);
        assert_eq!(root, json!({}));
    }

    #[test]
    fn test_remove_keeps_sibling_order() {
        let mut root = json!({"c": {"a": 1, "b": 2, "c": 3, "d": 4}});
        write_at(&mut root, &["c", "b"], Value::Null);
        let keys: Vec<&String> = root["c"].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["a", "c", "d"]);
    }

    #[test]
    fn test_children_of_array_skips_holes() {
        let children = children_of("users", Some(json!([null, {"name": "A"}, {"name": "B"}])));
        let keys: Vec<&String> = children.keys().collect();
        assert_eq!(keys, vec!["1", "2"]);
    }

    #[test]
    fn test_children_of_scalar_is_empty() {
        assert!(children_of("users", Some(json!("oops"))).is_empty());
        assert!(children_of("users", None).is_empty());
    }

    #[test]
    fn test_read_at() {
        let root = json!({"a": {"b": [10, 20]}});
        assert_eq!(read_at(&root, &["a", "b", "1"]), Some(&json!(20)));
        assert_eq!(read_at(&root, &["a", "x"]), None);
    }
}
