// src/store/sqlite.rs
//! Tree store persisted in SQLite.
//!
//! Each direct child of a top-level collection is one row of `tree_nodes`
//! holding its JSON text. Depth-1 writes replace a whole collection, depth-2
//! writes upsert or delete a row, deeper writes patch the row's JSON.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use sqlx::{Sqlite, SqlitePool, Transaction};

use super::{children_of, is_empty_node, read_at, split_path, validate_update, write_at, TreeStore, TreeUpdate};
use crate::error::{ApiError, ApiResult};

#[derive(Clone)]
pub struct SqliteTreeStore {
    pool: SqlitePool,
}

impl SqliteTreeStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn load_collection(&self, collection: &str) -> ApiResult<Option<Value>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT node_key, value FROM tree_nodes WHERE collection = ? ORDER BY node_key"
        )
            .bind(collection)
            .fetch_all(&self.pool)
            .await?;

        if rows.is_empty() {
            return Ok(None);
        }

        let mut children = Map::new();
        for (key, raw) in rows {
            children.insert(key, serde_json::from_str(&raw)?);
        }
        Ok(Some(Value::Object(children)))
    }

    async fn load_node(&self, collection: &str, key: &str) -> ApiResult<Option<Value>> {
        let raw: Option<String> = sqlx::query_scalar(
            "SELECT value FROM tree_nodes WHERE collection = ? AND node_key = ?"
        )
            .bind(collection)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl TreeStore for SqliteTreeStore {
    async fn fetch(&self, path: &str) -> ApiResult<Option<Value>> {
        let segments = split_path(path).ok_or_else(|| ApiError::invalid_path(path))?;

        match segments.as_slice() {
            [collection] => self.load_collection(collection).await,
            [collection, key, rest @ ..] => {
                let node = self.load_node(collection, key).await?;
                Ok(node.and_then(|node| read_at(&node, rest).cloned()))
            }
            [] => Err(ApiError::invalid_path(path)),
        }
    }

    async fn batch_update(&self, updates: TreeUpdate) -> ApiResult<()> {
        validate_update(&updates)?;

        let mut tx = self.pool.begin().await?;
        for (path, value) in updates {
            let segments = split_path(&path).ok_or_else(|| ApiError::invalid_path(&path))?;
            match segments.as_slice() {
                [collection] => replace_collection(&mut tx, &path, collection, value).await?,
                [collection, key, rest @ ..] => patch_node(&mut tx, collection, key, rest, value).await?,
                [] => return Err(ApiError::invalid_path(&path)),
            }
        }
        tx.commit().await?;

        Ok(())
    }

    async fn ping(&self) -> ApiResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

async fn replace_collection(
    tx: &mut Transaction<'static, Sqlite>,
    path: &str,
    collection: &str,
    value: Value,
) -> ApiResult<()> {
    if !(value.is_null() || value.is_object() || value.is_array()) {
        return Err(ApiError::BadRequest(format!(
            "Collection '{}' must be an object of records",
            collection
        )));
    }

    sqlx::query("DELETE FROM tree_nodes WHERE collection = ?")
        .bind(collection)
        .execute(&mut **tx)
        .await?;

    for (key, child) in children_of(path, Some(value)) {
        if is_empty_node(&child) {
            continue;
        }
        upsert_node(tx, collection, &key, &child).await?;
    }
    Ok(())
}

async fn patch_node(
    tx: &mut Transaction<'static, Sqlite>,
    collection: &str,
    key: &str,
    rest: &[&str],
    value: Value,
) -> ApiResult<()> {
    let current: Option<String> = sqlx::query_scalar(
        "SELECT value FROM tree_nodes WHERE collection = ? AND node_key = ?"
    )
        .bind(collection)
        .bind(key)
        .fetch_optional(&mut **tx)
        .await?;

    let mut node = match current {
        Some(raw) => serde_json::from_str(&raw)?,
        None => Value::Null,
    };
    write_at(&mut node, rest, value);

    if is_empty_node(&node) {
        sqlx::query("DELETE FROM tree_nodes WHERE collection = ? AND node_key = ?")
            .bind(collection)
            .bind(key)
            .execute(&mut **tx)
            .await?;
        Ok(())
    } else {
        upsert_node(tx, collection, key, &node).await
    }
}

async fn upsert_node(
    tx: &mut Transaction<'static, Sqlite>,
    collection: &str,
    key: &str,
    node: &Value,
) -> ApiResult<()> {
    sqlx::query(
        r#"INSERT INTO tree_nodes (collection, node_key, value, updated_at)
           VALUES (?, ?, ?, ?)
           ON CONFLICT(collection, node_key)
           DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at"#
    )
        .bind(collection)
        .bind(key)
        .bind(serde_json::to_string(node)?)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;
    Ok(())
}
