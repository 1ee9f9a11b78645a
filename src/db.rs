// src/db.rs - Database setup and migrations for the tree store

use sqlx::{sqlite::SqliteConnectOptions, sqlite::SqlitePoolOptions, migrate::MigrateDatabase, Sqlite, SqlitePool};
use std::str::FromStr;
use std::time::Duration;
use anyhow::{Context, Result};

use crate::config::DatabaseConfig;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(pool)
        .await?;

    // One row per direct child of a top-level collection
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tree_nodes (
            collection TEXT NOT NULL CHECK(length(collection) > 0),
            node_key TEXT NOT NULL CHECK(length(node_key) > 0),
            value TEXT NOT NULL CHECK(json_valid(value)),
            updated_at DATETIME NOT NULL,
            PRIMARY KEY (collection, node_key)
        )
        "#,
    )
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tree_nodes_updated ON tree_nodes(updated_at)")
        .execute(pool)
        .await?;

    log::info!("Database migrations completed");
    Ok(())
}

pub async fn setup_database(database_url: &str) -> Result<()> {
    if !Sqlite::database_exists(database_url).await.unwrap_or(false) {
        log::info!("Creating database: {}", database_url);
        Sqlite::create_database(database_url).await?;
    }
    Ok(())
}

pub async fn create_database_pool(db_config: &DatabaseConfig) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&db_config.url)
        .with_context(|| format!("Invalid database URL: {}", db_config.url))?
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(db_config.max_connections)
        .min_connections(db_config.min_connections)
        .acquire_timeout(Duration::from_secs(db_config.connect_timeout))
        .connect_with(options)
        .await
        .context("Failed to connect to database")?;

    Ok(pool)
}
