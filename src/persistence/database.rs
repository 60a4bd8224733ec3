/// Workflow database connection and schema bootstrap
///
/// A single SQLite database holds every case's live workflow record and its
/// checkpoints: {data_dir}/workflows.db. Tests use a private in-memory pool.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// File name of the workflow database inside the data directory
pub const DATABASE_FILE: &str = "workflows.db";

/// Open (creating if needed) the workflow database under `data_dir`
pub async fn connect(data_dir: impl AsRef<Path>) -> Result<SqlitePool> {
    let data_dir = data_dir.as_ref();
    std::fs::create_dir_all(data_dir).map_err(|e| {
        anyhow::anyhow!(
            "Failed to create data directory '{}': {}",
            data_dir.display(),
            e
        )
    })?;
    let db_path = data_dir.join(DATABASE_FILE);

    tracing::info!("🗄️ Opening workflow database: {}", db_path.display());

    let options = SqliteConnectOptions::new()
        .filename(&db_path)
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await?;

    init_schema(&pool).await?;

    tracing::info!("✅ Workflow database ready: {}", db_path.display());

    Ok(pool)
}

/// Open a private in-memory database with the schema applied
///
/// Pinned to one connection that never expires, since each SQLite memory
/// connection is its own database.
pub async fn connect_in_memory() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    init_schema(&pool).await?;

    Ok(pool)
}

/// Create the workflow tables and indexes
///
/// Safe to call multiple times (uses IF NOT EXISTS).
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    // One live row per case, replaced by upsert
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS workflow_states (
            case_id TEXT PRIMARY KEY,
            schema_version INTEGER NOT NULL,
            workflow_run_id TEXT,
            status TEXT NOT NULL,
            current_stage TEXT NOT NULL,
            steps TEXT NOT NULL,
            selected_document_ids TEXT NOT NULL,
            retry_count INTEGER NOT NULL DEFAULT 0,
            last_error TEXT,
            has_consent INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Insert-only history; rows are never updated
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS workflow_checkpoints (
            id TEXT PRIMARY KEY,
            case_id TEXT NOT NULL,
            schema_version INTEGER NOT NULL,
            workflow_run_id TEXT,
            checkpoint_label TEXT NOT NULL,
            status TEXT NOT NULL,
            current_stage TEXT NOT NULL,
            steps TEXT NOT NULL,
            selected_document_ids TEXT NOT NULL,
            retry_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_checkpoints_case_created ON workflow_checkpoints(case_id, created_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
