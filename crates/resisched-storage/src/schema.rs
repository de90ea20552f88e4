//! Schema creation and connection setup, mirroring `database.rs`'s
//! `CREATE TABLE IF NOT EXISTS` style from the teacher's outer app
//! rather than its `sqlx::migrate!` macro, since that macro needs a
//! live database at build time to type-check its embedded queries.
//!
//! Every row-bearing table keeps its JSON payload in a `data` column
//! and promotes only the columns a port actually filters or joins on
//! to real SQL columns, the same trade the teacher makes for
//! `node_metadata`'s free-form `(node_id, key, value)` rows.

use std::str::FromStr;

use serde::Serialize;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

use crate::error::Result;

const STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS people (
        id TEXT PRIMARY KEY,
        data TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS blocks (
        id TEXT PRIMARY KEY,
        date TEXT NOT NULL,
        data TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_blocks_date ON blocks (date)",
    "CREATE TABLE IF NOT EXISTS templates (
        id TEXT PRIMARY KEY,
        data TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS absences (
        person_id TEXT NOT NULL,
        start_date TEXT NOT NULL,
        end_date TEXT NOT NULL,
        data TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_absences_range ON absences (start_date, end_date)",
    "CREATE TABLE IF NOT EXISTS assignments (
        id TEXT PRIMARY KEY,
        run_id TEXT NOT NULL,
        block_id TEXT NOT NULL,
        data TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_assignments_run ON assignments (run_id)",
    "CREATE INDEX IF NOT EXISTS idx_assignments_block ON assignments (block_id)",
    "CREATE TABLE IF NOT EXISTS runs (
        id TEXT PRIMARY KEY,
        start_date TEXT NOT NULL,
        end_date TEXT NOT NULL,
        status TEXT NOT NULL,
        data TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS snapshots (
        start_date TEXT NOT NULL,
        end_date TEXT NOT NULL,
        data TEXT NOT NULL,
        PRIMARY KEY (start_date, end_date)
    )",
    "CREATE TABLE IF NOT EXISTS explanations (
        assignment_id TEXT PRIMARY KEY,
        data TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS idempotency_records (
        key TEXT PRIMARY KEY,
        data TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS outbox_messages (
        id TEXT PRIMARY KEY,
        aggregate_id TEXT NOT NULL,
        status TEXT NOT NULL,
        data TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_outbox_status ON outbox_messages (status)",
    "CREATE TABLE IF NOT EXISTS outbox_sequences (
        aggregate_id TEXT PRIMARY KEY,
        next_seq INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS approval_records (
        chain_id TEXT NOT NULL,
        sequence_num INTEGER NOT NULL,
        data TEXT NOT NULL,
        PRIMARY KEY (chain_id, sequence_num)
    )",
];

/// Open (creating if missing) the sqlite database at `db_path` and
/// apply the schema. Idempotent: safe to call on every process start.
pub async fn init_db(db_path: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(db_path)?
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePool::connect_with(options).await?;

    for statement in STATEMENTS {
        sqlx::query(statement).execute(&pool).await?;
    }

    tracing::info!(db_path, "resisched schema ready");
    Ok(pool)
}

/// One column of a table, as reported by `PRAGMA table_info`.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnManifest {
    pub name: String,
    pub sql_type: String,
    pub not_null: bool,
    pub primary_key: bool,
}

/// One table and its columns, for the CLI's `schema export` command.
#[derive(Debug, Clone, Serialize)]
pub struct TableManifest {
    pub name: String,
    pub columns: Vec<ColumnManifest>,
}

/// Introspect the live schema via `sqlite_master`/`PRAGMA table_info`
/// rather than re-deriving it from `STATEMENTS` by hand, so the export
/// always matches what is actually on disk.
pub async fn table_manifest(pool: &SqlitePool) -> Result<Vec<TableManifest>> {
    let table_rows = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
        .fetch_all(pool)
        .await?;

    let mut tables = Vec::with_capacity(table_rows.len());
    for row in table_rows {
        let name: String = row.get("name");
        let column_rows = sqlx::query(&format!("PRAGMA table_info({name})")).fetch_all(pool).await?;
        let columns = column_rows
            .into_iter()
            .map(|r| ColumnManifest {
                name: r.get("name"),
                sql_type: r.get("type"),
                not_null: r.get::<i64, _>("notnull") != 0,
                primary_key: r.get::<i64, _>("pk") != 0,
            })
            .collect();
        tables.push(TableManifest { name, columns });
    }
    Ok(tables)
}

/// In-process sqlite pool for tests, never touching the filesystem.
/// Pinned to one connection: sqlite's `:memory:` database is private
/// per-connection, so a pool with more than one would see each query
/// land on a different, table-less database.
pub async fn init_memory_db() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(":memory:")?.create_if_missing(true);
    let pool = SqlitePoolOptions::new().max_connections(1).connect_with(options).await?;

    for statement in STATEMENTS {
        sqlx::query(statement).execute(&pool).await?;
    }
    Ok(pool)
}
