//! Connection pool setup and schema.

use std::str::FromStr;

use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use tracing::{info, warn};

use crate::config::StoreConfig;
use crate::error::{StoreResult, map_sqlx_error};

/// Schema, applied in order. Every statement is idempotent.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS units (
        id   TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS providers (
        id   TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS destinations (
        id   TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS categories (
        id        TEXT PRIMARY KEY,
        name      TEXT NOT NULL,
        parent_id TEXT NULL REFERENCES categories(id)
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS categories_sibling_name
        ON categories (IFNULL(parent_id, ''), name COLLATE NOCASE)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS items (
        id               TEXT PRIMARY KEY,
        name             TEXT NOT NULL,
        current_quantity INTEGER NOT NULL DEFAULT 0 CHECK (current_quantity >= 0),
        unit_id          TEXT NOT NULL REFERENCES units(id),
        sub_category_id  TEXT NULL REFERENCES categories(id) ON DELETE SET NULL,
        provider_id      TEXT NULL REFERENCES providers(id),
        cost             TEXT NULL,
        barcode          TEXT NULL UNIQUE,
        status           TEXT NOT NULL DEFAULT 'active'
                         CHECK (status IN ('active', 'inactive', 'archived'))
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS items_active_name
        ON items (name COLLATE NOCASE) WHERE status = 'active'
    "#,
    "CREATE INDEX IF NOT EXISTS items_sub_category ON items (sub_category_id)",
    // No foreign keys: entries outlive the rows they mention.
    r#"
    CREATE TABLE IF NOT EXISTS movement_logs (
        id                 TEXT PRIMARY KEY,
        item_id            TEXT NOT NULL,
        item_name          TEXT NOT NULL,
        kind               TEXT NOT NULL,
        quantity_changed   INTEGER NULL,
        resulting_quantity INTEGER NULL,
        provider_id        TEXT NULL,
        destination_id     TEXT NULL,
        unit_cost          TEXT NULL,
        details            TEXT NULL,
        actor              TEXT NULL,
        timestamp          TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS movement_logs_item ON movement_logs (item_id)",
    "CREATE INDEX IF NOT EXISTS movement_logs_timestamp ON movement_logs (timestamp)",
    r#"
    CREATE TRIGGER IF NOT EXISTS movement_logs_no_update
    BEFORE UPDATE ON movement_logs
    BEGIN
        SELECT RAISE(ABORT, 'movement log entries are append-only');
    END
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS movement_logs_no_delete
    BEFORE DELETE ON movement_logs
    BEGIN
        SELECT RAISE(ABORT, 'movement log entries are append-only');
    END
    "#,
];

/// Open a pool for `config` and bring the schema up to date.
pub async fn connect(config: &StoreConfig) -> StoreResult<SqlitePool> {
    let mut options = SqliteConnectOptions::from_str(&config.database_url)
        .map_err(|e| map_sqlx_error("parse_database_url", e))?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(config.busy_timeout);

    let mut pool_options = SqlitePoolOptions::new();
    if config.is_in_memory() {
        // Each connection to `:memory:` is its own database; keep exactly one alive.
        pool_options = pool_options
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    } else {
        options = options
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);
        pool_options = pool_options.max_connections(config.max_connections);
    }

    let pool = pool_options
        .connect_with(options)
        .await
        .map_err(|e| map_sqlx_error("connect", e))?;

    migrate(&pool).await?;
    info!(
        database_url = %config.database_url,
        max_connections = config.max_connections,
        "inventory store ready"
    );
    Ok(pool)
}

/// Create any missing tables, indexes and triggers.
pub async fn migrate(pool: &SqlitePool) -> StoreResult<()> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
    }
    Ok(())
}

/// Commit `tx` when `result` is `Ok`, roll it back otherwise.
pub(crate) async fn finish<T>(
    tx: Transaction<'_, Sqlite>,
    operation: &'static str,
    result: StoreResult<T>,
) -> StoreResult<T> {
    match result {
        Ok(value) => {
            tx.commit()
                .await
                .map_err(|e| map_sqlx_error("commit_transaction", e))?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback) = tx.rollback().await {
                warn!(operation, error = %rollback, "rollback failed; the connection will discard the transaction");
            }
            Err(err)
        }
    }
}

/// Open a write transaction.
///
/// `BEGIN IMMEDIATE` takes the write lock up front, so a second writer waits
/// in `busy_timeout` instead of failing when it upgrades from a read.
pub(crate) async fn begin(pool: &SqlitePool) -> StoreResult<Transaction<'static, Sqlite>> {
    pool.begin_with("BEGIN IMMEDIATE")
        .await
        .map_err(|e| map_sqlx_error("begin_transaction", e))
}

/// Whether a row with `id` exists in `table`.
pub(crate) async fn row_exists(
    conn: &mut SqliteConnection,
    table: &'static str,
    id: &str,
) -> StoreResult<bool> {
    let sql = format!("SELECT EXISTS (SELECT 1 FROM {table} WHERE id = ?1) AS present");
    let present: i64 = sqlx::query_scalar(&sql)
        .bind(id)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("row_exists", e))?;
    Ok(present != 0)
}
