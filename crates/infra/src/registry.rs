//! Flat, uniquely named registries: units, providers and destinations.

use std::marker::PhantomData;

use sqlx::sqlite::SqliteRow;
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use tracing::{info, instrument};

use stockledger_core::{DomainError, RowId};
use stockledger_inventory::{Destination, NamedRecord, Provider, Unit, normalize_name};

use crate::db::{self, finish};
use crate::error::{StoreError, StoreResult, is_unique_violation, map_sqlx_error};
use crate::row;

/// Storage details of a named record.
pub trait RegistryTable: NamedRecord {
    const TABLE: &'static str;

    /// Single-column boolean query; `?1` is the record id.
    const IN_USE_SQL: &'static str;
}

impl RegistryTable for Unit {
    const TABLE: &'static str = "units";
    const IN_USE_SQL: &'static str = "SELECT EXISTS (SELECT 1 FROM items WHERE unit_id = ?1)";
}

impl RegistryTable for Provider {
    const TABLE: &'static str = "providers";
    const IN_USE_SQL: &'static str = "SELECT EXISTS (SELECT 1 FROM items WHERE provider_id = ?1)";
}

impl RegistryTable for Destination {
    const TABLE: &'static str = "destinations";
    const IN_USE_SQL: &'static str =
        "SELECT EXISTS (SELECT 1 FROM movement_logs WHERE destination_id = ?1)";
}

fn record_from_row<R: RegistryTable>(row: &SqliteRow) -> StoreResult<R> {
    Ok(R::from_parts(
        row::id(R::TABLE, row, "id")?,
        row::text(R::TABLE, row, "name")?,
    ))
}

fn record_write_error<R: RegistryTable>(
    operation: &'static str,
    name: &str,
    err: sqlx::Error,
) -> StoreError {
    if is_unique_violation(&err) {
        return DomainError::name_in_use(R::KIND, name).into();
    }
    map_sqlx_error(operation, err)
}

pub async fn add_record<R: RegistryTable>(
    conn: &mut SqliteConnection,
    name: &str,
) -> StoreResult<R> {
    let name = normalize_name(R::KIND, name)?;
    let id = R::Id::generate();
    let sql = format!("INSERT INTO {} (id, name) VALUES (?1, ?2)", R::TABLE);
    sqlx::query(&sql)
        .bind(id.to_string())
        .bind(&name)
        .execute(&mut *conn)
        .await
        .map_err(|e| record_write_error::<R>("insert_record", &name, e))?;
    Ok(R::from_parts(id, name))
}

pub async fn list_records<R: RegistryTable>(conn: &mut SqliteConnection) -> StoreResult<Vec<R>> {
    let sql = format!("SELECT id, name FROM {} ORDER BY name COLLATE NOCASE ASC", R::TABLE);
    let rows = sqlx::query(&sql)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("list_records", e))?;
    rows.iter().map(record_from_row::<R>).collect()
}

pub async fn get_record<R: RegistryTable>(
    conn: &mut SqliteConnection,
    id: R::Id,
) -> StoreResult<Option<R>> {
    let sql = format!("SELECT id, name FROM {} WHERE id = ?1", R::TABLE);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("get_record", e))?;
    row.as_ref().map(record_from_row::<R>).transpose()
}

pub async fn rename_record<R: RegistryTable>(
    conn: &mut SqliteConnection,
    id: R::Id,
    name: &str,
) -> StoreResult<R> {
    let name = normalize_name(R::KIND, name)?;
    let sql = format!("UPDATE {} SET name = ?1 WHERE id = ?2", R::TABLE);
    let result = sqlx::query(&sql)
        .bind(&name)
        .bind(id.to_string())
        .execute(&mut *conn)
        .await
        .map_err(|e| record_write_error::<R>("rename_record", &name, e))?;
    if result.rows_affected() == 0 {
        return Err(DomainError::not_found(R::KIND, id).into());
    }
    Ok(R::from_parts(id, name))
}

pub async fn record_in_use<R: RegistryTable>(
    conn: &mut SqliteConnection,
    id: R::Id,
) -> StoreResult<bool> {
    let in_use: i64 = sqlx::query_scalar(R::IN_USE_SQL)
        .bind(id.to_string())
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("record_in_use", e))?;
    Ok(in_use != 0)
}

/// Delete a record nothing refers to.
pub async fn delete_record<R: RegistryTable>(
    conn: &mut SqliteConnection,
    id: R::Id,
) -> StoreResult<()> {
    if get_record::<R>(conn, id).await?.is_none() {
        return Err(DomainError::not_found(R::KIND, id).into());
    }
    if record_in_use::<R>(conn, id).await? {
        return Err(DomainError::in_use(R::KIND, id).into());
    }
    let sql = format!("DELETE FROM {} WHERE id = ?1", R::TABLE);
    sqlx::query(&sql)
        .bind(id.to_string())
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("delete_record", e))?;
    Ok(())
}

/// Pool-backed registry of one record kind.
#[derive(Debug)]
pub struct NamedRegistry<R> {
    pool: SqlitePool,
    _record: PhantomData<fn() -> R>,
}

impl<R> Clone for NamedRegistry<R> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            _record: PhantomData,
        }
    }
}

pub type UnitRegistry = NamedRegistry<Unit>;
pub type ProviderRegistry = NamedRegistry<Provider>;
pub type DestinationRegistry = NamedRegistry<Destination>;

impl<R: RegistryTable> NamedRegistry<R> {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            _record: PhantomData,
        }
    }

    #[instrument(skip(self), fields(kind = R::KIND), err)]
    pub async fn add(&self, name: &str) -> StoreResult<R> {
        let mut tx = db::begin(&self.pool).await?;
        let result = add_record::<R>(&mut tx, name).await;
        let record = finish(tx, "add_record", result).await?;
        info!(kind = R::KIND, id = %record.id(), name = record.name(), "record added");
        Ok(record)
    }

    pub async fn list(&self) -> StoreResult<Vec<R>> {
        let mut conn = self.acquire().await?;
        list_records::<R>(&mut conn).await
    }

    pub async fn get(&self, id: R::Id) -> StoreResult<Option<R>> {
        let mut conn = self.acquire().await?;
        get_record::<R>(&mut conn, id).await
    }

    #[instrument(skip(self), fields(kind = R::KIND), err)]
    pub async fn update(&self, id: R::Id, name: &str) -> StoreResult<R> {
        let mut tx = db::begin(&self.pool).await?;
        let result = rename_record::<R>(&mut tx, id, name).await;
        let record = finish(tx, "rename_record", result).await?;
        info!(kind = R::KIND, id = %record.id(), name = record.name(), "record renamed");
        Ok(record)
    }

    pub async fn is_in_use(&self, id: R::Id) -> StoreResult<bool> {
        let mut conn = self.acquire().await?;
        record_in_use::<R>(&mut conn, id).await
    }

    #[instrument(skip(self), fields(kind = R::KIND), err)]
    pub async fn delete(&self, id: R::Id) -> StoreResult<()> {
        let mut tx = db::begin(&self.pool).await?;
        let result = delete_record::<R>(&mut tx, id).await;
        finish(tx, "delete_record", result).await?;
        info!(kind = R::KIND, id = %id, "record deleted");
        Ok(())
    }

    async fn acquire(&self) -> StoreResult<sqlx::pool::PoolConnection<Sqlite>> {
        self.pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))
    }
}
