//! Column codecs shared by the row mappers.
//!
//! Ids, decimals and timestamps are stored as TEXT.

use std::str::FromStr;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use stockledger_core::RowId;
use stockledger_inventory::TIMESTAMP_FORMAT;

use crate::error::{StoreError, StoreResult};

pub(crate) fn text(table: &'static str, row: &SqliteRow, column: &str) -> StoreResult<String> {
    row.try_get(column)
        .map_err(|e| StoreError::corrupt(table, format!("{column}: {e}")))
}

pub(crate) fn opt_text(
    table: &'static str,
    row: &SqliteRow,
    column: &str,
) -> StoreResult<Option<String>> {
    row.try_get(column)
        .map_err(|e| StoreError::corrupt(table, format!("{column}: {e}")))
}

pub(crate) fn int(table: &'static str, row: &SqliteRow, column: &str) -> StoreResult<i64> {
    row.try_get(column)
        .map_err(|e| StoreError::corrupt(table, format!("{column}: {e}")))
}

pub(crate) fn opt_int(
    table: &'static str,
    row: &SqliteRow,
    column: &str,
) -> StoreResult<Option<i64>> {
    row.try_get(column)
        .map_err(|e| StoreError::corrupt(table, format!("{column}: {e}")))
}

pub(crate) fn id<T: RowId>(table: &'static str, row: &SqliteRow, column: &str) -> StoreResult<T> {
    let raw = text(table, row, column)?;
    T::from_str(&raw).map_err(|e| StoreError::corrupt(table, format!("{column}: {e}")))
}

pub(crate) fn opt_id<T: RowId>(
    table: &'static str,
    row: &SqliteRow,
    column: &str,
) -> StoreResult<Option<T>> {
    opt_text(table, row, column)?
        .map(|raw| T::from_str(&raw).map_err(|e| StoreError::corrupt(table, format!("{column}: {e}"))))
        .transpose()
}

pub(crate) fn opt_decimal(
    table: &'static str,
    row: &SqliteRow,
    column: &str,
) -> StoreResult<Option<Decimal>> {
    opt_text(table, row, column)?
        .map(|raw| {
            Decimal::from_str(&raw)
                .map_err(|e| StoreError::corrupt(table, format!("{column}: {e}")))
        })
        .transpose()
}

pub(crate) fn timestamp(
    table: &'static str,
    row: &SqliteRow,
    column: &str,
) -> StoreResult<NaiveDateTime> {
    let raw = text(table, row, column)?;
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S%.f")
        .map_err(|e| StoreError::corrupt(table, format!("{column}: {e}")))
}

pub(crate) fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub(crate) fn opt_id_text<T: RowId>(id: Option<T>) -> Option<String> {
    id.map(|id| id.to_string())
}

pub(crate) fn opt_decimal_text(value: Option<Decimal>) -> Option<String> {
    value.map(|d| d.to_string())
}
