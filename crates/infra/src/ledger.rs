//! Append-only movement ledger.
//!
//! [`append`] never opens, commits or rolls back a transaction: it writes on
//! whatever connection the caller hands it, so the entry lands in the same
//! transaction as the item mutation it describes.

use chrono::{Local, NaiveDate};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, instrument, warn};

use stockledger_core::{EntryId, ItemId, Page, PageRequest};
use stockledger_inventory::{
    DailySummary, MovementFilter, MovementKind, MovementLogEntry, NewLogEntry, parse_day,
};

use crate::error::{StoreError, StoreResult, map_sqlx_error};
use crate::row;

const TABLE: &str = "movement_logs";

const SELECT_ENTRIES: &str = r#"
    SELECT
        ml.id,
        ml.item_id,
        ml.item_name,
        ml.kind,
        ml.quantity_changed,
        ml.resulting_quantity,
        ml.provider_id,
        p.name AS provider_name,
        ml.destination_id,
        d.name AS destination_name,
        ml.unit_cost,
        ml.details,
        ml.actor,
        ml.timestamp
    FROM movement_logs ml
    LEFT JOIN providers p ON p.id = ml.provider_id
    LEFT JOIN destinations d ON d.id = ml.destination_id
"#;

/// Insert one entry on the caller's connection. Timestamped with local time.
pub async fn append(conn: &mut SqliteConnection, entry: NewLogEntry) -> StoreResult<EntryId> {
    let id = EntryId::new();
    let timestamp = Local::now().naive_local();

    sqlx::query(
        r#"
        INSERT INTO movement_logs (
            id,
            item_id,
            item_name,
            kind,
            quantity_changed,
            resulting_quantity,
            provider_id,
            destination_id,
            unit_cost,
            details,
            actor,
            timestamp
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
    )
    .bind(id.to_string())
    .bind(entry.item_id.to_string())
    .bind(&entry.item_name)
    .bind(entry.kind.label())
    .bind(entry.quantity_changed)
    .bind(entry.resulting_quantity)
    .bind(row::opt_id_text(entry.provider_id))
    .bind(row::opt_id_text(entry.destination_id))
    .bind(row::opt_decimal_text(entry.unit_cost))
    .bind(&entry.details)
    .bind(&entry.actor)
    .bind(row::format_timestamp(timestamp))
    .execute(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("append_log_entry", e))?;

    debug!(entry_id = %id, item_id = %entry.item_id, kind = %entry.kind, "ledger entry appended");
    Ok(id)
}

/// Whether any entry refers to `item_id`.
pub async fn has_entries(conn: &mut SqliteConnection, item_id: ItemId) -> StoreResult<bool> {
    let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM movement_logs WHERE item_id = ?1) AS present")
        .bind(item_id.to_string())
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("has_log_entries", e))?;
    Ok(row::int(TABLE, &row, "present")? != 0)
}

/// Calendar-day bounds that survived validation.
#[derive(Debug, Default, Clone, Copy)]
struct DayRange {
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
}

impl DayRange {
    /// Malformed days are dropped from the filter and logged.
    fn resolve(filter: &MovementFilter) -> Self {
        Self {
            from: resolve_day("date_from", filter.date_from.as_deref()),
            to: resolve_day("date_to", filter.date_to.as_deref()),
        }
    }
}

fn resolve_day(field: &'static str, raw: Option<&str>) -> Option<NaiveDate> {
    let raw = raw.map(str::trim).filter(|r| !r.is_empty())?;
    let day = parse_day(raw);
    if day.is_none() {
        warn!(field, value = raw, "ignoring malformed date filter; expected YYYY-MM-DD");
    }
    day
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &MovementFilter, days: DayRange) {
    let mut sep = " WHERE ";

    if let Some(item_id) = filter.item_id {
        qb.push(sep).push("ml.item_id = ").push_bind(item_id.to_string());
        sep = " AND ";
    }
    if let Some(kinds) = &filter.kinds {
        if kinds.is_empty() {
            qb.push(sep).push("0 = 1");
        } else {
            qb.push(sep).push("ml.kind IN (");
            let mut labels = qb.separated(", ");
            for kind in kinds {
                labels.push_bind(kind.label());
            }
            labels.push_unseparated(")");
        }
        sep = " AND ";
    }
    if let Some(provider_id) = filter.provider_id {
        qb.push(sep).push("ml.provider_id = ").push_bind(provider_id.to_string());
        sep = " AND ";
    }
    if let Some(destination_id) = filter.destination_id {
        qb.push(sep)
            .push("ml.destination_id = ")
            .push_bind(destination_id.to_string());
        sep = " AND ";
    }
    if let Some(from) = days.from {
        qb.push(sep)
            .push("date(ml.timestamp) >= ")
            .push_bind(from.format("%Y-%m-%d").to_string());
        sep = " AND ";
    }
    if let Some(to) = days.to {
        qb.push(sep)
            .push("date(ml.timestamp) <= ")
            .push_bind(to.format("%Y-%m-%d").to_string());
    }
}

/// Filtered entries, newest first.
///
/// Without a page request the whole filtered set is returned; callers that
/// export must bound the range themselves.
pub async fn query(
    conn: &mut SqliteConnection,
    filter: &MovementFilter,
    page: Option<PageRequest>,
) -> StoreResult<Page<MovementLogEntry>> {
    let days = DayRange::resolve(filter);

    let mut select = QueryBuilder::<Sqlite>::new(SELECT_ENTRIES);
    push_filters(&mut select, filter, days);
    select.push(" ORDER BY ml.timestamp DESC, ml.id DESC");

    let Some(request) = page else {
        let rows = select
            .build()
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("query_log_entries", e))?;
        let entries = rows.iter().map(entry_from_row).collect::<StoreResult<Vec<_>>>()?;
        return Ok(Page::unpaginated(entries));
    };

    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) AS total FROM movement_logs ml");
    push_filters(&mut count, filter, days);
    let total_row = count
        .build()
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("count_log_entries", e))?;
    let total = u64::try_from(row::int(TABLE, &total_row, "total")?).unwrap_or(0);

    select
        .push(" LIMIT ")
        .push_bind(i64::from(request.page_size()))
        .push(" OFFSET ")
        .push_bind(i64::try_from(request.offset()).unwrap_or(i64::MAX));
    let rows = select
        .build()
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("query_log_entries", e))?;
    let entries = rows.iter().map(entry_from_row).collect::<StoreResult<Vec<_>>>()?;

    Ok(Page::new(entries, total, request))
}

/// Count today's additions and removals.
///
/// Never fails: a query error yields zero counts with the error attached.
pub async fn daily_summary(conn: &mut SqliteConnection) -> DailySummary {
    let today = Local::now().date_naive().format("%Y-%m-%d").to_string();

    let result = sqlx::query(
        r#"
        SELECT
            COALESCE(SUM(kind = 'Addition'), 0) AS additions,
            COALESCE(SUM(kind = 'Removal'), 0) AS removals
        FROM movement_logs
        WHERE date(timestamp) = ?1
        "#,
    )
    .bind(&today)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("daily_summary", e))
    .and_then(|row| Ok((row::int(TABLE, &row, "additions")?, row::int(TABLE, &row, "removals")?)));

    match result {
        Ok((additions, removals)) => DailySummary {
            additions_today: u64::try_from(additions).unwrap_or(0),
            withdrawals_today: u64::try_from(removals).unwrap_or(0),
            error: None,
        },
        Err(err) => {
            warn!(error = %err, "daily summary unavailable");
            DailySummary::degraded(err.to_string())
        }
    }
}

fn entry_from_row(row: &SqliteRow) -> StoreResult<MovementLogEntry> {
    let kind_label = row::text(TABLE, row, "kind")?;
    let kind: MovementKind = kind_label
        .parse()
        .map_err(|e| StoreError::corrupt(TABLE, e))?;

    Ok(MovementLogEntry {
        id: row::id(TABLE, row, "id")?,
        item_id: row::id(TABLE, row, "item_id")?,
        item_name: row::text(TABLE, row, "item_name")?,
        kind,
        quantity_changed: row::opt_int(TABLE, row, "quantity_changed")?,
        resulting_quantity: row::opt_int(TABLE, row, "resulting_quantity")?,
        provider_id: row::opt_id(TABLE, row, "provider_id")?,
        provider_name: row::opt_text(TABLE, row, "provider_name")?,
        destination_id: row::opt_id(TABLE, row, "destination_id")?,
        destination_name: row::opt_text(TABLE, row, "destination_name")?,
        unit_cost: row::opt_decimal(TABLE, row, "unit_cost")?,
        details: row::opt_text(TABLE, row, "details")?,
        actor: row::opt_text(TABLE, row, "actor")?,
        timestamp: row::timestamp(TABLE, row, "timestamp")?,
    })
}

/// Read-side handle over the ledger for callers outside a transaction.
#[derive(Debug, Clone)]
pub struct MovementLedger {
    pool: SqlitePool,
}

impl MovementLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self), err)]
    pub async fn query(
        &self,
        filter: &MovementFilter,
        page: Option<PageRequest>,
    ) -> StoreResult<Page<MovementLogEntry>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))?;
        query(&mut conn, filter, page).await
    }

    /// All entries for one item, newest first.
    pub async fn history(&self, item_id: ItemId) -> StoreResult<Vec<MovementLogEntry>> {
        Ok(self.query(&MovementFilter::for_item(item_id), None).await?.entries)
    }

    pub async fn has_entries(&self, item_id: ItemId) -> StoreResult<bool> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))?;
        has_entries(&mut conn, item_id).await
    }

    #[instrument(skip(self))]
    pub async fn daily_summary(&self) -> DailySummary {
        match self.pool.acquire().await {
            Ok(mut conn) => daily_summary(&mut conn).await,
            Err(e) => {
                let err = map_sqlx_error("acquire", e);
                warn!(error = %err, "daily summary unavailable");
                DailySummary::degraded(err.to_string())
            }
        }
    }
}
