//! Item store.
//!
//! Every mutation here writes the item row and appends exactly one ledger
//! entry on the same connection. The free functions expect to run inside a
//! transaction the caller owns; [`ItemStore`] opens one per call, commits on
//! success and rolls back on any error.

use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{info, instrument};

use stockledger_core::{CategoryId, Conflict, DomainError, Entity, ItemId, Page, PageRequest};
use stockledger_inventory::{
    Category, Destination, Item, ItemQuery, ItemStatus, ItemUpdate, MovementKind, NameClash,
    NewItem, NewLogEntry, Provider, StockAdjustment, Unit, UpdateOutcome, check_name_available,
    resulting_quantity,
};

use crate::categories::fetch_category;
use crate::db::{self, finish, row_exists};
use crate::error::{
    StoreError, StoreResult, db_message, is_foreign_key_violation, is_unique_violation,
    map_sqlx_error,
};
use crate::ledger;
use crate::row;

const TABLE: &str = "items";

const SELECT_ITEMS: &str = r#"
    SELECT
        i.id,
        i.name,
        i.current_quantity,
        i.unit_id,
        u.name AS unit_name,
        i.sub_category_id,
        c.name AS sub_category_name,
        i.provider_id,
        p.name AS provider_name,
        i.cost,
        i.barcode,
        i.status
    FROM items i
    JOIN units u ON u.id = i.unit_id
    LEFT JOIN categories c ON c.id = i.sub_category_id
    LEFT JOIN providers p ON p.id = i.provider_id
"#;

fn item_from_row(row: &SqliteRow) -> StoreResult<Item> {
    let status: ItemStatus = row::text(TABLE, row, "status")?
        .parse()
        .map_err(|e| StoreError::corrupt(TABLE, e))?;

    Ok(Item {
        id: row::id(TABLE, row, "id")?,
        name: row::text(TABLE, row, "name")?,
        current_quantity: row::int(TABLE, row, "current_quantity")?,
        unit_id: row::id(TABLE, row, "unit_id")?,
        unit_name: row::text(TABLE, row, "unit_name")?,
        sub_category_id: row::opt_id(TABLE, row, "sub_category_id")?,
        sub_category_name: row::opt_text(TABLE, row, "sub_category_name")?,
        provider_id: row::opt_id(TABLE, row, "provider_id")?,
        provider_name: row::opt_text(TABLE, row, "provider_name")?,
        cost: row::opt_decimal(TABLE, row, "cost")?,
        barcode: row::opt_text(TABLE, row, "barcode")?,
        status,
    })
}

/// Map a failed item write onto the conflict it represents.
fn item_write_error(
    operation: &'static str,
    name: &str,
    barcode: Option<&str>,
    err: sqlx::Error,
) -> StoreError {
    if is_unique_violation(&err) {
        let conflict = match barcode {
            Some(barcode) if db_message(&err).contains("barcode") => Conflict::BarcodeInUse {
                barcode: barcode.to_string(),
            },
            _ => Conflict::NameInUse {
                entity: Item::KIND,
                name: name.to_string(),
            },
        };
        return DomainError::Conflict(conflict).into();
    }
    if is_foreign_key_violation(&err) {
        return DomainError::invalid_argument(format!(
            "item '{name}' references a record that does not exist"
        ))
        .into();
    }
    map_sqlx_error(operation, err)
}

async fn ensure_exists<E: Entity>(
    conn: &mut SqliteConnection,
    table: &'static str,
    id: E::Id,
) -> StoreResult<()> {
    if row_exists(conn, table, &id.to_string()).await? {
        Ok(())
    } else {
        Err(DomainError::not_found(E::KIND, id).into())
    }
}

pub async fn get_item(conn: &mut SqliteConnection, item_id: ItemId) -> StoreResult<Option<Item>> {
    let sql = format!("{SELECT_ITEMS} WHERE i.id = ?1");
    let row = sqlx::query(&sql)
        .bind(item_id.to_string())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("get_item", e))?;
    row.as_ref().map(item_from_row).transpose()
}

async fn require_item(conn: &mut SqliteConnection, item_id: ItemId) -> StoreResult<Item> {
    get_item(conn, item_id)
        .await?
        .ok_or_else(|| DomainError::not_found(Item::KIND, item_id).into())
}

/// Any item with this name, ignoring case and status. Active items win.
pub async fn find_by_name(conn: &mut SqliteConnection, name: &str) -> StoreResult<Option<Item>> {
    let sql = format!(
        "{SELECT_ITEMS} WHERE i.name = ?1 COLLATE NOCASE ORDER BY (i.status = 'active') DESC, i.id DESC LIMIT 1"
    );
    let row = sqlx::query(&sql)
        .bind(name.trim())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("find_item_by_name", e))?;
    row.as_ref().map(item_from_row).transpose()
}

pub async fn find_active_by_barcode(
    conn: &mut SqliteConnection,
    barcode: &str,
) -> StoreResult<Option<Item>> {
    let sql = format!("{SELECT_ITEMS} WHERE i.barcode = ?1 AND i.status = 'active'");
    let row = sqlx::query(&sql)
        .bind(barcode.trim())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("find_item_by_barcode", e))?;
    row.as_ref().map(item_from_row).transpose()
}

/// Id of the item holding `barcode`, other than `except`.
async fn barcode_holder(
    conn: &mut SqliteConnection,
    barcode: &str,
    except: Option<ItemId>,
) -> StoreResult<Option<ItemId>> {
    let holder: Option<String> =
        sqlx::query_scalar("SELECT id FROM items WHERE barcode = ?1 AND id IS NOT ?2 LIMIT 1")
            .bind(barcode)
            .bind(row::opt_id_text(except))
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("barcode_holder", e))?;
    holder
        .map(|raw| raw.parse().map_err(|e| StoreError::corrupt(TABLE, e)))
        .transpose()
}

async fn ensure_barcode_free(
    conn: &mut SqliteConnection,
    barcode: Option<&str>,
    except: Option<ItemId>,
) -> StoreResult<()> {
    let Some(barcode) = barcode else {
        return Ok(());
    };
    if barcode_holder(conn, barcode, except).await?.is_some() {
        return Err(DomainError::from(Conflict::BarcodeInUse {
            barcode: barcode.to_string(),
        })
        .into());
    }
    Ok(())
}

/// Another active item already using `name`, if any.
async fn ensure_active_name_free(
    conn: &mut SqliteConnection,
    name: &str,
    except: ItemId,
) -> StoreResult<()> {
    let taken: Option<String> = sqlx::query_scalar(
        "SELECT id FROM items WHERE name = ?1 COLLATE NOCASE AND status = 'active' AND id != ?2 LIMIT 1",
    )
    .bind(name)
    .bind(except.to_string())
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("active_name_holder", e))?;

    match taken {
        Some(_) => Err(DomainError::name_in_use(Item::KIND, name).into()),
        None => Ok(()),
    }
}

fn clash_from(item: Item) -> NameClash {
    NameClash {
        item_id: item.id,
        name: item.name,
        status: item.status,
        category: item.sub_category_name,
    }
}

/// Create an item and log its opening stock.
pub async fn create_item(conn: &mut SqliteConnection, cmd: NewItem) -> StoreResult<Item> {
    let cmd = cmd.normalized()?;

    check_name_available(find_by_name(conn, &cmd.name).await?.map(clash_from))?;

    ensure_exists::<Unit>(conn, "units", cmd.unit_id).await?;
    ensure_exists::<Category>(conn, "categories", cmd.sub_category_id).await?;
    if let Some(provider_id) = cmd.provider_id {
        ensure_exists::<Provider>(conn, "providers", provider_id).await?;
    }
    ensure_barcode_free(conn, cmd.barcode.as_deref(), None).await?;

    let item_id = ItemId::new();
    sqlx::query(
        r#"
        INSERT INTO items (
            id,
            name,
            current_quantity,
            unit_id,
            sub_category_id,
            provider_id,
            cost,
            barcode,
            status
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'active')
        "#,
    )
    .bind(item_id.to_string())
    .bind(&cmd.name)
    .bind(cmd.quantity)
    .bind(cmd.unit_id.to_string())
    .bind(cmd.sub_category_id.to_string())
    .bind(row::opt_id_text(cmd.provider_id))
    .bind(row::opt_decimal_text(cmd.cost))
    .bind(&cmd.barcode)
    .execute(&mut *conn)
    .await
    .map_err(|e| item_write_error("insert_item", &cmd.name, cmd.barcode.as_deref(), e))?;

    ledger::append(
        conn,
        NewLogEntry::new(item_id, &cmd.name, MovementKind::Creation)
            .quantities(cmd.quantity, cmd.quantity)
            .provider(cmd.provider_id)
            .unit_cost(cmd.cost)
            .details("Item created.")
            .actor(cmd.actor),
    )
    .await?;

    require_item(conn, item_id).await
}

/// Add or remove stock.
pub async fn adjust_quantity(
    conn: &mut SqliteConnection,
    adjustment: StockAdjustment,
) -> StoreResult<Item> {
    let item = require_item(conn, adjustment.item_id).await?;
    let next = resulting_quantity(item.current_quantity, adjustment.delta, adjustment.kind)?;

    if let Some(provider_id) = adjustment.provider_id {
        ensure_exists::<Provider>(conn, "providers", provider_id).await?;
    }
    if let Some(destination_id) = adjustment.destination_id {
        ensure_exists::<Destination>(conn, "destinations", destination_id).await?;
    }

    sqlx::query("UPDATE items SET current_quantity = ?1 WHERE id = ?2")
        .bind(next)
        .bind(item.id.to_string())
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("update_quantity", e))?;

    ledger::append(
        conn,
        NewLogEntry::new(item.id, &item.name, adjustment.kind.movement_kind())
            .quantities(adjustment.kind.signed(adjustment.delta), next)
            .provider(adjustment.provider_id)
            .destination(adjustment.destination_id)
            .unit_cost(adjustment.cost)
            .actor(adjustment.actor),
    )
    .await?;

    require_item(conn, item.id).await
}

/// Edit name, unit, category and barcode.
///
/// A unit change on an item with history is held back until the caller
/// confirms it with `force_unit_change`.
pub async fn update_item(
    conn: &mut SqliteConnection,
    update: ItemUpdate,
) -> StoreResult<UpdateOutcome> {
    let update = update.normalized()?;
    let item = require_item(conn, update.item_id).await?;

    ensure_exists::<Unit>(conn, "units", update.unit_id).await?;
    if let Some(category_id) = update.sub_category_id {
        ensure_exists::<Category>(conn, "categories", category_id).await?;
    }
    ensure_barcode_free(conn, update.new_barcode(&item), Some(item.id)).await?;
    if item.is_active() {
        ensure_active_name_free(conn, &update.name, item.id).await?;
    }

    if update.changes_unit(&item)
        && !update.force_unit_change
        && ledger::has_entries(conn, item.id).await?
    {
        return Ok(UpdateOutcome::ConfirmationRequired {
            reason: UpdateOutcome::UNIT_CHANGE_REASON.to_string(),
        });
    }

    sqlx::query(
        "UPDATE items SET name = ?1, unit_id = ?2, sub_category_id = ?3, barcode = ?4 WHERE id = ?5",
    )
    .bind(&update.name)
    .bind(update.unit_id.to_string())
    .bind(row::opt_id_text(update.sub_category_id))
    .bind(&update.barcode)
    .bind(item.id.to_string())
    .execute(&mut *conn)
    .await
    .map_err(|e| item_write_error("update_item", &update.name, update.barcode.as_deref(), e))?;

    ledger::append(
        conn,
        NewLogEntry::new(item.id, &update.name, MovementKind::Update)
            .details(update.describe_changes(&item))
            .actor(update.actor.clone()),
    )
    .await?;

    Ok(UpdateOutcome::Updated(require_item(conn, item.id).await?))
}

/// Flip an item between active and inactive.
///
/// Setting the status it already has writes nothing.
pub async fn set_status(
    conn: &mut SqliteConnection,
    item_id: ItemId,
    status: ItemStatus,
    actor: Option<String>,
) -> StoreResult<Item> {
    let status = status.ensure_settable()?;
    let item = require_item(conn, item_id).await?;

    if item.status == status {
        return Ok(item);
    }
    if item.status == ItemStatus::Archived {
        return Err(DomainError::invalid_state(format!(
            "item {item_id} is archived; restore it into a category instead"
        ))
        .into());
    }
    if status == ItemStatus::Active {
        ensure_active_name_free(conn, &item.name, item.id).await?;
    }

    sqlx::query("UPDATE items SET status = ?1 WHERE id = ?2")
        .bind(status.as_str())
        .bind(item.id.to_string())
        .execute(&mut *conn)
        .await
        .map_err(|e| item_write_error("update_status", &item.name, None, e))?;

    ledger::append(
        conn,
        NewLogEntry::new(item.id, &item.name, MovementKind::StatusChange)
            .details(format!("Status changed from '{}' to '{}'.", item.status, status))
            .actor(actor),
    )
    .await?;

    require_item(conn, item.id).await
}

/// Reactivate an item under a category. Already-active items are re-logged.
pub async fn restore(
    conn: &mut SqliteConnection,
    item_id: ItemId,
    sub_category_id: CategoryId,
    actor: Option<String>,
) -> StoreResult<Item> {
    let item = require_item(conn, item_id).await?;
    let category = fetch_category(conn, sub_category_id)
        .await?
        .ok_or_else(|| DomainError::not_found(Category::KIND, sub_category_id))?;
    ensure_active_name_free(conn, &item.name, item.id).await?;

    sqlx::query("UPDATE items SET status = 'active', sub_category_id = ?1 WHERE id = ?2")
        .bind(category.id.to_string())
        .bind(item.id.to_string())
        .execute(&mut *conn)
        .await
        .map_err(|e| item_write_error("restore_item", &item.name, None, e))?;

    ledger::append(
        conn,
        NewLogEntry::new(item.id, &item.name, MovementKind::Restored)
            .details(format!("Item restored to category '{}'.", category.name))
            .actor(actor),
    )
    .await?;

    require_item(conn, item.id).await
}

fn push_item_filters(qb: &mut QueryBuilder<'_, Sqlite>, query: &ItemQuery) {
    qb.push(" WHERE i.status = 'active'");
    if let Some(term) = query.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        let pattern = format!("%{term}%");
        qb.push(" AND (i.name LIKE ")
            .push_bind(pattern.clone())
            .push(" OR i.id LIKE ")
            .push_bind(pattern.clone())
            .push(" OR i.barcode LIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(category_id) = query.sub_category_id {
        qb.push(" AND i.sub_category_id = ")
            .push_bind(category_id.to_string());
    }
}

/// Active items matching `query`, newest first.
pub async fn list_items(
    conn: &mut SqliteConnection,
    query: &ItemQuery,
    page: PageRequest,
) -> StoreResult<Page<Item>> {
    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM items i");
    push_item_filters(&mut count, query);
    let total: i64 = count
        .build_query_scalar()
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("count_items", e))?;

    let mut select = QueryBuilder::<Sqlite>::new(SELECT_ITEMS);
    push_item_filters(&mut select, query);
    select
        .push(" ORDER BY i.id DESC LIMIT ")
        .push_bind(i64::from(page.page_size()))
        .push(" OFFSET ")
        .push_bind(i64::try_from(page.offset()).unwrap_or(i64::MAX));
    let rows = select
        .build()
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("list_items", e))?;
    let items = rows.iter().map(item_from_row).collect::<StoreResult<Vec<_>>>()?;

    Ok(Page::new(items, u64::try_from(total).unwrap_or(0), page))
}

/// Pool-backed item store: one transaction per call.
#[derive(Debug, Clone)]
pub struct ItemStore {
    pool: SqlitePool,
}

impl ItemStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, cmd), fields(name = %cmd.name, quantity = cmd.quantity), err)]
    pub async fn create_item(&self, cmd: NewItem) -> StoreResult<Item> {
        let mut tx = db::begin(&self.pool).await?;
        let result = create_item(&mut tx, cmd).await;
        let item = finish(tx, "create_item", result).await?;
        info!(item_id = %item.id, name = %item.name, "item created");
        Ok(item)
    }

    #[instrument(
        skip(self, adjustment),
        fields(item_id = %adjustment.item_id, delta = adjustment.delta, kind = ?adjustment.kind),
        err
    )]
    pub async fn adjust_quantity(&self, adjustment: StockAdjustment) -> StoreResult<Item> {
        let mut tx = db::begin(&self.pool).await?;
        let result = adjust_quantity(&mut tx, adjustment).await;
        let item = finish(tx, "adjust_quantity", result).await?;
        info!(item_id = %item.id, quantity = item.current_quantity, "stock adjusted");
        Ok(item)
    }

    #[instrument(skip(self, update), fields(item_id = %update.item_id), err)]
    pub async fn update_item(&self, update: ItemUpdate) -> StoreResult<UpdateOutcome> {
        let mut tx = db::begin(&self.pool).await?;
        let result = update_item(&mut tx, update).await;
        let outcome = finish(tx, "update_item", result).await?;
        match &outcome {
            UpdateOutcome::Updated(item) => info!(item_id = %item.id, "item updated"),
            UpdateOutcome::ConfirmationRequired { .. } => {
                info!("item update held back pending unit change confirmation")
            }
        }
        Ok(outcome)
    }

    #[instrument(skip(self, actor), err)]
    pub async fn set_status(
        &self,
        item_id: ItemId,
        status: ItemStatus,
        actor: Option<String>,
    ) -> StoreResult<Item> {
        let mut tx = db::begin(&self.pool).await?;
        let result = set_status(&mut tx, item_id, status, actor).await;
        let item = finish(tx, "set_status", result).await?;
        info!(item_id = %item.id, status = %item.status, "item status set");
        Ok(item)
    }

    #[instrument(skip(self, actor), err)]
    pub async fn restore(
        &self,
        item_id: ItemId,
        sub_category_id: CategoryId,
        actor: Option<String>,
    ) -> StoreResult<Item> {
        let mut tx = db::begin(&self.pool).await?;
        let result = restore(&mut tx, item_id, sub_category_id, actor).await;
        let item = finish(tx, "restore_item", result).await?;
        info!(item_id = %item.id, "item restored");
        Ok(item)
    }

    pub async fn get_item(&self, item_id: ItemId) -> StoreResult<Option<Item>> {
        let mut conn = self.acquire().await?;
        get_item(&mut conn, item_id).await
    }

    pub async fn find_by_name(&self, name: &str) -> StoreResult<Option<Item>> {
        let mut conn = self.acquire().await?;
        find_by_name(&mut conn, name).await
    }

    pub async fn find_active_by_barcode(&self, barcode: &str) -> StoreResult<Option<Item>> {
        let mut conn = self.acquire().await?;
        find_active_by_barcode(&mut conn, barcode).await
    }

    pub async fn list_items(&self, query: &ItemQuery, page: PageRequest) -> StoreResult<Page<Item>> {
        let mut conn = self.acquire().await?;
        list_items(&mut conn, query, page).await
    }

    async fn acquire(&self) -> StoreResult<sqlx::pool::PoolConnection<Sqlite>> {
        self.pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))
    }
}
