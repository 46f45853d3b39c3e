//! Category registry: a two-level tree with a capped number of roots.

use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{info, instrument};

use stockledger_core::{CategoryId, DomainError, Entity, ItemId, Page, PageRequest};
use stockledger_inventory::{
    Category, CategoryDeletion, CategoryScope, NewCategory, Placement, check_placement,
    normalize_name,
};

use crate::db::{self, finish};
use crate::error::{StoreError, StoreResult, is_unique_violation, map_sqlx_error};
use crate::row;

const TABLE: &str = "categories";

fn category_from_row(row: &SqliteRow) -> StoreResult<Category> {
    Ok(Category {
        id: row::id(TABLE, row, "id")?,
        name: row::text(TABLE, row, "name")?,
        parent_id: row::opt_id(TABLE, row, "parent_id")?,
    })
}

fn category_write_error(operation: &'static str, name: &str, err: sqlx::Error) -> StoreError {
    if is_unique_violation(&err) {
        return DomainError::name_in_use(Category::KIND, name).into();
    }
    map_sqlx_error(operation, err)
}

pub async fn fetch_category(
    conn: &mut SqliteConnection,
    category_id: CategoryId,
) -> StoreResult<Option<Category>> {
    let row = sqlx::query("SELECT id, name, parent_id FROM categories WHERE id = ?1")
        .bind(category_id.to_string())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("get_category", e))?;
    row.as_ref().map(category_from_row).transpose()
}

async fn require_category(
    conn: &mut SqliteConnection,
    category_id: CategoryId,
) -> StoreResult<Category> {
    fetch_category(conn, category_id)
        .await?
        .ok_or_else(|| DomainError::not_found(Category::KIND, category_id).into())
}

async fn count_roots(conn: &mut SqliteConnection) -> StoreResult<u64> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE parent_id IS NULL")
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("count_root_categories", e))?;
    Ok(u64::try_from(total).unwrap_or(0))
}

/// Run the shared placement rules against stored state.
async fn check_stored_placement(
    conn: &mut SqliteConnection,
    parent_id: Option<CategoryId>,
    existing: Option<&Category>,
) -> StoreResult<()> {
    match parent_id {
        Some(parent_id) => {
            let parent = require_category(conn, parent_id).await?;
            check_placement(Placement::Child { parent: &parent })?;
        }
        None => {
            let stored = count_roots(conn).await?;
            let is_new = existing.is_none();
            check_placement(Placement::Root {
                existing_roots: if is_new { stored } else { stored.saturating_sub(1) },
                is_new,
            })?;
        }
    }
    Ok(())
}

pub async fn add_category(conn: &mut SqliteConnection, cmd: NewCategory) -> StoreResult<Category> {
    let cmd = cmd.normalized()?;
    check_stored_placement(conn, cmd.parent_id, None).await?;

    let category = Category {
        id: CategoryId::new(),
        name: cmd.name,
        parent_id: cmd.parent_id,
    };
    sqlx::query("INSERT INTO categories (id, name, parent_id) VALUES (?1, ?2, ?3)")
        .bind(category.id.to_string())
        .bind(&category.name)
        .bind(row::opt_id_text(category.parent_id))
        .execute(&mut *conn)
        .await
        .map_err(|e| category_write_error("insert_category", &category.name, e))?;
    Ok(category)
}

/// Categories in `scope`, ordered by name.
pub async fn list_categories(
    conn: &mut SqliteConnection,
    scope: CategoryScope,
    page: PageRequest,
) -> StoreResult<Page<Category>> {
    fn push_scope(qb: &mut QueryBuilder<'_, Sqlite>, scope: CategoryScope) {
        match scope {
            CategoryScope::All => {}
            CategoryScope::Roots => {
                qb.push(" WHERE parent_id IS NULL");
            }
            CategoryScope::ChildrenOf(parent_id) => {
                qb.push(" WHERE parent_id = ").push_bind(parent_id.to_string());
            }
        }
    }

    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM categories");
    push_scope(&mut count, scope);
    let total: i64 = count
        .build_query_scalar()
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("count_categories", e))?;

    let mut select = QueryBuilder::<Sqlite>::new("SELECT id, name, parent_id FROM categories");
    push_scope(&mut select, scope);
    select
        .push(" ORDER BY name COLLATE NOCASE ASC, id ASC LIMIT ")
        .push_bind(i64::from(page.page_size()))
        .push(" OFFSET ")
        .push_bind(i64::try_from(page.offset()).unwrap_or(i64::MAX));
    let rows = select
        .build()
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("list_categories", e))?;
    let categories = rows
        .iter()
        .map(category_from_row)
        .collect::<StoreResult<Vec<_>>>()?;

    Ok(Page::new(categories, u64::try_from(total).unwrap_or(0), page))
}

/// Rename a category. Its position in the tree is re-validated.
pub async fn rename_category(
    conn: &mut SqliteConnection,
    category_id: CategoryId,
    name: &str,
) -> StoreResult<Category> {
    let name = normalize_name(Category::KIND, name)?;
    let current = require_category(conn, category_id).await?;
    check_stored_placement(conn, current.parent_id, Some(&current)).await?;

    sqlx::query("UPDATE categories SET name = ?1 WHERE id = ?2")
        .bind(&name)
        .bind(category_id.to_string())
        .execute(&mut *conn)
        .await
        .map_err(|e| category_write_error("rename_category", &name, e))?;

    Ok(Category { name, ..current })
}

/// In use while it files any active item or has children.
pub async fn category_in_use(
    conn: &mut SqliteConnection,
    category_id: CategoryId,
) -> StoreResult<bool> {
    let in_use: i64 = sqlx::query_scalar(
        r#"
        SELECT
            EXISTS (SELECT 1 FROM items WHERE sub_category_id = ?1 AND status = 'active')
            OR EXISTS (SELECT 1 FROM categories WHERE parent_id = ?1)
        "#,
    )
    .bind(category_id.to_string())
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("category_in_use", e))?;
    Ok(in_use != 0)
}

/// Delete an unused category, archiving the inactive items filed under it.
///
/// Archival writes no ledger entries.
pub async fn delete_category(
    conn: &mut SqliteConnection,
    category_id: CategoryId,
) -> StoreResult<CategoryDeletion> {
    require_category(conn, category_id).await?;
    if category_in_use(conn, category_id).await? {
        return Err(DomainError::in_use(Category::KIND, category_id).into());
    }

    let inactive: Vec<String> = sqlx::query_scalar(
        "SELECT id FROM items WHERE sub_category_id = ?1 AND status = 'inactive' ORDER BY id",
    )
    .bind(category_id.to_string())
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("list_inactive_items", e))?;
    let archived_items = inactive
        .iter()
        .map(|raw| raw.parse::<ItemId>().map_err(|e| StoreError::corrupt("items", e)))
        .collect::<StoreResult<Vec<_>>>()?;

    sqlx::query(
        r#"
        UPDATE items
        SET status = 'archived', sub_category_id = NULL
        WHERE sub_category_id = ?1 AND status = 'inactive'
        "#,
    )
    .bind(category_id.to_string())
    .execute(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("archive_items", e))?;

    sqlx::query("DELETE FROM categories WHERE id = ?1")
        .bind(category_id.to_string())
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("delete_category", e))?;

    Ok(CategoryDeletion {
        category_id,
        archived_items,
    })
}

#[derive(Debug, Clone)]
pub struct CategoryRegistry {
    pool: SqlitePool,
}

impl CategoryRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self), err)]
    pub async fn add(&self, cmd: NewCategory) -> StoreResult<Category> {
        let mut tx = db::begin(&self.pool).await?;
        let result = add_category(&mut tx, cmd).await;
        let category = finish(tx, "add_category", result).await?;
        info!(category_id = %category.id, name = %category.name, "category added");
        Ok(category)
    }

    pub async fn list(&self, scope: CategoryScope, page: PageRequest) -> StoreResult<Page<Category>> {
        let mut conn = self.acquire().await?;
        list_categories(&mut conn, scope, page).await
    }

    pub async fn get(&self, category_id: CategoryId) -> StoreResult<Option<Category>> {
        let mut conn = self.acquire().await?;
        fetch_category(&mut conn, category_id).await
    }

    #[instrument(skip(self), err)]
    pub async fn update(&self, category_id: CategoryId, name: &str) -> StoreResult<Category> {
        let mut tx = db::begin(&self.pool).await?;
        let result = rename_category(&mut tx, category_id, name).await;
        let category = finish(tx, "rename_category", result).await?;
        info!(category_id = %category.id, name = %category.name, "category renamed");
        Ok(category)
    }

    pub async fn is_in_use(&self, category_id: CategoryId) -> StoreResult<bool> {
        let mut conn = self.acquire().await?;
        category_in_use(&mut conn, category_id).await
    }

    #[instrument(skip(self), err)]
    pub async fn delete(&self, category_id: CategoryId) -> StoreResult<CategoryDeletion> {
        let mut tx = db::begin(&self.pool).await?;
        let result = delete_category(&mut tx, category_id).await;
        let deletion = finish(tx, "delete_category", result).await?;
        info!(
            category_id = %category_id,
            archived = deletion.archived_items.len(),
            "category deleted"
        );
        Ok(deletion)
    }

    async fn acquire(&self) -> StoreResult<sqlx::pool::PoolConnection<Sqlite>> {
        self.pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))
    }
}
