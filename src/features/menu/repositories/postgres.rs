use async_trait::async_trait;
use sqlx::{PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

use super::{MenuRepository, MenuWrite};
use crate::features::menu::error::{handle_db_error, MenuError, MenuResult};
use crate::features::menu::models::{MenuCategory, MenuItem, NewCategory, NewItem, Venue};
use crate::features::menu::ordering::next_order;

/// Postgres-backed menu storage.
///
/// Writers of one venue are serialized by a `FOR NO KEY UPDATE` lock on the
/// venue row, taken first in every write transaction. Under READ COMMITTED
/// each statement after the lock sees every batch committed before it.
///
/// Sibling order uniqueness is enforced by deferred constraints, so a batch
/// may pass through duplicate orders as long as the final state is clean.
pub struct PgMenuRepository {
    pool: PgPool,
}

impl PgMenuRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn execute(conn: &mut PgConnection, write: MenuWrite) -> MenuResult<()> {
        match write {
            MenuWrite::ExpectCategoryAt {
                id,
                parent_id,
                display_order,
            } => {
                let slot = sqlx::query_as::<_, (Option<Uuid>, i32)>(
                    "SELECT parent_id, display_order FROM menu_categories WHERE id = $1",
                )
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;

                if slot != Some((parent_id, display_order)) {
                    return Err(stale("Category", id));
                }
                Ok(())
            }

            MenuWrite::ExpectCategoryGroupEnd {
                venue_id,
                parent_id,
                max,
            } => {
                if category_group_max(&mut *conn, venue_id, parent_id).await? != max {
                    return Err(stale("Category group of venue", venue_id));
                }
                Ok(())
            }

            MenuWrite::ExpectCategoryCount { venue_id, count } => {
                let current = sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*) FROM menu_categories WHERE venue_id = $1",
                )
                .bind(venue_id)
                .fetch_one(&mut *conn)
                .await?;

                if current != count {
                    return Err(stale("Categories of venue", venue_id));
                }
                Ok(())
            }

            MenuWrite::ExpectItemAt {
                id,
                category_id,
                display_order,
            } => {
                let slot = sqlx::query_as::<_, (Uuid, i32)>(
                    "SELECT category_id, display_order FROM menu_items WHERE id = $1",
                )
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;

                if slot != Some((category_id, display_order)) {
                    return Err(stale("Item", id));
                }
                Ok(())
            }

            MenuWrite::ExpectItemGroupEnd { category_id, max } => {
                if item_group_max(&mut *conn, category_id).await? != max {
                    return Err(stale("Items of category", category_id));
                }
                Ok(())
            }

            MenuWrite::UpdateCategory { id, patch } => {
                let result = sqlx::query(
                    r#"
                    UPDATE menu_categories
                    SET name = COALESCE($2, name),
                        description = CASE WHEN $3 THEN $4 ELSE description END,
                        parent_id = CASE WHEN $5 THEN $6 ELSE parent_id END,
                        display_order = COALESCE($7, display_order),
                        updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .bind(patch.name)
                .bind(patch.description.is_some())
                .bind(patch.description.flatten())
                .bind(patch.parent_id.is_some())
                .bind(patch.parent_id.flatten())
                .bind(patch.display_order)
                .execute(&mut *conn)
                .await
                .map_err(handle_db_error)?;

                expect_row(result.rows_affected(), "Category", id)
            }

            MenuWrite::SetCategoryOrder {
                id,
                venue_id,
                display_order,
            } => {
                let result = sqlx::query(
                    r#"
                    UPDATE menu_categories
                    SET display_order = $3, updated_at = NOW()
                    WHERE id = $1 AND venue_id = $2
                    "#,
                )
                .bind(id)
                .bind(venue_id)
                .bind(display_order)
                .execute(&mut *conn)
                .await
                .map_err(handle_db_error)?;

                expect_row(result.rows_affected(), "Category", id)
            }

            MenuWrite::MoveChildCategories {
                from,
                to,
                order_offset,
            } => {
                sqlx::query(
                    r#"
                    UPDATE menu_categories
                    SET parent_id = $2,
                        display_order = display_order + COALESCE($3::INTEGER, 0),
                        updated_at = NOW()
                    WHERE parent_id = $1
                    "#,
                )
                .bind(from)
                .bind(to)
                .bind(order_offset)
                .execute(&mut *conn)
                .await
                .map_err(handle_db_error)?;

                Ok(())
            }

            MenuWrite::DeleteCategory { id } => {
                // Sub-categories and items go with it (ON DELETE CASCADE)
                let result = sqlx::query("DELETE FROM menu_categories WHERE id = $1")
                    .bind(id)
                    .execute(&mut *conn)
                    .await
                    .map_err(handle_db_error)?;

                expect_row(result.rows_affected(), "Category", id)
            }

            MenuWrite::CloseCategoryGap {
                venue_id,
                parent_id,
                removed_order,
            } => {
                sqlx::query(
                    r#"
                    UPDATE menu_categories
                    SET display_order = display_order - 1, updated_at = NOW()
                    WHERE venue_id = $1
                      AND parent_id IS NOT DISTINCT FROM $2
                      AND display_order > $3
                    "#,
                )
                .bind(venue_id)
                .bind(parent_id)
                .bind(removed_order)
                .execute(&mut *conn)
                .await
                .map_err(handle_db_error)?;

                Ok(())
            }

            MenuWrite::UpdateItem { id, patch } => {
                let result = sqlx::query(
                    r#"
                    UPDATE menu_items
                    SET name = COALESCE($2, name),
                        description = CASE WHEN $3 THEN $4 ELSE description END,
                        price = CASE WHEN $5 THEN $6 ELSE price END,
                        image_url = CASE WHEN $7 THEN $8 ELSE image_url END,
                        is_available = COALESCE($9, is_available),
                        category_id = COALESCE($10, category_id),
                        display_order = COALESCE($11, display_order),
                        updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .bind(patch.name)
                .bind(patch.description.is_some())
                .bind(patch.description.flatten())
                .bind(patch.price.is_some())
                .bind(patch.price.flatten())
                .bind(patch.image_url.is_some())
                .bind(patch.image_url.flatten())
                .bind(patch.is_available)
                .bind(patch.category_id)
                .bind(patch.display_order)
                .execute(&mut *conn)
                .await
                .map_err(handle_db_error)?;

                expect_row(result.rows_affected(), "Item", id)
            }

            MenuWrite::SetItemOrder {
                id,
                category_id,
                display_order,
            } => {
                let result = sqlx::query(
                    r#"
                    UPDATE menu_items
                    SET display_order = $3, updated_at = NOW()
                    WHERE id = $1 AND category_id = $2
                    "#,
                )
                .bind(id)
                .bind(category_id)
                .bind(display_order)
                .execute(&mut *conn)
                .await
                .map_err(handle_db_error)?;

                expect_row(result.rows_affected(), "Item", id)
            }

            MenuWrite::MoveItems {
                from,
                to,
                order_offset,
            } => {
                sqlx::query(
                    r#"
                    UPDATE menu_items
                    SET category_id = $2,
                        display_order = display_order + COALESCE($3::INTEGER, 0),
                        updated_at = NOW()
                    WHERE category_id = $1
                    "#,
                )
                .bind(from)
                .bind(to)
                .bind(order_offset)
                .execute(&mut *conn)
                .await
                .map_err(handle_db_error)?;

                Ok(())
            }

            MenuWrite::DeleteItem { id } => {
                let result = sqlx::query("DELETE FROM menu_items WHERE id = $1")
                    .bind(id)
                    .execute(&mut *conn)
                    .await
                    .map_err(handle_db_error)?;

                expect_row(result.rows_affected(), "Item", id)
            }

            MenuWrite::CloseItemGap {
                category_id,
                removed_order,
            } => {
                sqlx::query(
                    r#"
                    UPDATE menu_items
                    SET display_order = display_order - 1, updated_at = NOW()
                    WHERE category_id = $1 AND display_order > $2
                    "#,
                )
                .bind(category_id)
                .bind(removed_order)
                .execute(&mut *conn)
                .await
                .map_err(handle_db_error)?;

                Ok(())
            }
        }
    }
}

fn expect_row(rows_affected: u64, entity: &str, id: Uuid) -> MenuResult<()> {
    if rows_affected == 0 {
        return Err(MenuError::NotFound(format!("{} {} not found", entity, id)));
    }
    Ok(())
}

fn stale(entity: &str, id: Uuid) -> MenuError {
    tracing::debug!("{} {} changed since it was read", entity, id);
    MenuError::ConflictingOrder(format!("{} {} changed concurrently", entity, id))
}

/// Take the venue's write lock for the rest of the transaction
async fn lock_venue(conn: &mut PgConnection, venue_id: Uuid) -> MenuResult<()> {
    sqlx::query_scalar::<_, Uuid>("SELECT id FROM venues WHERE id = $1 FOR NO KEY UPDATE")
        .bind(venue_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| MenuError::not_found("Venue"))?;
    Ok(())
}

async fn category_group_max<'e>(
    executor: impl PgExecutor<'e>,
    venue_id: Uuid,
    parent_id: Option<Uuid>,
) -> MenuResult<Option<i32>> {
    let max = sqlx::query_scalar::<_, Option<i32>>(
        r#"
        SELECT MAX(display_order)
        FROM menu_categories
        WHERE venue_id = $1 AND parent_id IS NOT DISTINCT FROM $2
        "#,
    )
    .bind(venue_id)
    .bind(parent_id)
    .fetch_one(executor)
    .await?;

    Ok(max)
}

async fn item_group_max<'e>(
    executor: impl PgExecutor<'e>,
    category_id: Uuid,
) -> MenuResult<Option<i32>> {
    let max = sqlx::query_scalar::<_, Option<i32>>(
        "SELECT MAX(display_order) FROM menu_items WHERE category_id = $1",
    )
    .bind(category_id)
    .fetch_one(executor)
    .await?;

    Ok(max)
}

#[async_trait]
impl MenuRepository for PgMenuRepository {
    async fn find_venue(&self, id: Uuid) -> MenuResult<Option<Venue>> {
        let venue = sqlx::query_as::<_, Venue>(
            r#"
            SELECT id, name, manager_id, status, created_at, updated_at
            FROM venues
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(venue)
    }

    async fn find_category(&self, id: Uuid) -> MenuResult<Option<MenuCategory>> {
        let category = sqlx::query_as::<_, MenuCategory>(
            r#"
            SELECT id, venue_id, parent_id, name, description, display_order,
                   created_at, updated_at
            FROM menu_categories
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(category)
    }

    async fn list_categories(&self, venue_id: Uuid) -> MenuResult<Vec<MenuCategory>> {
        let categories = sqlx::query_as::<_, MenuCategory>(
            r#"
            SELECT id, venue_id, parent_id, name, description, display_order,
                   created_at, updated_at
            FROM menu_categories
            WHERE venue_id = $1
            ORDER BY display_order ASC, created_at ASC
            "#,
        )
        .bind(venue_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    async fn count_categories(&self, venue_id: Uuid) -> MenuResult<i64> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM menu_categories WHERE venue_id = $1")
                .bind(venue_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    async fn max_category_order(
        &self,
        venue_id: Uuid,
        parent_id: Option<Uuid>,
    ) -> MenuResult<Option<i32>> {
        category_group_max(&self.pool, venue_id, parent_id).await
    }

    async fn insert_category(&self, category: NewCategory) -> MenuResult<MenuCategory> {
        let mut tx = self.pool.begin().await?;
        lock_venue(&mut tx, category.venue_id).await?;

        let max = category_group_max(&mut *tx, category.venue_id, category.parent_id).await?;
        if next_order(max) != category.display_order {
            return Err(stale("Category group of venue", category.venue_id));
        }

        let category = sqlx::query_as::<_, MenuCategory>(
            r#"
            INSERT INTO menu_categories (id, venue_id, parent_id, name, description, display_order)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, venue_id, parent_id, name, description, display_order,
                      created_at, updated_at
            "#,
        )
        .bind(category.id)
        .bind(category.venue_id)
        .bind(category.parent_id)
        .bind(category.name)
        .bind(category.description)
        .bind(category.display_order)
        .fetch_one(&mut *tx)
        .await
        .map_err(handle_db_error)?;

        tx.commit().await.map_err(handle_db_error)?;
        Ok(category)
    }

    async fn find_item(&self, id: Uuid) -> MenuResult<Option<MenuItem>> {
        let item = sqlx::query_as::<_, MenuItem>(
            r#"
            SELECT id, category_id, name, description, price, image_url, is_available,
                   display_order, created_at, updated_at
            FROM menu_items
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }

    async fn list_items(&self, category_id: Uuid) -> MenuResult<Vec<MenuItem>> {
        let items = sqlx::query_as::<_, MenuItem>(
            r#"
            SELECT id, category_id, name, description, price, image_url, is_available,
                   display_order, created_at, updated_at
            FROM menu_items
            WHERE category_id = $1
            ORDER BY display_order ASC
            "#,
        )
        .bind(category_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    async fn list_venue_items(&self, venue_id: Uuid) -> MenuResult<Vec<MenuItem>> {
        let items = sqlx::query_as::<_, MenuItem>(
            r#"
            SELECT i.id, i.category_id, i.name, i.description, i.price, i.image_url,
                   i.is_available, i.display_order, i.created_at, i.updated_at
            FROM menu_items i
            JOIN menu_categories c ON c.id = i.category_id
            WHERE c.venue_id = $1
            ORDER BY i.display_order ASC, i.created_at ASC
            "#,
        )
        .bind(venue_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    async fn max_item_order(&self, category_id: Uuid) -> MenuResult<Option<i32>> {
        item_group_max(&self.pool, category_id).await
    }

    async fn insert_item(&self, item: NewItem) -> MenuResult<MenuItem> {
        let mut tx = self.pool.begin().await?;

        let venue_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT venue_id FROM menu_categories WHERE id = $1",
        )
        .bind(item.category_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| MenuError::not_found("Category"))?;
        lock_venue(&mut tx, venue_id).await?;

        if next_order(item_group_max(&mut *tx, item.category_id).await?) != item.display_order {
            return Err(stale("Items of category", item.category_id));
        }

        let item = sqlx::query_as::<_, MenuItem>(
            r#"
            INSERT INTO menu_items
                (id, category_id, name, description, price, image_url, is_available, display_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, category_id, name, description, price, image_url, is_available,
                      display_order, created_at, updated_at
            "#,
        )
        .bind(item.id)
        .bind(item.category_id)
        .bind(item.name)
        .bind(item.description)
        .bind(item.price)
        .bind(item.image_url)
        .bind(item.is_available)
        .bind(item.display_order)
        .fetch_one(&mut *tx)
        .await
        .map_err(handle_db_error)?;

        tx.commit().await.map_err(handle_db_error)?;
        Ok(item)
    }

    async fn apply(&self, venue_id: Uuid, batch: Vec<MenuWrite>) -> MenuResult<()> {
        let writes = batch.len();
        let mut tx = self.pool.begin().await?;
        lock_venue(&mut tx, venue_id).await?;

        for write in batch {
            // Dropping `tx` on error rolls the whole batch back
            Self::execute(&mut tx, write).await?;
        }

        // Deferred sibling-order constraints are checked here
        tx.commit().await.map_err(handle_db_error)?;

        tracing::debug!("Applied menu batch of {} writes to venue {}", writes, venue_id);
        Ok(())
    }
}
