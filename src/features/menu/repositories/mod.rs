//! Persistence seam for the menu.
//!
//! Reads are plain row lookups outside any transaction; every mutation after
//! an insert goes through [`MenuRepository::apply`], which runs a batch of
//! [`MenuWrite`]s atomically while holding the venue's write lock.
//!
//! Batches are computed from those earlier reads, so a batch states what it
//! relied on with `Expect*` steps. They are re-checked under the lock and a
//! stale batch fails with `ConflictingOrder` before it can leave a gap; the
//! service then reads again and rebuilds it.

mod postgres;

#[cfg(test)]
pub mod memory;

pub use postgres::PgMenuRepository;

use async_trait::async_trait;
use uuid::Uuid;

use crate::features::menu::error::MenuResult;
use crate::features::menu::models::{
    CategoryPatch, ItemPatch, MenuCategory, MenuItem, NewCategory, NewItem, Venue,
};

/// One step of an atomic batch.
///
/// Steps addressing a single row by id fail the whole batch with `NotFound`
/// when the row does not exist (in the given venue/category where one is named).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuWrite {
    /// The category still has this parent and position
    ExpectCategoryAt {
        id: Uuid,
        parent_id: Option<Uuid>,
        display_order: i32,
    },
    /// The highest position in the sibling group is still `max`
    ExpectCategoryGroupEnd {
        venue_id: Uuid,
        parent_id: Option<Uuid>,
        max: Option<i32>,
    },
    ExpectCategoryCount {
        venue_id: Uuid,
        count: i64,
    },
    ExpectItemAt {
        id: Uuid,
        category_id: Uuid,
        display_order: i32,
    },
    ExpectItemGroupEnd {
        category_id: Uuid,
        max: Option<i32>,
    },
    UpdateCategory {
        id: Uuid,
        patch: CategoryPatch,
    },
    SetCategoryOrder {
        id: Uuid,
        venue_id: Uuid,
        display_order: i32,
    },
    /// Re-parent every direct child of `from` under `to`, shifting their
    /// orders by `order_offset` when given
    MoveChildCategories {
        from: Uuid,
        to: Uuid,
        order_offset: Option<i32>,
    },
    /// Removes the category with its sub-categories and items
    DeleteCategory {
        id: Uuid,
    },
    /// Decrement every sibling ordered after `removed_order`
    CloseCategoryGap {
        venue_id: Uuid,
        parent_id: Option<Uuid>,
        removed_order: i32,
    },
    UpdateItem {
        id: Uuid,
        patch: ItemPatch,
    },
    SetItemOrder {
        id: Uuid,
        category_id: Uuid,
        display_order: i32,
    },
    MoveItems {
        from: Uuid,
        to: Uuid,
        order_offset: Option<i32>,
    },
    DeleteItem {
        id: Uuid,
    },
    CloseItemGap {
        category_id: Uuid,
        removed_order: i32,
    },
}

impl MenuWrite {
    /// Guard pinning `category` where it was read
    pub fn category_at(category: &MenuCategory) -> Self {
        MenuWrite::ExpectCategoryAt {
            id: category.id,
            parent_id: category.parent_id,
            display_order: category.display_order,
        }
    }

    pub fn item_at(item: &MenuItem) -> Self {
        MenuWrite::ExpectItemAt {
            id: item.id,
            category_id: item.category_id,
            display_order: item.display_order,
        }
    }
}

#[async_trait]
pub trait MenuRepository: Send + Sync {
    async fn find_venue(&self, id: Uuid) -> MenuResult<Option<Venue>>;

    async fn find_category(&self, id: Uuid) -> MenuResult<Option<MenuCategory>>;

    /// All categories of a venue, by `display_order`
    async fn list_categories(&self, venue_id: Uuid) -> MenuResult<Vec<MenuCategory>>;

    async fn count_categories(&self, venue_id: Uuid) -> MenuResult<i64>;

    async fn max_category_order(
        &self,
        venue_id: Uuid,
        parent_id: Option<Uuid>,
    ) -> MenuResult<Option<i32>>;

    /// Append to the sibling group; `ConflictingOrder` unless `display_order`
    /// is still the group's next free slot
    async fn insert_category(&self, category: NewCategory) -> MenuResult<MenuCategory>;

    async fn find_item(&self, id: Uuid) -> MenuResult<Option<MenuItem>>;

    /// Items of one category, by `display_order`
    async fn list_items(&self, category_id: Uuid) -> MenuResult<Vec<MenuItem>>;

    /// Items of every category of a venue, by `display_order`
    async fn list_venue_items(&self, venue_id: Uuid) -> MenuResult<Vec<MenuItem>>;

    async fn max_item_order(&self, category_id: Uuid) -> MenuResult<Option<i32>>;

    /// Append to the category, with the same slot check as `insert_category`
    async fn insert_item(&self, item: NewItem) -> MenuResult<MenuItem>;

    /// Run all writes of one venue in one transaction; nothing is persisted on error
    async fn apply(&self, venue_id: Uuid, batch: Vec<MenuWrite>) -> MenuResult<()>;
}
