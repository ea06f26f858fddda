//! In-memory `MenuRepository` for service and router tests.
//!
//! Mirrors the Postgres schema: cascading deletes, foreign keys and the
//! deferred sibling-order uniqueness checked once per batch. One mutex stands
//! in for the venue write lock.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{MenuRepository, MenuWrite};
use crate::features::menu::error::{MenuError, MenuResult};
use crate::features::menu::models::venue::VenueStatus;
use crate::features::menu::models::{MenuCategory, MenuItem, NewCategory, NewItem, Venue};
use crate::features::menu::ordering::next_order;
use crate::features::menu::tree::descendant_ids;

const CATEGORY_ORDER_KEY: &str = "menu_categories_sibling_order_key";
const ITEM_ORDER_KEY: &str = "menu_items_sibling_order_key";

#[derive(Debug, Clone, Default)]
struct MenuState {
    venues: HashMap<Uuid, Venue>,
    categories: HashMap<Uuid, MenuCategory>,
    items: HashMap<Uuid, MenuItem>,
}

#[derive(Default)]
pub struct InMemoryMenuRepository {
    state: Mutex<MenuState>,
    insert_conflicts: AtomicU32,
    /// Batch of another writer that commits right before the next `apply`
    interleaved: Mutex<Option<(Uuid, Vec<MenuWrite>)>>,
}

impl InMemoryMenuRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_venue(&self, manager_id: &str, status: VenueStatus) -> Venue {
        let now = Utc::now();
        let venue = Venue {
            id: Uuid::new_v4(),
            name: format!("Venue of {}", manager_id),
            manager_id: manager_id.to_string(),
            status,
            created_at: now,
            updated_at: now,
        };
        self.state
            .lock()
            .await
            .venues
            .insert(venue.id, venue.clone());
        venue
    }

    /// Make the next `count` inserts fail as if a concurrent writer took the slot
    pub fn fail_next_inserts(&self, count: u32) {
        self.insert_conflicts.store(count, Ordering::SeqCst);
    }

    /// Commit `batch` just before the next `apply`, after the caller's reads
    pub async fn interleave_next_apply(&self, venue_id: Uuid, batch: Vec<MenuWrite>) {
        *self.interleaved.lock().await = Some((venue_id, batch));
    }

    fn take_injected_conflict(&self, key: &str) -> MenuResult<()> {
        let pending = self
            .insert_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match pending {
            Ok(_) => Err(MenuError::ConflictingOrder(key.to_string())),
            Err(_) => Ok(()),
        }
    }
}

fn missing(entity: &str, id: Uuid) -> MenuError {
    MenuError::NotFound(format!("{} {} not found", entity, id))
}

fn dangling_reference() -> MenuError {
    MenuError::NotFound("Referenced record does not exist".to_string())
}

fn stale(entity: &str, id: Uuid) -> MenuError {
    MenuError::ConflictingOrder(format!("{} {} changed concurrently", entity, id))
}

fn sorted_by_order<T>(mut rows: Vec<T>, key: impl Fn(&T) -> (i32, chrono::DateTime<Utc>)) -> Vec<T> {
    rows.sort_by_key(|row| key(row));
    rows
}

impl MenuState {
    fn category_group_max(&self, venue_id: Uuid, parent_id: Option<Uuid>) -> Option<i32> {
        self.categories
            .values()
            .filter(|c| c.venue_id == venue_id && c.parent_id == parent_id)
            .map(|c| c.display_order)
            .max()
    }

    fn item_group_max(&self, category_id: Uuid) -> Option<i32> {
        self.items
            .values()
            .filter(|i| i.category_id == category_id)
            .map(|i| i.display_order)
            .max()
    }

    /// Run a batch against a copy and swap it in only if everything holds
    fn commit(&mut self, venue_id: Uuid, batch: Vec<MenuWrite>) -> MenuResult<()> {
        if !self.venues.contains_key(&venue_id) {
            return Err(MenuError::not_found("Venue"));
        }

        let mut next = self.clone();
        for write in batch {
            next.apply(write)?;
        }
        next.check_constraints()?;
        *self = next;
        Ok(())
    }

    fn apply(&mut self, write: MenuWrite) -> MenuResult<()> {
        let now = Utc::now();
        match write {
            MenuWrite::ExpectCategoryAt {
                id,
                parent_id,
                display_order,
            } => {
                let slot = self
                    .categories
                    .get(&id)
                    .map(|c| (c.parent_id, c.display_order));
                if slot != Some((parent_id, display_order)) {
                    return Err(stale("Category", id));
                }
            }
            MenuWrite::ExpectCategoryGroupEnd {
                venue_id,
                parent_id,
                max,
            } => {
                if self.category_group_max(venue_id, parent_id) != max {
                    return Err(stale("Category group of venue", venue_id));
                }
            }
            MenuWrite::ExpectCategoryCount { venue_id, count } => {
                let current = self
                    .categories
                    .values()
                    .filter(|c| c.venue_id == venue_id)
                    .count() as i64;
                if current != count {
                    return Err(stale("Categories of venue", venue_id));
                }
            }
            MenuWrite::ExpectItemAt {
                id,
                category_id,
                display_order,
            } => {
                let slot = self.items.get(&id).map(|i| (i.category_id, i.display_order));
                if slot != Some((category_id, display_order)) {
                    return Err(stale("Item", id));
                }
            }
            MenuWrite::ExpectItemGroupEnd { category_id, max } => {
                if self.item_group_max(category_id) != max {
                    return Err(stale("Items of category", category_id));
                }
            }
            MenuWrite::UpdateCategory { id, patch } => {
                let category = self
                    .categories
                    .get_mut(&id)
                    .ok_or_else(|| missing("Category", id))?;
                if let Some(name) = patch.name {
                    category.name = name;
                }
                if let Some(description) = patch.description {
                    category.description = description;
                }
                if let Some(parent_id) = patch.parent_id {
                    category.parent_id = parent_id;
                }
                if let Some(display_order) = patch.display_order {
                    category.display_order = display_order;
                }
                category.updated_at = now;
            }
            MenuWrite::SetCategoryOrder {
                id,
                venue_id,
                display_order,
            } => {
                let category = self
                    .categories
                    .get_mut(&id)
                    .filter(|c| c.venue_id == venue_id)
                    .ok_or_else(|| missing("Category", id))?;
                category.display_order = display_order;
                category.updated_at = now;
            }
            MenuWrite::MoveChildCategories {
                from,
                to,
                order_offset,
            } => {
                for category in self.categories.values_mut() {
                    if category.parent_id == Some(from) {
                        category.parent_id = Some(to);
                        category.display_order += order_offset.unwrap_or(0);
                        category.updated_at = now;
                    }
                }
            }
            MenuWrite::DeleteCategory { id } => {
                if !self.categories.contains_key(&id) {
                    return Err(missing("Category", id));
                }
                let all: Vec<MenuCategory> = self.categories.values().cloned().collect();
                let mut doomed = descendant_ids(&all, id);
                doomed.insert(id);
                self.categories.retain(|category_id, _| !doomed.contains(category_id));
                self.items.retain(|_, item| !doomed.contains(&item.category_id));
            }
            MenuWrite::CloseCategoryGap {
                venue_id,
                parent_id,
                removed_order,
            } => {
                for category in self.categories.values_mut() {
                    if category.venue_id == venue_id
                        && category.parent_id == parent_id
                        && category.display_order > removed_order
                    {
                        category.display_order -= 1;
                        category.updated_at = now;
                    }
                }
            }
            MenuWrite::UpdateItem { id, patch } => {
                let item = self.items.get_mut(&id).ok_or_else(|| missing("Item", id))?;
                if let Some(name) = patch.name {
                    item.name = name;
                }
                if let Some(description) = patch.description {
                    item.description = description;
                }
                if let Some(price) = patch.price {
                    item.price = price;
                }
                if let Some(image_url) = patch.image_url {
                    item.image_url = image_url;
                }
                if let Some(is_available) = patch.is_available {
                    item.is_available = is_available;
                }
                if let Some(category_id) = patch.category_id {
                    item.category_id = category_id;
                }
                if let Some(display_order) = patch.display_order {
                    item.display_order = display_order;
                }
                item.updated_at = now;
            }
            MenuWrite::SetItemOrder {
                id,
                category_id,
                display_order,
            } => {
                let item = self
                    .items
                    .get_mut(&id)
                    .filter(|i| i.category_id == category_id)
                    .ok_or_else(|| missing("Item", id))?;
                item.display_order = display_order;
                item.updated_at = now;
            }
            MenuWrite::MoveItems {
                from,
                to,
                order_offset,
            } => {
                for item in self.items.values_mut() {
                    if item.category_id == from {
                        item.category_id = to;
                        item.display_order += order_offset.unwrap_or(0);
                        item.updated_at = now;
                    }
                }
            }
            MenuWrite::DeleteItem { id } => {
                self.items.remove(&id).ok_or_else(|| missing("Item", id))?;
            }
            MenuWrite::CloseItemGap {
                category_id,
                removed_order,
            } => {
                for item in self.items.values_mut() {
                    if item.category_id == category_id && item.display_order > removed_order {
                        item.display_order -= 1;
                        item.updated_at = now;
                    }
                }
            }
        }
        Ok(())
    }

    /// What Postgres checks at commit time
    fn check_constraints(&self) -> MenuResult<()> {
        let mut category_slots = HashSet::new();
        for category in self.categories.values() {
            if !self.venues.contains_key(&category.venue_id) {
                return Err(dangling_reference());
            }
            if let Some(parent_id) = category.parent_id {
                if !self.categories.contains_key(&parent_id) {
                    return Err(dangling_reference());
                }
            }
            let slot = (category.venue_id, category.parent_id, category.display_order);
            if !category_slots.insert(slot) {
                return Err(MenuError::ConflictingOrder(CATEGORY_ORDER_KEY.to_string()));
            }
        }

        let mut item_slots = HashSet::new();
        for item in self.items.values() {
            if !self.categories.contains_key(&item.category_id) {
                return Err(dangling_reference());
            }
            if !item_slots.insert((item.category_id, item.display_order)) {
                return Err(MenuError::ConflictingOrder(ITEM_ORDER_KEY.to_string()));
            }
        }

        Ok(())
    }
}

#[async_trait]
impl MenuRepository for InMemoryMenuRepository {
    async fn find_venue(&self, id: Uuid) -> MenuResult<Option<Venue>> {
        Ok(self.state.lock().await.venues.get(&id).cloned())
    }

    async fn find_category(&self, id: Uuid) -> MenuResult<Option<MenuCategory>> {
        Ok(self.state.lock().await.categories.get(&id).cloned())
    }

    async fn list_categories(&self, venue_id: Uuid) -> MenuResult<Vec<MenuCategory>> {
        let state = self.state.lock().await;
        let categories = state
            .categories
            .values()
            .filter(|c| c.venue_id == venue_id)
            .cloned()
            .collect();
        Ok(sorted_by_order(categories, |c| (c.display_order, c.created_at)))
    }

    async fn count_categories(&self, venue_id: Uuid) -> MenuResult<i64> {
        let state = self.state.lock().await;
        let count = state
            .categories
            .values()
            .filter(|c| c.venue_id == venue_id)
            .count();
        Ok(count as i64)
    }

    async fn max_category_order(
        &self,
        venue_id: Uuid,
        parent_id: Option<Uuid>,
    ) -> MenuResult<Option<i32>> {
        Ok(self.state.lock().await.category_group_max(venue_id, parent_id))
    }

    async fn insert_category(&self, category: NewCategory) -> MenuResult<MenuCategory> {
        self.take_injected_conflict(CATEGORY_ORDER_KEY)?;

        let mut state = self.state.lock().await;
        if !state.venues.contains_key(&category.venue_id) {
            return Err(MenuError::not_found("Venue"));
        }
        let max = state.category_group_max(category.venue_id, category.parent_id);
        if next_order(max) != category.display_order {
            return Err(stale("Category group of venue", category.venue_id));
        }

        let now = Utc::now();
        let category = MenuCategory {
            id: category.id,
            venue_id: category.venue_id,
            parent_id: category.parent_id,
            name: category.name,
            description: category.description,
            display_order: category.display_order,
            created_at: now,
            updated_at: now,
        };

        let mut next = state.clone();
        next.categories.insert(category.id, category.clone());
        next.check_constraints()?;
        *state = next;

        Ok(category)
    }

    async fn find_item(&self, id: Uuid) -> MenuResult<Option<MenuItem>> {
        Ok(self.state.lock().await.items.get(&id).cloned())
    }

    async fn list_items(&self, category_id: Uuid) -> MenuResult<Vec<MenuItem>> {
        let state = self.state.lock().await;
        let items = state
            .items
            .values()
            .filter(|i| i.category_id == category_id)
            .cloned()
            .collect();
        Ok(sorted_by_order(items, |i| (i.display_order, i.created_at)))
    }

    async fn list_venue_items(&self, venue_id: Uuid) -> MenuResult<Vec<MenuItem>> {
        let state = self.state.lock().await;
        let items = state
            .items
            .values()
            .filter(|i| {
                state
                    .categories
                    .get(&i.category_id)
                    .is_some_and(|c| c.venue_id == venue_id)
            })
            .cloned()
            .collect();
        Ok(sorted_by_order(items, |i| (i.display_order, i.created_at)))
    }

    async fn max_item_order(&self, category_id: Uuid) -> MenuResult<Option<i32>> {
        Ok(self.state.lock().await.item_group_max(category_id))
    }

    async fn insert_item(&self, item: NewItem) -> MenuResult<MenuItem> {
        self.take_injected_conflict(ITEM_ORDER_KEY)?;

        let mut state = self.state.lock().await;
        if !state.categories.contains_key(&item.category_id) {
            return Err(MenuError::not_found("Category"));
        }
        if next_order(state.item_group_max(item.category_id)) != item.display_order {
            return Err(stale("Items of category", item.category_id));
        }

        let now = Utc::now();
        let item = MenuItem {
            id: item.id,
            category_id: item.category_id,
            name: item.name,
            description: item.description,
            price: item.price,
            image_url: item.image_url,
            is_available: item.is_available,
            display_order: item.display_order,
            created_at: now,
            updated_at: now,
        };

        let mut next = state.clone();
        next.items.insert(item.id, item.clone());
        next.check_constraints()?;
        *state = next;

        Ok(item)
    }

    async fn apply(&self, venue_id: Uuid, batch: Vec<MenuWrite>) -> MenuResult<()> {
        let interleaved = self.interleaved.lock().await.take();
        let mut state = self.state.lock().await;

        if let Some((other_venue, other_batch)) = interleaved {
            state.commit(other_venue, other_batch)?;
        }

        state.commit(venue_id, batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_category(venue_id: Uuid, display_order: i32) -> NewCategory {
        NewCategory {
            id: Uuid::new_v4(),
            venue_id,
            parent_id: None,
            name: "Mains".to_string(),
            description: None,
            display_order,
        }
    }

    async fn root_orders(repo: &InMemoryMenuRepository, venue_id: Uuid) -> Vec<(Uuid, i32)> {
        repo.list_categories(venue_id)
            .await
            .unwrap()
            .into_iter()
            .filter(|c| c.parent_id.is_none())
            .map(|c| (c.id, c.display_order))
            .collect()
    }

    /// Delete batch as the service builds it from an earlier read of `category`
    fn delete_batch(category: &MenuCategory) -> Vec<MenuWrite> {
        vec![
            MenuWrite::category_at(category),
            MenuWrite::DeleteCategory { id: category.id },
            MenuWrite::CloseCategoryGap {
                venue_id: category.venue_id,
                parent_id: category.parent_id,
                removed_order: category.display_order,
            },
        ]
    }

    #[tokio::test]
    async fn test_duplicate_order_is_rejected_at_commit() {
        let repo = InMemoryMenuRepository::new();
        let venue = repo.add_venue("manager-1", VenueStatus::Active).await;
        let first = repo.insert_category(new_category(venue.id, 0)).await.unwrap();

        let duplicate = repo.insert_category(new_category(venue.id, 0)).await;
        assert!(matches!(duplicate, Err(MenuError::ConflictingOrder(_))));

        // a swap passes through a duplicate but ends clean
        let second = repo.insert_category(new_category(venue.id, 1)).await.unwrap();
        repo.apply(
            venue.id,
            vec![
                MenuWrite::SetCategoryOrder {
                    id: second.id,
                    venue_id: venue.id,
                    display_order: 0,
                },
                MenuWrite::SetCategoryOrder {
                    id: first.id,
                    venue_id: venue.id,
                    display_order: 1,
                },
            ],
        )
        .await
        .unwrap();

        let orders: Vec<Uuid> = repo
            .list_categories(venue.id)
            .await
            .unwrap()
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(orders, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn test_insert_must_take_the_next_slot() {
        let repo = InMemoryMenuRepository::new();
        let venue = repo.add_venue("manager-1", VenueStatus::Active).await;
        repo.insert_category(new_category(venue.id, 0)).await.unwrap();

        // a slot read before someone else appended, or before a delete closed a gap
        let ahead = repo.insert_category(new_category(venue.id, 2)).await;
        assert!(matches!(ahead, Err(MenuError::ConflictingOrder(_))));
        assert_eq!(repo.count_categories(venue.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_batch_changes_nothing() {
        let repo = InMemoryMenuRepository::new();
        let venue = repo.add_venue("manager-1", VenueStatus::Active).await;
        let category = repo.insert_category(new_category(venue.id, 0)).await.unwrap();

        let result = repo
            .apply(
                venue.id,
                vec![
                    MenuWrite::SetCategoryOrder {
                        id: category.id,
                        venue_id: venue.id,
                        display_order: 5,
                    },
                    MenuWrite::DeleteItem { id: Uuid::new_v4() },
                ],
            )
            .await;

        assert!(matches!(result, Err(MenuError::NotFound(_))));
        let stored = repo.find_category(category.id).await.unwrap().unwrap();
        assert_eq!(stored.display_order, 0);

        let unknown_venue = repo.apply(Uuid::new_v4(), vec![]).await;
        assert!(matches!(unknown_venue, Err(MenuError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_category_cascades() {
        let repo = InMemoryMenuRepository::new();
        let venue = repo.add_venue("manager-1", VenueStatus::Active).await;
        let parent = repo.insert_category(new_category(venue.id, 0)).await.unwrap();
        let child = repo
            .insert_category(NewCategory {
                parent_id: Some(parent.id),
                ..new_category(venue.id, 0)
            })
            .await
            .unwrap();
        let item = repo
            .insert_item(NewItem {
                id: Uuid::new_v4(),
                category_id: child.id,
                name: "Tea".to_string(),
                description: None,
                price: None,
                image_url: None,
                is_available: true,
                display_order: 0,
            })
            .await
            .unwrap();

        repo.apply(venue.id, vec![MenuWrite::DeleteCategory { id: parent.id }])
            .await
            .unwrap();

        assert_eq!(repo.count_categories(venue.id).await.unwrap(), 0);
        assert!(repo.find_item(item.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_batches_from_the_same_read_cannot_leave_a_gap() {
        let repo = InMemoryMenuRepository::new();
        let venue = repo.add_venue("manager-1", VenueStatus::Active).await;
        let mut rows = Vec::new();
        for order in 0..4 {
            rows.push(repo.insert_category(new_category(venue.id, order)).await.unwrap());
        }
        let (a, b, c, d) = (&rows[0], &rows[1], &rows[2], &rows[3]);

        // both deletes were planned before either committed
        let delete_b = delete_batch(b);
        let delete_c = delete_batch(c);

        repo.apply(venue.id, delete_b).await.unwrap();
        let second = repo.apply(venue.id, delete_c).await;

        assert!(matches!(second, Err(MenuError::ConflictingOrder(_))));
        assert_eq!(
            root_orders(&repo, venue.id).await,
            vec![(a.id, 0), (c.id, 1), (d.id, 2)]
        );

        // re-planned from a fresh read it goes through
        let c = repo.find_category(c.id).await.unwrap().unwrap();
        repo.apply(venue.id, delete_batch(&c)).await.unwrap();
        assert_eq!(root_orders(&repo, venue.id).await, vec![(a.id, 0), (d.id, 1)]);
    }

    #[tokio::test]
    async fn test_group_end_and_count_guards() {
        let repo = InMemoryMenuRepository::new();
        let venue = repo.add_venue("manager-1", VenueStatus::Active).await;
        let first = repo.insert_category(new_category(venue.id, 0)).await.unwrap();

        let guards = vec![
            MenuWrite::ExpectCategoryGroupEnd {
                venue_id: venue.id,
                parent_id: None,
                max: Some(0),
            },
            MenuWrite::ExpectCategoryCount {
                venue_id: venue.id,
                count: 1,
            },
            MenuWrite::ExpectItemGroupEnd {
                category_id: first.id,
                max: None,
            },
        ];
        repo.apply(venue.id, guards.clone()).await.unwrap();

        // another writer appends in between
        repo.insert_category(new_category(venue.id, 1)).await.unwrap();
        let result = repo.apply(venue.id, guards).await;
        assert!(matches!(result, Err(MenuError::ConflictingOrder(_))));
    }
}
