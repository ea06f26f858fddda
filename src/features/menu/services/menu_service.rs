use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use uuid::Uuid;

use crate::core::config::{MenuConfig, ReparentOrdering};
use crate::features::menu::dtos::{
    CategoryDetailDto, CategoryResponseDto, CategorySummaryDto, CategoryTreeDto,
    CreateCategoryDto, CreateItemDto, DeleteCategoryQuery, ItemListEntryDto, ItemResponseDto,
    PublicCategoryDto, ReorderCategoriesDto, ReorderItemsDto, UpdateCategoryDto, UpdateItemDto,
};
use crate::features::menu::error::{MenuError, MenuResult};
use crate::features::menu::models::{
    CategoryPatch, CategoryWithItems, DeleteStrategy, ItemPatch, MenuCategory, MenuItem,
    NewCategory, NewItem, Venue,
};
use crate::features::menu::ordering::{ensure_exact_permutation, next_order, positions};
use crate::features::menu::repositories::{MenuRepository, MenuWrite};
use crate::features::menu::tree::{
    ancestor_chain, build_management_tree, build_public_tree, descendant_ids,
};

/// Service for menu ordering and tree operations.
///
/// Authorization is not its concern; callers check venue access first.
///
/// Every ordering change is planned from plain reads and applied as one
/// batch that pins those reads (see `MenuWrite::Expect*`). When another
/// writer got there first the batch is refused and the whole attempt is
/// planned again, up to `order_conflict_retries` times.
pub struct MenuService {
    repo: Arc<dyn MenuRepository>,
    config: MenuConfig,
}

impl MenuService {
    pub fn new(repo: Arc<dyn MenuRepository>, config: MenuConfig) -> Self {
        Self { repo, config }
    }

    // =========================================================================
    // Venues
    // =========================================================================

    pub async fn get_venue(&self, venue_id: Uuid) -> MenuResult<Venue> {
        self.repo
            .find_venue(venue_id)
            .await?
            .ok_or_else(|| MenuError::not_found("Venue"))
    }

    /// Venue owning a category, for access checks
    pub async fn venue_for_category(&self, category_id: Uuid) -> MenuResult<Venue> {
        let category = self.require_category(category_id).await?;
        self.get_venue(category.venue_id).await
    }

    /// Venue owning an item, for access checks
    pub async fn venue_for_item(&self, item_id: Uuid) -> MenuResult<Venue> {
        let item = self.require_item(item_id).await?;
        self.venue_for_category(item.category_id).await
    }

    // =========================================================================
    // Categories
    // =========================================================================

    /// Create a category at the end of its sibling group
    pub async fn create_category(&self, dto: CreateCategoryDto) -> MenuResult<CategoryResponseDto> {
        self.get_venue(dto.venue_id).await?;

        if let Some(parent_id) = dto.parent_id {
            self.repo
                .find_category(parent_id)
                .await?
                .filter(|parent| parent.venue_id == dto.venue_id)
                .ok_or_else(|| MenuError::not_found("Parent category"))?;
        }

        let this = self;
        let input = &dto;
        let category = self
            .retry_on_order_conflict(
                "create_category",
                self.config.order_conflict_retries,
                move || this.append_category(input),
            )
            .await?;

        tracing::info!(
            "Created category {} in venue {} at position {}",
            category.id,
            category.venue_id,
            category.display_order
        );

        Ok(category.into())
    }

    async fn append_category(&self, dto: &CreateCategoryDto) -> MenuResult<MenuCategory> {
        let max = self
            .repo
            .max_category_order(dto.venue_id, dto.parent_id)
            .await?;

        self.repo
            .insert_category(NewCategory {
                id: Uuid::now_v7(),
                venue_id: dto.venue_id,
                parent_id: dto.parent_id,
                name: dto.name.clone(),
                description: dto.description.clone(),
                display_order: next_order(max),
            })
            .await
    }

    /// Update fields and optionally re-parent a category
    pub async fn update_category(
        &self,
        id: Uuid,
        dto: UpdateCategoryDto,
    ) -> MenuResult<CategoryResponseDto> {
        let patch = dto.into_patch();

        let this = self;
        let input = &patch;
        self.retry_on_order_conflict(
            "update_category",
            self.config.order_conflict_retries,
            move || this.try_update_category(id, input),
        )
        .await?;

        let updated = self.require_category(id).await?;
        tracing::info!("Updated category {}", id);

        Ok(updated.into())
    }

    async fn try_update_category(&self, id: Uuid, patch: &CategoryPatch) -> MenuResult<()> {
        let current = self.require_category(id).await?;

        let Some(new_parent) = patch
            .parent_id
            .filter(|&parent_id| parent_id != current.parent_id)
        else {
            return self
                .repo
                .apply(
                    current.venue_id,
                    vec![MenuWrite::UpdateCategory {
                        id,
                        patch: CategoryPatch {
                            parent_id: None,
                            ..patch.clone()
                        },
                    }],
                )
                .await;
        };

        let categories = self.repo.list_categories(current.venue_id).await?;
        let mut batch = vec![MenuWrite::category_at(&current)];

        if let Some(parent_id) = new_parent {
            ensure_valid_parent(&categories, &current, parent_id)?;
            // a concurrent reparent along this chain could close a cycle
            batch.extend(
                ancestor_chain(&categories, parent_id)
                    .into_iter()
                    .map(MenuWrite::category_at),
            );
        }

        match self.config.reparent_ordering {
            ReparentOrdering::Append => {
                let max = categories
                    .iter()
                    .filter(|c| c.parent_id == new_parent)
                    .map(|c| c.display_order)
                    .max();

                batch.push(MenuWrite::ExpectCategoryGroupEnd {
                    venue_id: current.venue_id,
                    parent_id: new_parent,
                    max,
                });
                batch.push(MenuWrite::UpdateCategory {
                    id,
                    patch: CategoryPatch {
                        display_order: Some(next_order(max)),
                        ..patch.clone()
                    },
                });
                batch.push(MenuWrite::CloseCategoryGap {
                    venue_id: current.venue_id,
                    parent_id: current.parent_id,
                    removed_order: current.display_order,
                });
            }
            ReparentOrdering::Preserve => {
                batch.push(MenuWrite::UpdateCategory {
                    id,
                    patch: patch.clone(),
                });
            }
        }

        self.repo.apply(current.venue_id, batch).await
    }

    /// Delete a category, cascading or re-homing its content
    pub async fn delete_category(&self, id: Uuid, query: DeleteCategoryQuery) -> MenuResult<()> {
        let this = self;
        let input = &query;
        let removed_descendants = self
            .retry_on_order_conflict(
                "delete_category",
                self.config.order_conflict_retries,
                move || this.try_delete_category(id, input),
            )
            .await?;

        tracing::info!(
            "Deleted category {} with strategy {} ({} descendants)",
            id,
            query.strategy,
            removed_descendants
        );

        Ok(())
    }

    async fn try_delete_category(&self, id: Uuid, query: &DeleteCategoryQuery) -> MenuResult<usize> {
        let category = self.require_category(id).await?;
        let venue_id = category.venue_id;

        let count = self.repo.count_categories(venue_id).await?;
        if count <= 1 {
            return Err(MenuError::LastCategory);
        }

        let categories = self.repo.list_categories(venue_id).await?;
        let descendants = descendant_ids(&categories, id);

        let target = match query.strategy {
            DeleteStrategy::Cascade => {
                if descendants.len() as i64 + 1 >= count {
                    return Err(MenuError::LastCategory);
                }
                None
            }
            DeleteStrategy::Move => {
                let has_children = !descendants.is_empty();
                let has_items = !self.repo.list_items(id).await?.is_empty();

                if has_children || has_items {
                    let target_id = query
                        .target_category_id
                        .ok_or(MenuError::TargetRequired)?;
                    if target_id == id || descendants.contains(&target_id) {
                        return Err(MenuError::CircularReference);
                    }
                    if !categories.iter().any(|c| c.id == target_id) {
                        return Err(MenuError::not_found("Target category"));
                    }
                    Some(target_id)
                } else {
                    None
                }
            }
        };

        let mut batch = vec![
            MenuWrite::ExpectCategoryCount { venue_id, count },
            MenuWrite::category_at(&category),
        ];

        if let Some(target) = target {
            // the target must still sit outside the deleted subtree
            batch.extend(
                ancestor_chain(&categories, target)
                    .into_iter()
                    .map(MenuWrite::category_at),
            );

            let (item_offset, child_offset) = match self.config.reparent_ordering {
                ReparentOrdering::Append => {
                    let max_item = self.repo.max_item_order(target).await?;
                    let max_child = categories
                        .iter()
                        .filter(|c| c.parent_id == Some(target))
                        .map(|c| c.display_order)
                        .max();

                    batch.push(MenuWrite::ExpectItemGroupEnd {
                        category_id: target,
                        max: max_item,
                    });
                    batch.push(MenuWrite::ExpectCategoryGroupEnd {
                        venue_id,
                        parent_id: Some(target),
                        max: max_child,
                    });
                    (Some(next_order(max_item)), Some(next_order(max_child)))
                }
                ReparentOrdering::Preserve => (None, None),
            };

            batch.push(MenuWrite::MoveItems {
                from: id,
                to: target,
                order_offset: item_offset,
            });
            batch.push(MenuWrite::MoveChildCategories {
                from: id,
                to: target,
                order_offset: child_offset,
            });
        }

        batch.push(MenuWrite::DeleteCategory { id });
        batch.push(MenuWrite::CloseCategoryGap {
            venue_id,
            parent_id: category.parent_id,
            removed_order: category.display_order,
        });

        self.repo.apply(venue_id, batch).await?;
        Ok(descendants.len())
    }

    /// Assign `display_order = index` to every listed category
    pub async fn reorder_categories(&self, dto: ReorderCategoriesDto) -> MenuResult<()> {
        if dto.ordered_ids.is_empty() {
            return Err(MenuError::Validation(
                "ordered_ids must not be empty".to_string(),
            ));
        }

        let this = self;
        let input = &dto;
        self.retry_on_order_conflict(
            "reorder_categories",
            self.config.order_conflict_retries,
            move || this.try_reorder_categories(input),
        )
        .await?;

        tracing::info!(
            "Reordered {} categories in venue {}",
            dto.ordered_ids.len(),
            dto.venue_id
        );

        Ok(())
    }

    async fn try_reorder_categories(&self, dto: &ReorderCategoriesDto) -> MenuResult<()> {
        let mut batch = Vec::with_capacity(dto.ordered_ids.len() + 1);

        if self.config.strict_reorder {
            let categories = self.repo.list_categories(dto.venue_id).await?;
            let parent_id = categories
                .iter()
                .find(|c| Some(&c.id) == dto.ordered_ids.first())
                .map(|c| c.parent_id)
                .ok_or_else(|| MenuError::not_found("Category"))?;
            let siblings: Vec<&MenuCategory> = categories
                .iter()
                .filter(|c| c.parent_id == parent_id)
                .collect();

            let sibling_ids: HashSet<Uuid> = siblings.iter().map(|c| c.id).collect();
            ensure_exact_permutation(&dto.ordered_ids, &sibling_ids)?;

            // no sibling may join in the meantime
            batch.push(MenuWrite::ExpectCategoryGroupEnd {
                venue_id: dto.venue_id,
                parent_id,
                max: siblings.iter().map(|c| c.display_order).max(),
            });
        }

        batch.extend(
            positions(&dto.ordered_ids).map(|(id, display_order)| MenuWrite::SetCategoryOrder {
                id,
                venue_id: dto.venue_id,
                display_order,
            }),
        );
        self.repo.apply(dto.venue_id, batch).await
    }

    /// Management view of the whole venue menu
    pub async fn get_categories_tree(&self, venue_id: Uuid) -> MenuResult<Vec<CategoryTreeDto>> {
        let rows = self.load_rows(venue_id).await?;
        Ok(build_management_tree(rows))
    }

    pub async fn get_category_by_id(&self, id: Uuid) -> MenuResult<CategoryDetailDto> {
        let category = self.require_category(id).await?;
        let items = self.repo.list_items(id).await?;

        Ok(CategoryDetailDto::new(
            category,
            items.into_iter().map(ItemResponseDto::from).collect(),
        ))
    }

    // =========================================================================
    // Items
    // =========================================================================

    /// Create an item at the end of its category
    pub async fn create_item(&self, dto: CreateItemDto) -> MenuResult<ItemResponseDto> {
        self.require_category(dto.category_id).await?;

        let this = self;
        let input = &dto;
        let item = self
            .retry_on_order_conflict(
                "create_item",
                self.config.order_conflict_retries,
                move || this.append_item(input),
            )
            .await?;

        tracing::info!(
            "Created item {} in category {} at position {}",
            item.id,
            item.category_id,
            item.display_order
        );

        Ok(item.into())
    }

    async fn append_item(&self, dto: &CreateItemDto) -> MenuResult<MenuItem> {
        let max = self.repo.max_item_order(dto.category_id).await?;

        self.repo
            .insert_item(NewItem {
                id: Uuid::now_v7(),
                category_id: dto.category_id,
                name: dto.name.clone(),
                description: dto.description.clone(),
                price: dto.price,
                image_url: dto.image_url.clone(),
                is_available: dto.is_available.unwrap_or(true),
                display_order: next_order(max),
            })
            .await
    }

    /// Update item fields; a new `category_id` moves it to the end of that category
    pub async fn update_item(&self, id: Uuid, dto: UpdateItemDto) -> MenuResult<ItemResponseDto> {
        let item = self.require_item(id).await?;
        let venue_id = self.require_category(item.category_id).await?.venue_id;

        if let Some(target) = dto
            .category_id
            .filter(|&category_id| category_id != item.category_id)
        {
            self.repo
                .find_category(target)
                .await?
                .filter(|c| c.venue_id == venue_id)
                .ok_or_else(|| MenuError::not_found("Target category"))?;
        }

        let target = dto.category_id;
        let patch = dto.into_patch();

        let this = self;
        let input = &patch;
        self.retry_on_order_conflict(
            "update_item",
            self.config.order_conflict_retries,
            move || this.try_update_item(id, venue_id, target, input),
        )
        .await?;

        Ok(self.require_item(id).await?.into())
    }

    async fn try_update_item(
        &self,
        id: Uuid,
        venue_id: Uuid,
        target: Option<Uuid>,
        patch: &ItemPatch,
    ) -> MenuResult<()> {
        let item = self.require_item(id).await?;

        let Some(target) = target.filter(|&target| target != item.category_id) else {
            return self
                .repo
                .apply(
                    venue_id,
                    vec![MenuWrite::UpdateItem {
                        id,
                        patch: patch.clone(),
                    }],
                )
                .await;
        };

        let max = self.repo.max_item_order(target).await?;
        self.repo
            .apply(
                venue_id,
                vec![
                    MenuWrite::item_at(&item),
                    MenuWrite::ExpectItemGroupEnd {
                        category_id: target,
                        max,
                    },
                    MenuWrite::UpdateItem {
                        id,
                        patch: ItemPatch {
                            category_id: Some(target),
                            display_order: Some(next_order(max)),
                            ..patch.clone()
                        },
                    },
                    MenuWrite::CloseItemGap {
                        category_id: item.category_id,
                        removed_order: item.display_order,
                    },
                ],
            )
            .await?;

        tracing::info!("Moved item {} to category {}", id, target);
        Ok(())
    }

    pub async fn delete_item(&self, id: Uuid) -> MenuResult<()> {
        let this = self;
        let category_id = self
            .retry_on_order_conflict(
                "delete_item",
                self.config.order_conflict_retries,
                move || this.try_delete_item(id),
            )
            .await?;

        tracing::info!("Deleted item {} from category {}", id, category_id);
        Ok(())
    }

    async fn try_delete_item(&self, id: Uuid) -> MenuResult<Uuid> {
        let item = self.require_item(id).await?;
        let venue_id = self.require_category(item.category_id).await?.venue_id;

        self.repo
            .apply(
                venue_id,
                vec![
                    MenuWrite::item_at(&item),
                    MenuWrite::DeleteItem { id },
                    MenuWrite::CloseItemGap {
                        category_id: item.category_id,
                        removed_order: item.display_order,
                    },
                ],
            )
            .await?;

        Ok(item.category_id)
    }

    /// Assign `display_order = index` to every listed item
    pub async fn reorder_items(&self, dto: ReorderItemsDto) -> MenuResult<()> {
        if dto.ordered_ids.is_empty() {
            return Err(MenuError::Validation(
                "ordered_ids must not be empty".to_string(),
            ));
        }

        let venue_id = self.require_category(dto.category_id).await?.venue_id;

        let this = self;
        let input = &dto;
        self.retry_on_order_conflict(
            "reorder_items",
            self.config.order_conflict_retries,
            move || this.try_reorder_items(venue_id, input),
        )
        .await?;

        tracing::info!(
            "Reordered {} items in category {}",
            dto.ordered_ids.len(),
            dto.category_id
        );

        Ok(())
    }

    async fn try_reorder_items(&self, venue_id: Uuid, dto: &ReorderItemsDto) -> MenuResult<()> {
        let mut batch = Vec::with_capacity(dto.ordered_ids.len() + 1);

        if self.config.strict_reorder {
            let items = self.repo.list_items(dto.category_id).await?;
            let siblings: HashSet<Uuid> = items.iter().map(|i| i.id).collect();
            ensure_exact_permutation(&dto.ordered_ids, &siblings)?;

            batch.push(MenuWrite::ExpectItemGroupEnd {
                category_id: dto.category_id,
                max: items.iter().map(|i| i.display_order).max(),
            });
        }

        batch.extend(
            positions(&dto.ordered_ids).map(|(id, display_order)| MenuWrite::SetItemOrder {
                id,
                category_id: dto.category_id,
                display_order,
            }),
        );
        self.repo.apply(venue_id, batch).await
    }

    pub async fn toggle_item_availability(&self, id: Uuid) -> MenuResult<ItemResponseDto> {
        let item = self.require_item(id).await?;
        let venue_id = self.require_category(item.category_id).await?.venue_id;

        self.repo
            .apply(
                venue_id,
                vec![MenuWrite::UpdateItem {
                    id,
                    patch: ItemPatch {
                        is_available: Some(!item.is_available),
                        ..Default::default()
                    },
                }],
            )
            .await?;

        tracing::info!("Item {} availability set to {}", id, !item.is_available);
        Ok(self.require_item(id).await?.into())
    }

    /// Items of a venue with their category, optionally of one category only
    pub async fn list_items(
        &self,
        venue_id: Uuid,
        category_id: Option<Uuid>,
    ) -> MenuResult<Vec<ItemListEntryDto>> {
        let categories: HashMap<Uuid, CategorySummaryDto> = self
            .repo
            .list_categories(venue_id)
            .await?
            .into_iter()
            .map(|c| (c.id, CategorySummaryDto::from(c)))
            .collect();
        let items = self.repo.list_venue_items(venue_id).await?;

        Ok(items
            .into_iter()
            .filter(|item| category_id.map_or(true, |c| item.category_id == c))
            .filter_map(|item| {
                let category = categories.get(&item.category_id)?.clone();
                Some(ItemListEntryDto {
                    item: item.into(),
                    category,
                })
            })
            .collect())
    }

    pub async fn get_item_by_id(&self, id: Uuid) -> MenuResult<ItemResponseDto> {
        Ok(self.require_item(id).await?.into())
    }

    // =========================================================================
    // Public menu
    // =========================================================================

    /// Guest view of an active venue. Inactive venues look missing.
    pub async fn get_public_menu(&self, venue_id: Uuid) -> MenuResult<Vec<PublicCategoryDto>> {
        let venue = self.get_venue(venue_id).await?;
        if !venue.is_public() {
            tracing::debug!("Public menu requested for inactive venue {}", venue_id);
            return Err(MenuError::not_found("Venue"));
        }

        let rows = self.load_rows(venue_id).await?;
        Ok(build_public_tree(rows))
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn require_category(&self, id: Uuid) -> MenuResult<MenuCategory> {
        self.repo
            .find_category(id)
            .await?
            .ok_or_else(|| MenuError::not_found("Category"))
    }

    async fn require_item(&self, id: Uuid) -> MenuResult<MenuItem> {
        self.repo
            .find_item(id)
            .await?
            .ok_or_else(|| MenuError::not_found("Item"))
    }

    /// Flat category rows of a venue, each with its ordered items
    async fn load_rows(&self, venue_id: Uuid) -> MenuResult<Vec<CategoryWithItems>> {
        let categories = self.repo.list_categories(venue_id).await?;
        let items = self.repo.list_venue_items(venue_id).await?;

        let mut items_by_category: HashMap<Uuid, Vec<MenuItem>> = HashMap::new();
        for item in items {
            items_by_category
                .entry(item.category_id)
                .or_default()
                .push(item);
        }

        Ok(categories
            .into_iter()
            .map(|category| CategoryWithItems {
                items: items_by_category.remove(&category.id).unwrap_or_default(),
                category,
            })
            .collect())
    }

    /// Re-plan an ordering change when a concurrent writer moved what it read
    async fn retry_on_order_conflict<T, F, Fut>(
        &self,
        operation: &str,
        retries: u32,
        mut attempt: F,
    ) -> MenuResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = MenuResult<T>>,
    {
        let mut retries_left = retries;
        loop {
            match attempt().await {
                Err(MenuError::ConflictingOrder(constraint)) if retries_left > 0 => {
                    retries_left -= 1;
                    tracing::warn!(
                        "{}: order conflict on {}, retrying ({} left)",
                        operation,
                        constraint,
                        retries_left
                    );
                }
                result => return result,
            }
        }
    }
}

/// A new parent must exist in the venue and sit outside the moved subtree
fn ensure_valid_parent(
    categories: &[MenuCategory],
    category: &MenuCategory,
    parent_id: Uuid,
) -> MenuResult<()> {
    if parent_id == category.id {
        return Err(MenuError::CircularReference);
    }

    if !categories.iter().any(|c| c.id == parent_id) {
        return Err(MenuError::not_found("Parent category"));
    }

    if descendant_ids(categories, category.id).contains(&parent_id) {
        tracing::warn!(
            "Rejected moving category {} under its descendant {}",
            category.id,
            parent_id
        );
        return Err(MenuError::CircularReference);
    }

    Ok(())
}
