use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::check_cleared_or_max_chars;
use super::item_dto::ItemResponseDto;
use crate::features::menu::models::{CategoryPatch, DeleteStrategy, MenuCategory};
use crate::shared::types::double_option;

// =============================================================================
// REQUEST DTOs
// =============================================================================

/// Request DTO for creating a category. It is appended to the end of its sibling group.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateCategoryDto {
    pub venue_id: Uuid,

    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(length(max = 500, message = "Description must not exceed 500 characters"))]
    pub description: Option<String>,

    /// Parent category; omit for a top-level category
    pub parent_id: Option<Uuid>,
}

/// Request DTO for updating a category.
///
/// `description` and `parent_id` accept an explicit `null`: clearing the
/// description, or moving the category to the top level.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_update_category"))]
pub struct UpdateCategoryDto {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<Uuid>)]
    pub parent_id: Option<Option<Uuid>>,
}

fn validate_update_category(dto: &UpdateCategoryDto) -> Result<(), ValidationError> {
    check_cleared_or_max_chars(
        &dto.description,
        500,
        "Description must not exceed 500 characters",
    )
}

impl UpdateCategoryDto {
    pub fn into_patch(self) -> CategoryPatch {
        CategoryPatch {
            name: self.name,
            description: self.description,
            parent_id: self.parent_id,
            display_order: None,
        }
    }
}

/// Request DTO for reordering one sibling group of categories
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ReorderCategoriesDto {
    pub venue_id: Uuid,

    /// Category ids in their new order; position `i` gets display order `i`
    #[validate(length(min = 1, message = "ordered_ids must not be empty"))]
    pub ordered_ids: Vec<Uuid>,
}

/// Query params for listing the category tree of a venue
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct CategoryTreeQuery {
    pub venue_id: Uuid,
}

/// Query params for deleting a category
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct DeleteCategoryQuery {
    /// `cascade` (default) or `move`
    #[serde(default)]
    pub strategy: DeleteStrategy,

    /// Required by `move` when the category has items or sub-categories
    pub target_category_id: Option<Uuid>,
}

// =============================================================================
// RESPONSE DTOs
// =============================================================================

/// Response DTO for category
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CategoryResponseDto {
    pub id: Uuid,
    pub venue_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<MenuCategory> for CategoryResponseDto {
    fn from(c: MenuCategory) -> Self {
        Self {
            id: c.id,
            venue_id: c.venue_id,
            parent_id: c.parent_id,
            name: c.name,
            description: c.description,
            display_order: c.display_order,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

/// A single category with its items, ordered by display order
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CategoryDetailDto {
    pub id: Uuid,
    pub venue_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<ItemResponseDto>,
}

impl CategoryDetailDto {
    pub fn new(c: MenuCategory, items: Vec<ItemResponseDto>) -> Self {
        Self {
            id: c.id,
            venue_id: c.venue_id,
            parent_id: c.parent_id,
            name: c.name,
            description: c.description,
            display_order: c.display_order,
            created_at: c.created_at,
            updated_at: c.updated_at,
            items,
        }
    }
}

/// Management view of the category tree (hierarchical structure)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(no_recursion)]
pub struct CategoryTreeDto {
    pub id: Uuid,
    pub venue_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<ItemResponseDto>,
    pub children: Vec<CategoryTreeDto>,
}

impl CategoryTreeDto {
    pub fn leaf(c: MenuCategory, items: Vec<ItemResponseDto>) -> Self {
        Self {
            id: c.id,
            venue_id: c.venue_id,
            parent_id: c.parent_id,
            name: c.name,
            description: c.description,
            display_order: c.display_order,
            created_at: c.created_at,
            updated_at: c.updated_at,
            items,
            children: Vec::new(),
        }
    }
}
