use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::{check_cleared_or_max_chars, check_cleared_or_url};
use crate::features::menu::models::{ItemPatch, MenuCategory, MenuItem};
use crate::shared::types::double_option;

/// Request DTO for creating a menu item. It is appended to the end of its category.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateItemDto {
    pub category_id: Uuid,

    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,

    #[validate(length(max = 1000, message = "Description must not exceed 1000 characters"))]
    pub description: Option<String>,

    /// Price in minor currency units
    #[validate(range(min = 0, message = "Price must not be negative"))]
    pub price: Option<i32>,

    #[validate(url(message = "Image URL must be a valid URL"))]
    pub image_url: Option<String>,

    /// Defaults to `true`
    pub is_available: Option<bool>,
}

/// Request DTO for updating a menu item.
///
/// Setting `category_id` to another category of the same venue moves the
/// item to the end of that category.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_update_item"))]
pub struct UpdateItemDto {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<i32>)]
    pub price: Option<Option<i32>>,

    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub image_url: Option<Option<String>>,

    pub is_available: Option<bool>,

    pub category_id: Option<Uuid>,
}

fn validate_update_item(dto: &UpdateItemDto) -> Result<(), ValidationError> {
    check_cleared_or_max_chars(
        &dto.description,
        1000,
        "Description must not exceed 1000 characters",
    )?;
    check_cleared_or_url(&dto.image_url, "Image URL must be a valid URL")?;
    if matches!(dto.price, Some(Some(price)) if price < 0) {
        return Err(ValidationError::new("range")
            .with_message(std::borrow::Cow::Borrowed("Price must not be negative")));
    }
    Ok(())
}

impl UpdateItemDto {
    /// Field patch without the category move, which the service resolves itself
    pub fn into_patch(self) -> ItemPatch {
        ItemPatch {
            name: self.name,
            description: self.description,
            price: self.price,
            image_url: self.image_url,
            is_available: self.is_available,
            category_id: None,
            display_order: None,
        }
    }
}

/// Request DTO for reordering the items of one category
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ReorderItemsDto {
    pub category_id: Uuid,

    /// Item ids in their new order; position `i` gets display order `i`
    #[validate(length(min = 1, message = "ordered_ids must not be empty"))]
    pub ordered_ids: Vec<Uuid>,
}

/// Query params for listing items of a venue
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct ListItemsQuery {
    pub venue_id: Uuid,
    /// Only items of this category
    pub category_id: Option<Uuid>,
}

/// Response DTO for menu item
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ItemResponseDto {
    pub id: Uuid,
    pub category_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Option<i32>,
    pub image_url: Option<String>,
    pub is_available: bool,
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<MenuItem> for ItemResponseDto {
    fn from(i: MenuItem) -> Self {
        Self {
            id: i.id,
            category_id: i.category_id,
            name: i.name,
            description: i.description,
            price: i.price,
            image_url: i.image_url,
            is_available: i.is_available,
            display_order: i.display_order,
            created_at: i.created_at,
            updated_at: i.updated_at,
        }
    }
}

/// Category reference embedded in item listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CategorySummaryDto {
    pub id: Uuid,
    pub name: String,
}

impl From<MenuCategory> for CategorySummaryDto {
    fn from(c: MenuCategory) -> Self {
        Self {
            id: c.id,
            name: c.name,
        }
    }
}

/// Item of a venue listing, with the category it belongs to
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ItemListEntryDto {
    #[serde(flatten)]
    pub item: ItemResponseDto,
    pub category: CategorySummaryDto,
}
