use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::features::menu::models::{MenuCategory, MenuItem};

/// Guest-facing category node.
///
/// Carries no ordering, ownership or audit fields; order is conveyed by
/// position in `children` and `items`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(no_recursion)]
pub struct PublicCategoryDto {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub items: Vec<PublicMenuItemDto>,
    pub children: Vec<PublicCategoryDto>,
}

impl PublicCategoryDto {
    pub fn leaf(c: MenuCategory, items: Vec<PublicMenuItemDto>) -> Self {
        Self {
            id: c.id,
            name: c.name,
            description: c.description,
            items,
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PublicMenuItemDto {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Option<i32>,
    pub image_url: Option<String>,
    pub is_available: bool,
}

impl From<MenuItem> for PublicMenuItemDto {
    fn from(i: MenuItem) -> Self {
        Self {
            id: i.id,
            name: i.name,
            description: i.description,
            price: i.price,
            image_url: i.image_url,
            is_available: i.is_available,
        }
    }
}
