use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database model for a menu item.
///
/// `price` is in minor currency units; `None` means "price on request".
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct MenuItem {
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

#[derive(Debug, Clone)]
pub struct NewItem {
    pub id: Uuid,
    pub category_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Option<i32>,
    pub image_url: Option<String>,
    pub is_available: bool,
    pub display_order: i32,
}

/// Partial update, same conventions as `CategoryPatch`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemPatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub price: Option<Option<i32>>,
    pub image_url: Option<Option<String>>,
    pub is_available: Option<bool>,
    pub category_id: Option<Uuid>,
    pub display_order: Option<i32>,
}
