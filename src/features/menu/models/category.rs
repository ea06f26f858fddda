use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::item::MenuItem;

/// Database model for a menu category.
///
/// Categories form a forest per venue through `parent_id`; `display_order`
/// is dense (`0..n-1`) within each `(venue_id, parent_id)` sibling group.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct MenuCategory {
    pub id: Uuid,
    pub venue_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One flat row handed to the tree builder: a category and its ordered items
#[derive(Debug, Clone)]
pub struct CategoryWithItems {
    pub category: MenuCategory,
    pub items: Vec<MenuItem>,
}

/// Insert payload; the service decides `id` and `display_order`
#[derive(Debug, Clone)]
pub struct NewCategory {
    pub id: Uuid,
    pub venue_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub display_order: i32,
}

/// Partial update. The outer `Option` means "leave as is"; for nullable
/// columns the inner `Option` is the new value (`None` clears it).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub parent_id: Option<Option<Uuid>>,
    pub display_order: Option<i32>,
}

/// What happens to the content of a deleted category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeleteStrategy {
    /// Delete sub-categories and items together with the category
    #[default]
    Cascade,
    /// Re-home items and direct sub-categories to a target category first
    Move,
}

impl std::fmt::Display for DeleteStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeleteStrategy::Cascade => write!(f, "cascade"),
            DeleteStrategy::Move => write!(f, "move"),
        }
    }
}
