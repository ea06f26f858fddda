use chrono::{DateTime, Utc};
use sqlx::{FromRow, Type};
use uuid::Uuid;

/// Venue status enum matching database enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type)]
#[sqlx(type_name = "venue_status", rename_all = "lowercase")]
pub enum VenueStatus {
    Pending,
    Active,
    Suspended,
}

/// The slice of a venue the menu feature needs: ownership and visibility
#[derive(Debug, Clone, FromRow)]
#[allow(dead_code)]
pub struct Venue {
    pub id: Uuid,
    pub name: String,
    pub manager_id: String,
    pub status: VenueStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Venue {
    /// Guests only see menus of active venues
    pub fn is_public(&self) -> bool {
        self.status == VenueStatus::Active
    }
}
