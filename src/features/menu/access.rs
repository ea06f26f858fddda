use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::auth::model::AuthenticatedUser;
use crate::features::menu::models::Venue;
use crate::features::menu::services::MenuService;

/// Admins manage every venue; managers only the venues assigned to their account
pub fn can_manage_venue(user: &AuthenticatedUser, venue: &Venue) -> bool {
    user.is_admin() || venue.manager_id == user.account_id
}

fn ensure_can_manage(user: &AuthenticatedUser, venue: &Venue) -> Result<()> {
    if can_manage_venue(user, venue) {
        return Ok(());
    }

    tracing::warn!(
        "Account {} denied access to the menu of venue {}",
        user.account_id,
        venue.id
    );
    Err(AppError::Forbidden(
        "You do not have access to this venue".to_string(),
    ))
}

pub async fn authorize_venue(
    service: &MenuService,
    user: &AuthenticatedUser,
    venue_id: Uuid,
) -> Result<Venue> {
    let venue = service.get_venue(venue_id).await?;
    ensure_can_manage(user, &venue)?;
    Ok(venue)
}

pub async fn authorize_category(
    service: &MenuService,
    user: &AuthenticatedUser,
    category_id: Uuid,
) -> Result<()> {
    let venue = service.venue_for_category(category_id).await?;
    ensure_can_manage(user, &venue)
}

pub async fn authorize_item(
    service: &MenuService,
    user: &AuthenticatedUser,
    item_id: Uuid,
) -> Result<()> {
    let venue = service.venue_for_item(item_id).await?;
    ensure_can_manage(user, &venue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::menu::models::venue::VenueStatus;
    use crate::shared::test_helpers::{admin_user, manager_user};
    use chrono::Utc;

    fn venue(manager_id: &str) -> Venue {
        Venue {
            id: Uuid::new_v4(),
            name: "Corner Bistro".to_string(),
            manager_id: manager_id.to_string(),
            status: VenueStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_can_manage_venue() {
        let bistro = venue("manager-1");

        assert!(can_manage_venue(&manager_user("manager-1"), &bistro));
        assert!(!can_manage_venue(&manager_user("manager-2"), &bistro));
        assert!(can_manage_venue(&admin_user(), &bistro));
    }

    #[test]
    fn test_denied_access_is_forbidden() {
        let result = ensure_can_manage(&manager_user("intruder"), &venue("manager-1"));
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }
}
