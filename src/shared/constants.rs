// =============================================================================
// ROLE CONSTANTS
// =============================================================================

/// Administrator role - may manage the menu of any venue
pub const ROLE_ADMIN: &str = "admin";

/// Venue manager role - manages the venues whose `manager_id` matches the account
#[allow(dead_code)]
pub const ROLE_VENUE_MANAGER: &str = "venue_manager";

