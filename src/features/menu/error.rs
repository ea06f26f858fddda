use thiserror::Error;

use crate::core::error::AppError;

/// Failures of menu operations, independent of the transport
#[derive(Debug, Error)]
pub enum MenuError {
    #[error("{0}")]
    NotFound(String),

    #[error("Cannot create circular category reference")]
    CircularReference,

    #[error("Cannot delete the last category of a venue")]
    LastCategory,

    #[error("Target category is required for the move strategy")]
    TargetRequired,

    #[error("Conflicting display order: {0}")]
    ConflictingOrder(String),

    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type MenuResult<T> = std::result::Result<T, MenuError>;

impl MenuError {
    pub fn not_found(what: &str) -> Self {
        MenuError::NotFound(format!("{} not found", what))
    }
}

impl From<MenuError> for AppError {
    fn from(e: MenuError) -> Self {
        match e {
            MenuError::NotFound(msg) => AppError::NotFound(msg),
            MenuError::CircularReference | MenuError::LastCategory | MenuError::TargetRequired => {
                AppError::BadRequest(e.to_string())
            }
            MenuError::ConflictingOrder(_) => AppError::Conflict(e.to_string()),
            MenuError::Validation(msg) => AppError::Validation(msg),
            MenuError::Database(err) => AppError::Database(err),
        }
    }
}

/// Map Postgres constraint violations to domain errors
pub(crate) fn handle_db_error(e: sqlx::Error) -> MenuError {
    if let sqlx::Error::Database(db_err) = &e {
        // Unique violation (23505): the deferred sibling-order constraints
        if db_err.code() == Some(std::borrow::Cow::Borrowed("23505")) {
            let constraint = db_err.constraint().unwrap_or("sibling order").to_string();
            tracing::debug!("Unique violation on {}", constraint);
            return MenuError::ConflictingOrder(constraint);
        }

        // Foreign key violation (23503): venue, parent or category vanished
        if db_err.code() == Some(std::borrow::Cow::Borrowed("23503")) {
            return MenuError::NotFound("Referenced record does not exist".to_string());
        }
    }

    MenuError::Database(e)
}
