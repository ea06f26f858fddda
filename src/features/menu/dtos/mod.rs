pub mod category_dto;
pub mod item_dto;
pub mod public_dto;

pub use category_dto::*;
pub use item_dto::*;
pub use public_dto::*;

use std::borrow::Cow;
use validator::{ValidateUrl, ValidationError};

/// Length check for double-option text fields, which the derive cannot see through
fn check_cleared_or_max_chars(
    value: &Option<Option<String>>,
    max: usize,
    message: &'static str,
) -> Result<(), ValidationError> {
    match value {
        Some(Some(text)) if text.chars().count() > max => {
            Err(ValidationError::new("length").with_message(Cow::Borrowed(message)))
        }
        _ => Ok(()),
    }
}

fn check_cleared_or_url(
    value: &Option<Option<String>>,
    message: &'static str,
) -> Result<(), ValidationError> {
    match value {
        Some(Some(url)) if !url.validate_url() => {
            Err(ValidationError::new("url").with_message(Cow::Borrowed(message)))
        }
        _ => Ok(()),
    }
}
