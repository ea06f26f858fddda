pub mod category_handler;
pub mod item_handler;
pub mod public_handler;

pub use category_handler::*;
pub use item_handler::*;
pub use public_handler::*;
