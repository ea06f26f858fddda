pub mod category;
pub mod item;
pub mod venue;

pub use category::{CategoryPatch, CategoryWithItems, DeleteStrategy, MenuCategory, NewCategory};
pub use item::{ItemPatch, MenuItem, NewItem};
pub use venue::Venue;
