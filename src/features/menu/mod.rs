pub mod access;
pub mod dtos;
pub mod error;
pub mod handlers;
pub mod models;
pub mod ordering;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod tree;

pub use repositories::PgMenuRepository;
pub use services::MenuService;
