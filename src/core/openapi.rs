use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::features::menu::{dtos as menu_dtos, handlers as menu_handlers, models as menu_models};
use crate::shared::types::{ApiResponse, Meta};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Categories (protected)
        menu_handlers::list_categories,
        menu_handlers::create_category,
        menu_handlers::reorder_categories,
        menu_handlers::get_category,
        menu_handlers::update_category,
        menu_handlers::delete_category,
        // Items (protected)
        menu_handlers::list_items,
        menu_handlers::create_item,
        menu_handlers::reorder_items,
        menu_handlers::get_item,
        menu_handlers::update_item,
        menu_handlers::toggle_item_availability,
        menu_handlers::delete_item,
        // Public menu
        menu_handlers::get_public_menu,
    ),
    components(
        schemas(
            Meta,
            // Menu
            menu_models::DeleteStrategy,
            menu_dtos::CreateCategoryDto,
            menu_dtos::UpdateCategoryDto,
            menu_dtos::ReorderCategoriesDto,
            menu_dtos::CategoryResponseDto,
            menu_dtos::CategoryDetailDto,
            menu_dtos::CategoryTreeDto,
            menu_dtos::CreateItemDto,
            menu_dtos::UpdateItemDto,
            menu_dtos::ReorderItemsDto,
            menu_dtos::ItemResponseDto,
            menu_dtos::CategorySummaryDto,
            menu_dtos::ItemListEntryDto,
            menu_dtos::PublicCategoryDto,
            menu_dtos::PublicMenuItemDto,
            ApiResponse<menu_dtos::CategoryResponseDto>,
            ApiResponse<menu_dtos::CategoryDetailDto>,
            ApiResponse<Vec<menu_dtos::CategoryTreeDto>>,
            ApiResponse<menu_dtos::ItemResponseDto>,
            ApiResponse<Vec<menu_dtos::ItemListEntryDto>>,
            ApiResponse<Vec<menu_dtos::PublicCategoryDto>>,
        )
    ),
    tags(
        (name = "menu", description = "Menu management for venue managers"),
        (name = "public-menu", description = "Guest-facing menu of active venues (public)"),
    ),
    modifiers(&SecurityAddon),
    info(
        title = "Venue Menu API",
        version = "0.1.0",
        description = "Hierarchical menu management for venues",
    )
)]
pub struct ApiDoc;

/// Registers the bearer JWT scheme used by the protected menu routes
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Modifier to override OpenAPI info from config
pub struct SwaggerInfoModifier {
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Modify for SwaggerInfoModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info.title = self.title.clone();
        openapi.info.version = self.version.clone();
        openapi.info.description = Some(self.description.clone());
    }
}
