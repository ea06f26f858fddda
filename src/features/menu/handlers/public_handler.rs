use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::error::Result;
use crate::features::menu::dtos::PublicCategoryDto;
use crate::features::menu::services::MenuService;
use crate::shared::types::ApiResponse;

/// Guest menu of a venue
///
/// Public endpoint. Only active venues are served.
#[utoipa::path(
    get,
    path = "/api/menu/{venue_id}/public",
    params(
        ("venue_id" = Uuid, Path, description = "Venue ID")
    ),
    responses(
        (status = 200, description = "Public menu", body = ApiResponse<Vec<PublicCategoryDto>>),
        (status = 404, description = "Venue not found or not active")
    ),
    tag = "public-menu"
)]
pub async fn get_public_menu(
    State(service): State<Arc<MenuService>>,
    Path(venue_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<PublicCategoryDto>>>> {
    let menu = service.get_public_menu(venue_id).await?;
    Ok(Json(ApiResponse::success(Some(menu), None, None)))
}
