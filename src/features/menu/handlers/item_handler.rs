use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::core::extractor::AppJson;
use crate::features::auth::model::AuthenticatedUser;
use crate::features::menu::access::{authorize_category, authorize_item, authorize_venue};
use crate::features::menu::dtos::{
    CreateItemDto, ItemListEntryDto, ItemResponseDto, ListItemsQuery, ReorderItemsDto,
    UpdateItemDto,
};
use crate::features::menu::services::MenuService;
use crate::shared::types::{ApiResponse, Meta};

/// List the items of a venue, optionally of one category
#[utoipa::path(
    get,
    path = "/api/menu/items",
    params(ListItemsQuery),
    responses(
        (status = 200, description = "Items retrieved successfully", body = ApiResponse<Vec<ItemListEntryDto>>),
        (status = 403, description = "Forbidden - not your venue"),
        (status = 404, description = "Venue not found")
    ),
    tag = "menu",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_items(
    user: AuthenticatedUser,
    State(service): State<Arc<MenuService>>,
    Query(query): Query<ListItemsQuery>,
) -> Result<Json<ApiResponse<Vec<ItemListEntryDto>>>> {
    authorize_venue(&service, &user, query.venue_id).await?;

    let items = service.list_items(query.venue_id, query.category_id).await?;
    let total = items.len() as i64;
    Ok(Json(ApiResponse::success(
        Some(items),
        None,
        Some(Meta { total }),
    )))
}

/// Create an item at the end of its category
#[utoipa::path(
    post,
    path = "/api/menu/items",
    request_body = CreateItemDto,
    responses(
        (status = 201, description = "Item created successfully", body = ApiResponse<ItemResponseDto>),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Forbidden - not your venue"),
        (status = 404, description = "Category not found")
    ),
    tag = "menu",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_item(
    user: AuthenticatedUser,
    State(service): State<Arc<MenuService>>,
    AppJson(dto): AppJson<CreateItemDto>,
) -> Result<(StatusCode, Json<ApiResponse<ItemResponseDto>>)> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    authorize_category(&service, &user, dto.category_id).await?;

    let item = service.create_item(dto).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            Some(item),
            Some("Item created successfully".to_string()),
            None,
        )),
    ))
}

/// Reorder the items of a category
#[utoipa::path(
    put,
    path = "/api/menu/items/reorder",
    request_body = ReorderItemsDto,
    responses(
        (status = 200, description = "Items reordered successfully"),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Forbidden - not your venue"),
        (status = 404, description = "Category or item not found")
    ),
    tag = "menu",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn reorder_items(
    user: AuthenticatedUser,
    State(service): State<Arc<MenuService>>,
    AppJson(dto): AppJson<ReorderItemsDto>,
) -> Result<Json<ApiResponse<()>>> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    authorize_category(&service, &user, dto.category_id).await?;

    service.reorder_items(dto).await?;
    Ok(Json(ApiResponse::success(
        None,
        Some("Items reordered successfully".to_string()),
        None,
    )))
}

/// Get an item by ID
#[utoipa::path(
    get,
    path = "/api/menu/items/{id}",
    params(
        ("id" = Uuid, Path, description = "Item ID")
    ),
    responses(
        (status = 200, description = "Item retrieved successfully", body = ApiResponse<ItemResponseDto>),
        (status = 403, description = "Forbidden - not your venue"),
        (status = 404, description = "Item not found")
    ),
    tag = "menu",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_item(
    user: AuthenticatedUser,
    State(service): State<Arc<MenuService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ItemResponseDto>>> {
    authorize_item(&service, &user, id).await?;

    let item = service.get_item_by_id(id).await?;
    Ok(Json(ApiResponse::success(Some(item), None, None)))
}

/// Update an item; a new `category_id` moves it to the end of that category
#[utoipa::path(
    put,
    path = "/api/menu/items/{id}",
    params(
        ("id" = Uuid, Path, description = "Item ID")
    ),
    request_body = UpdateItemDto,
    responses(
        (status = 200, description = "Item updated successfully", body = ApiResponse<ItemResponseDto>),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Forbidden - not your venue"),
        (status = 404, description = "Item or target category not found"),
        (status = 409, description = "Conflicting display order")
    ),
    tag = "menu",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_item(
    user: AuthenticatedUser,
    State(service): State<Arc<MenuService>>,
    Path(id): Path<Uuid>,
    AppJson(dto): AppJson<UpdateItemDto>,
) -> Result<Json<ApiResponse<ItemResponseDto>>> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    authorize_item(&service, &user, id).await?;

    let item = service.update_item(id, dto).await?;
    Ok(Json(ApiResponse::success(
        Some(item),
        Some("Item updated successfully".to_string()),
        None,
    )))
}

/// Toggle whether an item can be ordered
#[utoipa::path(
    patch,
    path = "/api/menu/items/{id}",
    params(
        ("id" = Uuid, Path, description = "Item ID")
    ),
    responses(
        (status = 200, description = "Availability toggled", body = ApiResponse<ItemResponseDto>),
        (status = 403, description = "Forbidden - not your venue"),
        (status = 404, description = "Item not found")
    ),
    tag = "menu",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn toggle_item_availability(
    user: AuthenticatedUser,
    State(service): State<Arc<MenuService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ItemResponseDto>>> {
    authorize_item(&service, &user, id).await?;

    let item = service.toggle_item_availability(id).await?;
    let message = if item.is_available {
        "Item is now available"
    } else {
        "Item is now unavailable"
    };
    Ok(Json(ApiResponse::success(
        Some(item),
        Some(message.to_string()),
        None,
    )))
}

/// Delete an item
#[utoipa::path(
    delete,
    path = "/api/menu/items/{id}",
    params(
        ("id" = Uuid, Path, description = "Item ID")
    ),
    responses(
        (status = 200, description = "Item deleted successfully"),
        (status = 403, description = "Forbidden - not your venue"),
        (status = 404, description = "Item not found")
    ),
    tag = "menu",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_item(
    user: AuthenticatedUser,
    State(service): State<Arc<MenuService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>> {
    authorize_item(&service, &user, id).await?;

    service.delete_item(id).await?;
    Ok(Json(ApiResponse::success(
        None,
        Some("Item deleted successfully".to_string()),
        None,
    )))
}
