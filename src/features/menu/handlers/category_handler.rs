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
use crate::features::menu::access::{authorize_category, authorize_venue};
use crate::features::menu::dtos::{
    CategoryDetailDto, CategoryResponseDto, CategoryTreeDto, CategoryTreeQuery,
    CreateCategoryDto, DeleteCategoryQuery, ReorderCategoriesDto, UpdateCategoryDto,
};
use crate::features::menu::services::MenuService;
use crate::shared::types::{ApiResponse, Meta};

/// Get the category tree of a venue, with items
#[utoipa::path(
    get,
    path = "/api/menu/categories",
    params(CategoryTreeQuery),
    responses(
        (status = 200, description = "Category tree retrieved successfully", body = ApiResponse<Vec<CategoryTreeDto>>),
        (status = 403, description = "Forbidden - not your venue"),
        (status = 404, description = "Venue not found")
    ),
    tag = "menu",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_categories(
    user: AuthenticatedUser,
    State(service): State<Arc<MenuService>>,
    Query(query): Query<CategoryTreeQuery>,
) -> Result<Json<ApiResponse<Vec<CategoryTreeDto>>>> {
    authorize_venue(&service, &user, query.venue_id).await?;

    let tree = service.get_categories_tree(query.venue_id).await?;
    let total = tree.len() as i64;
    Ok(Json(ApiResponse::success(
        Some(tree),
        None,
        Some(Meta { total }),
    )))
}

/// Create a category at the end of its sibling group
#[utoipa::path(
    post,
    path = "/api/menu/categories",
    request_body = CreateCategoryDto,
    responses(
        (status = 201, description = "Category created successfully", body = ApiResponse<CategoryResponseDto>),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Forbidden - not your venue"),
        (status = 404, description = "Venue or parent category not found")
    ),
    tag = "menu",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_category(
    user: AuthenticatedUser,
    State(service): State<Arc<MenuService>>,
    AppJson(dto): AppJson<CreateCategoryDto>,
) -> Result<(StatusCode, Json<ApiResponse<CategoryResponseDto>>)> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    authorize_venue(&service, &user, dto.venue_id).await?;

    let category = service.create_category(dto).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            Some(category),
            Some("Category created successfully".to_string()),
            None,
        )),
    ))
}

/// Reorder one sibling group of categories
#[utoipa::path(
    put,
    path = "/api/menu/categories/reorder",
    request_body = ReorderCategoriesDto,
    responses(
        (status = 200, description = "Categories reordered successfully"),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Forbidden - not your venue"),
        (status = 404, description = "Venue or category not found")
    ),
    tag = "menu",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn reorder_categories(
    user: AuthenticatedUser,
    State(service): State<Arc<MenuService>>,
    AppJson(dto): AppJson<ReorderCategoriesDto>,
) -> Result<Json<ApiResponse<()>>> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    authorize_venue(&service, &user, dto.venue_id).await?;

    service.reorder_categories(dto).await?;
    Ok(Json(ApiResponse::success(
        None,
        Some("Categories reordered successfully".to_string()),
        None,
    )))
}

/// Get a category with its items
#[utoipa::path(
    get,
    path = "/api/menu/categories/{id}",
    params(
        ("id" = Uuid, Path, description = "Category ID")
    ),
    responses(
        (status = 200, description = "Category retrieved successfully", body = ApiResponse<CategoryDetailDto>),
        (status = 403, description = "Forbidden - not your venue"),
        (status = 404, description = "Category not found")
    ),
    tag = "menu",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_category(
    user: AuthenticatedUser,
    State(service): State<Arc<MenuService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<CategoryDetailDto>>> {
    authorize_category(&service, &user, id).await?;

    let category = service.get_category_by_id(id).await?;
    Ok(Json(ApiResponse::success(Some(category), None, None)))
}

/// Update a category; a new `parent_id` moves it within the tree
#[utoipa::path(
    put,
    path = "/api/menu/categories/{id}",
    params(
        ("id" = Uuid, Path, description = "Category ID")
    ),
    request_body = UpdateCategoryDto,
    responses(
        (status = 200, description = "Category updated successfully", body = ApiResponse<CategoryResponseDto>),
        (status = 400, description = "Validation error or circular reference"),
        (status = 403, description = "Forbidden - not your venue"),
        (status = 404, description = "Category not found"),
        (status = 409, description = "Conflicting display order")
    ),
    tag = "menu",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_category(
    user: AuthenticatedUser,
    State(service): State<Arc<MenuService>>,
    Path(id): Path<Uuid>,
    AppJson(dto): AppJson<UpdateCategoryDto>,
) -> Result<Json<ApiResponse<CategoryResponseDto>>> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    authorize_category(&service, &user, id).await?;

    let category = service.update_category(id, dto).await?;
    Ok(Json(ApiResponse::success(
        Some(category),
        Some("Category updated successfully".to_string()),
        None,
    )))
}

/// Delete a category
///
/// `strategy=cascade` (default) removes sub-categories and items as well;
/// `strategy=move` re-homes them under `target_category_id` first.
#[utoipa::path(
    delete,
    path = "/api/menu/categories/{id}",
    params(
        ("id" = Uuid, Path, description = "Category ID"),
        DeleteCategoryQuery
    ),
    responses(
        (status = 200, description = "Category deleted successfully"),
        (status = 400, description = "Last category, missing target or circular target"),
        (status = 403, description = "Forbidden - not your venue"),
        (status = 404, description = "Category or target not found")
    ),
    tag = "menu",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_category(
    user: AuthenticatedUser,
    State(service): State<Arc<MenuService>>,
    Path(id): Path<Uuid>,
    Query(query): Query<DeleteCategoryQuery>,
) -> Result<Json<ApiResponse<()>>> {
    authorize_category(&service, &user, id).await?;

    service.delete_category(id, query).await?;
    Ok(Json(ApiResponse::success(
        None,
        Some("Category deleted successfully".to_string()),
        None,
    )))
}
