use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use easyshop_core::{Category, CategoryDraft, CategoryId, Product};

use super::extract::AdminGuard;
use super::{parse_body, reject, ApiResult, AppState};

pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<Category>>> {
    let categories =
        state.catalog.list_categories().await.map_err(|e| reject("categories.list", e))?;
    Ok(Json(categories))
}

pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Category>> {
    let category =
        state.catalog.get_category(CategoryId(id)).await.map_err(|e| reject("categories.get", e))?;
    Ok(Json(category))
}

pub async fn products(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<Product>>> {
    let products = state
        .catalog
        .products_in_category(CategoryId(id))
        .await
        .map_err(|e| reject("categories.products", e))?;
    Ok(Json(products))
}

pub async fn create(
    _admin: AdminGuard,
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<Category>)> {
    let draft: CategoryDraft = parse_body(&body).map_err(|e| reject("categories.create", e))?;
    let category =
        state.catalog.create_category(draft).await.map_err(|e| reject("categories.create", e))?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update(
    _admin: AdminGuard,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Bytes,
) -> ApiResult<Json<Category>> {
    let draft: CategoryDraft = parse_body(&body).map_err(|e| reject("categories.update", e))?;
    let category = state
        .catalog
        .update_category(CategoryId(id), draft)
        .await
        .map_err(|e| reject("categories.update", e))?;
    Ok(Json(category))
}

/// Refused with 409 while any product still belongs to the category.
pub async fn delete(
    _admin: AdminGuard,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state
        .catalog
        .delete_category(CategoryId(id))
        .await
        .map_err(|e| reject("categories.delete", e))?;
    Ok(StatusCode::NO_CONTENT)
}
