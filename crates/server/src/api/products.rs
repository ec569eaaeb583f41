use std::str::FromStr;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;

use easyshop_core::{ApplicationError, CategoryId, Product, ProductDraft, ProductId, SearchCriteria};

use super::extract::AdminGuard;
use super::{parse_body, reject, ApiResult, AppState};

/// Raw query string of `GET /products`. Empty values count as absent.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub cat: Option<String>,
    #[serde(rename = "minPrice")]
    pub min_price: Option<String>,
    #[serde(rename = "maxPrice")]
    pub max_price: Option<String>,
    pub color: Option<String>,
}

impl SearchParams {
    pub fn into_criteria(self) -> Result<SearchCriteria, ApplicationError> {
        let category_id = present(self.cat)
            .map(|raw| {
                raw.parse::<i64>().map(CategoryId).map_err(|_| {
                    let message = format!("cat must be an integer, got `{raw}`");
                    ApplicationError::InvalidArgument(message)
                })
            })
            .transpose()?;

        Ok(SearchCriteria {
            category_id,
            min_price: parse_price("minPrice", self.min_price)?,
            max_price: parse_price("maxPrice", self.max_price)?,
            color: present(self.color),
        })
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.map(|raw| raw.trim().to_string()).filter(|raw| !raw.is_empty())
}

fn parse_price(name: &str, value: Option<String>) -> Result<Option<Decimal>, ApplicationError> {
    present(value)
        .map(|raw| {
            Decimal::from_str(&raw).map_err(|_| {
                ApplicationError::InvalidArgument(format!("{name} must be a decimal, got `{raw}`"))
            })
        })
        .transpose()
}

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Vec<Product>>> {
    let criteria = params.into_criteria().map_err(|e| reject("products.search", e))?;
    let products = state.catalog.search(criteria).await.map_err(|e| reject("products.search", e))?;
    Ok(Json(products))
}

pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Product>> {
    let product =
        state.catalog.get_product(ProductId(id)).await.map_err(|e| reject("products.get", e))?;
    Ok(Json(product))
}

pub async fn create(
    _admin: AdminGuard,
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<Product>)> {
    let draft: ProductDraft = parse_body(&body).map_err(|e| reject("products.create", e))?;
    let product =
        state.catalog.create_product(draft).await.map_err(|e| reject("products.create", e))?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update(
    _admin: AdminGuard,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Bytes,
) -> ApiResult<Json<Product>> {
    let draft: ProductDraft = parse_body(&body).map_err(|e| reject("products.update", e))?;
    let product = state
        .catalog
        .update_product(ProductId(id), draft)
        .await
        .map_err(|e| reject("products.update", e))?;
    Ok(Json(product))
}

pub async fn delete(
    _admin: AdminGuard,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.catalog.delete_product(ProductId(id)).await.map_err(|e| reject("products.delete", e))?;
    Ok(StatusCode::NO_CONTENT)
}
