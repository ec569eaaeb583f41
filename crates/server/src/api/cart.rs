use std::collections::BTreeMap;

use axum::{
    body::Bytes,
    extract::{Path, State},
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use easyshop_core::{ApplicationError, CartLine, Product, ProductId, ShoppingCart};

use super::extract::CartUser;
use super::{parse_body, reject, ApiResult, AppState};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CartLineView {
    pub product: Product,
    pub quantity: i64,
    pub discount_percent: Decimal,
    pub line_total: Decimal,
}

impl From<&CartLine> for CartLineView {
    fn from(line: &CartLine) -> Self {
        Self {
            product: line.product().clone(),
            quantity: line.quantity(),
            discount_percent: line.discount_percent(),
            line_total: line.line_total(),
        }
    }
}

/// Wire shape of a cart: lines keyed by product id plus derived totals.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CartView {
    pub items: BTreeMap<ProductId, CartLineView>,
    pub total: Decimal,
    pub item_count: usize,
    pub total_quantity: i64,
}

impl From<&ShoppingCart> for CartView {
    fn from(cart: &ShoppingCart) -> Self {
        Self {
            items: cart.lines().map(|line| (line.product_id(), CartLineView::from(line))).collect(),
            total: cart.total(),
            item_count: cart.item_count(),
            total_quantity: cart.total_quantity(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct QuantityBody {
    pub quantity: i64,
}

/// `POST` bodies are optional; an empty body adds a single unit.
fn quantity_or_default(body: &Bytes, default: Option<i64>) -> Result<i64, ApplicationError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return default.ok_or_else(|| {
            let message = "request body `{ \"quantity\": n }` is required";
            ApplicationError::InvalidArgument(message.into())
        });
    }
    parse_body::<QuantityBody>(body).map(|parsed| parsed.quantity)
}

pub async fn get_cart(
    State(state): State<AppState>,
    CartUser(user_id): CartUser,
) -> ApiResult<Json<CartView>> {
    let cart = state.cart.get_cart(user_id).await.map_err(|e| reject("cart.get", e))?;
    Ok(Json(CartView::from(&cart)))
}

pub async fn add_item(
    State(state): State<AppState>,
    CartUser(user_id): CartUser,
    Path(product_id): Path<i64>,
    body: Bytes,
) -> ApiResult<Json<CartView>> {
    let quantity = quantity_or_default(&body, Some(1)).map_err(|e| reject("cart.add", e))?;
    let cart = state
        .cart
        .add_item(user_id, ProductId(product_id), quantity)
        .await
        .map_err(|e| reject("cart.add", e))?;
    Ok(Json(CartView::from(&cart)))
}

pub async fn update_quantity(
    State(state): State<AppState>,
    CartUser(user_id): CartUser,
    Path(product_id): Path<i64>,
    body: Bytes,
) -> ApiResult<Json<CartView>> {
    let quantity = quantity_or_default(&body, None).map_err(|e| reject("cart.update", e))?;
    let cart = state
        .cart
        .update_quantity(user_id, ProductId(product_id), quantity)
        .await
        .map_err(|e| reject("cart.update", e))?;
    Ok(Json(CartView::from(&cart)))
}

pub async fn remove_item(
    State(state): State<AppState>,
    CartUser(user_id): CartUser,
    Path(product_id): Path<i64>,
) -> ApiResult<Json<CartView>> {
    let cart = state
        .cart
        .remove_item(user_id, ProductId(product_id))
        .await
        .map_err(|e| reject("cart.remove", e))?;
    Ok(Json(CartView::from(&cart)))
}

pub async fn clear(
    State(state): State<AppState>,
    CartUser(user_id): CartUser,
) -> ApiResult<Json<CartView>> {
    state.cart.clear_cart(user_id).await.map_err(|e| reject("cart.clear", e))?;
    Ok(Json(CartView::from(&ShoppingCart::new())))
}
