//! Wishlists and carts.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::model::{CartItemView, CartView, WishlistItemView, WishlistView};

use super::error::{ApiError, ApiResult};
use super::extract::{CurrentUser, Staff};
use super::state::AppState;

#[derive(Debug, Deserialize)]
pub(super) struct WishlistItemRequest {
    product: i64,
}

#[derive(Debug, Deserialize)]
pub(super) struct CartItemRequest {
    product: i64,
    #[serde(default = "one")]
    quantity: i64,
}

#[derive(Debug, Deserialize)]
pub(super) struct QuantityRequest {
    quantity: i64,
}

const fn one() -> i64 {
    1
}

fn quantity(value: i64) -> ApiResult<u32> {
    u32::try_from(value)
        .ok()
        .filter(|q| *q >= 1)
        .ok_or_else(|| ApiError::bad_field("quantity", "quantity must be at least 1"))
}

// Wishlists

pub(super) async fn list_wishlists(
    State(state): State<AppState>,
    Staff(_): Staff,
) -> ApiResult<Json<Vec<WishlistView>>> {
    Ok(Json(state.db(|storage| storage.list_wishlists())?))
}

pub(super) async fn my_wishlist(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<WishlistView>> {
    Ok(Json(state.db(|storage| storage.wishlist(user.id))?))
}

pub(super) async fn list_wishlist_items(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<Vec<WishlistItemView>>> {
    let wishlist = state.db(|storage| storage.wishlist(user.id))?;
    Ok(Json(wishlist.items))
}

pub(super) async fn add_wishlist_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<WishlistItemRequest>,
) -> ApiResult<(StatusCode, Json<WishlistItemView>)> {
    let item = state.db(|storage| storage.add_to_wishlist(user.id, input.product))?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub(super) async fn remove_wishlist_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.db(|storage| storage.remove_wishlist_item(user.id, id))?;
    Ok(StatusCode::NO_CONTENT)
}

// Carts

pub(super) async fn my_cart(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<CartView>> {
    Ok(Json(state.db(|storage| storage.cart(user.id))?))
}

pub(super) async fn clear_cart(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<StatusCode> {
    state.db(|storage| storage.clear_cart(user.id))?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn list_cart_items(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<Vec<CartItemView>>> {
    let cart = state.db(|storage| storage.cart(user.id))?;
    Ok(Json(cart.items))
}

pub(super) async fn add_cart_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CartItemRequest>,
) -> ApiResult<(StatusCode, Json<CartItemView>)> {
    let qty = quantity(input.quantity)?;
    let item = state.db(|storage| storage.add_to_cart(user.id, input.product, qty))?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub(super) async fn update_cart_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Json(input): Json<QuantityRequest>,
) -> ApiResult<Json<CartItemView>> {
    let qty = quantity(input.quantity)?;
    Ok(Json(
        state.db(|storage| storage.update_cart_item(user.id, id, qty))?,
    ))
}

pub(super) async fn remove_cart_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.db(|storage| storage.remove_cart_item(user.id, id))?;
    Ok(StatusCode::NO_CONTENT)
}
