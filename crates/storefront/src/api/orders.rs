//! Checkout, order history and invoices.

use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use tracing::info;

use crate::error::{Error, FoundExt};
use crate::invoice::{content_disposition, render_order_invoice};
use crate::model::{NewOrder, OrderFilter, OrderItemView, OrderStatus, OrderView, User};

use super::error::ApiResult;
use super::extract::{CurrentUser, Staff};
use super::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub(super) struct OrderParams {
    status: Option<String>,
    recent_days: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct OrderItemParams {
    order: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct StatusRequest {
    status: String,
}

/// Owners see their own orders, staff see all; others get a 404.
fn check_access(order: &OrderView, user: &User) -> crate::Result<()> {
    if order.user == user.id || user.is_staff {
        Ok(())
    } else {
        Err(Error::not_found("order"))
    }
}

pub(super) async fn list_orders(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<OrderParams>,
) -> ApiResult<Json<Vec<OrderView>>> {
    let status = params
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<OrderStatus>)
        .transpose()?;
    let filter = OrderFilter {
        user: (!user.is_staff).then_some(user.id),
        status,
        recent_days: params.recent_days,
        limit: None,
    };
    Ok(Json(state.db(|storage| storage.list_orders(&filter))?))
}

pub(super) async fn checkout(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<NewOrder>,
) -> ApiResult<(StatusCode, Json<OrderView>)> {
    let order = state.db(|storage| storage.checkout(user.id, &input))?;
    state.cache.invalidate();
    Ok((StatusCode::CREATED, Json(order)))
}

pub(super) async fn get_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<OrderView>> {
    let order = state.db(|storage| storage.get_order(id).found("order"))?;
    check_access(&order, &user)?;
    Ok(Json(order))
}

pub(super) async fn order_by_number(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(number): Path<String>,
) -> ApiResult<Json<OrderView>> {
    let order = state.db(|storage| storage.order_by_number(&number).found("order"))?;
    check_access(&order, &user)?;
    Ok(Json(order))
}

pub(super) async fn cancel_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<OrderView>> {
    Ok(Json(state.db(|storage| storage.cancel_order(user.id, id))?))
}

pub(super) async fn set_status(
    State(state): State<AppState>,
    Staff(staff): Staff,
    Path(id): Path<i64>,
    Json(input): Json<StatusRequest>,
) -> ApiResult<Json<OrderView>> {
    let status: OrderStatus = input.status.parse()?;
    let order = state.db(|storage| storage.set_order_status(id, status))?;
    info!(order_id = id, %status, staff = %staff.username, "Order status changed");
    Ok(Json(order))
}

pub(super) async fn list_order_items(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<OrderItemParams>,
) -> ApiResult<Json<Vec<OrderItemView>>> {
    let items = state.db(|storage| match params.order {
        Some(order_id) => {
            let order = storage.get_order(order_id).found("order")?;
            check_access(&order, &user)?;
            Ok(order.items)
        }
        None => Ok(storage
            .orders_for_user(user.id)?
            .into_iter()
            .flat_map(|order| order.items)
            .collect()),
    })?;
    Ok(Json(items))
}

fn invoice_response(state: &AppState, id: i64) -> ApiResult<impl IntoResponse> {
    let invoice = state.db(|storage| render_order_invoice(storage, id, &state.config.invoice))?;
    Ok((
        [
            (CONTENT_TYPE, "application/pdf".to_string()),
            (CONTENT_DISPOSITION, content_disposition(&invoice.filename)),
        ],
        invoice.pdf,
    ))
}

pub(super) async fn order_invoice(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let order = state.db(|storage| storage.get_order(id).found("order"))?;
    check_access(&order, &user)?;
    invoice_response(&state, id)
}

pub(super) async fn admin_order_pdf(
    State(state): State<AppState>,
    Staff(_): Staff,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    invoice_response(&state, id)
}
