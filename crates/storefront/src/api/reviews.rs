//! Product reviews.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::error::{Error, FoundExt};
use crate::model::{NewReview, ReviewFilter, ReviewPatch, ReviewView};
use crate::storage::ReviewRights;

use super::error::ApiResult;
use super::extract::CurrentUser;
use super::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub(super) struct ReviewParams {
    product: Option<i64>,
    user: Option<i64>,
    min_rating: Option<i64>,
    rating: Option<i64>,
    with_response: Option<bool>,
}

pub(super) async fn list_reviews(
    State(state): State<AppState>,
    Query(params): Query<ReviewParams>,
) -> ApiResult<Json<Vec<ReviewView>>> {
    let filter = ReviewFilter {
        product: params.product,
        user: params.user,
        min_rating: params.min_rating,
        rating: params.rating,
        with_response: params.with_response,
        ..ReviewFilter::default()
    };
    Ok(Json(state.db(|storage| storage.list_reviews(&filter))?))
}

pub(super) async fn create_review(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<NewReview>,
) -> ApiResult<(StatusCode, Json<ReviewView>)> {
    let review = state.db(|storage| storage.create_review(user.id, &input))?;
    Ok((StatusCode::CREATED, Json(review)))
}

pub(super) async fn get_review(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ReviewView>> {
    Ok(Json(state.db(|storage| storage.get_review(id).found("review"))?))
}

pub(super) async fn update_review(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Json(patch): Json<ReviewPatch>,
) -> ApiResult<Json<ReviewView>> {
    let review = state.db(|storage| {
        let current = storage.get_review(id).found("review")?;
        let rights = ReviewRights {
            edit_content: current.user == user.id,
            respond: user.is_staff,
        };
        if !rights.edit_content && !rights.respond {
            return Err(Error::permission_denied("you can only edit your own reviews"));
        }
        storage.update_review(id, &patch, rights)
    })?;
    Ok(Json(review))
}

pub(super) async fn delete_review(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.db(|storage| {
        let current = storage.get_review(id).found("review")?;
        if current.user != user.id && !user.is_staff {
            return Err(Error::permission_denied("you can only delete your own reviews"));
        }
        storage.delete_review(id)
    })?;
    Ok(StatusCode::NO_CONTENT)
}
