//! Categories, brands and tags.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::error::FoundExt;
use crate::model::{
    Brand, BrandPatch, Category, CategoryPatch, CategoryStats, NewBrand, NewCategory, NewTag, Tag,
    TagPatch,
};
use crate::storage::CategoryQuery;

use super::error::ApiResult;
use super::extract::Staff;
use super::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub(super) struct SearchParams {
    search: Option<String>,
    parent: Option<i64>,
}

impl SearchParams {
    fn search(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

// Categories

pub(super) async fn list_categories(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Vec<Category>>> {
    let query = CategoryQuery {
        search: params.search().map(str::to_string),
        parent: params.parent,
        roots_only: false,
    };
    Ok(Json(state.db(|storage| storage.list_categories(&query))?))
}

pub(super) async fn category_stats(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<CategoryStats>>> {
    let stats = state.db(|storage| state.cache.category_stats(|| storage.category_stats()))?;
    Ok(Json(stats))
}

pub(super) async fn create_category(
    State(state): State<AppState>,
    Staff(_): Staff,
    Json(input): Json<NewCategory>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    let category = state.db(|storage| storage.create_category(&input))?;
    state.cache.invalidate();
    Ok((StatusCode::CREATED, Json(category)))
}

pub(super) async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Category>> {
    Ok(Json(
        state.db(|storage| storage.get_category(id).found("category"))?,
    ))
}

pub(super) async fn update_category(
    State(state): State<AppState>,
    Staff(_): Staff,
    Path(id): Path<i64>,
    Json(patch): Json<CategoryPatch>,
) -> ApiResult<Json<Category>> {
    let category = state.db(|storage| storage.update_category(id, &patch))?;
    state.cache.invalidate();
    Ok(Json(category))
}

pub(super) async fn delete_category(
    State(state): State<AppState>,
    Staff(_): Staff,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.db(|storage| storage.delete_category(id))?;
    state.cache.invalidate();
    Ok(StatusCode::NO_CONTENT)
}

// Brands

pub(super) async fn list_brands(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Vec<Brand>>> {
    Ok(Json(
        state.db(|storage| storage.list_brands(params.search()))?,
    ))
}

pub(super) async fn create_brand(
    State(state): State<AppState>,
    Staff(_): Staff,
    Json(input): Json<NewBrand>,
) -> ApiResult<(StatusCode, Json<Brand>)> {
    let brand = state.db(|storage| storage.create_brand(&input))?;
    state.cache.invalidate();
    Ok((StatusCode::CREATED, Json(brand)))
}

pub(super) async fn get_brand(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Brand>> {
    Ok(Json(state.db(|storage| storage.get_brand(id).found("brand"))?))
}

pub(super) async fn update_brand(
    State(state): State<AppState>,
    Staff(_): Staff,
    Path(id): Path<i64>,
    Json(patch): Json<BrandPatch>,
) -> ApiResult<Json<Brand>> {
    let brand = state.db(|storage| storage.update_brand(id, &patch))?;
    state.cache.invalidate();
    Ok(Json(brand))
}

pub(super) async fn delete_brand(
    State(state): State<AppState>,
    Staff(_): Staff,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.db(|storage| storage.delete_brand(id))?;
    state.cache.invalidate();
    Ok(StatusCode::NO_CONTENT)
}

// Tags

pub(super) async fn list_tags(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Vec<Tag>>> {
    Ok(Json(state.db(|storage| storage.list_tags(params.search()))?))
}

pub(super) async fn create_tag(
    State(state): State<AppState>,
    Staff(_): Staff,
    Json(input): Json<NewTag>,
) -> ApiResult<(StatusCode, Json<Tag>)> {
    let tag = state.db(|storage| storage.create_tag(&input))?;
    Ok((StatusCode::CREATED, Json(tag)))
}

pub(super) async fn get_tag(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Tag>> {
    Ok(Json(state.db(|storage| storage.get_tag(id).found("tag"))?))
}

pub(super) async fn update_tag(
    State(state): State<AppState>,
    Staff(_): Staff,
    Path(id): Path<i64>,
    Json(patch): Json<TagPatch>,
) -> ApiResult<Json<Tag>> {
    Ok(Json(state.db(|storage| storage.update_tag(id, &patch))?))
}

pub(super) async fn delete_tag(
    State(state): State<AppState>,
    Staff(_): Staff,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.db(|storage| storage.delete_tag(id))?;
    Ok(StatusCode::NO_CONTENT)
}
