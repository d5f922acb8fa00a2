//! Products, their images, files and tags.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, FoundExt};
use crate::invoice::content_disposition;
use crate::media::{PRODUCT_FILES, PRODUCT_IMAGES};
use crate::money::Money;
use crate::model::{
    FeaturedProduct, NewProduct, NewProductFile, NewProductImage, ProductDetail, ProductFile,
    ProductFilter, ProductImage, ProductImagePatch, ProductPatch, ProductSummary, ProductTag,
    ProductTagInput,
};

use super::error::ApiResult;
use super::extract::{MaybeUser, Staff};
use super::state::AppState;
use super::upload::UploadForm;

/// Raw product list query; values are parsed into a [`ProductFilter`].
#[derive(Debug, Default, Deserialize)]
pub(super) struct ProductParams {
    category: Option<String>,
    brand: Option<String>,
    search: Option<String>,
    min_price: Option<String>,
    max_price: Option<String>,
    featured: Option<bool>,
    available: Option<bool>,
    min_rating: Option<f64>,
    stock: Option<String>,
    ordering: Option<String>,
    limit: Option<usize>,
    offset: Option<usize>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ProductParams {
    fn into_filter(self, staff: bool, low_stock_threshold: i64) -> crate::Result<ProductFilter> {
        let price = |field: &'static str, raw: Option<String>| {
            non_blank(raw)
                .map(|v| {
                    v.parse::<Money>()
                        .map_err(|_| Error::field(field, format!("invalid amount: {v}")))
                })
                .transpose()
        };
        Ok(ProductFilter {
            category_slug: non_blank(self.category),
            brand_slug: non_blank(self.brand),
            search: non_blank(self.search),
            min_price: price("min_price", self.min_price)?,
            max_price: price("max_price", self.max_price)?,
            featured: self.featured,
            available: if staff { self.available } else { Some(true) },
            min_rating: self.min_rating,
            stock: non_blank(self.stock).map(|s| s.parse()).transpose()?,
            low_stock_threshold: Some(low_stock_threshold),
            ordering: non_blank(self.ordering)
                .map(|s| s.parse())
                .transpose()?
                .unwrap_or_default(),
            limit: self.limit,
            offset: self.offset,
        })
    }
}

/// Hide unavailable products from everyone but staff.
fn visible(detail: ProductDetail, staff: bool) -> crate::Result<ProductDetail> {
    if detail.summary.is_available || staff {
        Ok(detail)
    } else {
        Err(Error::not_found("product"))
    }
}

pub(super) async fn list_products(
    State(state): State<AppState>,
    caller: MaybeUser,
    Query(params): Query<ProductParams>,
) -> ApiResult<Json<Vec<ProductSummary>>> {
    let filter = params.into_filter(
        caller.is_staff(),
        state.config.catalog.low_stock_threshold,
    )?;
    debug!(?filter, "Listing products");
    Ok(Json(state.db(|storage| storage.list_products(&filter))?))
}

pub(super) async fn featured_products(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<FeaturedProduct>>> {
    let featured = state.db(|storage| state.cache.featured(|| storage.featured_summary()))?;
    Ok(Json(featured))
}

pub(super) async fn get_product(
    State(state): State<AppState>,
    caller: MaybeUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<ProductDetail>> {
    let detail = state.db(|storage| storage.get_product(id).found("product"))?;
    Ok(Json(visible(detail, caller.is_staff())?))
}

pub(super) async fn product_by_slug(
    State(state): State<AppState>,
    caller: MaybeUser,
    Path(slug): Path<String>,
) -> ApiResult<Json<ProductDetail>> {
    let detail = state.db(|storage| storage.product_by_slug(&slug).found("product"))?;
    Ok(Json(visible(detail, caller.is_staff())?))
}

pub(super) async fn create_product(
    State(state): State<AppState>,
    Staff(_): Staff,
    Json(input): Json<NewProduct>,
) -> ApiResult<(StatusCode, Json<ProductDetail>)> {
    let product = state.db(|storage| storage.create_product(&input))?;
    state.cache.invalidate();
    Ok((StatusCode::CREATED, Json(product)))
}

pub(super) async fn update_product(
    State(state): State<AppState>,
    Staff(_): Staff,
    Path(id): Path<i64>,
    Json(patch): Json<ProductPatch>,
) -> ApiResult<Json<ProductDetail>> {
    let product = state.db(|storage| storage.update_product(id, &patch))?;
    state.cache.invalidate();
    Ok(Json(product))
}

pub(super) async fn delete_product(
    State(state): State<AppState>,
    Staff(_): Staff,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.db(|storage| storage.delete_product(id))?;
    state.cache.invalidate();
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn tag_product(
    State(state): State<AppState>,
    Staff(user): Staff,
    Path(id): Path<i64>,
    Json(input): Json<ProductTagInput>,
) -> ApiResult<(StatusCode, Json<ProductTag>)> {
    let tag = state.db(|storage| storage.tag_product(id, &input, Some(user.id)))?;
    Ok((StatusCode::CREATED, Json(tag)))
}

pub(super) async fn untag_product(
    State(state): State<AppState>,
    Staff(_): Staff,
    Path((id, tag_id)): Path<(i64, i64)>,
) -> ApiResult<StatusCode> {
    state.db(|storage| storage.untag_product(id, tag_id))?;
    Ok(StatusCode::NO_CONTENT)
}

// Images

#[derive(Debug, Default, Deserialize)]
pub(super) struct ProductParam {
    product: Option<i64>,
}

pub(super) async fn list_images(
    State(state): State<AppState>,
    Query(params): Query<ProductParam>,
) -> ApiResult<Json<Vec<ProductImage>>> {
    Ok(Json(
        state.db(|storage| storage.list_images(params.product))?,
    ))
}

pub(super) async fn upload_image(
    State(state): State<AppState>,
    Staff(_): Staff,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<ProductImage>)> {
    let mut form = UploadForm::read(multipart, "image").await?;
    let product = form.integer("product")?;
    let order = form.integer_or("order", 0)?;
    let file = form.take_file("image")?;
    let stored = state
        .media
        .save(PRODUCT_IMAGES, &file.file_name, &file.bytes)?;

    let input = NewProductImage {
        product,
        image: stored.clone(),
        is_primary: form.flag("is_primary"),
        order,
    };
    match state.db(|storage| storage.add_image(&input)) {
        Ok(image) => {
            state.cache.invalidate();
            Ok((StatusCode::CREATED, Json(image)))
        }
        Err(err) => {
            state.media.remove(&stored);
            Err(err)
        }
    }
}

pub(super) async fn get_image(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ProductImage>> {
    Ok(Json(
        state.db(|storage| storage.get_image(id).found("product image"))?,
    ))
}

pub(super) async fn update_image(
    State(state): State<AppState>,
    Staff(_): Staff,
    Path(id): Path<i64>,
    Json(patch): Json<ProductImagePatch>,
) -> ApiResult<Json<ProductImage>> {
    let image = state.db(|storage| storage.update_image(id, &patch))?;
    state.cache.invalidate();
    Ok(Json(image))
}

pub(super) async fn delete_image(
    State(state): State<AppState>,
    Staff(_): Staff,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let image = state.db(|storage| storage.delete_image(id))?;
    state.media.remove(&image.image);
    state.cache.invalidate();
    Ok(StatusCode::NO_CONTENT)
}

// Files

pub(super) async fn list_files(
    State(state): State<AppState>,
    Query(params): Query<ProductParam>,
) -> ApiResult<Json<Vec<ProductFile>>> {
    Ok(Json(state.db(|storage| storage.list_files(params.product))?))
}

pub(super) async fn upload_file(
    State(state): State<AppState>,
    Staff(_): Staff,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<ProductFile>)> {
    let mut form = UploadForm::read(multipart, "file").await?;
    let product = form.integer("product")?;
    let file = form.take_file("file")?;
    let stored = state
        .media
        .save(PRODUCT_FILES, &file.file_name, &file.bytes)?;

    let input = NewProductFile {
        product,
        file: stored.clone(),
        file_type: form.text("file_type").unwrap_or_default().to_string(),
        name: form
            .text("name")
            .map_or_else(|| file.file_name.clone(), str::to_string),
        description: form.text("description").map(str::to_string),
        size: i64::try_from(file.bytes.len()).unwrap_or(i64::MAX),
    };
    match state.db(|storage| storage.add_file(&input)) {
        Ok(created) => Ok((StatusCode::CREATED, Json(created))),
        Err(err) => {
            state.media.remove(&stored);
            Err(err)
        }
    }
}

pub(super) async fn get_file(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ProductFile>> {
    Ok(Json(
        state.db(|storage| storage.get_file(id).found("product file"))?,
    ))
}

pub(super) async fn delete_file(
    State(state): State<AppState>,
    Staff(_): Staff,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let file = state.db(|storage| storage.delete_file(id))?;
    state.media.remove(&file.file);
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn download_file(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let file = state.db(|storage| storage.get_file(id).found("product file"))?;
    let bytes = state.media.read(&file.file)?;
    state.db(|storage| storage.record_download(id))?;

    let filename = file
        .file
        .rsplit('/')
        .next()
        .unwrap_or(file.name.as_str())
        .to_string();
    Ok((
        [
            (CONTENT_TYPE, "application/octet-stream".to_string()),
            (CONTENT_DISPOSITION, content_disposition(&filename)),
        ],
        bytes,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ProductOrdering, StockLevel};

    #[test]
    fn test_non_staff_only_sees_available() {
        let params = ProductParams {
            available: Some(false),
            ..ProductParams::default()
        };
        let filter = params.into_filter(false, 10).unwrap();
        assert_eq!(filter.available, Some(true));
    }

    #[test]
    fn test_staff_filter_passes_through() {
        let params = ProductParams {
            available: Some(false),
            min_price: Some("10.50".to_string()),
            stock: Some("low_stock".to_string()),
            ordering: Some("-price".to_string()),
            category: Some("  ".to_string()),
            ..ProductParams::default()
        };
        let filter = params.into_filter(true, 5).unwrap();
        assert_eq!(filter.available, Some(false));
        assert_eq!(filter.min_price, Some(Money::from_minor(1050)));
        assert_eq!(filter.stock, Some(StockLevel::LowStock));
        assert_eq!(filter.ordering, ProductOrdering::PriceDesc);
        assert_eq!(filter.low_stock_threshold, Some(5));
        assert_eq!(filter.category_slug, None);
    }

    #[test]
    fn test_bad_values_name_the_field() {
        let params = ProductParams {
            max_price: Some("cheap".to_string()),
            ..ProductParams::default()
        };
        let err = params.into_filter(true, 10).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("cheap"));

        let params = ProductParams {
            ordering: Some("popularity".to_string()),
            ..ProductParams::default()
        };
        assert!(params.into_filter(true, 10).is_err());
    }
}
