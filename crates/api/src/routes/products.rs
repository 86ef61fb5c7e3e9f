//! Catalog route handlers.

use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{info, instrument};

use cartwheel_core::ProductId;

use super::missing;
use crate::db::ProductRepository;
use crate::error::{AppError, Result};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::RequireAdmin;
use crate::models::product::{CategoryCount, NewProduct, Product, ProductFilter, ProductUpdate};
use crate::models::{Page, PageParams};
use crate::services::images::ImageError;
use crate::state::AppState;

/// List products with filtering, sorting and pagination.
///
/// Filter and page parameters share one query string.
#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<ProductFilter>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> Result<Json<Page<Product>>> {
    let (products, total) = ProductRepository::new(state.pool())
        .list(&filter, params)
        .await?;

    Ok(Json(Page::new(products, params, total)))
}

/// Categories with product counts.
pub async fn categories(State(state): State<AppState>) -> Result<Json<Vec<CategoryCount>>> {
    let counts = ProductRepository::new(state.pool())
        .category_counts()
        .await?;
    Ok(Json(counts))
}

/// Product detail.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<Json<Product>> {
    let product = ProductRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;
    Ok(Json(product))
}

/// Create a product.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(body): ApiJson<NewProduct>,
) -> Result<impl IntoResponse> {
    body.validate().map_err(AppError::Validation)?;

    let product = ProductRepository::new(state.pool()).create(&body).await?;

    info!(product_id = %product.id, "Product created");

    Ok((StatusCode::CREATED, Json(product)))
}

/// Partially update a product.
#[instrument(skip_all, fields(admin_id = %admin.id, product_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<ProductId>,
    ApiJson(body): ApiJson<ProductUpdate>,
) -> Result<Json<Product>> {
    body.validate().map_err(AppError::Validation)?;

    let product = ProductRepository::new(state.pool())
        .update(id, &body)
        .await
        .map_err(missing("Product"))?;

    info!("Product updated");

    Ok(Json(product))
}

/// Delete a product.
#[instrument(skip_all, fields(admin_id = %admin.id, product_id = %id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<StatusCode> {
    ProductRepository::new(state.pool())
        .delete(id)
        .await
        .map_err(missing("Product"))?;

    info!("Product deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Upload an image from the multipart `image` field and attach it.
#[instrument(skip_all, fields(admin_id = %admin.id, product_id = %id))]
pub async fn upload_image(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<ProductId>,
    mut multipart: Multipart,
) -> Result<Json<Product>> {
    let uploader = state.images().ok_or(ImageError::NotConfigured)?;
    let products = ProductRepository::new(state.pool());

    // Fail before streaming the upload to Cloudinary
    if products.get_by_id(id).await?.is_none() {
        return Err(AppError::NotFound("Product not found".to_string()));
    }

    let mut file = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        file = Some((file_name, content_type, data.to_vec()));
        break;
    }

    let (file_name, content_type, data) =
        file.ok_or_else(|| AppError::BadRequest("Missing image field".to_string()))?;

    let url = uploader.upload(&file_name, &content_type, data).await?;
    let product = products
        .add_image(id, &url)
        .await
        .map_err(missing("Product"))?;

    info!(url = %url, "Product image added");

    Ok(Json(product))
}
