// handlers/products.rs - /products routes
//
// Writes arrive as multipart forms: text fields plus an `image` file
// (create/update) or up to ten `images` files (gallery).

use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, Multipart, Path, Query, State},
    http::HeaderMap,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::models::{Category, NewProduct, PopulatedProduct, Product};
use crate::error::ApiError;
use crate::handlers::{parse_id, request_host, Message};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::state::AppState;
use crate::uploads::{self, UploadError};

/// Gallery uploads are capped per request
pub const MAX_GALLERY_IMAGES: usize = 10;

#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    /// Comma separated category ids
    pub categories: Option<String>,
}

/// GET /products?categories=id1,id2
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> ApiResult<Vec<PopulatedProduct>> {
    let filter = match query.categories.as_deref() {
        Some(raw) => Some(parse_category_filter(raw)?),
        None => None,
    };

    let products = state.stores.products.list_products(filter).await?;
    let categories: HashMap<Uuid, Category> = state
        .stores
        .categories
        .list_categories()
        .await?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();

    let populated = products
        .into_iter()
        .map(|p| {
            let category = categories.get(&p.category).cloned();
            PopulatedProduct::new(p, category)
        })
        .collect();
    Ok(ApiResponse::success(populated))
}

/// GET /products/:id
pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<PopulatedProduct> {
    let id = parse_id(&id)?;
    let product = state
        .stores
        .products
        .find_product(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;
    let category = state.stores.categories.find_category(product.category).await?;
    Ok(ApiResponse::success(PopulatedProduct::new(product, category)))
}

/// GET /products/get/count
pub async fn count(State(state): State<AppState>) -> ApiResult<Value> {
    let product_count = state.stores.products.count_products().await?;
    Ok(ApiResponse::success(json!({ "productCount": product_count })))
}

/// GET /products/get/featured/:count - a count of 0 returns every featured product
pub async fn featured(State(state): State<AppState>, Path(count): Path<String>) -> ApiResult<Vec<Product>> {
    let limit = count
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|n| *n >= 0)
        .ok_or_else(|| ApiError::bad_request(format!("Invalid count '{}'", count)))?;

    let products = state.stores.products.featured_products(limit).await?;
    Ok(ApiResponse::success(products))
}

/// POST /products
pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Product> {
    user.require_admin()?;
    let form = ProductForm::read(multipart?).await?;

    let image = form
        .single_file("image")
        .ok_or_else(|| ApiError::field_error("image", "No image found in request"))?;
    let mut new_product = form.to_new_product()?;
    ensure_category(&state, new_product.category).await?;

    let host = upload_host(&state, &headers);
    let stored = state.uploads.save(&image.file_name, &image.content_type, &image.bytes).await?;
    let image_url = uploads::public_url(&host, &stored);
    new_product.image = image_url.clone();

    match state.stores.products.insert_product(new_product).await {
        Ok(product) => {
            info!("Created product {} ({})", product.id, product.name);
            Ok(ApiResponse::created(product))
        }
        Err(err) => {
            state.uploads.remove_urls([image_url.as_str()]).await;
            Err(err.into())
        }
    }
}

/// PUT /products/:id - the stored image is kept unless a new one is sent
pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Product> {
    user.require_admin()?;
    let id = parse_id(&id)?;
    let form = ProductForm::read(multipart?).await?;

    let mut changes = form.to_new_product()?;
    ensure_category(&state, changes.category).await?;

    let existing = state
        .stores
        .products
        .find_product(id)
        .await?
        .ok_or_else(|| ApiError::not_found("No product found"))?;

    let replaced_image = match form.single_file("image") {
        Some(image) => {
            let host = upload_host(&state, &headers);
            let stored = state.uploads.save(&image.file_name, &image.content_type, &image.bytes).await?;
            changes.image = uploads::public_url(&host, &stored);
            Some(existing.image)
        }
        None => {
            changes.image = existing.image;
            None
        }
    };

    let product = state
        .stores
        .products
        .update_product(id, changes)
        .await?
        .ok_or_else(|| ApiError::not_found("The product cannot be updated"))?;

    if let Some(old) = replaced_image {
        state.uploads.remove_urls([old.as_str()]).await;
    }
    Ok(ApiResponse::success(product))
}

/// PUT /products/gallery-images/:id - replaces the gallery with the uploaded files
pub async fn gallery(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Product> {
    user.require_admin()?;
    let id = parse_id(&id)?;

    let existing = state
        .stores
        .products
        .find_product(id)
        .await?
        .ok_or_else(|| ApiError::not_found("The product cannot be updated"))?;

    let form = ProductForm::read(multipart?).await?;
    let files: Vec<&FilePart> = form.files_named("images").collect();
    if files.len() > MAX_GALLERY_IMAGES {
        return Err(ApiError::field_error(
            "images",
            format!("At most {} images may be uploaded", MAX_GALLERY_IMAGES),
        ));
    }

    let host = upload_host(&state, &headers);
    let mut urls = Vec::with_capacity(files.len());
    for file in files {
        let stored = state.uploads.save(&file.file_name, &file.content_type, &file.bytes).await?;
        urls.push(uploads::public_url(&host, &stored));
    }

    let product = state
        .stores
        .products
        .set_gallery(id, urls)
        .await?
        .ok_or_else(|| ApiError::not_found("The product cannot be updated"))?;

    let replaced: Vec<&str> = existing.images.iter().map(String::as_str).collect();
    state.uploads.remove_urls(replaced).await;
    Ok(ApiResponse::success(product))
}

/// DELETE /products/:id - also removes the product's stored images
pub async fn delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Message> {
    user.require_admin()?;
    let id = parse_id(&id)?;

    let product = state
        .stores
        .products
        .delete_product(id)
        .await?
        .ok_or_else(|| ApiError::not_found("The product was not found"))?;

    let mut files: Vec<&str> = Vec::with_capacity(product.images.len() + 1);
    files.push(product.image.as_str());
    files.extend(product.images.iter().map(String::as_str));
    state.uploads.remove_urls(files).await;

    info!("Deleted product {}", product.id);
    Ok(ApiResponse::success(Message::new("The product was deleted")))
}

fn parse_category_filter(raw: &str) -> Result<Vec<Uuid>, ApiError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            Uuid::parse_str(s).map_err(|_| ApiError::field_error("categories", format!("Invalid category id '{}'", s)))
        })
        .collect()
}

async fn ensure_category(state: &AppState, id: Uuid) -> Result<(), ApiError> {
    match state.stores.categories.find_category(id).await? {
        Some(_) => Ok(()),
        None => Err(ApiError::field_error("category", "Invalid category")),
    }
}

fn upload_host(state: &AppState, headers: &HeaderMap) -> String {
    let fallback = format!("{}:{}", state.config.api.host, state.config.api.port);
    request_host(headers, &fallback)
}

#[derive(Debug)]
struct FilePart {
    field: String,
    file_name: String,
    content_type: String,
    bytes: Bytes,
}

/// A product multipart body, fully buffered
#[derive(Debug, Default)]
struct ProductForm {
    fields: HashMap<String, String>,
    files: Vec<FilePart>,
}

impl ProductForm {
    /// Files with a type outside the upload map are rejected as soon as
    /// their part header is seen.
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = ProductForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field.content_type().unwrap_or_default().to_string();
                    if uploads::extension_for(&content_type).is_none() {
                        warn!("Rejected upload '{}' of type '{}'", file_name, content_type);
                        return Err(UploadError::InvalidFileType(content_type).into());
                    }
                    let bytes = field.bytes().await?;
                    form.files.push(FilePart {
                        field: name,
                        file_name,
                        content_type,
                        bytes,
                    });
                }
                None => {
                    let value = field.text().await?;
                    form.fields.insert(name, value);
                }
            }
        }

        Ok(form)
    }

    fn text(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
    }

    fn files_named<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a FilePart> + 'a {
        self.files.iter().filter(move |f| f.field == field)
    }

    fn single_file<'a>(&'a self, field: &'a str) -> Option<&'a FilePart> {
        self.files_named(field).next()
    }

    /// Validated product fields; `image` is filled in by the caller
    fn to_new_product(&self) -> Result<NewProduct, ApiError> {
        let mut errors = HashMap::new();
        let mut required = |key: &str| -> String {
            match self.text(key) {
                Some(v) => v.to_string(),
                None => {
                    errors.insert(key.to_string(), "This field is required".to_string());
                    String::new()
                }
            }
        };

        let name = required("name");
        let description = required("description");
        let category_raw = required("category");
        let stock_raw = required("countInStock");

        let category = if category_raw.is_empty() {
            Uuid::nil()
        } else {
            Uuid::parse_str(&category_raw).unwrap_or_else(|_| {
                errors.insert("category".into(), "Invalid category".into());
                Uuid::nil()
            })
        };

        let count_in_stock = if stock_raw.is_empty() {
            0
        } else {
            match stock_raw.parse::<i32>() {
                Ok(n) if (0..=255).contains(&n) => n,
                _ => {
                    errors.insert("countInStock".into(), "Must be an integer between 0 and 255".into());
                    0
                }
            }
        };

        let price = match self.text("price") {
            None => Decimal::ZERO,
            Some(raw) => match Decimal::from_str(raw) {
                Ok(p) if !p.is_sign_negative() => p,
                _ => {
                    errors.insert("price".into(), "Must be a non-negative number".into());
                    Decimal::ZERO
                }
            },
        };

        let rating = match self.text("rating") {
            None => 0.0,
            Some(raw) => raw.parse::<f64>().ok().filter(|r| r.is_finite()).unwrap_or_else(|| {
                errors.insert("rating".into(), "Must be a number".into());
                0.0
            }),
        };

        let num_reviews = match self.text("numReviews").or_else(|| self.text("numOfReviews")) {
            None => 0,
            Some(raw) => raw.parse::<i32>().ok().filter(|n| *n >= 0).unwrap_or_else(|| {
                errors.insert("numReviews".into(), "Must be a non-negative integer".into());
                0
            }),
        };

        let is_featured = match self.text("isFeatured") {
            None => false,
            Some(raw) => parse_flag(raw).unwrap_or_else(|| {
                errors.insert("isFeatured".into(), "Must be true or false".into());
                false
            }),
        };

        if !errors.is_empty() {
            return Err(ApiError::validation_error("Invalid product fields", Some(errors)));
        }

        Ok(NewProduct {
            name,
            description,
            rich_description: self.text("richDescription").unwrap_or_default().to_string(),
            image: String::new(),
            brand: self.text("brand").unwrap_or_default().to_string(),
            price,
            category,
            count_in_stock,
            rating,
            num_reviews,
            is_featured,
        })
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Some(true),
        "false" | "0" | "off" | "no" => Some(false),
        _ => None,
    }
}
