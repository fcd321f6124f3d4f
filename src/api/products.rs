// src/api/products.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, delete, get, post, put, web};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::api::auth::AuthUser;
use crate::checkout::{MAX_PRICE, discount_price};
use crate::db::{self, ProductFilter, ProductSort, Showcase};
use crate::error::{ApiError, ApiResult};
use crate::models::{Category, MetalType, Product, ProductVariant};
use crate::response::{message, ok, ok_with, paginated, Page};
use crate::slug::slugify;
use crate::AppState;

const DEFAULT_LIMIT: i64 = 12;
const SHOWCASE_LIMIT: i64 = 8;
const SEARCH_LIMIT: i64 = 20;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ProductListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub metal_type: Option<MetalType>,
    pub category_id: Option<Uuid>,
    /// Lower bound on base price
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub purity: Option<String>,
    /// Case-insensitive match on name, description and tags
    pub search: Option<String>,
    pub is_featured: Option<bool>,
    /// price | name | rating | newest
    pub sort_by: Option<String>,
    /// asc | desc
    pub sort_order: Option<String>,
}

impl ProductListQuery {
    pub fn filter(&self, include_inactive: bool) -> ProductFilter {
        let non_empty = |v: &Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(String::from);
        ProductFilter {
            include_inactive,
            metal_type: self.metal_type,
            category_id: self.category_id,
            min_price: self.min_price.filter(|p| *p > Decimal::ZERO),
            max_price: self.max_price.filter(|p| *p > Decimal::ZERO),
            purity: non_empty(&self.purity),
            search: non_empty(&self.search),
            featured_only: self.is_featured == Some(true),
            sort: self.sort_by.as_deref().and_then(ProductSort::parse).unwrap_or_default(),
            ascending: self.sort_order.as_deref() == Some("asc"),
        }
    }

    pub fn page(&self) -> Page {
        Page::resolve(self.page, self.limit, DEFAULT_LIMIT)
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/products",
    tag = "products",
    params(ProductListQuery),
    responses((status = 200, description = "Paginated active products"))
)]
#[get("/products")]
pub async fn list_products(state: web::Data<AppState>, query: web::Query<ProductListQuery>) -> ApiResult<HttpResponse> {
    let page = query.page();
    let filter = query.filter(false);
    let (products, total) = db::list_products(&state.pool, &filter, &page).await?;
    Ok(paginated(products, &page, total))
}

#[utoipa::path(get, path = "/api/products/featured", tag = "products",
    responses((status = 200, description = "Up to 8 featured products", body = [Product])))]
#[get("/products/featured")]
pub async fn featured_products(state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    Ok(ok(db::list_showcase(&state.pool, Showcase::Featured, SHOWCASE_LIMIT).await?))
}

#[utoipa::path(get, path = "/api/products/new-arrivals", tag = "products",
    responses((status = 200, description = "Up to 8 new arrivals", body = [Product])))]
#[get("/products/new-arrivals")]
pub async fn new_arrivals(state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    Ok(ok(db::list_showcase(&state.pool, Showcase::NewArrivals, SHOWCASE_LIMIT).await?))
}

#[utoipa::path(get, path = "/api/products/best-sellers", tag = "products",
    responses((status = 200, description = "Up to 8 best sellers", body = [Product])))]
#[get("/products/best-sellers")]
pub async fn best_sellers(state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    Ok(ok(db::list_showcase(&state.pool, Showcase::BestSellers, SHOWCASE_LIMIT).await?))
}

#[utoipa::path(
    get,
    path = "/api/products/search",
    tag = "products",
    params(SearchQuery),
    responses(
        (status = 200, description = "Up to 20 matches", body = [Product]),
        (status = 400, description = "Missing query")
    )
)]
#[get("/products/search")]
pub async fn search_products(state: web::Data<AppState>, query: web::Query<SearchQuery>) -> ApiResult<HttpResponse> {
    let term = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::validation("Search query is required"))?;
    Ok(ok(db::search_products(&state.pool, term, SEARCH_LIMIT).await?))
}

/// Resolves a path segment that is either a product id or a slug.
pub async fn find_by_id_or_slug(state: &AppState, id_or_slug: &str) -> ApiResult<Option<Product>> {
    Ok(match Uuid::parse_str(id_or_slug) {
        Ok(id) => db::find_product(&state.pool, id).await?,
        Err(_) => db::find_product_by_slug(&state.pool, id_or_slug).await?,
    })
}

#[utoipa::path(
    get,
    path = "/api/products/{id}",
    tag = "products",
    params(("id" = String, Path, description = "Product id or slug")),
    responses(
        (status = 200, description = "Product", body = Product),
        (status = 404, description = "Product not found")
    )
)]
#[get("/products/{id}")]
pub async fn get_product(state: web::Data<AppState>, path: web::Path<String>) -> ApiResult<HttpResponse> {
    let product = find_by_id_or_slug(&state, &path)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| ApiError::not_found("Product not found"))?;
    Ok(ok(product))
}

// ---------------------------------------------------------------------------
// admin

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "description is required"))]
    pub description: String,
    #[serde(default)]
    pub short_desc: String,
    pub metal_type: MetalType,
    #[validate(length(min = 1, message = "purity is required"))]
    pub purity: String,
    pub category_id: Uuid,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub thumbnail: String,
    pub base_price: Decimal,
    #[serde(default)]
    pub discount_percent: Decimal,
    #[serde(default)]
    pub variants: Vec<ProductVariant>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub is_new_arrival: bool,
    #[serde(default)]
    pub is_best_seller: bool,
    #[serde(default)]
    pub stock: i32,
}

/// Every field is optional; absent fields keep their stored value.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub short_desc: Option<String>,
    pub metal_type: Option<MetalType>,
    pub purity: Option<String>,
    pub category_id: Option<Uuid>,
    pub images: Option<Vec<String>>,
    pub thumbnail: Option<String>,
    pub base_price: Option<Decimal>,
    pub discount_percent: Option<Decimal>,
    pub variants: Option<Vec<ProductVariant>>,
    pub tags: Option<Vec<String>>,
    pub features: Option<Vec<String>>,
    pub is_featured: Option<bool>,
    pub is_new_arrival: Option<bool>,
    pub is_best_seller: Option<bool>,
    pub is_active: Option<bool>,
    pub stock: Option<i32>,
}

fn check_pricing(base_price: Decimal, discount_percent: Decimal, stock: i32, variants: &[ProductVariant]) -> ApiResult<()> {
    if base_price < Decimal::ZERO {
        return Err(ApiError::validation("basePrice must not be negative"));
    }
    if base_price > MAX_PRICE {
        return Err(ApiError::validation("basePrice must not exceed 999999999999.99"));
    }
    if discount_percent < Decimal::ZERO || discount_percent > Decimal::ONE_HUNDRED {
        return Err(ApiError::validation("discountPercent must be between 0 and 100"));
    }
    if stock < 0 {
        return Err(ApiError::validation("stock must not be negative"));
    }
    if variants.iter().any(|v| v.price < Decimal::ZERO || v.stock < 0) {
        return Err(ApiError::validation("variant price and stock must not be negative"));
    }
    if variants.iter().any(|v| v.price > MAX_PRICE) {
        return Err(ApiError::validation("variant price must not exceed 999999999999.99"));
    }
    Ok(())
}

fn assign_variant_ids(variants: &mut [ProductVariant]) {
    for variant in variants.iter_mut().filter(|v| v.id.is_none()) {
        variant.id = Some(Uuid::new_v4());
    }
}

/// A product may only point at a category that exists.
async fn category_for(state: &AppState, id: Uuid) -> ApiResult<Category> {
    db::find_category(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::validation("Category not found"))
}

impl CreateProductRequest {
    pub fn into_product(self, category: &Category, seller_id: Uuid, now: DateTime<Utc>) -> Product {
        let mut variants = self.variants;
        assign_variant_ids(&mut variants);
        Product {
            id: Uuid::new_v4(),
            slug: slugify(&self.name),
            name: self.name,
            description: self.description,
            short_desc: self.short_desc,
            metal_type: self.metal_type,
            purity: self.purity,
            category_id: category.id,
            category_name: category.name.clone(),
            images: self.images,
            thumbnail: self.thumbnail,
            discount_price: discount_price(self.base_price, self.discount_percent),
            base_price: self.base_price,
            discount_percent: self.discount_percent,
            variants,
            tags: self.tags,
            features: self.features,
            is_featured: self.is_featured,
            is_new_arrival: self.is_new_arrival,
            is_best_seller: self.is_best_seller,
            is_active: true,
            stock: self.stock,
            rating: 0.0,
            review_count: 0,
            seller_id: Some(seller_id),
            created_at: now,
            updated_at: now,
        }
    }
}

impl UpdateProductRequest {
    /// Applies the present fields. The discount price is recomputed from the
    /// resulting base price and percent whenever either changes.
    pub fn apply(self, product: &mut Product, category: Option<&Category>, now: DateTime<Utc>) {
        if let Some(name) = self.name.filter(|n| !n.trim().is_empty()) {
            product.slug = slugify(&name);
            product.name = name;
        }
        if let Some(description) = self.description {
            product.description = description;
        }
        if let Some(short_desc) = self.short_desc {
            product.short_desc = short_desc;
        }
        if let Some(metal_type) = self.metal_type {
            product.metal_type = metal_type;
        }
        if let Some(purity) = self.purity {
            product.purity = purity;
        }
        if let Some(category) = category {
            product.category_id = category.id;
            product.category_name = category.name.clone();
        }
        if let Some(images) = self.images {
            product.images = images;
        }
        if let Some(thumbnail) = self.thumbnail {
            product.thumbnail = thumbnail;
        }
        if self.base_price.is_some() || self.discount_percent.is_some() {
            product.base_price = self.base_price.unwrap_or(product.base_price);
            product.discount_percent = self.discount_percent.unwrap_or(product.discount_percent);
            product.discount_price = discount_price(product.base_price, product.discount_percent);
        }
        if let Some(mut variants) = self.variants {
            assign_variant_ids(&mut variants);
            product.variants = variants;
        }
        if let Some(tags) = self.tags {
            product.tags = tags;
        }
        if let Some(features) = self.features {
            product.features = features;
        }
        product.is_featured = self.is_featured.unwrap_or(product.is_featured);
        product.is_new_arrival = self.is_new_arrival.unwrap_or(product.is_new_arrival);
        product.is_best_seller = self.is_best_seller.unwrap_or(product.is_best_seller);
        product.is_active = self.is_active.unwrap_or(product.is_active);
        product.stock = self.stock.unwrap_or(product.stock);
        product.updated_at = now;
    }
}

#[utoipa::path(
    get,
    path = "/api/admin/products",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(ProductListQuery),
    responses((status = 200, description = "Paginated products, inactive included"))
)]
#[get("/products")]
pub async fn admin_list_products(state: web::Data<AppState>, query: web::Query<ProductListQuery>) -> ApiResult<HttpResponse> {
    let page = query.page();
    let filter = query.filter(true);
    let (products, total) = db::list_products(&state.pool, &filter, &page).await?;
    Ok(paginated(products, &page, total))
}

#[utoipa::path(
    post,
    path = "/api/admin/products",
    tag = "admin",
    security(("bearer_auth" = [])),
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = Product),
        (status = 400, description = "Invalid input or unknown category")
    )
)]
#[post("/products")]
pub async fn create_product(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    payload: web::Json<CreateProductRequest>,
) -> ApiResult<HttpResponse> {
    payload.validate()?;
    check_pricing(payload.base_price, payload.discount_percent, payload.stock, &payload.variants)?;
    let category = category_for(&state, payload.category_id).await?;

    let product = payload.into_inner().into_product(&category, auth.id, Utc::now());
    db::insert_product(&state.pool, &product).await?;
    log::info!("product created id={} slug={}", product.id, product.slug);

    Ok(ok_with(StatusCode::CREATED, "Product created successfully", product))
}

#[utoipa::path(
    put,
    path = "/api/admin/products/{id}",
    tag = "admin",
    security(("bearer_auth" = [])),
    request_body = UpdateProductRequest,
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product updated", body = Product),
        (status = 404, description = "Product not found")
    )
)]
#[put("/products/{id}")]
pub async fn update_product(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    payload: web::Json<UpdateProductRequest>,
) -> ApiResult<HttpResponse> {
    let mut product = db::find_product(&state.pool, path.into_inner())
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;

    let payload = payload.into_inner();
    let category = match payload.category_id {
        Some(id) => Some(category_for(&state, id).await?),
        None => None,
    };
    payload.apply(&mut product, category.as_ref(), Utc::now());
    check_pricing(product.base_price, product.discount_percent, product.stock, &product.variants)?;

    db::update_product(&state.pool, &product).await?;
    Ok(ok_with(StatusCode::OK, "Product updated successfully", product))
}

#[utoipa::path(
    delete,
    path = "/api/admin/products/{id}",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product deleted"),
        (status = 404, description = "Product not found")
    )
)]
#[delete("/products/{id}")]
pub async fn delete_product(state: web::Data<AppState>, path: web::Path<Uuid>) -> ApiResult<HttpResponse> {
    if !db::delete_product(&state.pool, path.into_inner()).await? {
        return Err(ApiError::not_found("Product not found"));
    }
    Ok(message("Product deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).expect("decimal literal")
    }

    fn category(name: &str) -> Category {
        let now = Utc::now();
        Category {
            id: Uuid::new_v4(),
            name: name.into(),
            slug: slugify(name),
            description: String::new(),
            image: String::new(),
            icon: String::new(),
            parent_id: None,
            is_active: true,
            sort_order: 1,
            created_at: now,
            updated_at: now,
        }
    }

    fn create_request() -> CreateProductRequest {
        serde_json::from_value(serde_json::json!({
            "name": "22K Gold Diamond Ring!!",
            "description": "Solitaire set in hallmarked gold",
            "metalType": "gold",
            "purity": "22K",
            "categoryId": Uuid::new_v4(),
            "basePrice": "125000",
            "discountPercent": 10,
            "variants": [
                {"size": "6", "weight": 4.1, "price": "118000", "stock": 3},
                {"size": "7", "weight": 4.3, "price": "121000", "stock": 2}
            ],
            "stock": 5,
            "isFeatured": true
        }))
        .expect("request json")
    }

    #[test]
    fn create_derives_slug_discount_and_variant_ids() {
        let rings = category("Rings");
        let seller = Uuid::new_v4();
        let product = create_request().into_product(&rings, seller, Utc::now());

        assert_eq!(product.slug, "22k-gold-diamond-ring");
        assert_eq!(product.discount_price, dec("112500"));
        assert_eq!(product.category_name, "Rings");
        assert_eq!(product.seller_id, Some(seller));
        assert!(product.is_active);
        assert!(product.variants.iter().all(|v| v.id.is_some()));
        assert_eq!(product.rating, 0.0);
    }

    #[test]
    fn update_recomputes_discount_when_either_input_changes() {
        let mut product = create_request().into_product(&category("Rings"), Uuid::new_v4(), Utc::now());

        UpdateProductRequest {
            discount_percent: Some(dec("20")),
            ..Default::default()
        }
        .apply(&mut product, None, Utc::now());
        assert_eq!(product.discount_price, dec("100000"));

        UpdateProductRequest {
            base_price: Some(dec("150000")),
            ..Default::default()
        }
        .apply(&mut product, None, Utc::now());
        assert_eq!(product.discount_percent, dec("20"));
        assert_eq!(product.discount_price, dec("120000"));

        UpdateProductRequest {
            discount_percent: Some(Decimal::ZERO),
            ..Default::default()
        }
        .apply(&mut product, None, Utc::now());
        assert_eq!(product.discount_price, product.base_price);
    }

    #[test]
    fn update_leaves_absent_fields_alone() {
        let mut product = create_request().into_product(&category("Rings"), Uuid::new_v4(), Utc::now());
        let necklaces = category("Necklaces");

        UpdateProductRequest {
            name: Some("Temple Necklace".into()),
            is_active: Some(false),
            ..Default::default()
        }
        .apply(&mut product, Some(&necklaces), Utc::now());

        assert_eq!(product.slug, "temple-necklace");
        assert_eq!(product.category_id, necklaces.id);
        assert_eq!(product.category_name, "Necklaces");
        assert!(!product.is_active);
        assert!(product.is_featured);
        assert_eq!(product.stock, 5);
        assert_eq!(product.variants.len(), 2);
    }

    #[test]
    fn pricing_bounds_are_enforced() {
        assert!(check_pricing(dec("100"), dec("0"), 0, &[]).is_ok());
        assert!(check_pricing(dec("100"), dec("100"), 0, &[]).is_ok());
        assert!(check_pricing(dec("-1"), dec("0"), 0, &[]).is_err());
        assert!(check_pricing(dec("100"), dec("100.5"), 0, &[]).is_err());
        assert!(check_pricing(dec("100"), dec("-5"), 0, &[]).is_err());
        assert!(check_pricing(dec("100"), dec("5"), -1, &[]).is_err());
    }

    #[test]
    fn prices_above_the_money_column_are_rejected() {
        assert!(check_pricing(dec("999999999999.99"), dec("10"), 1, &[]).is_ok());
        assert!(check_pricing(dec("1000000000000"), dec("0"), 1, &[]).is_err());
        assert!(check_pricing(Decimal::MAX, dec("100"), 1, &[]).is_err());

        let variant = ProductVariant {
            id: None,
            size: "7".into(),
            weight: 3.5,
            price: Decimal::MAX,
            stock: 1,
            sku: String::new(),
            is_default: false,
        };
        let err = check_pricing(dec("100"), dec("0"), 1, &[variant]).expect_err("oversized variant");
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn list_query_builds_filter() {
        let query = ProductListQuery {
            metal_type: Some(MetalType::Silver),
            min_price: Some(Decimal::ZERO),
            max_price: Some(dec("5000")),
            search: Some("  ".into()),
            sort_by: Some("price".into()),
            sort_order: Some("asc".into()),
            is_featured: Some(true),
            ..Default::default()
        };
        let filter = query.filter(false);
        assert_eq!(filter.metal_type, Some(MetalType::Silver));
        assert_eq!(filter.min_price, None);
        assert_eq!(filter.max_price, Some(dec("5000")));
        assert_eq!(filter.search, None);
        assert_eq!(filter.sort, ProductSort::Price);
        assert!(filter.ascending);
        assert!(filter.featured_only);
        assert_eq!(query.page(), Page { page: 1, limit: DEFAULT_LIMIT });
    }
}
