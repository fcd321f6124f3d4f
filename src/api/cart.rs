// src/api/cart.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, delete, get, post, put, web};
use chrono::Utc;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::api::auth::AuthUser;
use crate::checkout::{MAX_LINE_QUANTITY, line_price};
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{Cart, CartItem};
use crate::response::{message, ok, ok_with};
use crate::AppState;

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    #[validate(range(min = 1, max = MAX_LINE_QUANTITY, message = "quantity must be between 1 and 10000"))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateCartItemRequest {
    /// 0 removes the line
    #[validate(range(min = 0, max = MAX_LINE_QUANTITY, message = "quantity must be between 0 and 10000"))]
    pub quantity: i32,
}

/// Narrows an update or removal to one variant line.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct LineQuery {
    pub variant_id: Option<Uuid>,
}

async fn stored_cart(state: &AppState, user_id: Uuid) -> ApiResult<Cart> {
    db::find_cart(&state.pool, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Cart not found"))
}

#[utoipa::path(get, path = "/api/cart", tag = "cart", security(("bearer_auth" = [])),
    responses((status = 200, description = "The caller's cart, empty when none exists", body = Cart)))]
#[get("")]
pub async fn get_cart(state: web::Data<AppState>, auth: web::ReqData<AuthUser>) -> ApiResult<HttpResponse> {
    let cart = db::find_cart(&state.pool, auth.id)
        .await?
        .unwrap_or_else(|| Cart::empty(auth.id, Utc::now()));
    Ok(ok(cart))
}

#[utoipa::path(
    post,
    path = "/api/cart",
    tag = "cart",
    security(("bearer_auth" = [])),
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Item added", body = Cart),
        (status = 400, description = "Invalid quantity or unknown variant"),
        (status = 404, description = "Product not found")
    )
)]
#[post("")]
pub async fn add_to_cart(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    payload: web::Json<AddToCartRequest>,
) -> ApiResult<HttpResponse> {
    payload.validate()?;
    let product = db::find_product(&state.pool, payload.product_id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| ApiError::not_found("Product not found"))?;

    let (price, size) =
        line_price(&product, payload.variant_id).ok_or_else(|| ApiError::validation("Variant not found"))?;

    let now = Utc::now();
    let mut cart = db::find_cart(&state.pool, auth.id)
        .await?
        .unwrap_or_else(|| Cart::empty(auth.id, now));
    cart.add_item(
        CartItem {
            product_id: product.id,
            product_name: product.name,
            thumbnail: product.thumbnail,
            variant_id: payload.variant_id,
            size,
            price,
            quantity: payload.quantity,
            added_at: now,
        },
        now,
    )?;
    cart.id = Some(db::save_cart(&state.pool, &cart).await?);

    Ok(ok_with(StatusCode::OK, "Item added to cart", cart))
}

#[utoipa::path(
    put,
    path = "/api/cart/{productId}",
    tag = "cart",
    security(("bearer_auth" = [])),
    request_body = UpdateCartItemRequest,
    params(("productId" = Uuid, Path, description = "Product id"), LineQuery),
    responses(
        (status = 200, description = "Cart updated", body = Cart),
        (status = 404, description = "Cart or line not found")
    )
)]
#[put("/{product_id}")]
pub async fn update_cart_item(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<Uuid>,
    query: web::Query<LineQuery>,
    payload: web::Json<UpdateCartItemRequest>,
) -> ApiResult<HttpResponse> {
    payload.validate()?;
    let mut cart = stored_cart(&state, auth.id).await?;
    if !cart.set_quantity(path.into_inner(), query.variant_id, payload.quantity, Utc::now())? {
        return Err(ApiError::not_found("Item not found in cart"));
    }
    db::save_cart(&state.pool, &cart).await?;
    Ok(ok_with(StatusCode::OK, "Cart updated", cart))
}

#[utoipa::path(
    delete,
    path = "/api/cart/{productId}",
    tag = "cart",
    security(("bearer_auth" = [])),
    params(("productId" = Uuid, Path, description = "Product id"), LineQuery),
    responses(
        (status = 200, description = "Item removed", body = Cart),
        (status = 404, description = "Cart or line not found")
    )
)]
#[delete("/{product_id}")]
pub async fn remove_from_cart(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<Uuid>,
    query: web::Query<LineQuery>,
) -> ApiResult<HttpResponse> {
    let mut cart = stored_cart(&state, auth.id).await?;
    if !cart.remove_product(path.into_inner(), query.variant_id, Utc::now())? {
        return Err(ApiError::not_found("Item not found in cart"));
    }
    db::save_cart(&state.pool, &cart).await?;
    Ok(ok_with(StatusCode::OK, "Item removed from cart", cart))
}

#[utoipa::path(delete, path = "/api/cart", tag = "cart", security(("bearer_auth" = [])),
    responses((status = 200, description = "Cart cleared")))]
#[delete("")]
pub async fn clear_cart(state: web::Data<AppState>, auth: web::ReqData<AuthUser>) -> ApiResult<HttpResponse> {
    db::delete_cart(&state.pool, auth.id).await?;
    Ok(message("Cart cleared"))
}
