// src/api/wishlist.rs

use actix_web::{HttpResponse, delete, get, post, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::auth::AuthUser;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::WishlistProduct;
use crate::response::{message, ok};
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WishlistRequest {
    pub product_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WishlistView {
    pub products: Vec<WishlistProduct>,
}

/// Keeps the wishlist's insertion order; ids whose product is gone are skipped.
fn in_wishlist_order(ids: &[Uuid], products: Vec<WishlistProduct>) -> Vec<WishlistProduct> {
    let mut products: Vec<Option<WishlistProduct>> = products.into_iter().map(Some).collect();
    ids.iter()
        .filter_map(|id| {
            products
                .iter_mut()
                .find(|p| matches!(p, Some(product) if product.id == *id))?
                .take()
        })
        .collect()
}

#[utoipa::path(get, path = "/api/wishlist", tag = "wishlist", security(("bearer_auth" = [])),
    responses((status = 200, description = "Wishlisted product summaries", body = WishlistView)))]
#[get("")]
pub async fn get_wishlist(state: web::Data<AppState>, auth: web::ReqData<AuthUser>) -> ApiResult<HttpResponse> {
    let ids = db::find_wishlist(&state.pool, auth.id)
        .await?
        .map(|w| w.products)
        .unwrap_or_default();
    let products = db::find_products_by_ids(&state.pool, &ids)
        .await?
        .into_iter()
        .map(WishlistProduct::from)
        .collect();
    Ok(ok(WishlistView {
        products: in_wishlist_order(&ids, products),
    }))
}

#[utoipa::path(
    post,
    path = "/api/wishlist",
    tag = "wishlist",
    security(("bearer_auth" = [])),
    request_body = WishlistRequest,
    responses(
        (status = 200, description = "Added; adding twice is a no-op"),
        (status = 404, description = "Product not found")
    )
)]
#[post("")]
pub async fn add_to_wishlist(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    payload: web::Json<WishlistRequest>,
) -> ApiResult<HttpResponse> {
    if !db::product_exists(&state.pool, payload.product_id, true).await? {
        return Err(ApiError::not_found("Product not found"));
    }
    db::add_to_wishlist(&state.pool, auth.id, payload.product_id).await?;
    Ok(message("Added to wishlist"))
}

#[utoipa::path(
    delete,
    path = "/api/wishlist/{productId}",
    tag = "wishlist",
    security(("bearer_auth" = [])),
    params(("productId" = Uuid, Path, description = "Product id")),
    responses((status = 200, description = "Removed"))
)]
#[delete("/{product_id}")]
pub async fn remove_from_wishlist(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    db::remove_from_wishlist(&state.pool, auth.id, path.into_inner()).await?;
    Ok(message("Removed from wishlist"))
}

#[utoipa::path(delete, path = "/api/wishlist", tag = "wishlist", security(("bearer_auth" = [])),
    responses((status = 200, description = "Wishlist cleared")))]
#[delete("")]
pub async fn clear_wishlist(state: web::Data<AppState>, auth: web::ReqData<AuthUser>) -> ApiResult<HttpResponse> {
    db::delete_wishlist(&state.pool, auth.id).await?;
    Ok(message("Wishlist cleared"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MetalType;
    use rust_decimal::Decimal;

    fn summary(id: Uuid) -> WishlistProduct {
        WishlistProduct {
            id,
            name: "Pearl Drop Earrings".into(),
            thumbnail: String::new(),
            base_price: Decimal::from(8500),
            discount_price: Decimal::from(7225),
            metal_type: MetalType::Silver,
            is_active: true,
            stock: 4,
        }
    }

    #[test]
    fn keeps_insertion_order_and_skips_missing() {
        let (a, b, gone) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let ordered = in_wishlist_order(&[b, gone, a], vec![summary(a), summary(b)]);
        let ids: Vec<Uuid> = ordered.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![b, a]);
    }
}
