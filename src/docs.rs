use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::api::{admin, auth, cart, categories, orders, products, reviews, wishlist};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::health,
        auth::register,
        auth::login,
        auth::refresh,
        auth::logout,
        auth::get_profile,
        auth::update_profile,
        auth::change_password,
        products::list_products,
        products::featured_products,
        products::new_arrivals,
        products::best_sellers,
        products::search_products,
        products::get_product,
        categories::list_categories,
        categories::get_category,
        cart::get_cart,
        cart::add_to_cart,
        cart::update_cart_item,
        cart::remove_from_cart,
        cart::clear_cart,
        wishlist::get_wishlist,
        wishlist::add_to_wishlist,
        wishlist::remove_from_wishlist,
        wishlist::clear_wishlist,
        orders::create_order,
        orders::list_orders,
        orders::get_order,
        orders::cancel_order,
        reviews::product_reviews,
        reviews::create_review,
        reviews::update_review,
        reviews::delete_review,
        admin::dashboard,
        admin::list_users,
        admin::get_user,
        admin::update_user,
        products::admin_list_products,
        products::create_product,
        products::update_product,
        products::delete_product,
        orders::admin_list_orders,
        orders::update_order_status,
        categories::create_category,
        categories::update_category,
        categories::delete_category
    ),
    components(
        schemas(
            crate::api::Health,
            crate::models::Role,
            crate::models::MetalType,
            crate::models::OrderStatus,
            crate::models::PaymentStatus,
            crate::models::PaymentMethod,
            crate::models::Address,
            crate::models::User,
            crate::models::ProductVariant,
            crate::models::Product,
            crate::models::Category,
            crate::models::CartItem,
            crate::models::Cart,
            crate::models::WishlistProduct,
            crate::models::OrderItem,
            crate::models::ShippingInfo,
            crate::models::PaymentInfo,
            crate::models::Order,
            crate::models::Review,
            crate::db::MonthlyStat,
            auth::RegisterRequest,
            auth::LoginRequest,
            auth::RefreshRequest,
            auth::UpdateProfileRequest,
            auth::ChangePasswordRequest,
            auth::AuthResponse,
            auth::TokenPair,
            products::CreateProductRequest,
            products::UpdateProductRequest,
            categories::CreateCategoryRequest,
            categories::UpdateCategoryRequest,
            cart::AddToCartRequest,
            cart::UpdateCartItemRequest,
            wishlist::WishlistRequest,
            wishlist::WishlistView,
            orders::CreateOrderRequest,
            orders::CancelOrderRequest,
            orders::UpdateOrderStatusRequest,
            reviews::CreateReviewRequest,
            reviews::UpdateReviewRequest,
            reviews::ProductReviews,
            admin::Overview,
            admin::Dashboard,
            admin::UpdateUserRequest,
            admin::UserDetail
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Liveness"),
        (name = "auth", description = "Registration, login and profile"),
        (name = "products", description = "Catalog browsing"),
        (name = "categories", description = "Category browsing"),
        (name = "cart", description = "Shopping cart"),
        (name = "wishlist", description = "Saved products"),
        (name = "orders", description = "Checkout and order history"),
        (name = "reviews", description = "Product reviews"),
        (name = "admin", description = "Back office")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by protected paths.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_storefront_routes() {
        let doc = ApiDoc::openapi();
        for path in ["/api/auth/login", "/api/products/{id}", "/api/orders/{id}/cancel", "/api/admin/dashboard"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
