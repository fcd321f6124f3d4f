// src/api/mod.rs

pub mod admin;
pub mod auth;
pub mod cart;
pub mod categories;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod wishlist;

use actix_cors::Cors;
use actix_web::http::header;
use actix_web::{HttpResponse, Responder, get, web};
use serde::Serialize;
use utoipa::ToSchema;

use crate::config::Config;
use crate::error::ApiError;
use auth::JwtMiddleware;

#[derive(Debug, Serialize, ToSchema)]
pub struct Health {
    pub status: &'static str,
    pub message: &'static str,
}

#[utoipa::path(get, path = "/api/health", tag = "health",
    responses((status = 200, description = "Service is up", body = Health)))]
#[get("/health")]
pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(Health {
        status: "ok",
        message: "Storefront API is running",
    })
}

async fn route_not_found() -> Result<HttpResponse, ApiError> {
    Err(ApiError::not_found("Route not found"))
}

/// Malformed bodies, query strings and path segments become 400s in the
/// standard failure envelope.
fn extractor_config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default().error_handler(|err, _req| ApiError::validation(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default().error_handler(|err, _req| ApiError::validation(err.to_string()).into()),
    )
    .app_data(web::PathConfig::default().error_handler(|err, _req| {
        ApiError::validation(format!("Invalid path parameter: {err}")).into()
    }));
}

/// CORS for the browser storefront. Wraps the whole app so preflights never
/// reach the auth middleware.
pub fn cors(config: &Config) -> Cors {
    let cors = if config.cors_origins.iter().any(|o| o == "*") {
        Cors::default().allow_any_origin()
    } else {
        config
            .cors_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
    };
    cors.allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
        .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .max_age(3600)
}

/// Mounts every route under `/api`. Expects `web::Data<AppState>` on the app.
pub fn configure(cfg: &mut web::ServiceConfig) {
    extractor_config(cfg);
    cfg.service(
        web::scope("/api")
            .service(health)
            // auth: register/login/refresh are public, the rest wrap themselves
            .service(auth::register)
            .service(auth::login)
            .service(auth::refresh)
            .service(auth::logout)
            .service(auth::get_profile)
            .service(auth::update_profile)
            .service(auth::change_password)
            // catalog: fixed segments before `/products/{id}`
            .service(products::list_products)
            .service(products::featured_products)
            .service(products::new_arrivals)
            .service(products::best_sellers)
            .service(products::search_products)
            .service(reviews::product_reviews)
            .service(products::get_product)
            .service(categories::list_categories)
            .service(categories::get_category)
            .service(
                web::scope("/cart")
                    .wrap(JwtMiddleware::authenticated())
                    .service(cart::get_cart)
                    .service(cart::add_to_cart)
                    .service(cart::clear_cart)
                    .service(cart::update_cart_item)
                    .service(cart::remove_from_cart),
            )
            .service(
                web::scope("/wishlist")
                    .wrap(JwtMiddleware::authenticated())
                    .service(wishlist::get_wishlist)
                    .service(wishlist::add_to_wishlist)
                    .service(wishlist::clear_wishlist)
                    .service(wishlist::remove_from_wishlist),
            )
            .service(
                web::scope("/orders")
                    .wrap(JwtMiddleware::authenticated())
                    .service(orders::list_orders)
                    .service(orders::create_order)
                    .service(orders::get_order)
                    .service(orders::cancel_order),
            )
            .service(
                web::scope("/reviews")
                    .wrap(JwtMiddleware::authenticated())
                    .service(reviews::create_review)
                    .service(reviews::update_review)
                    .service(reviews::delete_review),
            )
            .service(
                web::scope("/admin")
                    .wrap(JwtMiddleware::admin())
                    .service(admin::dashboard)
                    .service(admin::list_users)
                    .service(admin::get_user)
                    .service(admin::update_user)
                    .service(products::admin_list_products)
                    .service(products::create_product)
                    .service(products::update_product)
                    .service(products::delete_product)
                    .service(orders::admin_list_orders)
                    .service(orders::update_order_status)
                    .service(categories::create_category)
                    .service(categories::update_category)
                    .service(categories::delete_category),
            )
            .default_service(web::to(route_not_found)),
    );
}
