use std::str::FromStr;

use actix_web::http::StatusCode;
use actix_web::test::TestRequest;
use actix_web::{App, test, web};
use rust_decimal::Decimal;
use serde_json::{Value, json};

use jewel_storefront::api;
use jewel_storefront::config::Config;
use jewel_storefront::seed;

mod support;

macro_rules! store_app {
    ($db:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(support::build_state($db.pool.clone(), &$db.url)))
                .configure(api::configure),
        )
        .await
    };
}

macro_rules! call {
    ($app:expr, $req:expr) => {
        support::outcome(test::try_call_service(&$app, $req).await).await
    };
}

macro_rules! register_customer {
    ($app:expr, $email:expr, $first_name:expr) => {{
        let req = TestRequest::post()
            .uri("/api/auth/register")
            .set_json(json!({
                "email": $email,
                "password": "secret12",
                "firstName": $first_name,
                "lastName": "Iyer"
            }))
            .to_request();
        let (status, body) = call!($app, req);
        assert_eq!(status, StatusCode::CREATED);
        body["data"]["accessToken"].clone()
    }};
}

fn money(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        other => Decimal::from_str(&other.to_string()).expect("decimal number"),
    }
}

fn auth_header(token: &Value) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token.as_str().expect("token")))
}

#[actix_web::test]
async fn register_login_and_refresh() {
    let Some(db) = support::init_test_db().await else { return };
    let app = store_app!(db);

    let register = json!({
        "email": "  Priya@Example.com ",
        "password": "secret12",
        "firstName": "Priya",
        "lastName": "Nair"
    });
    let req = TestRequest::post().uri("/api/auth/register").set_json(&register).to_request();
    let (status, body) = call!(app, req);
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["user"]["email"], "priya@example.com");
    assert_eq!(body["data"]["user"]["role"], "customer");
    assert!(body["data"]["user"].get("passwordHash").is_none());

    let req = TestRequest::post().uri("/api/auth/register").set_json(&register).to_request();
    let (status, body) = call!(app, req);
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "User with this email already exists");

    let req = TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({"email": "priya@example.com", "password": "wrong-one"}))
        .to_request();
    let (status, _) = call!(app, req);
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({"email": "priya@example.com", "password": "secret12"}))
        .to_request();
    let (status, body) = call!(app, req);
    assert_eq!(status, StatusCode::OK);
    let refresh_token = body["data"]["refreshToken"].clone();

    let req = TestRequest::post()
        .uri("/api/auth/refresh")
        .set_json(json!({"refreshToken": refresh_token}))
        .to_request();
    let (status, body) = call!(app, req);
    assert_eq!(status, StatusCode::OK);
    let access = body["data"]["accessToken"].clone();
    let rotated = body["data"]["refreshToken"].clone();

    let req = TestRequest::get()
        .uri("/api/auth/profile")
        .insert_header(auth_header(&access))
        .to_request();
    let (status, body) = call!(app, req);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["firstName"], "Priya");

    let req = TestRequest::post()
        .uri("/api/auth/logout")
        .insert_header(auth_header(&access))
        .to_request();
    let (status, _) = call!(app, req);
    assert_eq!(status, StatusCode::OK);

    // logout revokes the stored refresh token
    let req = TestRequest::post()
        .uri("/api/auth/refresh")
        .set_json(json!({"refreshToken": rotated}))
        .to_request();
    let (status, _) = call!(app, req);
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn checkout_cancel_and_review() {
    let Some(db) = support::init_test_db().await else { return };
    let config = Config::for_tests(&db.url, support::JWT_SECRET);
    assert!(seed::seed(&db.pool, &config).await.expect("seed"));
    assert!(!seed::seed(&db.pool, &config).await.expect("second seed"));
    let app = store_app!(db);

    // admin from the seed
    let req = TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({"email": config.admin_email, "password": config.admin_password}))
        .to_request();
    let (status, body) = call!(app, req);
    assert_eq!(status, StatusCode::OK);
    let admin = body["data"]["accessToken"].clone();

    let req = TestRequest::get().uri("/api/categories/rings").to_request();
    let (status, body) = call!(app, req);
    assert_eq!(status, StatusCode::OK);
    let rings_id = body["data"]["id"].clone();

    let req = TestRequest::post()
        .uri("/api/admin/products")
        .insert_header(auth_header(&admin))
        .set_json(json!({
            "name": "Silver Twist Band",
            "description": "Plain 925 silver band with a twisted profile.",
            "metalType": "silver",
            "purity": "925 Sterling",
            "categoryId": rings_id,
            "basePrice": "4000",
            "stock": 10
        }))
        .to_request();
    let (status, body) = call!(app, req);
    assert_eq!(status, StatusCode::CREATED);
    let product_id = body["data"]["id"].clone();
    assert_eq!(body["data"]["slug"], "silver-twist-band");
    assert_eq!(body["data"]["categoryName"], "Rings");

    let req = TestRequest::get().uri("/api/products/silver-twist-band").to_request();
    let (status, body) = call!(app, req);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], product_id);

    // customer
    let req = TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({
            "email": "kabir@example.com",
            "password": "secret12",
            "firstName": "Kabir",
            "lastName": "Das"
        }))
        .to_request();
    let (status, body) = call!(app, req);
    assert_eq!(status, StatusCode::CREATED);
    let customer = body["data"]["accessToken"].clone();

    let req = TestRequest::put()
        .uri("/api/auth/profile")
        .insert_header(auth_header(&customer))
        .set_json(json!({"addresses": [{
            "type": "home",
            "street": "12 MG Road",
            "city": "Bengaluru",
            "state": "KA",
            "country": "India",
            "zipCode": "560001",
            "isDefault": true
        }]}))
        .to_request();
    let (status, body) = call!(app, req);
    assert_eq!(status, StatusCode::OK);
    let address_id = body["data"]["addresses"][0]["id"].clone();
    assert!(address_id.is_string());

    let req = TestRequest::post()
        .uri("/api/orders")
        .insert_header(auth_header(&customer))
        .set_json(json!({"addressId": address_id, "paymentMethod": "cod"}))
        .to_request();
    let (status, body) = call!(app, req);
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Cart is empty");

    let req = TestRequest::post()
        .uri("/api/cart")
        .insert_header(auth_header(&customer))
        .set_json(json!({"productId": product_id, "quantity": 1}))
        .to_request();
    let (status, body) = call!(app, req);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(money(&body["data"]["total"]), Decimal::from(4000));

    let req = TestRequest::post()
        .uri("/api/orders")
        .insert_header(auth_header(&customer))
        .set_json(json!({"addressId": address_id, "paymentMethod": "cod"}))
        .to_request();
    let (status, body) = call!(app, req);
    assert_eq!(status, StatusCode::CREATED);
    let order = &body["data"];
    assert_eq!(money(&order["subtotal"]), Decimal::from(4000));
    assert_eq!(money(&order["tax"]), Decimal::from(720));
    assert_eq!(money(&order["shippingInfo"]["cost"]), Decimal::from(199));
    assert_eq!(money(&order["total"]), Decimal::from(4919));
    assert_eq!(order["status"], "confirmed");
    let order_id = order["id"].as_str().expect("order id").to_string();

    let req = TestRequest::get()
        .uri("/api/cart")
        .insert_header(auth_header(&customer))
        .to_request();
    let (_, body) = call!(app, req);
    assert_eq!(body["data"]["items"].as_array().map(Vec::len), Some(0));

    let stock_uri = format!("/api/products/{}", product_id.as_str().expect("id"));
    let req = TestRequest::get().uri(&stock_uri).to_request();
    let (_, body) = call!(app, req);
    assert_eq!(body["data"]["stock"], 9);

    let req = TestRequest::post()
        .uri(&format!("/api/orders/{order_id}/cancel"))
        .insert_header(auth_header(&customer))
        .set_json(json!({"reason": "Ordered the wrong size"}))
        .to_request();
    let (status, _) = call!(app, req);
    assert_eq!(status, StatusCode::OK);

    let req = TestRequest::get().uri(&stock_uri).to_request();
    let (_, body) = call!(app, req);
    assert_eq!(body["data"]["stock"], 10);

    let req = TestRequest::post()
        .uri(&format!("/api/orders/{order_id}/cancel"))
        .insert_header(auth_header(&customer))
        .to_request();
    let (status, body) = call!(app, req);
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Order cannot be cancelled");

    // reviews
    let review = json!({"productId": product_id, "rating": 4, "comment": "Fits perfectly"});
    let req = TestRequest::post()
        .uri("/api/reviews")
        .insert_header(auth_header(&customer))
        .set_json(&review)
        .to_request();
    let (status, body) = call!(app, req);
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["isVerified"], false);

    let req = TestRequest::post()
        .uri("/api/reviews")
        .insert_header(auth_header(&customer))
        .set_json(&review)
        .to_request();
    let (status, body) = call!(app, req);
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "You have already reviewed this product");

    let req = TestRequest::get().uri(&format!("{stock_uri}/reviews")).to_request();
    let (status, body) = call!(app, req);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 1);
    assert_eq!(body["data"]["avgRating"], 4.0);

    let req = TestRequest::get().uri(&stock_uri).to_request();
    let (_, body) = call!(app, req);
    assert_eq!(body["data"]["reviewCount"], 1);
    assert_eq!(body["data"]["rating"], 4.0);

    // a category that still holds products cannot go
    let req = TestRequest::delete()
        .uri(&format!("/api/admin/categories/{}", rings_id.as_str().expect("id")))
        .insert_header(auth_header(&admin))
        .to_request();
    let (status, body) = call!(app, req);
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Cannot delete category with existing products");
}

#[actix_web::test]
async fn catalog_browsing() {
    let Some(db) = support::init_test_db().await else { return };
    let config = Config::for_tests(&db.url, support::JWT_SECRET);
    seed::seed(&db.pool, &config).await.expect("seed");
    let app = store_app!(db);

    let req = TestRequest::get().uri("/api/products?metalType=gold&sortBy=price&sortOrder=asc").to_request();
    let (status, body) = call!(app, req);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    let prices: Vec<Decimal> = body["data"]
        .as_array()
        .expect("products")
        .iter()
        .map(|p| money(&p["basePrice"]))
        .collect();
    assert!(prices.windows(2).all(|w| w[0] <= w[1]));

    let req = TestRequest::get().uri("/api/products?limit=3&page=2").to_request();
    let (_, body) = call!(app, req);
    assert_eq!(body["total"], 8);
    assert_eq!(body["totalPages"], 3);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(3));

    let req = TestRequest::get().uri("/api/products/featured").to_request();
    let (status, body) = call!(app, req);
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].as_array().expect("featured").iter().all(|p| p["isFeatured"] == true));

    let req = TestRequest::get().uri("/api/products/search?q=PEARL").to_request();
    let (_, body) = call!(app, req);
    assert_eq!(body["data"][0]["slug"], "sterling-silver-pearl-necklace");

    let req = TestRequest::get().uri("/api/products/search").to_request();
    let (status, body) = call!(app, req);
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Search query is required");

    let req = TestRequest::get().uri("/api/categories").to_request();
    let (_, body) = call!(app, req);
    let names: Vec<&str> = body["data"]
        .as_array()
        .expect("categories")
        .iter()
        .filter_map(|c| c["name"].as_str())
        .collect();
    assert_eq!(names, ["Rings", "Necklaces", "Earrings", "Bracelets", "Pendants", "Anklets"]);

    let req = TestRequest::get().uri("/api/products/no-such-piece").to_request();
    let (status, _) = call!(app, req);
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn product_rating_follows_every_review_change() {
    let Some(db) = support::init_test_db().await else { return };
    let config = Config::for_tests(&db.url, support::JWT_SECRET);
    seed::seed(&db.pool, &config).await.expect("seed");
    let app = store_app!(db);

    let req = TestRequest::get().uri("/api/products/silver-peacock-pendant").to_request();
    let (status, body) = call!(app, req);
    assert_eq!(status, StatusCode::OK);
    let product_uri = format!("/api/products/{}", body["data"]["id"].as_str().expect("id"));
    let product_id = body["data"]["id"].clone();

    let meera = register_customer!(app, "meera@example.com", "Meera");
    let arjun = register_customer!(app, "arjun@example.com", "Arjun");

    let mut review_ids = Vec::new();
    for (token, rating) in [(&meera, 5), (&arjun, 2)] {
        let req = TestRequest::post()
            .uri("/api/reviews")
            .insert_header(auth_header(token))
            .set_json(json!({"productId": product_id, "rating": rating, "comment": "Lovely enamel"}))
            .to_request();
        let (status, body) = call!(app, req);
        assert_eq!(status, StatusCode::CREATED);
        review_ids.push(body["data"]["id"].as_str().expect("review id").to_string());
    }

    let req = TestRequest::get().uri(&product_uri).to_request();
    let (_, body) = call!(app, req);
    assert_eq!(body["data"]["rating"], 3.5);
    assert_eq!(body["data"]["reviewCount"], 2);

    let req = TestRequest::get().uri(&format!("{product_uri}/reviews")).to_request();
    let (_, body) = call!(app, req);
    assert_eq!(body["data"]["count"], 2);
    assert_eq!(body["data"]["avgRating"], 3.5);

    // only the author may edit
    let req = TestRequest::put()
        .uri(&format!("/api/reviews/{}", review_ids[1]))
        .insert_header(auth_header(&meera))
        .set_json(json!({"rating": 1}))
        .to_request();
    let (status, _) = call!(app, req);
    assert_eq!(status, StatusCode::NOT_FOUND);

    let req = TestRequest::put()
        .uri(&format!("/api/reviews/{}", review_ids[1]))
        .insert_header(auth_header(&arjun))
        .set_json(json!({"rating": 4}))
        .to_request();
    let (status, body) = call!(app, req);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["rating"], 4);

    let req = TestRequest::get().uri(&product_uri).to_request();
    let (_, body) = call!(app, req);
    assert_eq!(body["data"]["rating"], 4.5);
    assert_eq!(body["data"]["reviewCount"], 2);

    let req = TestRequest::delete()
        .uri(&format!("/api/reviews/{}", review_ids[0]))
        .insert_header(auth_header(&meera))
        .to_request();
    let (status, _) = call!(app, req);
    assert_eq!(status, StatusCode::OK);

    let req = TestRequest::get().uri(&product_uri).to_request();
    let (_, body) = call!(app, req);
    assert_eq!(body["data"]["rating"], 4.0);
    assert_eq!(body["data"]["reviewCount"], 1);

    let req = TestRequest::delete()
        .uri(&format!("/api/reviews/{}", review_ids[1]))
        .insert_header(auth_header(&arjun))
        .to_request();
    let (status, _) = call!(app, req);
    assert_eq!(status, StatusCode::OK);

    let req = TestRequest::get().uri(&product_uri).to_request();
    let (_, body) = call!(app, req);
    assert_eq!(body["data"]["rating"], 0.0);
    assert_eq!(body["data"]["reviewCount"], 0);

    let req = TestRequest::get().uri(&format!("{product_uri}/reviews")).to_request();
    let (_, body) = call!(app, req);
    assert_eq!(body["data"]["count"], 0);
    assert_eq!(body["data"]["avgRating"], 0.0);
}
