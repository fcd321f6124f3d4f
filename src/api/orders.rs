// src/api/orders.rs
//
// Cart to order conversion and the order lifecycle. The steps (insert, clear
// cart, adjust stock) run one after another without a transaction.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, get, post, put, web};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::api::auth::AuthUser;
use crate::checkout::{CartError, OrderTotals, order_number, round_money};
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    Address, Cart, Order, OrderItem, OrderStatus, PaymentInfo, PaymentMethod, PaymentStatus, ShippingInfo, User,
};
use crate::response::{Page, message, ok, ok_with, paginated};
use crate::AppState;

const ADMIN_DEFAULT_LIMIT: i64 = 20;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub address_id: Uuid,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub shipping_method: String,
    /// Recorded on the order; no discount is applied.
    #[serde(default)]
    pub coupon_code: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CancelOrderRequest {
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
    #[serde(default)]
    pub tracking_id: String,
    #[serde(default)]
    pub carrier: String,
    #[serde(default)]
    pub cancel_reason: String,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AdminOrderQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<OrderStatus>,
}

/// Snapshots the cart, the chosen address and the computed totals into a new order.
pub fn build_order(
    user: &User,
    cart: &Cart,
    address: Address,
    req: CreateOrderRequest,
    now: DateTime<Utc>,
) -> Result<Order, CartError> {
    let items: Vec<OrderItem> = cart.order_items()?;
    let subtotal = round_money(cart.total);
    let totals = OrderTotals::from_subtotal(subtotal);
    let status = match req.payment_method {
        PaymentMethod::Cod => OrderStatus::Confirmed,
        _ => OrderStatus::Pending,
    };

    Ok(Order {
        id: Uuid::new_v4(),
        order_number: order_number(now),
        user_id: user.id,
        user_email: user.email.clone(),
        user_name: user.full_name(),
        items,
        subtotal: totals.subtotal,
        tax: totals.tax,
        discount: Decimal::ZERO,
        coupon_code: req.coupon_code,
        shipping_info: ShippingInfo {
            address,
            method: req.shipping_method,
            cost: totals.shipping,
            tracking_id: String::new(),
            carrier: String::new(),
            estimated_date: None,
        },
        payment_info: PaymentInfo {
            method: req.payment_method,
            status: PaymentStatus::Pending,
            transaction_id: String::new(),
            paid_at: None,
        },
        total: totals.total,
        status,
        notes: req.notes,
        cancel_reason: String::new(),
        created_at: now,
        updated_at: now,
    })
}

impl Order {
    /// Customer cancellation. Only pending and confirmed orders qualify.
    pub fn cancel(&mut self, reason: String, now: DateTime<Utc>) -> ApiResult<()> {
        if !self.status.can_cancel() {
            return Err(ApiError::validation("Order cannot be cancelled"));
        }
        self.status = OrderStatus::Cancelled;
        self.cancel_reason = reason;
        self.updated_at = now;
        Ok(())
    }

    /// Admin status change. Any status may be set; delivery marks the payment completed.
    pub fn apply_status_update(&mut self, req: UpdateOrderStatusRequest, now: DateTime<Utc>) {
        self.status = req.status;
        if !req.tracking_id.is_empty() {
            self.shipping_info.tracking_id = req.tracking_id;
        }
        if !req.carrier.is_empty() {
            self.shipping_info.carrier = req.carrier;
        }
        if !req.cancel_reason.is_empty() {
            self.cancel_reason = req.cancel_reason;
        }
        if req.status == OrderStatus::Delivered {
            self.payment_info.status = PaymentStatus::Completed;
            self.payment_info.paid_at = Some(now);
        }
        self.updated_at = now;
    }
}

#[utoipa::path(
    post,
    path = "/api/orders",
    tag = "orders",
    security(("bearer_auth" = [])),
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order placed", body = Order),
        (status = 400, description = "Unknown address or empty cart")
    )
)]
#[post("")]
pub async fn create_order(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    payload: web::Json<CreateOrderRequest>,
) -> ApiResult<HttpResponse> {
    let user = db::find_user_by_id(&state.pool, auth.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    let address = user
        .address(payload.address_id)
        .cloned()
        .ok_or_else(|| ApiError::validation("Invalid address"))?;
    let cart = db::find_cart(&state.pool, auth.id)
        .await?
        .filter(|c| !c.items.is_empty())
        .ok_or_else(|| ApiError::validation("Cart is empty"))?;

    let order = build_order(&user, &cart, address, payload.into_inner(), Utc::now())?;
    db::insert_order(&state.pool, &order).await?;
    db::delete_cart(&state.pool, auth.id).await?;
    for item in &order.items {
        db::adjust_stock(&state.pool, item.product_id, -item.quantity).await?;
    }
    log::info!(
        "order placed number={} user={} total={}",
        order.order_number,
        order.user_id,
        order.total
    );

    Ok(ok_with(StatusCode::CREATED, "Order placed successfully", order))
}

#[utoipa::path(get, path = "/api/orders", tag = "orders", security(("bearer_auth" = [])),
    responses((status = 200, description = "The caller's orders, newest first", body = [Order])))]
#[get("")]
pub async fn list_orders(state: web::Data<AppState>, auth: web::ReqData<AuthUser>) -> ApiResult<HttpResponse> {
    Ok(ok(db::list_user_orders(&state.pool, auth.id, None).await?))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    tag = "orders",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order", body = Order),
        (status = 404, description = "Order not found")
    )
)]
#[get("/{id}")]
pub async fn get_order(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    let order = db::find_user_order(&state.pool, path.into_inner(), auth.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Order not found"))?;
    Ok(ok(order))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/cancel",
    tag = "orders",
    security(("bearer_auth" = [])),
    request_body = CancelOrderRequest,
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order cancelled, stock restored"),
        (status = 400, description = "Order cannot be cancelled"),
        (status = 404, description = "Order not found")
    )
)]
#[post("/{id}/cancel")]
pub async fn cancel_order(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<Uuid>,
    payload: Option<web::Json<CancelOrderRequest>>,
) -> ApiResult<HttpResponse> {
    let mut order = db::find_user_order(&state.pool, path.into_inner(), auth.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Order not found"))?;

    let reason = payload.map(|p| p.into_inner().reason).unwrap_or_default();
    order.cancel(reason, Utc::now())?;
    db::update_order_progress(&state.pool, &order).await?;
    for item in &order.items {
        db::adjust_stock(&state.pool, item.product_id, item.quantity).await?;
    }
    log::info!("order cancelled number={}", order.order_number);

    Ok(message("Order cancelled successfully"))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(AdminOrderQuery),
    responses((status = 200, description = "Paginated orders, newest first"))
)]
#[get("/orders")]
pub async fn admin_list_orders(state: web::Data<AppState>, query: web::Query<AdminOrderQuery>) -> ApiResult<HttpResponse> {
    let page = Page::resolve(query.page, query.limit, ADMIN_DEFAULT_LIMIT);
    let (orders, total) = db::list_orders(&state.pool, query.status, &page).await?;
    Ok(paginated(orders, &page, total))
}

#[utoipa::path(
    put,
    path = "/api/admin/orders/{id}/status",
    tag = "admin",
    security(("bearer_auth" = [])),
    request_body = UpdateOrderStatusRequest,
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order status updated", body = Order),
        (status = 404, description = "Order not found")
    )
)]
#[put("/orders/{id}/status")]
pub async fn update_order_status(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    payload: web::Json<UpdateOrderStatusRequest>,
) -> ApiResult<HttpResponse> {
    let mut order = db::find_order(&state.pool, path.into_inner())
        .await?
        .ok_or_else(|| ApiError::not_found("Order not found"))?;

    order.apply_status_update(payload.into_inner(), Utc::now());
    db::update_order_progress(&state.pool, &order).await?;
    Ok(ok_with(StatusCode::OK, "Order status updated", order))
}
