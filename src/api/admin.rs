// src/api/admin.rs
//
// Read-only dashboard aggregates and user management. Every route here sits
// behind `JwtMiddleware::admin()`.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, get, put, web};
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::db::{self, Collection, MonthlyStat};
use crate::error::{ApiError, ApiResult};
use crate::models::{Order, OrderStatus, Product, Role, User};
use crate::response::{Page, ok, ok_with, paginated};
use crate::AppState;

const RECENT_ORDERS: i64 = 10;
const LOW_STOCK_BELOW: i32 = 10;
const LOW_STOCK_LIMIT: i64 = 10;
/// Months before the current one included in the revenue chart.
const CHART_MONTHS_BACK: u32 = 5;
const USERS_DEFAULT_LIMIT: i64 = 20;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub total_products: i64,
    pub active_products: i64,
    pub total_users: i64,
    pub total_orders: i64,
    pub pending_orders: i64,
    pub processing_orders: i64,
    pub delivered_orders: i64,
    /// Sum over shipped and delivered orders
    pub total_revenue: Decimal,
    pub today_orders: i64,
    pub today_revenue: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub overview: Overview,
    pub recent_orders: Vec<Order>,
    pub low_stock_products: Vec<Product>,
    pub monthly_stats: Vec<MonthlyStat>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub role: Option<Role>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserDetail {
    pub user: User,
    /// Ten most recent
    pub orders: Vec<Order>,
}

pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&now.date_naive().and_hms_opt(0, 0, 0).unwrap_or_default())
}

/// First instant of the calendar month `months_back` months before `now`'s.
pub fn start_of_month_back(now: DateTime<Utc>, months_back: u32) -> DateTime<Utc> {
    let index = now.year() * 12 + now.month0() as i32 - months_back as i32;
    let (year, month) = (index.div_euclid(12), index.rem_euclid(12) as u32 + 1);
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt))
        .unwrap_or_else(|| start_of_day(now))
}

#[utoipa::path(
    get,
    path = "/api/admin/dashboard",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Dashboard aggregates", body = Dashboard))
)]
#[get("/dashboard")]
pub async fn dashboard(state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let pool = &state.pool;
    let now = Utc::now();
    let (today_orders, today_revenue) = db::orders_since(pool, start_of_day(now)).await?;

    let overview = Overview {
        total_products: db::count_rows(pool, Collection::Products).await?,
        active_products: db::count_active_products(pool).await?,
        total_users: db::count_rows(pool, Collection::Users).await?,
        total_orders: db::count_rows(pool, Collection::Orders).await?,
        pending_orders: db::count_orders_with_status(pool, OrderStatus::Pending).await?,
        processing_orders: db::count_orders_with_status(pool, OrderStatus::Processing).await?,
        delivered_orders: db::count_orders_with_status(pool, OrderStatus::Delivered).await?,
        total_revenue: db::revenue_for_statuses(pool, &[OrderStatus::Shipped, OrderStatus::Delivered]).await?,
        today_orders,
        today_revenue,
    };

    Ok(ok(Dashboard {
        overview,
        recent_orders: db::recent_orders(pool, RECENT_ORDERS).await?,
        low_stock_products: db::low_stock_products(pool, LOW_STOCK_BELOW, LOW_STOCK_LIMIT).await?,
        monthly_stats: db::monthly_stats(pool, start_of_month_back(now, CHART_MONTHS_BACK)).await?,
    }))
}

#[utoipa::path(
    get,
    path = "/api/admin/users",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(UserListQuery),
    responses((status = 200, description = "Paginated users, newest first"))
)]
#[get("/users")]
pub async fn list_users(state: web::Data<AppState>, query: web::Query<UserListQuery>) -> ApiResult<HttpResponse> {
    let page = Page::resolve(query.page, query.limit, USERS_DEFAULT_LIMIT);
    let (users, total) = db::list_users(&state.pool, query.role, &page).await?;
    Ok(paginated(users, &page, total))
}

#[utoipa::path(
    get,
    path = "/api/admin/users/{id}",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User with recent orders", body = UserDetail),
        (status = 404, description = "User not found")
    )
)]
#[get("/users/{id}")]
pub async fn get_user(state: web::Data<AppState>, path: web::Path<Uuid>) -> ApiResult<HttpResponse> {
    let user = db::find_user_by_id(&state.pool, path.into_inner())
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    let orders = db::list_user_orders(&state.pool, user.id, Some(RECENT_ORDERS)).await?;
    Ok(ok(UserDetail { user, orders }))
}

#[utoipa::path(
    put,
    path = "/api/admin/users/{id}",
    tag = "admin",
    security(("bearer_auth" = [])),
    request_body = UpdateUserRequest,
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 404, description = "User not found")
    )
)]
#[put("/users/{id}")]
pub async fn update_user(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    payload: web::Json<UpdateUserRequest>,
) -> ApiResult<HttpResponse> {
    let mut user = db::find_user_by_id(&state.pool, path.into_inner())
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    user.role = payload.role.unwrap_or(user.role);
    user.is_active = payload.is_active.unwrap_or(user.is_active);
    if !db::set_user_access(&state.pool, user.id, user.role, user.is_active).await? {
        return Err(ApiError::not_found("User not found"));
    }
    if !user.is_active {
        db::set_refresh_token(&state.pool, user.id, None).await?;
    }
    log::info!("user access changed id={} role={} active={}", user.id, user.role, user.is_active);

    Ok(ok_with(StatusCode::OK, "User updated successfully", user))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .expect("timestamp")
            .with_timezone(&Utc)
    }

    #[test]
    fn day_starts_at_utc_midnight() {
        assert_eq!(start_of_day(at("2024-03-15T18:42:10Z")), at("2024-03-15T00:00:00Z"));
    }

    #[test]
    fn chart_window_crosses_year_boundary() {
        assert_eq!(start_of_month_back(at("2024-03-15T18:42:10Z"), 5), at("2023-10-01T00:00:00Z"));
        assert_eq!(start_of_month_back(at("2024-12-31T23:59:59Z"), 5), at("2024-07-01T00:00:00Z"));
        assert_eq!(start_of_month_back(at("2024-01-01T00:00:00Z"), 0), at("2024-01-01T00:00:00Z"));
    }
}
