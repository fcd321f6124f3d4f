// src/api/auth.rs

use std::task::{Context, Poll};

use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::StatusCode;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{Error, HttpMessage, HttpResponse, get, post, put, web};
use bcrypt::{DEFAULT_COST, hash, verify};
use chrono::Utc;
use futures_util::future::{LocalBoxFuture, Ready, ready};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::config::Config;
use crate::db;
use crate::error::{ApiError, ApiResult, conflict_on_duplicate};
use crate::models::{Address, Role, User};
use crate::response::{message, ok, ok_with};
use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

/// The caller, as established by [`JwtMiddleware`]. Read it with `web::ReqData<AuthUser>`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

pub fn issue_token(user: &User, kind: TokenKind, config: &Config) -> Result<String, jsonwebtoken::errors::Error> {
    let lifetime = match kind {
        TokenKind::Access => config.jwt_expiry,
        TokenKind::Refresh => config.refresh_token_expiry,
    };
    let now = Utc::now().timestamp();
    let claims = Claims {
        user_id: user.id,
        email: user.email.clone(),
        role: user.role,
        kind,
        iat: now,
        exp: now + lifetime.as_secs() as i64,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(config.jwt_secret.as_bytes()))
}

/// Signature and expiry check, then the token must be of the expected kind.
pub fn verify_token(token: &str, kind: TokenKind, secret: &str) -> Option<Claims> {
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())
        .ok()
        .map(|data| data.claims)
        .filter(|claims| claims.kind == kind)
}

fn authenticate(req: &ServiceRequest, required: Option<Role>) -> ApiResult<AuthUser> {
    let state = req
        .app_data::<web::Data<AppState>>()
        .ok_or_else(|| ApiError::Internal("Application state missing".to_string()))?;

    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Authorization header required".to_string()))?;

    let token = match header.split_once(' ') {
        Some(("Bearer", token)) if !token.is_empty() && !token.contains(' ') => token,
        _ => return Err(ApiError::Unauthorized("Invalid authorization header format".to_string())),
    };

    let claims = verify_token(token, TokenKind::Access, &state.config.jwt_secret)
        .ok_or_else(|| ApiError::Unauthorized("Invalid or expired token".to_string()))?;

    if let Some(role) = required {
        if claims.role != role {
            return Err(ApiError::Forbidden(format!("{} access required", capitalized(role.as_str()))));
        }
    }

    Ok(AuthUser {
        id: claims.user_id,
        email: claims.email,
        role: claims.role,
    })
}

fn capitalized(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Middleware that:
/// - takes `Authorization: Bearer <jwt>`
/// - validates an access token against the configured secret
/// - optionally requires a role (403 otherwise)
/// - puts [`AuthUser`] into `req.extensions_mut()`
#[derive(Debug, Clone, Copy, Default)]
pub struct JwtMiddleware {
    required: Option<Role>,
}

impl JwtMiddleware {
    pub fn authenticated() -> Self {
        Self { required: None }
    }

    pub fn admin() -> Self {
        Self {
            required: Some(Role::Admin),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = JwtMiddlewareInner<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtMiddlewareInner {
            service,
            required: self.required,
        }))
    }
}

pub struct JwtMiddlewareInner<S> {
    service: S,
    required: Option<Role>,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareInner<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        match authenticate(&req, self.required) {
            Ok(user) => {
                req.extensions_mut().insert(user);
                let fut = self.service.call(req);
                Box::pin(async move { fut.await })
            }
            Err(e) => {
                log::debug!("rejected {} {}: {e}", req.method(), req.path());
                Box::pin(async move { Err(e.into()) })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// handlers

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: String,
    #[validate(length(min = 1, message = "firstName is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "lastName is required"))]
    pub last_name: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub avatar: Option<String>,
    /// Replaces the whole list; entries without an id get a fresh one.
    pub addresses: Option<Vec<Address>>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "currentPassword is required"))]
    pub current_password: String,
    #[validate(length(min = 6, message = "newPassword must be at least 6 characters"))]
    pub new_password: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Issues both tokens and persists the refresh token on the user record.
async fn issue_session(state: &AppState, user: &User) -> ApiResult<TokenPair> {
    let access_token = issue_token(user, TokenKind::Access, &state.config)?;
    let refresh_token = issue_token(user, TokenKind::Refresh, &state.config)?;
    db::set_refresh_token(&state.pool, user.id, Some(&refresh_token)).await?;
    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

pub fn assign_address_ids(addresses: &mut [Address]) {
    for address in addresses.iter_mut().filter(|a| a.id.is_none()) {
        address.id = Some(Uuid::new_v4());
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created, tokens issued", body = AuthResponse),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Email already registered")
    )
)]
#[post("/auth/register")]
pub async fn register(state: web::Data<AppState>, payload: web::Json<RegisterRequest>) -> ApiResult<HttpResponse> {
    payload.validate()?;
    let payload = payload.into_inner();
    let email = normalize_email(&payload.email);

    if db::find_user_by_email(&state.pool, &email).await?.is_some() {
        return Err(ApiError::Conflict("User with this email already exists".to_string()));
    }

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        email,
        password_hash: hash(&payload.password, DEFAULT_COST)?,
        first_name: payload.first_name.trim().to_string(),
        last_name: payload.last_name.trim().to_string(),
        phone: payload.phone,
        avatar: String::new(),
        role: Role::Customer,
        addresses: Vec::new(),
        is_active: true,
        is_verified: false,
        refresh_token: None,
        created_at: now,
        updated_at: now,
    };
    db::insert_user(&state.pool, &user)
        .await
        .map_err(|e| conflict_on_duplicate(e, "User with this email already exists"))?;

    let tokens = issue_session(&state, &user).await?;
    log::info!("registered user id={} email={}", user.id, user.email);

    Ok(ok_with(
        StatusCode::CREATED,
        "User registered successfully",
        AuthResponse {
            user,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        },
    ))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid email or password"),
        (status = 403, description = "Account is deactivated")
    )
)]
#[post("/auth/login")]
pub async fn login(state: web::Data<AppState>, payload: web::Json<LoginRequest>) -> ApiResult<HttpResponse> {
    payload.validate()?;
    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

    let user = db::find_user_by_email(&state.pool, &normalize_email(&payload.email))
        .await?
        .ok_or_else(invalid)?;

    if !user.is_active {
        return Err(ApiError::Forbidden("Account is deactivated".to_string()));
    }
    if !verify(&payload.password, &user.password_hash)? {
        return Err(invalid());
    }

    let tokens = issue_session(&state, &user).await?;
    Ok(ok_with(
        StatusCode::OK,
        "Login successful",
        AuthResponse {
            user,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        },
    ))
}

#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    tag = "auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Tokens rotated", body = TokenPair),
        (status = 401, description = "Invalid refresh token")
    )
)]
#[post("/auth/refresh")]
pub async fn refresh(state: web::Data<AppState>, payload: web::Json<RefreshRequest>) -> ApiResult<HttpResponse> {
    let invalid = || ApiError::Unauthorized("Invalid refresh token".to_string());

    let claims =
        verify_token(&payload.refresh_token, TokenKind::Refresh, &state.config.jwt_secret).ok_or_else(invalid)?;
    let user = db::find_user_by_id(&state.pool, claims.user_id)
        .await?
        .filter(|u| u.refresh_token.as_deref() == Some(payload.refresh_token.as_str()))
        .ok_or_else(invalid)?;
    if !user.is_active {
        return Err(ApiError::Forbidden("Account is deactivated".to_string()));
    }

    let tokens = issue_session(&state, &user).await?;
    Ok(ok_with(StatusCode::OK, "Token refreshed successfully", tokens))
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Refresh token revoked"))
)]
#[post("/auth/logout", wrap = "JwtMiddleware::authenticated()")]
pub async fn logout(state: web::Data<AppState>, auth: web::ReqData<AuthUser>) -> ApiResult<HttpResponse> {
    db::set_refresh_token(&state.pool, auth.id, None).await?;
    Ok(message("Logged out successfully"))
}

#[utoipa::path(
    get,
    path = "/api/auth/profile",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 404, description = "User not found")
    )
)]
#[get("/auth/profile", wrap = "JwtMiddleware::authenticated()")]
pub async fn get_profile(state: web::Data<AppState>, auth: web::ReqData<AuthUser>) -> ApiResult<HttpResponse> {
    let user = db::find_user_by_id(&state.pool, auth.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(ok(user))
}

#[utoipa::path(
    put,
    path = "/api/auth/profile",
    tag = "auth",
    security(("bearer_auth" = [])),
    request_body = UpdateProfileRequest,
    responses((status = 200, description = "Updated user", body = User))
)]
#[put("/auth/profile", wrap = "JwtMiddleware::authenticated()")]
pub async fn update_profile(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    payload: web::Json<UpdateProfileRequest>,
) -> ApiResult<HttpResponse> {
    let mut user = db::find_user_by_id(&state.pool, auth.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let payload = payload.into_inner();
    let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
    if let Some(first_name) = non_empty(payload.first_name) {
        user.first_name = first_name;
    }
    if let Some(last_name) = non_empty(payload.last_name) {
        user.last_name = last_name;
    }
    if let Some(phone) = non_empty(payload.phone) {
        user.phone = phone;
    }
    if let Some(avatar) = non_empty(payload.avatar) {
        user.avatar = avatar;
    }
    if let Some(mut addresses) = payload.addresses {
        assign_address_ids(&mut addresses);
        user.addresses = addresses;
    }
    user.updated_at = Utc::now();

    db::update_profile(&state.pool, &user).await?;
    Ok(ok_with(StatusCode::OK, "Profile updated successfully", user))
}

#[utoipa::path(
    put,
    path = "/api/auth/change-password",
    tag = "auth",
    security(("bearer_auth" = [])),
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed"),
        (status = 400, description = "Current password is incorrect")
    )
)]
#[put("/auth/change-password", wrap = "JwtMiddleware::authenticated()")]
pub async fn change_password(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    payload: web::Json<ChangePasswordRequest>,
) -> ApiResult<HttpResponse> {
    payload.validate()?;
    let user = db::find_user_by_id(&state.pool, auth.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if !verify(&payload.current_password, &user.password_hash)? {
        return Err(ApiError::validation("Current password is incorrect"));
    }

    let password_hash = hash(&payload.new_password, DEFAULT_COST)?;
    db::update_password(&state.pool, user.id, &password_hash).await?;
    Ok(message("Password changed successfully"))
}
