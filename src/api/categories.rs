// src/api/categories.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, delete, get, post, put, web};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::Category;
use crate::response::{message, ok, ok_with};
use crate::slug::slugify;
use crate::AppState;

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub icon: String,
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub icon: Option<String>,
    pub parent_id: Option<Uuid>,
    pub is_active: Option<bool>,
    pub sort_order: Option<i32>,
}

impl CreateCategoryRequest {
    pub fn into_category(self, now: DateTime<Utc>) -> Category {
        Category {
            id: Uuid::new_v4(),
            slug: slugify(&self.name),
            name: self.name,
            description: self.description,
            image: self.image,
            icon: self.icon,
            parent_id: self.parent_id,
            is_active: true,
            sort_order: self.sort_order,
            created_at: now,
            updated_at: now,
        }
    }
}

impl UpdateCategoryRequest {
    /// Returns true when the name changed.
    pub fn apply(self, category: &mut Category, now: DateTime<Utc>) -> bool {
        let renamed = match self.name.filter(|n| !n.trim().is_empty()) {
            Some(name) if name != category.name => {
                category.slug = slugify(&name);
                category.name = name;
                true
            }
            _ => false,
        };
        if let Some(description) = self.description {
            category.description = description;
        }
        if let Some(image) = self.image {
            category.image = image;
        }
        if let Some(icon) = self.icon {
            category.icon = icon;
        }
        if self.parent_id.is_some() {
            category.parent_id = self.parent_id;
        }
        category.is_active = self.is_active.unwrap_or(category.is_active);
        category.sort_order = self.sort_order.unwrap_or(category.sort_order);
        category.updated_at = now;
        renamed
    }
}

#[utoipa::path(get, path = "/api/categories", tag = "categories",
    responses((status = 200, description = "Active categories by sort order", body = [Category])))]
#[get("/categories")]
pub async fn list_categories(state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    Ok(ok(db::list_active_categories(&state.pool).await?))
}

#[utoipa::path(
    get,
    path = "/api/categories/{id}",
    tag = "categories",
    params(("id" = String, Path, description = "Category id or slug")),
    responses(
        (status = 200, description = "Category", body = Category),
        (status = 404, description = "Category not found")
    )
)]
#[get("/categories/{id}")]
pub async fn get_category(state: web::Data<AppState>, path: web::Path<String>) -> ApiResult<HttpResponse> {
    let category = match Uuid::parse_str(&path) {
        Ok(id) => db::find_category(&state.pool, id).await?,
        Err(_) => db::find_category_by_slug(&state.pool, &path).await?,
    };
    Ok(ok(category.ok_or_else(|| ApiError::not_found("Category not found"))?))
}

#[utoipa::path(
    post,
    path = "/api/admin/categories",
    tag = "admin",
    security(("bearer_auth" = [])),
    request_body = CreateCategoryRequest,
    responses((status = 201, description = "Category created", body = Category))
)]
#[post("/categories")]
pub async fn create_category(
    state: web::Data<AppState>,
    payload: web::Json<CreateCategoryRequest>,
) -> ApiResult<HttpResponse> {
    payload.validate()?;
    let category = payload.into_inner().into_category(Utc::now());
    db::insert_category(&state.pool, &category).await?;
    Ok(ok_with(StatusCode::CREATED, "Category created successfully", category))
}

#[utoipa::path(
    put,
    path = "/api/admin/categories/{id}",
    tag = "admin",
    security(("bearer_auth" = [])),
    request_body = UpdateCategoryRequest,
    params(("id" = Uuid, Path, description = "Category id")),
    responses(
        (status = 200, description = "Category updated", body = Category),
        (status = 404, description = "Category not found")
    )
)]
#[put("/categories/{id}")]
pub async fn update_category(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    payload: web::Json<UpdateCategoryRequest>,
) -> ApiResult<HttpResponse> {
    let mut category = db::find_category(&state.pool, path.into_inner())
        .await?
        .ok_or_else(|| ApiError::not_found("Category not found"))?;

    let renamed = payload.into_inner().apply(&mut category, Utc::now());
    db::update_category(&state.pool, &category).await?;
    if renamed {
        db::rename_category_on_products(&state.pool, category.id, &category.name).await?;
    }
    Ok(ok_with(StatusCode::OK, "Category updated successfully", category))
}

#[utoipa::path(
    delete,
    path = "/api/admin/categories/{id}",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Category id")),
    responses(
        (status = 200, description = "Category deleted"),
        (status = 404, description = "Category not found"),
        (status = 409, description = "Category still has products")
    )
)]
#[delete("/categories/{id}")]
pub async fn delete_category(state: web::Data<AppState>, path: web::Path<Uuid>) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    if db::count_products_in_category(&state.pool, id).await? > 0 {
        return Err(ApiError::Conflict("Cannot delete category with existing products".to_string()));
    }
    if !db::delete_category(&state.pool, id).await? {
        return Err(ApiError::not_found("Category not found"));
    }
    Ok(message("Category deleted successfully"))
}
