// src/api/reviews.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, delete, get, post, put, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::api::auth::AuthUser;
use crate::checkout::RatingSummary;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::Review;
use crate::response::{message, ok, ok_with};
use crate::AppState;

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateReviewRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 5, message = "rating must be between 1 and 5"))]
    pub rating: i32,
    #[serde(default)]
    pub title: String,
    #[validate(length(min = 1, message = "comment is required"))]
    pub comment: String,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateReviewRequest {
    #[validate(range(min = 1, max = 5, message = "rating must be between 1 and 5"))]
    pub rating: Option<i32>,
    pub title: Option<String>,
    pub comment: Option<String>,
    pub images: Option<Vec<String>>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductReviews {
    pub reviews: Vec<Review>,
    pub count: usize,
    pub avg_rating: f64,
}

impl UpdateReviewRequest {
    pub fn apply(self, review: &mut Review, now: DateTime<Utc>) {
        if let Some(rating) = self.rating {
            review.rating = rating;
        }
        if let Some(title) = self.title.filter(|t| !t.is_empty()) {
            review.title = title;
        }
        if let Some(comment) = self.comment.filter(|c| !c.is_empty()) {
            review.comment = comment;
        }
        if let Some(images) = self.images {
            review.images = images;
        }
        review.updated_at = now;
    }
}

/// Recomputes mean rating and count from every review of the product and
/// writes both back.
async fn refresh_product_rating(state: &AppState, product_id: Uuid) -> ApiResult<RatingSummary> {
    let ratings = db::product_ratings(&state.pool, product_id).await?;
    let summary = RatingSummary::from_ratings(&ratings);
    db::set_product_rating(&state.pool, product_id, summary.average, summary.count).await?;
    Ok(summary)
}

#[utoipa::path(
    get,
    path = "/api/products/{id}/reviews",
    tag = "reviews",
    params(("id" = Uuid, Path, description = "Product id")),
    responses((status = 200, description = "Reviews, newest first, with count and mean", body = ProductReviews))
)]
#[get("/products/{id}/reviews")]
pub async fn product_reviews(state: web::Data<AppState>, path: web::Path<Uuid>) -> ApiResult<HttpResponse> {
    let reviews = db::list_product_reviews(&state.pool, path.into_inner()).await?;
    let ratings: Vec<i32> = reviews.iter().map(|r| r.rating).collect();
    let summary = RatingSummary::from_ratings(&ratings);
    Ok(ok(ProductReviews {
        count: reviews.len(),
        avg_rating: summary.average,
        reviews,
    }))
}

#[utoipa::path(
    post,
    path = "/api/reviews",
    tag = "reviews",
    security(("bearer_auth" = [])),
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Review created", body = Review),
        (status = 404, description = "Product not found"),
        (status = 409, description = "Already reviewed")
    )
)]
#[post("")]
pub async fn create_review(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    payload: web::Json<CreateReviewRequest>,
) -> ApiResult<HttpResponse> {
    payload.validate()?;
    let payload = payload.into_inner();

    if !db::product_exists(&state.pool, payload.product_id, false).await? {
        return Err(ApiError::not_found("Product not found"));
    }
    if db::review_exists(&state.pool, payload.product_id, auth.id).await? {
        return Err(ApiError::Conflict("You have already reviewed this product".to_string()));
    }

    let user = db::find_user_by_id(&state.pool, auth.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    let is_verified = db::has_delivered_purchase(&state.pool, auth.id, payload.product_id).await?;

    let now = Utc::now();
    let review = Review {
        id: Uuid::new_v4(),
        product_id: payload.product_id,
        user_id: user.id,
        user_name: user.full_name(),
        user_avatar: user.avatar,
        rating: payload.rating,
        title: payload.title,
        comment: payload.comment,
        images: payload.images,
        is_verified,
        helpful_count: 0,
        created_at: now,
        updated_at: now,
    };
    db::insert_review(&state.pool, &review).await?;
    refresh_product_rating(&state, review.product_id).await?;

    Ok(ok_with(StatusCode::CREATED, "Review created successfully", review))
}

#[utoipa::path(
    put,
    path = "/api/reviews/{id}",
    tag = "reviews",
    security(("bearer_auth" = [])),
    request_body = UpdateReviewRequest,
    params(("id" = Uuid, Path, description = "Review id")),
    responses(
        (status = 200, description = "Review updated", body = Review),
        (status = 404, description = "Review not found or not yours")
    )
)]
#[put("/{id}")]
pub async fn update_review(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<Uuid>,
    payload: web::Json<UpdateReviewRequest>,
) -> ApiResult<HttpResponse> {
    payload.validate()?;
    let mut review = db::find_review(&state.pool, path.into_inner(), Some(auth.id))
        .await?
        .ok_or_else(|| ApiError::not_found("Review not found"))?;

    payload.into_inner().apply(&mut review, Utc::now());
    db::update_review(&state.pool, &review).await?;
    refresh_product_rating(&state, review.product_id).await?;

    Ok(ok_with(StatusCode::OK, "Review updated successfully", review))
}

#[utoipa::path(
    delete,
    path = "/api/reviews/{id}",
    tag = "reviews",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Review id")),
    responses(
        (status = 200, description = "Review deleted"),
        (status = 404, description = "Review not found or not yours")
    )
)]
#[delete("/{id}")]
pub async fn delete_review(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    let author = (!auth.is_admin()).then_some(auth.id);
    let review = db::find_review(&state.pool, path.into_inner(), author)
        .await?
        .ok_or_else(|| ApiError::not_found("Review not found"))?;

    db::delete_review(&state.pool, review.id).await?;
    refresh_product_rating(&state, review.product_id).await?;

    Ok(message("Review deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review() -> Review {
        let now = Utc::now();
        Review {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            user_name: "Anita Rao".into(),
            user_avatar: String::new(),
            rating: 4,
            title: "Lovely finish".into(),
            comment: "Looks even better in person".into(),
            images: vec![],
            is_verified: true,
            helpful_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn update_keeps_blank_text() {
        let mut r = review();
        UpdateReviewRequest {
            rating: Some(2),
            title: Some(String::new()),
            comment: None,
            images: Some(vec!["https://cdn.example.com/r1.jpg".into()]),
        }
        .apply(&mut r, Utc::now());
        assert_eq!(r.rating, 2);
        assert_eq!(r.title, "Lovely finish");
        assert_eq!(r.images.len(), 1);
    }

    #[test]
    fn rating_outside_range_is_rejected() {
        let bad = UpdateReviewRequest {
            rating: Some(6),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        assert!(UpdateReviewRequest::default().validate().is_ok());

        let create: CreateReviewRequest = serde_json::from_value(serde_json::json!({
            "productId": Uuid::new_v4(),
            "rating": 0,
            "comment": "meh"
        }))
        .expect("json");
        assert!(create.validate().is_err());
    }
}
