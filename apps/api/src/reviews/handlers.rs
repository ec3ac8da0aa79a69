use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::session::AuthUser;
use crate::errors::AppError;
use crate::extract::AppJson;
use crate::models::review::Review;
use crate::notify::{spawn_notification, templates};
use crate::reviews::service::{self, NewReview};
use crate::state::AppState;

#[derive(Serialize)]
pub struct ReviewListResponse {
    pub blogs: Vec<Review>,
}

#[derive(Serialize)]
pub struct ReviewResponse {
    pub blog: Review,
}

/// GET /reviews (public)
pub async fn handle_list_reviews(
    State(state): State<AppState>,
) -> Result<Json<ReviewListResponse>, AppError> {
    let blogs = service::list_reviews(&state.db).await?;
    Ok(Json(ReviewListResponse { blogs }))
}

/// GET /reviews/me
pub async fn handle_list_my_reviews(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ReviewListResponse>, AppError> {
    let blogs = service::list_reviews_by_user(&state.db, auth.user_id).await?;
    Ok(Json(ReviewListResponse { blogs }))
}

/// GET /reviews/user/:id
///
/// Public; returns the same fields as the public listing.
pub async fn handle_list_user_reviews(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ReviewListResponse>, AppError> {
    let blogs = service::list_reviews_by_user(&state.db, user_id).await?;
    Ok(Json(ReviewListResponse { blogs }))
}

/// POST /reviews
pub async fn handle_create_review(
    State(state): State<AppState>,
    auth: AuthUser,
    AppJson(req): AppJson<NewReview>,
) -> Result<(StatusCode, Json<ReviewResponse>), AppError> {
    let blog = service::create_review(&state.db, auth.user_id, req).await?;
    spawn_notification(
        state.notifier.clone(),
        templates::review_created(&auth.email, &blog),
    );
    Ok((StatusCode::CREATED, Json(ReviewResponse { blog })))
}

/// DELETE /reviews/:id (author only)
pub async fn handle_delete_review(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(review_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    service::delete_review(&state.db, review_id, auth.user_id).await?;
    Ok(Json(json!({ "message": "Review deleted" })))
}
