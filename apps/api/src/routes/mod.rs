pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
    Router,
};

use crate::analysis::handlers as analysis;
use crate::auth::handlers as auth;
use crate::jobs::handlers as jobs;
use crate::reviews::handlers as reviews;
use crate::state::AppState;
use crate::users::attachments::MAX_UPLOAD_BYTES;
use crate::users::handlers as users;

/// Multipart framing overhead on top of the file size cap.
const UPLOAD_BODY_LIMIT: usize = MAX_UPLOAD_BYTES + 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Auth
        .route("/auth/signup", post(auth::handle_signup))
        .route("/auth/login", post(auth::handle_login))
        .route("/auth/logout", post(auth::handle_logout))
        // Profile & account
        .route("/me/me", get(users::handle_me))
        .route("/users", axum::routing::delete(users::handle_delete_account))
        .route("/users/profile", patch(users::handle_update_profile))
        .route("/users/generate-otp", post(auth::handle_generate_otp))
        .route("/users/validate-otp", post(auth::handle_validate_otp))
        .route("/users/reset-password", patch(auth::handle_reset_password))
        .route(
            "/users/avatar",
            post(users::handle_upload_avatar)
                .delete(users::handle_delete_avatar)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/users/resume",
            post(users::handle_upload_resume)
                .delete(users::handle_delete_resume)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        // Jobs
        .route(
            "/jobs",
            get(jobs::handle_list_jobs)
                .post(jobs::handle_create_job)
                .patch(jobs::handle_update_job),
        )
        .route(
            "/jobs/:id",
            get(jobs::handle_get_job).delete(jobs::handle_delete_job),
        )
        // Reviews
        .route(
            "/reviews",
            get(reviews::handle_list_reviews).post(reviews::handle_create_review),
        )
        .route("/reviews/me", get(reviews::handle_list_my_reviews))
        .route("/reviews/user/:id", get(reviews::handle_list_user_reviews))
        .route(
            "/reviews/:id",
            axum::routing::delete(reviews::handle_delete_review),
        )
        // AI
        .route("/ai/analyze", post(analysis::handle_analyze))
        .with_state(state)
}
