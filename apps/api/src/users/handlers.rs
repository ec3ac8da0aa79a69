use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::auth::session::{cleared_session_cookie, AuthUser};
use crate::errors::AppError;
use crate::extract::AppJson;
use crate::jobs::service::list_jobs;
use crate::models::job::Job;
use crate::models::review::Review;
use crate::models::user::User;
use crate::reviews::service::list_reviews_by_user;
use crate::state::AppState;
use crate::users::attachments::{
    cleanup_old_attachments, owned_key, purge_user_attachments, store_attachment,
    AttachmentKind, Upload, RETAINED_PER_KIND,
};
use crate::users::service::{self, ProfileUpdate};

#[derive(Serialize)]
pub struct MeResponse {
    pub user: User,
    pub jobs: Vec<Job>,
    pub reviews: Vec<Review>,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub user: User,
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
}

/// GET /me/me
pub async fn handle_me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<MeResponse>, AppError> {
    let user = service::require_user(&state.db, auth.user_id).await?;
    let jobs = list_jobs(&state.db, auth.user_id).await?;
    let reviews = list_reviews_by_user(&state.db, auth.user_id).await?;
    Ok(Json(MeResponse {
        user,
        jobs,
        reviews,
    }))
}

/// PATCH /users/profile
pub async fn handle_update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    AppJson(req): AppJson<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, AppError> {
    for (field, value) in [("firstName", &req.first_name), ("lastName", &req.last_name)] {
        if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
            return Err(AppError::Validation(format!("{field} cannot be empty")));
        }
    }
    let update = ProfileUpdate {
        first_name: req.first_name.map(|v| v.trim().to_string()),
        last_name: req.last_name.map(|v| v.trim().to_string()),
        bio: req.bio,
    };
    let user = service::update_profile(&state.db, auth.user_id, update).await?;
    Ok(Json(UserResponse { user }))
}

/// POST /users/avatar
pub async fn handle_upload_avatar(
    state: State<AppState>,
    auth: AuthUser,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    upload(state, auth, multipart, AttachmentKind::Avatar).await
}

/// POST /users/resume
pub async fn handle_upload_resume(
    state: State<AppState>,
    auth: AuthUser,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    upload(state, auth, multipart, AttachmentKind::Resume).await
}

/// DELETE /users/avatar
pub async fn handle_delete_avatar(
    state: State<AppState>,
    auth: AuthUser,
) -> Result<Json<Value>, AppError> {
    remove_attachment(state, auth, AttachmentKind::Avatar).await
}

/// DELETE /users/resume
pub async fn handle_delete_resume(
    state: State<AppState>,
    auth: AuthUser,
) -> Result<Json<Value>, AppError> {
    remove_attachment(state, auth, AttachmentKind::Resume).await
}

/// DELETE /users
///
/// Jobs and reviews are removed by the database cascade; stored files are
/// purged afterwards on a best-effort basis.
pub async fn handle_delete_account(
    State(state): State<AppState>,
    auth: AuthUser,
    jar: CookieJar,
) -> Result<(CookieJar, Json<Value>), AppError> {
    if !service::delete_user(&state.db, auth.user_id).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    info!(user_id = %auth.user_id, "Account deleted");
    purge_user_attachments(state.storage.as_ref(), auth.user_id).await;

    let jar = jar.add(cleared_session_cookie(state.config.production));
    Ok((jar, Json(json!({ "message": "Account deleted" }))))
}

async fn upload(
    State(state): State<AppState>,
    auth: AuthUser,
    multipart: Multipart,
    kind: AttachmentKind,
) -> Result<Json<UploadResponse>, AppError> {
    let file = read_single_file(multipart).await?;
    let url = store_attachment(state.storage.as_ref(), auth.user_id, kind, file, Utc::now()).await?;
    service::set_attachment_url(&state.db, auth.user_id, kind, Some(&url)).await?;

    if let Err(e) =
        cleanup_old_attachments(state.storage.as_ref(), auth.user_id, kind, RETAINED_PER_KIND)
            .await
    {
        warn!(user_id = %auth.user_id, "Attachment cleanup failed: {e}");
    }

    Ok(Json(UploadResponse { url }))
}

async fn remove_attachment(
    State(state): State<AppState>,
    auth: AuthUser,
    kind: AttachmentKind,
) -> Result<Json<Value>, AppError> {
    let user = service::require_user(&state.db, auth.user_id).await?;
    let current = match kind {
        AttachmentKind::Avatar => user.profile_url,
        AttachmentKind::Resume => user.resume_url,
    };
    service::set_attachment_url(&state.db, auth.user_id, kind, None).await?;

    let key = current
        .as_deref()
        .and_then(|url| owned_key(state.storage.as_ref(), url, kind, auth.user_id));
    if let Some(key) = key {
        if let Err(e) = state.storage.delete(&key).await {
            warn!(user_id = %auth.user_id, "Failed to delete {key}: {e}");
        }
    }

    Ok(Json(json!({ "message": format!("{} removed", kind.as_str()) })))
}

/// Reads exactly one file part from the form.
async fn read_single_file(mut multipart: Multipart) -> Result<Upload, AppError> {
    let mut file: Option<Upload> = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.file_name().is_none() {
            continue;
        }
        if file.is_some() {
            return Err(AppError::Validation("only one file may be uploaded".to_string()));
        }
        let filename = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field.bytes().await.map_err(multipart_error)?;
        file = Some(Upload {
            filename,
            content_type,
            data,
        });
    }
    file.ok_or_else(|| AppError::Validation("no file provided".to_string()))
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::Validation(err.body_text())
    }
}
