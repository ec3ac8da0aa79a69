use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::session::AuthUser;
use crate::errors::AppError;
use crate::extract::AppJson;
use crate::jobs::service::{self, JobPatch, NewJob};
use crate::models::job::Job;
use crate::notify::{spawn_notification, templates};
use crate::state::AppState;

#[derive(Serialize)]
pub struct JobResponse {
    pub job: Job,
}

#[derive(Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<Job>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateJobRequest {
    #[serde(rename = "jobId")]
    pub job_id: Option<Uuid>,
    #[serde(flatten)]
    pub patch: JobPatch,
}

/// GET /jobs
pub async fn handle_list_jobs(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<JobListResponse>, AppError> {
    let jobs = service::list_jobs(&state.db, auth.user_id).await?;
    Ok(Json(JobListResponse { jobs }))
}

/// GET /jobs/:id
pub async fn handle_get_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobResponse>, AppError> {
    let job = service::get_job(&state.db, job_id, auth.user_id).await?;
    Ok(Json(JobResponse { job }))
}

/// POST /jobs
pub async fn handle_create_job(
    State(state): State<AppState>,
    auth: AuthUser,
    AppJson(req): AppJson<NewJob>,
) -> Result<(StatusCode, Json<JobResponse>), AppError> {
    let job = service::create_job(&state.db, auth.user_id, req).await?;
    spawn_notification(
        state.notifier.clone(),
        templates::job_created(&auth.email, &job),
    );
    Ok((StatusCode::CREATED, Json(JobResponse { job })))
}

/// PATCH /jobs
///
/// Body is `{jobId, ...fields}`; only the allow-listed fields in `JobPatch` change.
pub async fn handle_update_job(
    State(state): State<AppState>,
    auth: AuthUser,
    AppJson(req): AppJson<UpdateJobRequest>,
) -> Result<Json<JobResponse>, AppError> {
    let job_id = req
        .job_id
        .ok_or_else(|| AppError::Validation("jobId is required".to_string()))?;
    let job = service::update_job(&state.db, job_id, auth.user_id, req.patch).await?;
    Ok(Json(JobResponse { job }))
}

/// DELETE /jobs/:id
pub async fn handle_delete_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(job_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    service::delete_job(&state.db, job_id, auth.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_request_splits_id_from_patch() {
        let req: UpdateJobRequest = serde_json::from_str(
            r#"{"jobId":"5b0c3c3e-8a4e-4a43-9f4f-3f5e1d9b2a10","roundStatus":{"HR":"passed"},"jobtype":"part-time"}"#,
        )
        .unwrap();
        assert!(req.job_id.is_some());
        assert!(req.patch.round_status.is_some());
        assert!(req.patch.jobtitle.is_none());
    }
}
