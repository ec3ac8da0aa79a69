use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::analysis::prompts::build_analysis_prompt;
use crate::auth::session::AuthUser;
use crate::errors::AppError;
use crate::extract::AppJson;
use crate::jobs::service::get_job;
use crate::llm_client::prompts::CAREER_COACH_SYSTEM;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub job_id: Option<Uuid>,
    /// Free-text notes; the job's stored review is used when absent.
    pub review: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub response: String,
}

/// POST /ai/analyze
///
/// Upstream failures surface as a generic 500; details are only logged.
pub async fn handle_analyze(
    State(state): State<AppState>,
    auth: AuthUser,
    AppJson(req): AppJson<AnalysisRequest>,
) -> Result<Json<AnalysisResponse>, AppError> {
    let job_id = req
        .job_id
        .ok_or_else(|| AppError::Validation("jobId is required".to_string()))?;
    let job = get_job(&state.db, job_id, auth.user_id).await?;

    let review = req.review.as_deref().or(job.review.as_deref());
    let prompt = build_analysis_prompt(&job, review);

    info!(user_id = %auth.user_id, job_id = %job_id, model = state.llm.model(), "Requesting analysis");
    let response = state
        .llm
        .call(&prompt, CAREER_COACH_SYSTEM)
        .await
        .map_err(|e| AppError::Llm(format!("analysis of job {job_id} failed: {e}")))?;

    Ok(Json(AnalysisResponse { response }))
}
