//! Job applications. Every query is owner-scoped: `(id, user_id)`.

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::fields::opt_string_or_number;
use crate::models::job::{Job, JobType, RoundStatusMap};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewJob {
    pub jobtitle: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub jobtype: Option<JobType>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub salary: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "date")]
    pub date_applied: Option<NaiveDate>,
    pub round_status: Option<RoundStatusMap>,
    pub review: Option<String>,
    pub status: Option<String>,
}

/// The mutable subset of a job. Keys outside this list are dropped at
/// deserialization, so they can never reach the update.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPatch {
    pub jobtitle: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub salary: Option<String>,
    pub description: Option<String>,
    pub review: Option<String>,
    pub round_status: Option<RoundStatusMap>,
    pub status: Option<String>,
}

impl JobPatch {
    pub fn validate(&self) -> Result<(), AppError> {
        for (field, value) in [("jobtitle", &self.jobtitle), ("company", &self.company)] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                return Err(AppError::Validation(format!("{field} cannot be empty")));
            }
        }
        Ok(())
    }

    /// Overwrites only the fields present in the patch.
    pub fn apply_to(self, job: &mut Job) {
        if let Some(jobtitle) = self.jobtitle {
            job.jobtitle = jobtitle.trim().to_string();
        }
        if let Some(company) = self.company {
            job.company = company.trim().to_string();
        }
        if let Some(location) = self.location {
            job.location = Some(location);
        }
        if let Some(salary) = self.salary {
            job.salary = Some(salary);
        }
        if let Some(description) = self.description {
            job.description = Some(description);
        }
        if let Some(review) = self.review {
            job.review = Some(review);
        }
        if let Some(round_status) = self.round_status {
            job.round_status = Json(round_status);
        }
        if let Some(status) = self.status {
            job.status = Some(status);
        }
    }
}

pub async fn create_job(pool: &PgPool, user_id: Uuid, new_job: NewJob) -> Result<Job, AppError> {
    let jobtitle = required_text("jobtitle", new_job.jobtitle)?;
    let company = required_text("company", new_job.company)?;
    let jobtype = new_job.jobtype.unwrap_or_default();
    let date_applied = new_job
        .date_applied
        .unwrap_or_else(|| Utc::now().date_naive());
    let round_status = new_job.round_status.unwrap_or_default();

    let job = sqlx::query_as::<_, Job>(
        r#"
        INSERT INTO jobs
            (id, user_id, jobtitle, company, location, jobtype, salary,
             description, date_applied, round_status, review, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(jobtitle)
    .bind(company)
    .bind(new_job.location)
    .bind(jobtype.as_str())
    .bind(new_job.salary)
    .bind(new_job.description)
    .bind(date_applied)
    .bind(Json(round_status))
    .bind(new_job.review)
    .bind(new_job.status)
    .fetch_one(pool)
    .await
    .map_err(AppError::from_owned_insert)?;

    info!(user_id = %user_id, job_id = %job.id, "Job created");
    Ok(job)
}

pub async fn list_jobs(pool: &PgPool, user_id: Uuid) -> Result<Vec<Job>, AppError> {
    Ok(sqlx::query_as::<_, Job>(
        "SELECT * FROM jobs WHERE user_id = $1 ORDER BY date_applied DESC, created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

/// 404 both when the job does not exist and when someone else owns it.
pub async fn get_job(pool: &PgPool, job_id: Uuid, user_id: Uuid) -> Result<Job, AppError> {
    sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1 AND user_id = $2")
        .bind(job_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| job_not_found(job_id))
}

/// Read-modify-write without a version check; concurrent patches are last-write-wins.
pub async fn update_job(
    pool: &PgPool,
    job_id: Uuid,
    user_id: Uuid,
    patch: JobPatch,
) -> Result<Job, AppError> {
    patch.validate()?;
    let mut job = get_job(pool, job_id, user_id).await?;
    patch.apply_to(&mut job);

    sqlx::query_as::<_, Job>(
        r#"
        UPDATE jobs
        SET jobtitle = $3, company = $4, location = $5, salary = $6,
            description = $7, review = $8, round_status = $9, status = $10,
            updated_at = now()
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(job_id)
    .bind(user_id)
    .bind(&job.jobtitle)
    .bind(&job.company)
    .bind(&job.location)
    .bind(&job.salary)
    .bind(&job.description)
    .bind(&job.review)
    .bind(&job.round_status)
    .bind(&job.status)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| job_not_found(job_id))
}

pub async fn delete_job(pool: &PgPool, job_id: Uuid, user_id: Uuid) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM jobs WHERE id = $1 AND user_id = $2")
        .bind(job_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(job_not_found(job_id));
    }
    info!(user_id = %user_id, job_id = %job_id, "Job deleted");
    Ok(())
}

fn job_not_found(job_id: Uuid) -> AppError {
    AppError::NotFound(format!("Job {job_id} not found"))
}

fn required_text(field: &str, value: Option<String>) -> Result<String, AppError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Validation(format!("{field} is required")))
}
