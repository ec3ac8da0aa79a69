//! Company reviews: publicly readable, created and deleted only by their author.

use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::fields::opt_string_or_number;
use crate::models::review::Review;

pub const MAX_RATING: f64 = 5.0;

#[derive(Debug, Deserialize)]
pub struct NewReview {
    pub company: Option<String>,
    pub review: Option<String>,
    pub rating: Option<f64>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub salary: Option<String>,
    pub rounds: Option<Vec<String>>,
    pub role: Option<String>,
}

impl NewReview {
    fn validate(self) -> Result<ValidReview, AppError> {
        let rating = self
            .rating
            .ok_or_else(|| AppError::Validation("rating is required".to_string()))?;
        if !(0.0..=MAX_RATING).contains(&rating) {
            return Err(AppError::Validation(format!(
                "rating must be between 0 and {MAX_RATING}"
            )));
        }
        let rounds = self
            .rounds
            .unwrap_or_default()
            .into_iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();
        Ok(ValidReview {
            company: required_text("company", self.company)?,
            review: required_text("review", self.review)?,
            role: required_text("role", self.role)?,
            rating,
            salary: self.salary,
            rounds,
        })
    }
}

#[derive(Debug)]
struct ValidReview {
    company: String,
    review: String,
    role: String,
    rating: f64,
    salary: Option<String>,
    rounds: Vec<String>,
}

pub async fn list_reviews(pool: &PgPool) -> Result<Vec<Review>, AppError> {
    Ok(
        sqlx::query_as::<_, Review>("SELECT * FROM reviews ORDER BY created_at DESC")
            .fetch_all(pool)
            .await?,
    )
}

pub async fn list_reviews_by_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Review>, AppError> {
    Ok(sqlx::query_as::<_, Review>(
        "SELECT * FROM reviews WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

pub async fn create_review(
    pool: &PgPool,
    user_id: Uuid,
    new_review: NewReview,
) -> Result<Review, AppError> {
    let valid = new_review.validate()?;
    let review = sqlx::query_as::<_, Review>(
        r#"
        INSERT INTO reviews (id, user_id, company, review, rating, salary, rounds, role)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(&valid.company)
    .bind(&valid.review)
    .bind(valid.rating)
    .bind(&valid.salary)
    .bind(&valid.rounds)
    .bind(&valid.role)
    .fetch_one(pool)
    .await
    .map_err(AppError::from_owned_insert)?;

    info!(user_id = %user_id, review_id = %review.id, "Review created");
    Ok(review)
}

/// Deletes only when `user_id` is the author; otherwise 404.
pub async fn delete_review(pool: &PgPool, review_id: Uuid, user_id: Uuid) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM reviews WHERE id = $1 AND user_id = $2")
        .bind(review_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Review {review_id} not found")));
    }
    info!(user_id = %user_id, review_id = %review_id, "Review deleted");
    Ok(())
}

fn required_text(field: &str, value: Option<String>) -> Result<String, AppError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Validation(format!("{field} is required")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> NewReview {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_valid_review() {
        let valid = parse(
            r#"{"company":"Acme","review":"Fair process","rating":4.5,"role":"SWE",
                "rounds":["OA"," ","Onsite"],"salary":150000}"#,
        )
        .validate()
        .unwrap();
        assert_eq!(valid.company, "Acme");
        assert_eq!(valid.rounds, vec!["OA".to_string(), "Onsite".to_string()]);
        assert_eq!(valid.salary.as_deref(), Some("150000"));
    }

    #[test]
    fn test_rating_out_of_range() {
        let err = parse(r#"{"company":"Acme","review":"x","rating":5.5,"role":"SWE"}"#)
            .validate()
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let err = parse(r#"{"company":"Acme","review":"x","rating":-1,"role":"SWE"}"#)
            .validate()
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_boundary_ratings_allowed() {
        for rating in ["0", "5"] {
            let json = format!(r#"{{"company":"Acme","review":"x","rating":{rating},"role":"SWE"}}"#);
            assert!(parse(&json).validate().is_ok());
        }
    }

    #[test]
    fn test_missing_fields() {
        let err = parse(r#"{"review":"x","rating":3,"role":"SWE"}"#)
            .validate()
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m == "company is required"));
        assert!(parse(r#"{"company":"Acme","review":"x","role":"SWE"}"#)
            .validate()
            .is_err());
    }
}
