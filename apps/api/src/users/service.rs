use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::user::User;
use crate::users::attachments::AttachmentKind;

pub struct NewUser<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
}

#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
}

pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, AppError> {
    Ok(
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE lower(email) = lower($1)")
            .bind(email.trim())
            .fetch_optional(pool)
            .await?,
    )
}

pub async fn find_by_id(pool: &PgPool, user_id: Uuid) -> Result<Option<User>, AppError> {
    Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?)
}

pub async fn require_user(pool: &PgPool, user_id: Uuid) -> Result<User, AppError> {
    find_by_id(pool, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// Inserts a user. A concurrent duplicate e-mail surfaces as `Conflict`.
pub async fn insert_user(pool: &PgPool, new_user: NewUser<'_>) -> Result<User, AppError> {
    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (id, first_name, last_name, email, password_hash)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(new_user.first_name.trim())
    .bind(new_user.last_name.trim())
    .bind(new_user.email.trim())
    .bind(new_user.password_hash)
    .fetch_one(pool)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict("User already exists".to_string())
        }
        _ => AppError::Database(e),
    })
}

/// Returns false when no user has that e-mail.
pub async fn update_password(
    pool: &PgPool,
    email: &str,
    password_hash: &str,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        "UPDATE users SET password_hash = $1, updated_at = now() WHERE lower(email) = lower($2)",
    )
    .bind(password_hash)
    .bind(email.trim())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn update_profile(
    pool: &PgPool,
    user_id: Uuid,
    update: ProfileUpdate,
) -> Result<User, AppError> {
    let mut user = require_user(pool, user_id).await?;
    if let Some(first_name) = update.first_name {
        user.first_name = first_name;
    }
    if let Some(last_name) = update.last_name {
        user.last_name = last_name;
    }
    if let Some(bio) = update.bio {
        user.bio = Some(bio);
    }

    Ok(sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET first_name = $2, last_name = $3, bio = $4, updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.bio)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("User not found".to_string()))?)
}

/// Points the avatar or resume field at `url` (or clears it with `None`).
pub async fn set_attachment_url(
    pool: &PgPool,
    user_id: Uuid,
    kind: AttachmentKind,
    url: Option<&str>,
) -> Result<User, AppError> {
    let sql = match kind {
        AttachmentKind::Avatar => {
            "UPDATE users SET profile_url = $2, updated_at = now() WHERE id = $1 RETURNING *"
        }
        AttachmentKind::Resume => {
            "UPDATE users SET resume_url = $2, updated_at = now() WHERE id = $1 RETURNING *"
        }
    };
    sqlx::query_as::<_, User>(sql)
        .bind(user_id)
        .bind(url)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// Deletes the user row. Jobs and reviews go with it through `ON DELETE CASCADE`.
pub async fn delete_user(pool: &PgPool, user_id: Uuid) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
