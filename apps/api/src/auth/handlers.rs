use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::auth::otp::{self, OTP_TTL_SECS};
use crate::auth::password::{hash_password, validate_new_password, verify_password};
use crate::auth::session::{cleared_session_cookie, session_cookie, AuthUser};
use crate::errors::AppError;
use crate::extract::AppJson;
use crate::models::user::User;
use crate::notify::{spawn_notification, templates};
use crate::state::AppState;
use crate::users::service::{self, NewUser};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ValidateOtpRequest {
    pub email: Option<String>,
    pub otp: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub user: User,
    pub message: &'static str,
}

/// POST /auth/signup
pub async fn handle_signup(
    State(state): State<AppState>,
    jar: CookieJar,
    AppJson(req): AppJson<SignupRequest>,
) -> Result<(StatusCode, CookieJar, Json<SessionResponse>), AppError> {
    let first_name = required("firstName", &req.first_name)?;
    let last_name = required("lastName", &req.last_name)?;
    let email = required_email(&req.email)?;
    let password = required_secret("password", &req.password)?;
    validate_new_password(password)?;

    if service::find_by_email(&state.db, email).await?.is_some() {
        return Err(AppError::Conflict("User already exists".to_string()));
    }

    let password_hash = hash_password(password)?;
    let user = service::insert_user(
        &state.db,
        NewUser {
            first_name,
            last_name,
            email,
            password_hash: &password_hash,
        },
    )
    .await?;
    info!(user_id = %user.id, "User registered");

    let token = state
        .tokens
        .issue(user.id, &user.email, Utc::now().timestamp())
        .map_err(|e| AppError::Internal(e.into()))?;
    let jar = jar.add(session_cookie(token, state.config.production));

    spawn_notification(state.notifier.clone(), templates::welcome(&user));

    Ok((
        StatusCode::CREATED,
        jar,
        Json(SessionResponse {
            user,
            message: "User registered successfully",
        }),
    ))
}

/// POST /auth/login
///
/// Unknown e-mail and wrong password produce the same 401.
pub async fn handle_login(
    State(state): State<AppState>,
    jar: CookieJar,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<(CookieJar, Json<SessionResponse>), AppError> {
    let email = required("email", &req.email)?;
    let password = required_secret("password", &req.password)?;

    let invalid = || AppError::Unauthorized("Invalid email or password".to_string());
    let user = service::find_by_email(&state.db, email)
        .await?
        .ok_or_else(invalid)?;
    if !verify_password(password, &user.password_hash) {
        return Err(invalid());
    }

    let token = state
        .tokens
        .issue(user.id, &user.email, Utc::now().timestamp())
        .map_err(|e| AppError::Internal(e.into()))?;
    let jar = jar.add(session_cookie(token, state.config.production));

    Ok((
        jar,
        Json(SessionResponse {
            user,
            message: "Login successful",
        }),
    ))
}

/// POST /auth/logout
pub async fn handle_logout(
    State(state): State<AppState>,
    _auth: AuthUser,
    jar: CookieJar,
) -> (CookieJar, Json<Value>) {
    let jar = jar.add(cleared_session_cookie(state.config.production));
    (jar, Json(json!({ "message": "Logged out" })))
}

/// POST /users/generate-otp
///
/// Always 200 so the endpoint does not reveal which e-mails have accounts.
pub async fn handle_generate_otp(
    State(state): State<AppState>,
    AppJson(req): AppJson<EmailRequest>,
) -> Result<Json<Value>, AppError> {
    let email = required_email(&req.email)?;

    if let Some(user) = service::find_by_email(&state.db, email).await? {
        match otp::issue_otp(state.otp.as_ref(), &user.email, Utc::now().timestamp()).await {
            Ok(code) => {
                let mail = templates::otp(&user.email, &code, OTP_TTL_SECS / 60);
                if let Err(e) = state.notifier.send(mail).await {
                    warn!(user_id = %user.id, "Failed to send OTP e-mail: {e}");
                }
            }
            Err(e) => warn!(user_id = %user.id, "Failed to store OTP: {e}"),
        }
    }

    Ok(Json(
        json!({ "message": "If the account exists, an OTP has been sent" }),
    ))
}

/// POST /users/validate-otp
pub async fn handle_validate_otp(
    State(state): State<AppState>,
    AppJson(req): AppJson<ValidateOtpRequest>,
) -> Result<Json<Value>, AppError> {
    let email = required_email(&req.email)?;
    let code = required("otp", &req.otp)?;
    otp::validate_otp(state.otp.as_ref(), email, code, Utc::now().timestamp()).await?;
    Ok(Json(json!({ "message": "OTP verified" })))
}

/// PATCH /users/reset-password
///
/// Only valid directly after a successful `validate-otp` for the same e-mail.
pub async fn handle_reset_password(
    State(state): State<AppState>,
    AppJson(req): AppJson<ResetPasswordRequest>,
) -> Result<Json<Value>, AppError> {
    let email = required_email(&req.email)?;
    let new_password = required_secret("newPassword", &req.new_password)?;
    validate_new_password(new_password)?;

    otp::consume_reset_marker(state.otp.as_ref(), email, Utc::now().timestamp()).await?;

    let password_hash = hash_password(new_password)?;
    if !service::update_password(&state.db, email, &password_hash).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    info!("Password reset completed");
    Ok(Json(json!({ "message": "Password updated successfully" })))
}

fn required<'a>(field: &str, value: &'a Option<String>) -> Result<&'a str, AppError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Validation(format!("{field} is required")))
}

/// Passwords are taken byte for byte; only a missing or empty value is rejected.
fn required_secret<'a>(field: &str, value: &'a Option<String>) -> Result<&'a str, AppError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Validation(format!("{field} is required")))
}

fn required_email(value: &Option<String>) -> Result<&str, AppError> {
    let email = required("email", value)?;
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(AppError::Validation("email is not valid".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_rejects_blank() {
        assert!(required("firstName", &None).is_err());
        assert!(required("firstName", &Some("   ".to_string())).is_err());
        assert_eq!(required("firstName", &Some(" A ".to_string())).unwrap(), "A");
    }

    #[test]
    fn test_password_is_not_trimmed() {
        assert!(required_secret("password", &None).is_err());
        assert!(required_secret("password", &Some(String::new())).is_err());
        let padded = Some("  pass  ".to_string());
        let password = required_secret("password", &padded).unwrap();
        assert_eq!(password, "  pass  ");
        assert!(validate_new_password(password).is_ok());
        assert!(validate_new_password(required("password", &padded).unwrap()).is_err());
    }

    #[test]
    fn test_required_email_shape() {
        assert!(required_email(&Some("a@b.com".to_string())).is_ok());
        assert!(required_email(&Some("ab.com".to_string())).is_err());
        assert!(required_email(&Some("@b.com".to_string())).is_err());
    }
}
