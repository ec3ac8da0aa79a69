//! Cookie transport for session tokens and the `AuthUser` extractor.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::auth::token::{TokenError, SESSION_TTL_SECS};
use crate::errors::AppError;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "access_token";

/// Http-only session cookie. Cross-site (`Secure`, `SameSite=None`) in production.
pub fn session_cookie(token: String, production: bool) -> Cookie<'static> {
    build_cookie(token, production, time::Duration::seconds(SESSION_TTL_SECS))
}

/// Same attributes as `session_cookie`, empty and already expired.
pub fn cleared_session_cookie(production: bool) -> Cookie<'static> {
    build_cookie(String::new(), production, time::Duration::ZERO)
}

fn build_cookie(value: String, production: bool, max_age: time::Duration) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .http_only(true)
        .path("/")
        .max_age(max_age)
        .secure(production)
        .same_site(if production {
            SameSite::None
        } else {
            SameSite::Lax
        })
        .build()
}

/// The authenticated caller, taken from the `access_token` cookie.
///
/// Missing or expired token → 401; bad signature or malformed token → 403.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(SESSION_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;

        match state.tokens.verify(&token, Utc::now().timestamp()) {
            Ok(claims) => Ok(AuthUser {
                user_id: claims.user_id,
                email: claims.email,
            }),
            Err(TokenError::Expired) => Err(AppError::Unauthorized("Session expired".to_string())),
            Err(TokenError::Invalid(reason)) => {
                debug!("Rejected session token: {reason}");
                Err(AppError::Forbidden)
            }
        }
    }
}
