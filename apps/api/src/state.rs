use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::otp::OtpStore;
use crate::auth::token::TokenSigner;
use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::notify::Notifier;
use crate::users::attachments::ObjectStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub tokens: TokenSigner,
    /// Expiring store for password-reset codes. Redis in production.
    pub otp: Arc<dyn OtpStore>,
    /// Avatar and resume objects. S3-compatible bucket in production.
    pub storage: Arc<dyn ObjectStore>,
    pub notifier: Arc<dyn Notifier>,
    pub llm: LlmClient,
    pub config: Config,
}
