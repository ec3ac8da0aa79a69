use anyhow::{bail, Context, Result};

use crate::llm_client::Provider;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub jwt_secret: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub s3_region: String,
    pub s3_public_url: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub llm: LlmConfig,
    pub smtp: Option<SmtpConfig>,
    pub production: bool,
    pub cors_origin: Option<String>,
    pub port: u16,
    pub rust_log: String,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: Provider,
    pub api_key: String,
    pub model: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub username: String,
    pub password: String,
    pub from: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let s3_endpoint = require_env("S3_ENDPOINT")?;
        let s3_bucket = require_env("S3_BUCKET")?;
        let s3_public_url = optional_env("S3_PUBLIC_URL")
            .unwrap_or_else(|| format!("{}/{}", s3_endpoint.trim_end_matches('/'), s3_bucket));

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            jwt_secret: require_env("JWT_SECRET")?,
            s3_bucket,
            s3_endpoint,
            s3_region: optional_env("S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            s3_public_url,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            llm: LlmConfig::from_env()?,
            smtp: SmtpConfig::from_env()?,
            production: optional_env("APP_ENV").is_some_and(|env| env == "production"),
            cors_origin: optional_env("CORS_ORIGIN"),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

impl LlmConfig {
    fn from_env() -> Result<Self> {
        let provider = match optional_env("LLM_PROVIDER").as_deref() {
            None | Some("openrouter") => Provider::OpenRouter,
            Some("gemini") => Provider::Gemini,
            Some(other) => bail!("LLM_PROVIDER must be 'openrouter' or 'gemini', got '{other}'"),
        };
        let api_key = match provider {
            Provider::OpenRouter => require_env("OPENROUTER_API_KEY")?,
            Provider::Gemini => require_env("GEMINI_API_KEY")?,
        };
        Ok(LlmConfig {
            provider,
            api_key,
            model: optional_env("LLM_MODEL"),
        })
    }
}

impl SmtpConfig {
    /// SMTP is optional: without `SMTP_HOST` notifications are only logged.
    fn from_env() -> Result<Option<Self>> {
        let Some(host) = optional_env("SMTP_HOST") else {
            return Ok(None);
        };
        Ok(Some(SmtpConfig {
            host,
            username: require_env("SMTP_USERNAME")?,
            password: require_env("SMTP_PASSWORD")?,
            from: require_env("MAIL_FROM")?,
        }))
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
