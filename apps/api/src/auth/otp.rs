//! One-time codes for password reset.
//!
//! Flow: `issue_otp` → `validate_otp` → `consume_reset_marker`. Each step
//! deletes the state of the previous one, so a code verifies at most once and
//! a reset needs a fresh verification.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::warn;

use crate::errors::AppError;

pub const OTP_TTL_SECS: i64 = 5 * 60;
pub const RESET_MARKER_TTL_SECS: i64 = 5 * 60;
pub const OTP_DIGITS: usize = 6;
/// Wrong guesses allowed per issued code before it is discarded.
pub const MAX_OTP_ATTEMPTS: u32 = 5;

#[derive(Debug, Error)]
pub enum OtpError {
    #[error("OTP not found")]
    NotFound,

    #[error("OTP expired")]
    Expired,

    #[error("Invalid OTP")]
    Invalid,

    #[error("OTP not verified")]
    NotVerified,

    #[error("OTP store error: {0}")]
    Store(String),
}

impl From<OtpError> for AppError {
    fn from(err: OtpError) -> Self {
        match err {
            OtpError::Store(msg) => AppError::Internal(anyhow::anyhow!(msg)),
            other => AppError::Validation(other.to_string()),
        }
    }
}

/// Expiring key-value store holding OTP state.
#[async_trait]
pub trait OtpStore: Send + Sync {
    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), OtpError>;
    async fn get(&self, key: &str) -> Result<Option<String>, OtpError>;
    async fn delete(&self, key: &str) -> Result<(), OtpError>;
}

pub struct RedisOtpStore {
    client: redis::Client,
}

impl RedisOtpStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, OtpError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| OtpError::Store(e.to_string()))
    }
}

#[async_trait]
impl OtpStore for RedisOtpStore {
    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), OtpError> {
        let mut conn = self.connection().await?;
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| OtpError::Store(e.to_string()))
    }

    async fn get(&self, key: &str) -> Result<Option<String>, OtpError> {
        let mut conn = self.connection().await?;
        redis::cmd("GET")
            .arg(key)
            .query_async::<_, Option<String>>(&mut conn)
            .await
            .map_err(|e| OtpError::Store(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), OtpError> {
        let mut conn = self.connection().await?;
        redis::cmd("DEL")
            .arg(key)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| OtpError::Store(e.to_string()))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct OtpRecord {
    hash: String,
    expires_at: i64,
    #[serde(default)]
    attempts: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ResetMarker {
    expires_at: i64,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn otp_key(email: &str) -> String {
    format!("otp:{}", normalize_email(email))
}

fn reset_key(email: &str) -> String {
    format!("reset:{}", normalize_email(email))
}

/// Six decimal digits, leading zeros kept.
pub fn generate_code<R: Rng>(rng: &mut R) -> String {
    let n: u32 = rng.gen_range(0..1_000_000);
    format!("{n:0width$}", width = OTP_DIGITS)
}

pub fn hash_code(code: &str) -> String {
    format!("{:x}", Sha256::digest(code.trim().as_bytes()))
}

/// Stores a fresh code for `email` and returns it for delivery.
/// A previous unvalidated code is replaced.
pub async fn issue_otp(store: &dyn OtpStore, email: &str, now: i64) -> Result<String, OtpError> {
    let code = generate_code(&mut rand::thread_rng());
    let record = OtpRecord {
        hash: hash_code(&code),
        expires_at: now + OTP_TTL_SECS,
        attempts: 0,
    };
    store
        .put(&otp_key(email), encode(&record)?, ttl(OTP_TTL_SECS))
        .await?;
    Ok(code)
}

/// Checks `code` against the stored hash. On success the code is consumed and
/// a reset marker is stored for the next step. After `MAX_OTP_ATTEMPTS` wrong
/// guesses the code is deleted and a new one must be requested.
pub async fn validate_otp(
    store: &dyn OtpStore,
    email: &str,
    code: &str,
    now: i64,
) -> Result<(), OtpError> {
    let key = otp_key(email);
    let raw = store.get(&key).await?.ok_or(OtpError::NotFound)?;
    let mut record: OtpRecord = decode(&raw)?;

    if record.expires_at <= now {
        store.delete(&key).await?;
        return Err(OtpError::Expired);
    }
    if record.hash != hash_code(code) {
        record.attempts += 1;
        if record.attempts >= MAX_OTP_ATTEMPTS {
            warn!("OTP discarded after {} failed attempts", record.attempts);
            store.delete(&key).await?;
        } else {
            let remaining = ttl(record.expires_at - now);
            store.put(&key, encode(&record)?, remaining).await?;
        }
        return Err(OtpError::Invalid);
    }

    store.delete(&key).await?;
    let marker = ResetMarker {
        expires_at: now + RESET_MARKER_TTL_SECS,
    };
    store
        .put(&reset_key(email), encode(&marker)?, ttl(RESET_MARKER_TTL_SECS))
        .await?;
    Ok(())
}

/// Succeeds once per successful `validate_otp`.
pub async fn consume_reset_marker(
    store: &dyn OtpStore,
    email: &str,
    now: i64,
) -> Result<(), OtpError> {
    let key = reset_key(email);
    let raw = store.get(&key).await?.ok_or(OtpError::NotVerified)?;
    store.delete(&key).await?;
    let marker: ResetMarker = decode(&raw)?;
    if marker.expires_at <= now {
        return Err(OtpError::NotVerified);
    }
    Ok(())
}

fn ttl(secs: i64) -> Duration {
    Duration::from_secs(secs.unsigned_abs())
}

fn encode<T: Serialize>(value: &T) -> Result<String, OtpError> {
    serde_json::to_string(value).map_err(|e| OtpError::Store(e.to_string()))
}

fn decode<T: for<'de> Deserialize<'de>>(raw: &str) -> Result<T, OtpError> {
    serde_json::from_str(raw).map_err(|e| OtpError::Store(e.to_string()))
}

#[cfg(test)]
pub mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// Ignores TTLs; expiry is enforced by the `expires_at` inside each value.
    #[derive(Default)]
    pub struct MemoryOtpStore {
        entries: Mutex<HashMap<String, String>>,
    }

    impl MemoryOtpStore {
        pub fn contains(&self, key: &str) -> bool {
            self.entries.lock().unwrap().contains_key(key)
        }
    }

    #[async_trait]
    impl OtpStore for MemoryOtpStore {
        async fn put(&self, key: &str, value: String, _ttl: Duration) -> Result<(), OtpError> {
            self.entries.lock().unwrap().insert(key.to_string(), value);
            Ok(())
        }

        async fn get(&self, key: &str) -> Result<Option<String>, OtpError> {
            Ok(self.entries.lock().unwrap().get(key).cloned())
        }

        async fn delete(&self, key: &str) -> Result<(), OtpError> {
            self.entries.lock().unwrap().remove(key);
            Ok(())
        }
    }
}
