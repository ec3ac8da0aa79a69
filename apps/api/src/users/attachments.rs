//! Avatar and resume storage.
//!
//! Every upload lands under a fresh timestamped key inside the user's prefix
//! (`avatars/<user_id>/...`, `resumes/<user_id>/...`), so nothing is ever
//! overwritten. After each upload only the newest `RETAINED_PER_KIND`
//! objects of that kind are kept.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;

pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
pub const RETAINED_PER_KIND: usize = 5;

#[derive(Debug, Error)]
#[error("object storage: {0}")]
pub struct StorageError(pub String);

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Storage(err.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Avatar,
    Resume,
}

impl AttachmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttachmentKind::Avatar => "avatar",
            AttachmentKind::Resume => "resume",
        }
    }

    pub fn user_prefix(&self, user_id: Uuid) -> String {
        format!("{}s/{}/", self.as_str(), user_id)
    }

    fn accepts(&self, content_type: &str) -> bool {
        match self {
            AttachmentKind::Avatar => content_type.starts_with("image/"),
            AttachmentKind::Resume => content_type == "application/pdf",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub content_type: String,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub last_modified: DateTime<Utc>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), StorageError>;
    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, StorageError>;
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
    fn public_url(&self, key: &str) -> String;

    /// Inverse of `public_url`; `None` for URLs outside this store.
    fn key_for_url(&self, url: &str) -> Option<String>;
}

pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_base: String,
}

impl S3ObjectStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: String, public_base: String) -> Self {
        Self {
            client,
            bucket,
            public_base: public_base.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError(format!("upload of {key} failed: {e}")))?;
        info!("Uploaded s3://{}/{}", self.bucket, key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, StorageError> {
        let mut objects = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let page = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| StorageError(format!("listing {prefix} failed: {e}")))?;

            for object in page.contents() {
                let Some(key) = object.key() else { continue };
                let last_modified = object
                    .last_modified()
                    .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos()))
                    .unwrap_or(DateTime::<Utc>::MIN_UTC);
                objects.push(StoredObject {
                    key: key.to_string(),
                    last_modified,
                });
            }

            match page.next_continuation_token() {
                Some(token) if page.is_truncated() == Some(true) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }
        Ok(objects)
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError(format!("delete of {key} failed: {e}")))?;
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base, key)
    }

    fn key_for_url(&self, url: &str) -> Option<String> {
        url.strip_prefix(&self.public_base)
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|key| !key.is_empty())
            .map(str::to_string)
    }
}

pub fn validate_upload(kind: AttachmentKind, upload: &Upload) -> Result<(), AppError> {
    if upload.data.is_empty() {
        return Err(AppError::Validation("uploaded file is empty".to_string()));
    }
    if upload.data.len() > MAX_UPLOAD_BYTES {
        return Err(AppError::PayloadTooLarge(format!(
            "file exceeds the {} MB limit",
            MAX_UPLOAD_BYTES / (1024 * 1024)
        )));
    }
    if !kind.accepts(&upload.content_type) {
        return Err(AppError::Validation(format!(
            "unsupported content type '{}' for {}",
            upload.content_type,
            kind.as_str()
        )));
    }
    Ok(())
}

/// Keeps ASCII alphanumerics, `.`, `-` and `_`; everything else becomes `_`.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .take(100)
        .collect();
    if cleaned.trim_matches(['.', '_']).is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

pub fn object_key(kind: AttachmentKind, user_id: Uuid, at: DateTime<Utc>, filename: &str) -> String {
    format!(
        "{}{}-{}",
        kind.user_prefix(user_id),
        at.timestamp_millis(),
        sanitize_filename(filename)
    )
}

/// Keys beyond the newest `keep`, newest first by modification time
/// (key order breaks ties, and keys embed the upload timestamp).
pub fn select_expired(mut objects: Vec<StoredObject>, keep: usize) -> Vec<String> {
    objects.sort_by(|a, b| {
        b.last_modified
            .cmp(&a.last_modified)
            .then_with(|| b.key.cmp(&a.key))
    });
    objects.into_iter().skip(keep).map(|o| o.key).collect()
}

/// Validates and stores an upload, returning its public URL.
pub async fn store_attachment(
    store: &dyn ObjectStore,
    user_id: Uuid,
    kind: AttachmentKind,
    upload: Upload,
    now: DateTime<Utc>,
) -> Result<String, AppError> {
    validate_upload(kind, &upload)?;
    let key = object_key(kind, user_id, now, &upload.filename);
    store.put(&key, upload.data, &upload.content_type).await?;
    Ok(store.public_url(&key))
}

/// Enforces the per-user object ceiling for `kind`. Returns deleted keys.
pub async fn cleanup_old_attachments(
    store: &dyn ObjectStore,
    user_id: Uuid,
    kind: AttachmentKind,
    keep: usize,
) -> Result<Vec<String>, StorageError> {
    let objects = store.list(&kind.user_prefix(user_id)).await?;
    let expired = select_expired(objects, keep);
    for key in &expired {
        store.delete(key).await?;
    }
    if !expired.is_empty() {
        info!(
            user_id = %user_id,
            kind = kind.as_str(),
            deleted = expired.len(),
            "Removed old attachments"
        );
    }
    Ok(expired)
}

/// Key of the object `url` points at, if it lives under the caller's own
/// prefix for `kind`. Profile URLs written elsewhere are never deleted.
pub fn owned_key(
    store: &dyn ObjectStore,
    url: &str,
    kind: AttachmentKind,
    user_id: Uuid,
) -> Option<String> {
    store
        .key_for_url(url)
        .filter(|key| key.starts_with(&kind.user_prefix(user_id)))
}

/// Removes every stored object of both kinds for a deleted account. Best effort.
pub async fn purge_user_attachments(store: &dyn ObjectStore, user_id: Uuid) {
    for kind in [AttachmentKind::Avatar, AttachmentKind::Resume] {
        if let Err(e) = cleanup_old_attachments(store, user_id, kind, 0).await {
            warn!(user_id = %user_id, "Failed to purge {} objects: {e}", kind.as_str());
        }
    }
}

#[cfg(test)]
pub mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use chrono::Duration;

    use super::*;

    /// Stamps each put one second after the previous one.
    pub struct MemoryObjectStore {
        objects: Mutex<HashMap<String, StoredObject>>,
        clock: Mutex<DateTime<Utc>>,
    }

    impl Default for MemoryObjectStore {
        fn default() -> Self {
            Self {
                objects: Mutex::new(HashMap::new()),
                clock: Mutex::new(
                    DateTime::<Utc>::from_timestamp(1_790_000_000, 0).unwrap(),
                ),
            }
        }
    }

    impl MemoryObjectStore {
        pub fn keys(&self) -> Vec<String> {
            let mut keys: Vec<_> = self.objects.lock().unwrap().keys().cloned().collect();
            keys.sort();
            keys
        }
    }

    #[async_trait]
    impl ObjectStore for MemoryObjectStore {
        async fn put(&self, key: &str, _data: Bytes, _content_type: &str) -> Result<(), StorageError> {
            let mut clock = self.clock.lock().unwrap();
            *clock += Duration::seconds(1);
            self.objects.lock().unwrap().insert(
                key.to_string(),
                StoredObject {
                    key: key.to_string(),
                    last_modified: *clock,
                },
            );
            Ok(())
        }

        async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, StorageError> {
            Ok(self
                .objects
                .lock()
                .unwrap()
                .values()
                .filter(|o| o.key.starts_with(prefix))
                .cloned()
                .collect())
        }

        async fn delete(&self, key: &str) -> Result<(), StorageError> {
            self.objects.lock().unwrap().remove(key);
            Ok(())
        }

        fn public_url(&self, key: &str) -> String {
            format!("http://storage.test/bucket/{key}")
        }

        fn key_for_url(&self, url: &str) -> Option<String> {
            url.strip_prefix("http://storage.test/bucket/")
                .map(str::to_string)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MemoryObjectStore;
    use super::*;
    use chrono::Duration;

    fn png(name: &str) -> Upload {
        Upload {
            filename: name.to_string(),
            content_type: "image/png".to_string(),
            data: Bytes::from_static(b"\x89PNG"),
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_790_000_000 + secs, 0).unwrap()
    }

    fn s3_store(public_base: &str) -> S3ObjectStore {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new("us-east-1"))
            .build();
        S3ObjectStore::new(
            aws_sdk_s3::Client::from_conf(config),
            "bucket".to_string(),
            public_base.to_string(),
        )
    }

    #[test]
    fn test_s3_key_for_url_inverts_public_url() {
        let store = s3_store("https://cdn.example.com/bucket/");
        let key = "avatars/u/1790000000000-me.png";
        let url = store.public_url(key);
        assert_eq!(url, format!("https://cdn.example.com/bucket/{key}"));
        assert_eq!(store.key_for_url(&url).as_deref(), Some(key));
        assert_eq!(store.key_for_url("https://cdn.example.com/bucket/"), None);
        assert_eq!(store.key_for_url("https://cdn.example.com/bucketx/a"), None);
        assert_eq!(store.key_for_url("https://elsewhere.com/bucket/a"), None);
    }

    #[tokio::test]
    async fn test_owned_key_only_for_own_prefix() {
        let store = MemoryObjectStore::default();
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();
        let url = store_attachment(&store, user, AttachmentKind::Avatar, png("me.png"), at(0))
            .await
            .unwrap();

        let key = owned_key(&store, &url, AttachmentKind::Avatar, user).unwrap();
        assert!(key.starts_with(&format!("avatars/{user}/")));
        assert_eq!(owned_key(&store, &url, AttachmentKind::Avatar, other), None);
        assert_eq!(owned_key(&store, &url, AttachmentKind::Resume, user), None);

        let foreign = store.public_url(&format!("avatars/{other}/1-x.png"));
        assert_eq!(owned_key(&store, &foreign, AttachmentKind::Avatar, user), None);
        assert_eq!(
            owned_key(&store, "https://gravatar.com/avatar/abc", AttachmentKind::Avatar, user),
            None
        );
    }

    #[tokio::test]
    async fn test_sixth_avatar_leaves_newest_five() {
        let store = MemoryObjectStore::default();
        let user = Uuid::new_v4();
        let mut urls = Vec::new();
        for i in 0..6 {
            let url = store_attachment(&store, user, AttachmentKind::Avatar, png("me.png"), at(i))
                .await
                .unwrap();
            urls.push(url);
            cleanup_old_attachments(&store, user, AttachmentKind::Avatar, RETAINED_PER_KIND)
                .await
                .unwrap();
        }
        let remaining = store.keys();
        assert_eq!(remaining.len(), 5);
        let first_key = store.key_for_url(&urls[0]).unwrap();
        assert!(!remaining.contains(&first_key));
        for url in &urls[1..] {
            assert!(remaining.contains(&store.key_for_url(url).unwrap()));
        }
    }

    #[tokio::test]
    async fn test_cleanup_is_scoped_to_user_and_kind() {
        let store = MemoryObjectStore::default();
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();
        store_attachment(&store, other, AttachmentKind::Avatar, png("x.png"), at(0))
            .await
            .unwrap();
        let resume = Upload {
            filename: "cv.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            data: Bytes::from_static(b"%PDF"),
        };
        store_attachment(&store, user, AttachmentKind::Resume, resume, at(1))
            .await
            .unwrap();
        let deleted = cleanup_old_attachments(&store, user, AttachmentKind::Avatar, 0)
            .await
            .unwrap();
        assert!(deleted.is_empty());
        assert_eq!(store.keys().len(), 2);
    }

    #[test]
    fn test_select_expired_orders_by_modification_time() {
        let base = at(0);
        let objects = (0..7)
            .map(|i| StoredObject {
                key: format!("avatars/u/{i}"),
                last_modified: base + Duration::seconds(i),
            })
            .collect();
        let expired = select_expired(objects, 5);
        assert_eq!(expired, vec!["avatars/u/1".to_string(), "avatars/u/0".to_string()]);
    }

    #[test]
    fn test_oversized_upload_rejected() {
        let upload = Upload {
            filename: "big.png".to_string(),
            content_type: "image/png".to_string(),
            data: Bytes::from(vec![0u8; MAX_UPLOAD_BYTES + 1]),
        };
        let err = validate_upload(AttachmentKind::Avatar, &upload).unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge(_)));
    }

    #[test]
    fn test_content_type_checked_per_kind() {
        assert!(validate_upload(AttachmentKind::Resume, &png("cv.png")).is_err());
        assert!(validate_upload(AttachmentKind::Avatar, &png("me.png")).is_ok());
    }

    #[test]
    fn test_keys_are_timestamped_and_sanitized() {
        let user = Uuid::nil();
        let key = object_key(AttachmentKind::Resume, user, at(0), "../My CV (final).pdf");
        assert_eq!(
            key,
            format!(
                "resumes/{}/{}-My_CV__final_.pdf",
                user,
                at(0).timestamp_millis()
            )
        );
        assert_eq!(sanitize_filename("..."), "file");
    }
}
