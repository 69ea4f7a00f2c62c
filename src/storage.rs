//! Object-store read client.
//!
//! The pipeline never talks to storage directly — it goes through the
//! [`ObjectStore`] trait, injected into the retriever at construction time.
//! Production uses [`HttpObjectStore`] against any S3-style endpoint; tests
//! substitute an in-memory implementation.

use std::io::Read;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("no such key: {0}")]
    NotFound(String),
    #[error("invalid bucket name: {0}")]
    InvalidBucket(String),
    #[error("access denied to {bucket}/{key}")]
    AccessDenied { bucket: String, key: String },
    #[error("storage request failed: {0}")]
    Transport(String),
}

/// A stored object's transport metadata and body stream.
///
/// `content_type` and `content_length` are whatever the store declared —
/// often generic or absent, which is why the sniffer never trusts them.
pub struct StoredObject {
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub body: Box<dyn Read + Send>,
}

impl std::fmt::Debug for StoredObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredObject")
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// A service that, given a bucket and key, yields an object or fails.
pub trait ObjectStore: Send + Sync {
    fn get(&self, bucket: &str, key: &str) -> Result<StoredObject, StoreError>;
}

/// S3-style bucket naming: 3–63 characters from `[a-z0-9.-]`, starting and
/// ending alphanumeric. Checked before any request goes out so a bad bucket
/// fails the same way regardless of endpoint.
pub fn valid_bucket_name(bucket: &str) -> bool {
    let len_ok = (3..=63).contains(&bucket.len());
    let chars_ok = bucket
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'.' || b == b'-');
    let ends_ok = bucket
        .as_bytes()
        .first()
        .zip(bucket.as_bytes().last())
        .is_some_and(|(f, l)| f.is_ascii_alphanumeric() && l.is_ascii_alphanumeric());
    len_ok && chars_ok && ends_ok
}

/// Object store backed by an S3-compatible HTTP endpoint.
///
/// Requests are path-style (`{endpoint}/{bucket}/{key}`), which works
/// against AWS, MinIO, and the like without per-bucket DNS.
pub struct HttpObjectStore {
    endpoint: Url,
    client: reqwest::blocking::Client,
}

impl HttpObjectStore {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl ObjectStore for HttpObjectStore {
    fn get(&self, bucket: &str, key: &str) -> Result<StoredObject, StoreError> {
        if !valid_bucket_name(bucket) {
            return Err(StoreError::InvalidBucket(bucket.to_string()));
        }

        let url = self
            .endpoint
            .join(&format!("{bucket}/{key}"))
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        tracing::debug!(%url, "requesting stored object");
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(key.to_string()));
        }
        if status == reqwest::StatusCode::FORBIDDEN {
            return Err(StoreError::AccessDenied {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }
        if !status.is_success() {
            return Err(StoreError::Transport(format!("status {status}")));
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let content_length = resp.content_length();

        Ok(StoredObject {
            content_type,
            content_length,
            body: Box::new(resp),
        })
    }
}
