//! Streamed retrieval into a bounded, seekable temporary buffer.
//!
//! Two source variants sit behind one capability — "fetch into buffer":
//! remote HTTP and object storage. Both copy the body in fixed-size chunks
//! into a [`SpooledTempFile`], so everything downstream of retrieval is
//! source-agnostic. The buffer spills to disk past a fixed threshold and is
//! reclaimed when dropped, on success and failure alike.

use std::io::{Read, Write};

use tempfile::SpooledTempFile;
use thiserror::Error;
use url::Url;

use crate::storage::{ObjectStore, StoreError};

/// Default copy granularity; overridable via configuration.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Bodies beyond this stay on disk rather than in memory.
const SPOOL_THRESHOLD: usize = 4 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Connect {
        url: String,
        source: reqwest::Error,
    },
    #[error("{url} returned status {status}")]
    BadStatus { url: String, status: u16 },
    #[error("transfer truncated: declared {declared} bytes, received {received}")]
    Truncated { declared: u64, received: u64 },
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Transport-declared metadata. Advisory only — the sniffer decides the
/// real format, and the original size is measured from bytes written.
#[derive(Debug, Clone, Default)]
pub struct DeclaredMeta {
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
}

/// Fresh spooled buffer for one pipeline run.
pub fn spool_buffer() -> SpooledTempFile {
    tempfile::spooled_tempfile(SPOOL_THRESHOLD)
}

/// Pulls bytes from either source variant into a caller-owned buffer.
///
/// Holds the HTTP client and the injected object-store handle for the
/// process lifetime; each fetch call is otherwise stateless.
pub struct Retriever {
    http: reqwest::blocking::Client,
    store: Box<dyn ObjectStore>,
    chunk_size: usize,
}

impl Retriever {
    pub fn new(store: Box<dyn ObjectStore>, chunk_size: usize) -> Self {
        Self {
            http: reqwest::blocking::Client::new(),
            store,
            chunk_size,
        }
    }

    /// Stream a remote URL into `buffer`.
    ///
    /// Returns the transport-declared metadata and the byte count actually
    /// written, which is the authoritative "original size" for the
    /// compression ratio.
    pub fn fetch_remote(
        &self,
        url: &Url,
        buffer: &mut SpooledTempFile,
    ) -> Result<(DeclaredMeta, u64), FetchError> {
        tracing::info!(%url, "downloading image");

        let resp = self
            .http
            .get(url.clone())
            .send()
            .map_err(|source| FetchError::Connect {
                url: url.to_string(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::BadStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let meta = DeclaredMeta {
            content_type: resp
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            content_length: resp.content_length(),
        };

        let written = copy_chunked(resp, buffer, self.chunk_size)?;
        check_complete(&meta, written)?;

        tracing::info!(
            bytes = written,
            content_type = meta.content_type.as_deref().unwrap_or("-"),
            "downloaded"
        );
        Ok((meta, written))
    }

    /// Stream an object out of `bucket` into `buffer`.
    pub fn fetch_stored(
        &self,
        bucket: &str,
        key: &str,
        buffer: &mut SpooledTempFile,
    ) -> Result<(DeclaredMeta, u64), FetchError> {
        tracing::info!(bucket, key, "downloading image from storage");

        let object = self.store.get(bucket, key)?;
        let meta = DeclaredMeta {
            content_type: object.content_type,
            content_length: object.content_length,
        };

        let written = copy_chunked(object.body, buffer, self.chunk_size)?;
        check_complete(&meta, written)?;

        tracing::info!(bytes = written, "downloaded from storage");
        Ok((meta, written))
    }
}

/// Copy `body` into the buffer in `chunk_size` slices, flush, and return
/// the total written.
fn copy_chunked(
    mut body: impl Read,
    buffer: &mut SpooledTempFile,
    chunk_size: usize,
) -> Result<u64, std::io::Error> {
    let mut chunk = vec![0u8; chunk_size.max(1)];
    let mut written = 0u64;
    loop {
        let n = body.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        buffer.write_all(&chunk[..n])?;
        written += n as u64;
    }
    buffer.flush()?;
    Ok(written)
}

/// A transfer that ends short of its declared length is an error; transfers
/// with no declared length pass through at whatever size arrived.
fn check_complete(meta: &DeclaredMeta, written: u64) -> Result<(), FetchError> {
    match meta.content_length {
        Some(declared) if written < declared => Err(FetchError::Truncated {
            declared,
            received: written,
        }),
        _ => Ok(()),
    }
}
