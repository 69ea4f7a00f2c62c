//! Pipeline coordinator: validate → locate → retrieve → sniff → transform.
//!
//! One [`Gateway`] serves the whole process. Each [`Gateway::run`] call owns
//! a fresh spooled buffer and shares nothing with concurrent calls beyond
//! the read-only configuration, so invocations are fully independent. The
//! buffer is dropped on every exit path, error or not.

use std::io::{BufReader, Seek, SeekFrom};

use thiserror::Error;
use url::Url;

use crate::fetch::{FetchError, Retriever, spool_buffer, DEFAULT_CHUNK_SIZE};
use crate::sniff::{sniff, DetectedFormat, SniffError};
use crate::source::SourceReference;
use crate::storage::{HttpObjectStore, ObjectStore};
use crate::transcode::{transcode, ResizeSpec, TransformError};

/// Encode quality applied when the caller omits `q`.
pub const DEFAULT_QUALITY: i64 = 70;

const DEFAULT_STORAGE_ENDPOINT: &str = "https://s3.amazonaws.com/";

/// Classified pipeline failure. Every run either returns a fully transformed
/// payload or exactly one of these; nothing is retried internally.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Configuration(String),
    #[error("retrieval failed: {0}")]
    Retrieval(#[from] FetchError),
    #[error(transparent)]
    UnsupportedFormat(#[from] SniffError),
    #[error(transparent)]
    Transform(#[from] TransformError),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Process-wide configuration, set once at startup and read-only after.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Bucket for storage-relative references. Absent means such references
    /// always fail with a configuration error.
    pub bucket: Option<String>,
    /// Download copy granularity in bytes.
    pub chunk_size: usize,
    /// Base URL of the S3-style storage endpoint.
    pub storage_endpoint: Url,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            storage_endpoint: Url::parse(DEFAULT_STORAGE_ENDPOINT)
                .expect("default endpoint is a valid URL"),
        }
    }
}

impl GatewayConfig {
    /// Read configuration from the environment: `S3_BUCKET_NAME`,
    /// `DOWNLOAD_CHUNK_SIZE` (default 1024), `STORAGE_ENDPOINT`. Unparseable
    /// values fall back to defaults rather than aborting startup.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bucket: std::env::var("S3_BUCKET_NAME").ok().filter(|b| !b.is_empty()),
            chunk_size: std::env::var("DOWNLOAD_CHUNK_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&n: &usize| n > 0)
                .unwrap_or(DEFAULT_CHUNK_SIZE),
            storage_endpoint: std::env::var("STORAGE_ENDPOINT")
                .ok()
                .and_then(|v| Url::parse(&v).ok())
                .unwrap_or(defaults.storage_endpoint),
        }
    }
}

/// Validated caller input for one transcoding run.
#[derive(Debug, Clone, Default)]
pub struct TranscodeRequest {
    /// Absolute URL or storage-relative key.
    pub reference: String,
    /// Encode quality, forwarded to the codec unmodified.
    pub quality: i64,
    /// Target width bound; exactly one of width/height must be set.
    pub width: Option<i64>,
    pub height: Option<i64>,
}

/// Successful pipeline output.
#[derive(Debug, Clone)]
pub struct Transcoded {
    pub bytes: Vec<u8>,
    pub format: DetectedFormat,
    /// `len(output) / len(original)`; 0 when the original was empty.
    pub ratio: f64,
}

/// The coordinator: owns the retriever and configuration for the process
/// lifetime and sequences the stages per request.
pub struct Gateway {
    config: GatewayConfig,
    retriever: Retriever,
}

impl Gateway {
    /// Build a gateway with an injected object-store handle (the seam tests
    /// use to substitute an in-memory store).
    pub fn new(config: GatewayConfig, store: Box<dyn ObjectStore>) -> Self {
        let retriever = Retriever::new(store, config.chunk_size);
        Self { config, retriever }
    }

    /// Build a gateway from environment configuration, talking to the
    /// configured S3-style endpoint.
    pub fn from_env() -> Self {
        let config = GatewayConfig::from_env();
        let store = HttpObjectStore::new(config.storage_endpoint.clone());
        Self::new(config, Box::new(store))
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Run the full pipeline for one request.
    pub fn run(&self, req: &TranscodeRequest) -> Result<Transcoded, PipelineError> {
        let resize = validate(req)?;
        let source = SourceReference::classify(&req.reference);

        // Dropped on every exit path below, reclaiming spool storage.
        let mut buffer = spool_buffer();

        let original_len = match &source {
            SourceReference::Remote(url) => self.retriever.fetch_remote(url, &mut buffer)?.1,
            SourceReference::StorageKey(key) => {
                let bucket = self.config.bucket.as_deref().ok_or_else(|| {
                    PipelineError::Configuration(
                        "must specify a value for S3_BUCKET_NAME for storage support".to_string(),
                    )
                })?;
                self.retriever.fetch_stored(bucket, key, &mut buffer)?.1
            }
        };

        let format = sniff(&mut buffer)?;
        tracing::debug!(format = format.code.as_str(), original_bytes = original_len, "sniffed");

        buffer
            .seek(SeekFrom::Start(0))
            .map_err(|e| PipelineError::Internal(e.to_string()))?;
        let bytes = transcode(BufReader::new(&mut buffer), &format, req.quality, resize)?;

        let ratio = compression_ratio(bytes.len(), original_len);

        tracing::info!(
            content_type = format.content_type,
            output_bytes = bytes.len(),
            ratio,
            "transcoded"
        );
        Ok(Transcoded { bytes, format, ratio })
    }
}

/// `len(output) / len(original)`, using bytes actually written rather than
/// the declared length, so a short-but-unerroring transfer still yields a
/// correct value. Defined as 0 when the original was empty.
fn compression_ratio(output_len: usize, original_len: u64) -> f64 {
    if original_len == 0 {
        0.0
    } else {
        output_len as f64 / original_len as f64
    }
}

/// Fail-fast input validation; runs before any I/O.
fn validate(req: &TranscodeRequest) -> Result<ResizeSpec, PipelineError> {
    let invalid = |msg: &str| Err(PipelineError::Validation(msg.to_string()));

    if req.reference.is_empty() {
        return invalid("url is required");
    }

    match (req.width, req.height) {
        (Some(_), Some(_)) | (None, None) => {
            invalid("exactly one of width or height must be defined")
        }
        (Some(w), None) => match u32::try_from(w) {
            Ok(w) if w > 0 => Ok(ResizeSpec::Width(w)),
            _ => invalid("width must be greater than zero"),
        },
        (None, Some(h)) => match u32::try_from(h) {
            Ok(h) if h > 0 => Ok(ResizeSpec::Height(h)),
            _ => invalid("height must be greater than zero"),
        },
    }
}
