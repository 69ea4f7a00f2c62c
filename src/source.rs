//! Source reference classification.
//!
//! The incoming `url` parameter names an image either by absolute remote URL
//! or by key within the configured storage bucket. Classification is pure
//! string inspection with no I/O and no failure mode: anything that does not
//! parse as a URL with a host component is treated as a storage key.

use url::Url;

/// Where an image lives, resolved once before retrieval starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceReference {
    /// Absolute URL with a network host; fetched over HTTP(S).
    Remote(Url),
    /// Bare key into the configured storage bucket, path separators trimmed.
    StorageKey(String),
}

impl SourceReference {
    /// Classify a raw reference string.
    ///
    /// `"https://x/abc.png"` is remote; `"abc.png"` or `"/nested/abc.png"`
    /// is a storage key with leading/trailing slashes stripped. Malformed
    /// URLs fall through to storage keys rather than erroring, matching the
    /// retrieval failure they would produce anyway.
    pub fn classify(raw: &str) -> Self {
        if let Ok(url) = Url::parse(raw) {
            if url.has_host() {
                return Self::Remote(url);
            }
        }
        Self::StorageKey(raw.trim_matches('/').to_string())
    }
}
