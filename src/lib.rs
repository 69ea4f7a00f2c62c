//! # Pixgate
//!
//! An on-demand image transcoding gateway. Given a source reference (an
//! absolute URL or an object-storage key) plus one target dimension and a
//! quality, it fetches the original, determines its true format from content
//! bytes, resizes within the requested bound, re-encodes, and returns the
//! payload with its content type and compression ratio.
//!
//! # Architecture: One Pipeline Per Request
//!
//! ```text
//! params → validate → locate → retrieve → sniff → transform → respond
//! ```
//!
//! Every invocation runs the stages synchronously, start to finish, owning a
//! fresh spooled temporary buffer that is reclaimed on every exit path. The
//! only shared state is the read-only process configuration (bucket name,
//! chunk size), so concurrent invocations are fully independent.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`source`] | Classifies a reference as remote URL vs storage key — pure, no I/O |
//! | [`fetch`] | Streams remote or stored bodies into a spooled buffer in fixed-size chunks |
//! | [`storage`] | [`storage::ObjectStore`] trait + S3-style HTTP implementation |
//! | [`sniff`] | Magic-byte format detection; never trusts transport content types |
//! | [`transcode`] | Decode, aspect-preserving non-upscaling resize, policy-table re-encode |
//! | [`pipeline`] | Coordinator sequencing the stages; validation and the error taxonomy |
//! | [`response`] | Boundary formatter: outcome → proxy-style response record |
//!
//! # Design Decisions
//!
//! ## Sniff, Don't Trust
//!
//! Storage objects routinely declare `application/octet-stream` (or nothing)
//! and remote servers misreport. The [`sniff`] stage inspects the buffered
//! bytes against known signatures and its verdict is the only content type
//! the caller ever sees. Unrecognized bytes are a 422, not a pass-through.
//!
//! ## One Bound, Never Upscale
//!
//! Callers supply exactly one of width/height. The other axis follows the
//! original aspect ratio with floor rounding, and a bound at or beyond the
//! original leaves the image at its original size. See
//! [`transcode::ResizeSpec`].
//!
//! ## Results Over Exceptions
//!
//! Stage failures are explicit `Result`s carrying one of the enumerated
//! error kinds ([`pipeline::PipelineError`]), propagated with `?` and
//! translated into a status code exactly once, at the [`response`] boundary.
//!
//! ## Injected Storage Client
//!
//! The retriever talks to storage through [`storage::ObjectStore`], an
//! explicitly constructed handle passed in at gateway construction — no
//! module-load globals, and tests swap in an in-memory store.

pub mod fetch;
pub mod pipeline;
pub mod response;
pub mod sniff;
pub mod source;
pub mod storage;
pub mod transcode;

pub use pipeline::{Gateway, GatewayConfig, PipelineError, Transcoded, TranscodeRequest};
pub use response::{handle, ApiResponse};
pub use sniff::{DetectedFormat, FormatCode};
pub use transcode::ResizeSpec;
