//! Response formatter: the boundary between the pipeline and the trigger
//! runtime.
//!
//! Error kinds are translated into status codes exactly once, here. The
//! response record mirrors a proxy-integration event: `statusCode`, `body`,
//! `isBase64Encoded`, `headers`.

use std::collections::{BTreeMap, HashMap};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Serialize;

use crate::pipeline::{Gateway, PipelineError, Transcoded, TranscodeRequest, DEFAULT_QUALITY};

/// Externally visible response shape.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub status_code: u16,
    pub body: String,
    pub is_base64_encoded: bool,
    pub headers: BTreeMap<String, String>,
}

/// Status code for a classified failure.
///
/// Caller mistakes (bad input, content the engine does not support) are 422;
/// everything else, including a missing bucket configuration, is the
/// server's fault and maps to 500.
fn status_for(err: &PipelineError) -> u16 {
    match err {
        PipelineError::Validation(_) | PipelineError::UnsupportedFormat(_) => 422,
        PipelineError::Configuration(_)
        | PipelineError::Retrieval(_)
        | PipelineError::Transform(_)
        | PipelineError::Internal(_) => 500,
    }
}

fn success(outcome: &Transcoded) -> ApiResponse {
    let mut headers = BTreeMap::new();
    headers.insert("Vary".to_string(), "Accept".to_string());
    headers.insert(
        "Content-Type".to_string(),
        outcome.format.content_type.to_string(),
    );
    headers.insert(
        "X-Optimization-Ratio".to_string(),
        format!("{:.4}", outcome.ratio),
    );

    ApiResponse {
        status_code: 200,
        body: BASE64.encode(&outcome.bytes),
        is_base64_encoded: true,
        headers,
    }
}

fn failure(err: &PipelineError) -> ApiResponse {
    let mut headers = BTreeMap::new();
    headers.insert("Vary".to_string(), "Accept".to_string());
    headers.insert("Content-Type".to_string(), "application/json".to_string());

    ApiResponse {
        status_code: status_for(err),
        body: serde_json::json!({ "error": err.to_string() }).to_string(),
        is_base64_encoded: false,
        headers,
    }
}

/// Parse an optional query value as an integer; garbled values read as
/// absent rather than erroring.
fn parse_int(value: Option<&String>) -> Option<i64> {
    value.and_then(|v| v.trim().parse().ok())
}

/// Handle one invocation's query-style parameters end to end.
pub fn handle(gateway: &Gateway, params: &HashMap<String, String>) -> ApiResponse {
    let req = TranscodeRequest {
        reference: params.get("url").cloned().unwrap_or_default(),
        quality: parse_int(params.get("q")).unwrap_or(DEFAULT_QUALITY),
        width: parse_int(params.get("w")),
        height: parse_int(params.get("h")),
    };

    match gateway.run(&req) {
        Ok(outcome) => success(&outcome),
        Err(err) => {
            tracing::warn!(error = %err, "pipeline failed");
            failure(&err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchError;
    use crate::sniff::{DetectedFormat, FormatCode, SniffError};
    use crate::transcode::TransformError;

    #[test]
    fn status_mapping_matches_error_taxonomy() {
        assert_eq!(status_for(&PipelineError::Validation("x".into())), 422);
        assert_eq!(status_for(&PipelineError::UnsupportedFormat(SniffError)), 422);
        assert_eq!(status_for(&PipelineError::Configuration("x".into())), 500);
        assert_eq!(
            status_for(&PipelineError::Retrieval(FetchError::Truncated {
                declared: 10,
                received: 5
            })),
            500
        );
        assert_eq!(
            status_for(&PipelineError::Transform(TransformError::Decode("x".into()))),
            500
        );
        assert_eq!(status_for(&PipelineError::Internal("x".into())), 500);
    }

    #[test]
    fn success_response_shape() {
        let outcome = Transcoded {
            bytes: vec![1, 2, 3],
            format: DetectedFormat {
                content_type: "image/png",
                code: FormatCode::Png,
            },
            ratio: 0.003666,
        };
        let resp = success(&outcome);

        assert_eq!(resp.status_code, 200);
        assert!(resp.is_base64_encoded);
        assert_eq!(resp.body, BASE64.encode([1u8, 2, 3]));
        assert_eq!(resp.headers["Vary"], "Accept");
        assert_eq!(resp.headers["Content-Type"], "image/png");
        assert_eq!(resp.headers["X-Optimization-Ratio"], "0.0037");
    }

    #[test]
    fn failure_response_shape() {
        let resp = failure(&PipelineError::Validation("url is required".into()));

        assert_eq!(resp.status_code, 422);
        assert!(!resp.is_base64_encoded);
        assert_eq!(resp.headers["Content-Type"], "application/json");
        assert_eq!(resp.body, r#"{"error":"url is required"}"#);
    }

    #[test]
    fn response_serializes_with_camel_case_keys() {
        let resp = failure(&PipelineError::Internal("boom".into()));
        let json = serde_json::to_value(&resp).unwrap();

        assert_eq!(json["statusCode"], 500);
        assert_eq!(json["isBase64Encoded"], false);
        assert!(json["headers"]["Content-Type"].is_string());
    }

    #[test]
    fn parse_int_tolerates_garbage() {
        assert_eq!(parse_int(Some(&"100".to_string())), Some(100));
        assert_eq!(parse_int(Some(&" 42 ".to_string())), Some(42));
        assert_eq!(parse_int(Some(&"-5".to_string())), Some(-5));
        assert_eq!(parse_int(Some(&"abc".to_string())), None);
        assert_eq!(parse_int(Some(&"".to_string())), None);
        assert_eq!(parse_int(None), None);
    }

    #[test]
    fn ratio_header_formats_to_four_decimals() {
        for (ratio, expected) in [(0.0, "0.0000"), (0.21094, "0.2109"), (1.5, "1.5000")] {
            let outcome = Transcoded {
                bytes: Vec::new(),
                format: DetectedFormat {
                    content_type: "image/jpeg",
                    code: FormatCode::Jpeg,
                },
                ratio,
            };
            assert_eq!(success(&outcome).headers["X-Optimization-Ratio"], expected);
        }
    }
}
