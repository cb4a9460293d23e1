//! HTTP adapter for the remote corrosion segmentation service.
//!
//! One multipart POST per image; the JSON reply is normalized into an
//! [`AnalysisOutcome`]. No retries, no queueing.

use std::time::Duration;

use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE},
    Engine,
};
use reqwest::{multipart, StatusCode, Url};
use serde::Deserialize;
use thiserror::Error;

use super::{
    image::ImageUpload,
    options::SubmissionOptions,
    status::normalize_percentage,
    AnalysisOutcome,
};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Longest service body echoed back in an error.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("invalid analysis endpoint '{0}'")]
    InvalidEndpoint(String),
    #[error("analysis request timed out after {0:?}")]
    Timeout(Duration),
    #[error("analysis request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("analysis service returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("analysis service reported an error: {0}")]
    Service(String),
    #[error("malformed analysis reply: {0}")]
    Malformed(String),
}

/// Raw reply. Field names vary between service versions, hence the aliases.
#[derive(Debug, Default, Deserialize)]
pub struct ServiceReply {
    #[serde(alias = "corrosion_percentage", alias = "corrosionPercentage", alias = "rust_percentage")]
    pub percentage: Option<f64>,
    #[serde(alias = "pixels_total", alias = "pixelsTotal", alias = "totalPixels")]
    pub total_pixels: Option<f64>,
    #[serde(
        alias = "corroded_pixels",
        alias = "pixels_corroded",
        alias = "pixelsCorrupted",
        alias = "rustPixels"
    )]
    pub rust_pixels: Option<f64>,
    #[serde(alias = "confidence_score", alias = "confidenceScore")]
    pub confidence: Option<f64>,
    #[serde(alias = "overlay")]
    pub overlay_image: Option<String>,
    #[serde(alias = "isolated")]
    pub isolated_image: Option<String>,
    pub error: Option<String>,
}

fn count(value: Option<f64>) -> Option<u64> {
    value
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v.round() as u64)
}

/// Decode a base64 image, accepting an optional `data:<mime>;base64,` prefix.
pub fn decode_image_payload(payload: &str) -> Result<Vec<u8>, SubmissionError> {
    let trimmed = payload.trim();
    let data = match trimmed.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, data)| data)
            .ok_or_else(|| SubmissionError::Malformed("data URL without payload".into()))?,
        None => trimmed,
    };
    let compact: String = data.chars().filter(|c| !c.is_whitespace()).collect();

    STANDARD
        .decode(&compact)
        .or_else(|_| URL_SAFE.decode(&compact))
        .map_err(|err| SubmissionError::Malformed(format!("invalid base64 image: {err}")))
}

/// An undecodable reply image is dropped; the measurement still counts.
fn reply_image(kind: &str, payload: Option<String>) -> Option<Vec<u8>> {
    let payload = payload.filter(|s| !s.trim().is_empty())?;
    match decode_image_payload(&payload) {
        Ok(bytes) => Some(bytes),
        Err(err) => {
            log_warn!("discarding {kind} image from analysis reply: {err}");
            None
        }
    }
}

impl ServiceReply {
    /// Fill gaps from whatever the reply does carry. `fallback_total` is the
    /// decoded image size, used when the reply omits the pixel total.
    pub fn normalize(self, fallback_total: Option<u64>) -> Result<AnalysisOutcome, SubmissionError> {
        if let Some(message) = self.error.filter(|m| !m.trim().is_empty()) {
            return Err(SubmissionError::Service(message));
        }

        let reported_total = count(self.total_pixels);
        let reported_rust = count(self.rust_pixels);
        let raw_percentage = self.percentage.filter(|p| p.is_finite());

        let percentage = match (raw_percentage, reported_total, reported_rust) {
            (Some(p), _, _) => normalize_percentage(p),
            (None, Some(total), Some(rust)) if total > 0 => {
                normalize_percentage(rust as f64 / total as f64 * 100.0)
            }
            _ => {
                return Err(SubmissionError::Malformed(
                    "reply carries neither a percentage nor pixel counts".into(),
                ))
            }
        };

        let pixels_total = reported_total.or(fallback_total).unwrap_or(0);
        let pixels_corroded = reported_rust
            .unwrap_or_else(|| (pixels_total as f64 * percentage / 100.0).round() as u64);

        let overlay_image = reply_image("overlay", self.overlay_image);
        let isolated_image = reply_image("isolated", self.isolated_image);

        Ok(AnalysisOutcome {
            corrosion_percentage: percentage,
            confidence_score: self
                .confidence
                .filter(|c| c.is_finite())
                .map(|c| (c.clamp(0.0, 1.0) * 100.0).round() / 100.0),
            pixels_total,
            pixels_corroded,
            overlay_image,
            isolated_image,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RemoteAnalyzer {
    client: reqwest::Client,
    endpoint: Url,
    timeout: Duration,
}

impl RemoteAnalyzer {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, SubmissionError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|_| SubmissionError::InvalidEndpoint(endpoint.to_string()))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(SubmissionError::InvalidEndpoint(endpoint.to_string()));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint,
            timeout,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn form(upload: &ImageUpload, options: &SubmissionOptions) -> Result<multipart::Form, SubmissionError> {
        let image = multipart::Part::bytes(upload.bytes.clone())
            .file_name(upload.filename.clone())
            .mime_str(upload.mime)?;

        let mut form = multipart::Form::new()
            .part("image", image)
            .text("rust_color", options.rust_color.wire_value())
            .text("background_color", options.background_color.wire_value());

        if let Some(roi) = options.roi {
            let roi = serde_json::to_string(&roi)
                .map_err(|err| SubmissionError::Malformed(err.to_string()))?;
            form = form.text("roi", roi);
        }
        Ok(form)
    }

    pub async fn analyze(
        &self,
        upload: &ImageUpload,
        options: &SubmissionOptions,
    ) -> Result<AnalysisOutcome, SubmissionError> {
        log_info!(
            "submitting {} ({} bytes) to {}",
            upload.filename,
            upload.bytes.len(),
            self.endpoint
        );

        let response = self
            .client
            .post(self.endpoint.clone())
            .multipart(Self::form(upload, options)?)
            .send()
            .await
            .map_err(|err| self.classify(err))?;

        let status = response.status();
        let body = response.text().await.map_err(|err| self.classify(err))?;

        if !status.is_success() {
            log_warn!("analysis service answered {status} for {}", upload.filename);
            let mut body = body.trim().to_string();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(SubmissionError::Status { status, body });
        }

        let reply: ServiceReply = serde_json::from_str(&body)
            .map_err(|err| SubmissionError::Malformed(err.to_string()))?;
        reply.normalize(upload.pixel_count())
    }

    fn classify(&self, err: reqwest::Error) -> SubmissionError {
        if err.is_timeout() {
            SubmissionError::Timeout(self.timeout)
        } else {
            SubmissionError::Transport(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(json: &str) -> ServiceReply {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn uses_reported_values() {
        let outcome = reply(
            r#"{"percentage": 42.1234, "total_pixels": 1000, "rust_pixels": 421, "confidence": 0.913}"#,
        )
        .normalize(None)
        .unwrap();
        assert_eq!(outcome.corrosion_percentage, 42.12);
        assert_eq!(outcome.pixels_total, 1000);
        assert_eq!(outcome.pixels_corroded, 421);
        assert_eq!(outcome.confidence_score, Some(0.91));
    }

    #[test]
    fn accepts_alternate_field_names() {
        let outcome = reply(r#"{"corrosionPercentage": 12.5, "pixelsTotal": 800, "pixelsCorrupted": 100}"#)
            .normalize(None)
            .unwrap();
        assert_eq!(outcome.corrosion_percentage, 12.5);
        assert_eq!(outcome.pixels_corroded, 100);
    }

    #[test]
    fn derives_percentage_from_pixel_counts() {
        let outcome = reply(r#"{"total_pixels": 400, "rust_pixels": 100}"#)
            .normalize(None)
            .unwrap();
        assert_eq!(outcome.corrosion_percentage, 25.0);
    }

    #[test]
    fn falls_back_to_image_size_for_pixel_counts() {
        let outcome = reply(r#"{"percentage": 10}"#)
            .normalize(Some(480_000))
            .unwrap();
        assert_eq!(outcome.pixels_total, 480_000);
        assert_eq!(outcome.pixels_corroded, 48_000);
    }

    #[test]
    fn clamps_out_of_range_percentages() {
        let outcome = reply(r#"{"percentage": 130.0}"#).normalize(None).unwrap();
        assert_eq!(outcome.corrosion_percentage, 100.0);
    }

    #[test]
    fn rejects_empty_and_error_replies() {
        assert!(matches!(
            reply("{}").normalize(Some(10)),
            Err(SubmissionError::Malformed(_))
        ));
        assert!(matches!(
            reply(r#"{"error": "no piece detected"}"#).normalize(None),
            Err(SubmissionError::Service(message)) if message == "no piece detected"
        ));
    }

    #[test]
    fn undecodable_reply_images_are_dropped() {
        let encoded = STANDARD.encode(b"\x89PNG payload");
        let outcome = reply(&format!(
            r#"{{"percentage": 42, "overlay_image": "not*base64", "isolated_image": "{encoded}"}}"#
        ))
        .normalize(Some(100))
        .unwrap();
        assert_eq!(outcome.corrosion_percentage, 42.0);
        assert!(outcome.overlay_image.is_none());
        assert_eq!(outcome.isolated_image.as_deref(), Some(&b"\x89PNG payload"[..]));
    }

    #[test]
    fn decodes_plain_and_data_url_images() {
        let encoded = STANDARD.encode(b"\x89PNG payload");
        assert_eq!(decode_image_payload(&encoded).unwrap(), b"\x89PNG payload");

        let data_url = format!("data:image/png;base64,{encoded}");
        assert_eq!(decode_image_payload(&data_url).unwrap(), b"\x89PNG payload");

        assert!(decode_image_payload("data:image/png;base64").is_err());
        assert!(decode_image_payload("***").is_err());
    }

    #[test]
    fn rejects_non_http_endpoints() {
        assert!(RemoteAnalyzer::new("ftp://example.com/analyze", Duration::from_secs(1)).is_err());
        assert!(RemoteAnalyzer::new("not a url", Duration::from_secs(1)).is_err());
        assert!(RemoteAnalyzer::new("http://127.0.0.1:9/analyze", Duration::from_secs(1)).is_ok());
    }
}
