pub mod client;
pub mod commands;
pub mod image;
pub mod options;
pub mod service;
pub mod simulated;
pub mod status;

use std::time::Duration;

use anyhow::Result;

pub use client::{RemoteAnalyzer, SubmissionError};
pub use image::{ArtifactStore, ImageUpload};
pub use options::{BackgroundColor, RustColor, SubmissionOptions, SubmitRequest};
pub use service::AnalysisService;
pub use simulated::SimulatedAnalyzer;
pub use status::CorrosionThresholds;

use crate::settings::AppSettings;

/// Normalized result of one analysis, before it becomes a stored record.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub corrosion_percentage: f64,
    pub confidence_score: Option<f64>,
    pub pixels_total: u64,
    pub pixels_corroded: u64,
    pub overlay_image: Option<Vec<u8>>,
    pub isolated_image: Option<Vec<u8>>,
}

/// Remote service when an endpoint is configured, simulation otherwise.
#[derive(Debug, Clone)]
pub enum Analyzer {
    Remote(RemoteAnalyzer),
    Simulated(SimulatedAnalyzer),
}

impl Analyzer {
    pub fn from_settings(settings: &AppSettings) -> Result<Self> {
        match settings.analysis_endpoint.as_deref() {
            Some(endpoint) => Ok(Analyzer::Remote(RemoteAnalyzer::new(
                endpoint,
                Duration::from_millis(settings.request_timeout_ms),
            )?)),
            None => Ok(Analyzer::Simulated(SimulatedAnalyzer::new(
                settings.simulated_latency_ms,
            ))),
        }
    }

    pub fn is_simulated(&self) -> bool {
        matches!(self, Analyzer::Simulated(_))
    }

    pub async fn analyze(
        &self,
        upload: &ImageUpload,
        options: &SubmissionOptions,
    ) -> Result<AnalysisOutcome> {
        match self {
            Analyzer::Remote(remote) => Ok(remote.analyze(upload, options).await?),
            Analyzer::Simulated(simulated) => Ok(simulated.analyze(upload, options).await),
        }
    }
}
