//! Offline stand-in for the segmentation service, plus the demo records
//! used to populate an empty store.

use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use rand::{rngs::StdRng, Rng, SeedableRng};

use super::{
    image::ImageUpload, options::SubmissionOptions, status::normalize_percentage,
    AnalysisOutcome, CorrosionThresholds,
};
use crate::{
    db::{CorrosionAnalysis, RegionOfInterest},
    settings::LatencyRange,
    utils::ids,
};

/// 800x600, the frame size the simulated records pretend to have.
pub const SIMULATED_PIXELS_TOTAL: u64 = 480_000;

pub const SIMULATED_OPERATOR: &str = "Automated System";

pub const DEMO_PIECE_TYPES: [&str; 4] = ["Bolt M8", "Nut M10", "Flat Washer", "Phillips Screw"];

const DEMO_HISTORY_DAYS: i64 = 30;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone)]
pub struct SimulatedAnalyzer {
    latency: LatencyRange,
}

impl SimulatedAnalyzer {
    pub fn new(latency: LatencyRange) -> Self {
        Self { latency }
    }

    /// Random outcome for an 800x600 frame, whatever the upload's real size.
    pub async fn analyze(&self, _upload: &ImageUpload, _options: &SubmissionOptions) -> AnalysisOutcome {
        let delay_ms = if self.latency.max > self.latency.min {
            rand::thread_rng().gen_range(self.latency.min..=self.latency.max)
        } else {
            self.latency.min
        };
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        let mut rng = StdRng::from_entropy();
        let percentage = normalize_percentage(rng.gen_range(0.0..100.0));
        let pixels_total = SIMULATED_PIXELS_TOTAL;

        AnalysisOutcome {
            corrosion_percentage: percentage,
            confidence_score: Some(round2(rng.gen_range(0.7..1.0))),
            pixels_total,
            pixels_corroded: (pixels_total as f64 * percentage / 100.0).round() as u64,
            overlay_image: None,
            isolated_image: None,
        }
    }
}

/// Random historical records spread over the last 30 days.
pub fn generate_demo_analyses(count: usize, thresholds: &CorrosionThresholds) -> Vec<CorrosionAnalysis> {
    let mut rng = StdRng::from_entropy();
    let now = Utc::now();

    (0..count)
        .map(|index| {
            let percentage = normalize_percentage(rng.gen_range(0.0..100.0));
            let age_ms = rng.gen_range(0..DEMO_HISTORY_DAYS * 24 * 60 * 60 * 1000);
            let created_at = now - ChronoDuration::milliseconds(age_ms);
            let seed = now.timestamp_millis() + index as i64;

            CorrosionAnalysis {
                id: ids::analysis_id(),
                image_url: format!("https://picsum.photos/800/600?random={seed}"),
                thumbnail_url: Some(format!("https://picsum.photos/200/150?random={seed}")),
                original_filename: format!("piece_{seed}.jpg"),
                corrosion_percentage: percentage,
                confidence_score: Some(round2(rng.gen_range(0.7..1.0))),
                pixels_total: SIMULATED_PIXELS_TOTAL,
                pixels_corroded: (SIMULATED_PIXELS_TOTAL as f64 * percentage / 100.0).round() as u64,
                status: thresholds.classify(percentage),
                operator: SIMULATED_OPERATOR.to_string(),
                piece_type: DEMO_PIECE_TYPES[rng.gen_range(0..DEMO_PIECE_TYPES.len())].to_string(),
                batch_id: None,
                notes: None,
                roi: Some(RegionOfInterest {
                    x: round2(100.0 + rng.gen_range(0.0..200.0)),
                    y: round2(50.0 + rng.gen_range(0.0..100.0)),
                    width: round2(400.0 + rng.gen_range(0.0..200.0)),
                    height: round2(300.0 + rng.gen_range(0.0..150.0)),
                }),
                overlay_url: Some(format!("https://picsum.photos/800/600?random={}", seed + 1)),
                isolated_url: Some(format!("https://picsum.photos/800/600?random={}", seed + 2)),
                created_at,
                updated_at: now,
                approved_at: None,
                approved_by: None,
            }
        })
        .collect()
}
