use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pixel scale of a capture setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationProfile {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub pixels_per_mm: f64,
    pub reference_image_url: Option<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationProfileInput {
    pub name: String,
    pub description: Option<String>,
    pub pixels_per_mm: f64,
    pub reference_image_url: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}
