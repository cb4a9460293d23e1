//! Aggregates computed for the reports view.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Average corrosion for one calendar day (UTC).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailyCorrosion {
    pub date: NaiveDate,
    pub average_corrosion: f64,
    pub analyses: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BatchCorrosion {
    pub batch_id: String,
    pub batch_name: String,
    pub average_corrosion: f64,
    pub analyses: u32,
}
