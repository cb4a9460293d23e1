//! Analysis record models.
//!
//! `CorrosionAnalysis` is the unit everything else aggregates over: batches
//! group them, reports average them, the audit log points at them.

use std::str::FromStr;

use anyhow::{anyhow, Error};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Approved,
    Inspection,
    Rejected,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Approved => "approved",
            AnalysisStatus::Inspection => "inspection",
            AnalysisStatus::Rejected => "rejected",
        }
    }

    /// Ordering used by reports: approved < inspection < rejected.
    pub fn severity(&self) -> u8 {
        match self {
            AnalysisStatus::Approved => 0,
            AnalysisStatus::Inspection => 1,
            AnalysisStatus::Rejected => 2,
        }
    }
}

impl FromStr for AnalysisStatus {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "approved" => Ok(AnalysisStatus::Approved),
            "inspection" => Ok(AnalysisStatus::Inspection),
            "rejected" => Ok(AnalysisStatus::Rejected),
            other => Err(anyhow!("unknown analysis status '{other}'")),
        }
    }
}

/// Region of interest, in source image pixels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RegionOfInterest {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl FromStr for RegionOfInterest {
    type Err = Error;

    /// Parses `x,y,width,height`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parts = value
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| anyhow!("invalid ROI '{value}', expected x,y,width,height"))?;

        match parts.as_slice() {
            [x, y, width, height] if *width > 0.0 && *height > 0.0 => Ok(Self {
                x: *x,
                y: *y,
                width: *width,
                height: *height,
            }),
            [_, _, _, _] => Err(anyhow!("ROI width and height must be positive")),
            _ => Err(anyhow!("invalid ROI '{value}', expected x,y,width,height")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrosionAnalysis {
    pub id: String,
    pub image_url: String,
    pub thumbnail_url: Option<String>,
    pub original_filename: String,
    pub corrosion_percentage: f64,
    pub confidence_score: Option<f64>,
    pub pixels_total: u64,
    pub pixels_corroded: u64,
    pub status: AnalysisStatus,
    pub operator: String,
    pub piece_type: String,
    pub batch_id: Option<String>,
    pub notes: Option<String>,
    pub roi: Option<RegionOfInterest>,
    pub overlay_url: Option<String>,
    pub isolated_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<String>,
}

/// Filters and paging for analysis listings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub status: Option<AnalysisStatus>,
    pub operator: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub total_pages: usize,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: usize, page: usize, limit: usize) -> Self {
        let total_pages = if limit == 0 {
            0
        } else {
            total.div_ceil(limit)
        };
        Self {
            data,
            total,
            page,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_wire_names() {
        for status in [
            AnalysisStatus::Approved,
            AnalysisStatus::Inspection,
            AnalysisStatus::Rejected,
        ] {
            assert_eq!(status.as_str().parse::<AnalysisStatus>().unwrap(), status);
        }
        assert!("pending".parse::<AnalysisStatus>().is_err());
    }

    #[test]
    fn parses_roi() {
        let roi: RegionOfInterest = "10, 20,300,150".parse().unwrap();
        assert_eq!(roi.width, 300.0);
        assert!("1,2,3".parse::<RegionOfInterest>().is_err());
        assert!("1,2,0,4".parse::<RegionOfInterest>().is_err());
    }

    #[test]
    fn page_rounds_total_pages_up() {
        let page: Page<u8> = Page::new(vec![], 21, 1, 10);
        assert_eq!(page.total_pages, 3);
        let empty: Page<u8> = Page::new(vec![], 0, 1, 10);
        assert_eq!(empty.total_pages, 0);
    }
}
