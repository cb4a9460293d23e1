//! Batch models.

use std::str::FromStr;

use anyhow::{anyhow, Error};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::analysis::{AnalysisStatus, CorrosionAnalysis};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Pending => "pending",
            BatchStatus::Processing => "processing",
            BatchStatus::Completed => "completed",
            BatchStatus::Error => "error",
        }
    }
}

impl FromStr for BatchStatus {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(BatchStatus::Pending),
            "processing" => Ok(BatchStatus::Processing),
            "completed" => Ok(BatchStatus::Completed),
            "error" => Ok(BatchStatus::Error),
            other => Err(anyhow!("unknown batch status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusSummary {
    pub approved: u32,
    pub inspection: u32,
    pub rejected: u32,
}

impl StatusSummary {
    pub fn from_analyses<'a>(analyses: impl IntoIterator<Item = &'a CorrosionAnalysis>) -> Self {
        let mut summary = Self::default();
        for analysis in analyses {
            summary.count(analysis.status);
        }
        summary
    }

    pub fn count(&mut self, status: AnalysisStatus) {
        match status {
            AnalysisStatus::Approved => self.approved += 1,
            AnalysisStatus::Inspection => self.inspection += 1,
            AnalysisStatus::Rejected => self.rejected += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.approved + self.inspection + self.rejected
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchProcessing {
    pub id: String,
    pub name: String,
    pub total_files: u32,
    pub processed_files: u32,
    pub failed_files: u32,
    pub status: BatchStatus,
    /// Populated on lookup; listings leave it empty.
    pub analyses: Vec<CorrosionAnalysis>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub average_corrosion: Option<f64>,
    pub summary: Option<StatusSummary>,
}
