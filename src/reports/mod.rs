//! Aggregated inspection reports and JSON export.

pub mod commands;

use std::{fs, path::Path};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    audit::{AuditLog, AuditResource},
    audit_details,
    db::{
        AnalysisQuery, AuditAction, BatchCorrosion, CorrosionAnalysis, DailyCorrosion, Database,
        StatusSummary, MAX_STORED_ANALYSES,
    },
};

const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Inclusive `created_at` window. Open ends are unbounded.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionReport {
    pub generated_at: DateTime<Utc>,
    pub range: ReportRange,
    pub total_analyses: u32,
    pub average_corrosion: Option<f64>,
    pub status_distribution: StatusSummary,
    pub corrosion_over_time: Vec<DailyCorrosion>,
    pub corrosion_by_batch: Vec<BatchCorrosion>,
}

/// File layout written by [`ReportService::export`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportExport {
    pub report: InspectionReport,
    pub analyses: Vec<CorrosionAnalysis>,
}

fn mean(analyses: &[CorrosionAnalysis]) -> Option<f64> {
    if analyses.is_empty() {
        return None;
    }
    let sum: f64 = analyses.iter().map(|a| a.corrosion_percentage).sum();
    Some((sum / analyses.len() as f64 * 100.0).round() / 100.0)
}

#[derive(Clone)]
pub struct ReportService {
    db: Database,
    audit: AuditLog,
}

impl ReportService {
    pub fn new(db: Database, audit: AuditLog) -> Self {
        Self { db, audit }
    }

    pub async fn build(&self, range: ReportRange) -> Result<InspectionReport> {
        let analyses = self.db.list_analyses_between(range.from, range.to).await?;
        let status_distribution = self.db.status_distribution(range.from, range.to).await?;

        Ok(InspectionReport {
            generated_at: Utc::now(),
            range,
            total_analyses: status_distribution.total(),
            average_corrosion: mean(&analyses),
            status_distribution,
            corrosion_over_time: self.db.corrosion_over_time(range.from, range.to).await?,
            corrosion_by_batch: self.db.corrosion_by_batch(range.from, range.to).await?,
        })
    }

    /// Write the records matching `query` plus a report over the same dates
    /// as pretty JSON.
    pub async fn export(&self, path: &Path, query: AnalysisQuery) -> Result<ReportExport> {
        let range = ReportRange {
            from: query.date_from,
            to: query.date_to,
        };
        let page = self
            .db
            .list_analyses(
                AnalysisQuery {
                    page: Some(1),
                    limit: Some(MAX_STORED_ANALYSES),
                    ..query
                },
                MAX_STORED_ANALYSES,
            )
            .await?;

        let export = ReportExport {
            report: self.build(range).await?,
            analyses: page.data,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let serialized = serde_json::to_string_pretty(&export)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        log_info!(
            "exported {} analyses to {}",
            export.analyses.len(),
            path.display()
        );

        let target = path.to_string_lossy();
        self.audit
            .record(
                AuditAction::Export,
                audit_details!(
                    "path" => target,
                    "analyses" => export.analyses.len(),
                ),
                Some(AuditResource::report(&target)),
            )
            .await;

        Ok(export)
    }
}
