use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Result};
use chrono::{Local, Utc};
use tokio_util::sync::CancellationToken;

use crate::{
    analysis::{image::ImageUpload, AnalysisService, Analyzer, SubmitRequest},
    audit::{AuditLog, AuditResource},
    audit_details,
    db::{AuditAction, BatchProcessing, BatchStatus, Database, StatusSummary},
    settings::SettingsStore,
    utils::ids,
};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// `Batch <dd/mm/yyyy> - <n> items`, dated in local time.
pub fn default_batch_name(total_files: usize) -> String {
    format!(
        "Batch {} - {} items",
        Local::now().format("%d/%m/%Y"),
        total_files
    )
}

fn average(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    Some((mean * 100.0).round() / 100.0)
}

fn new_batch(name: String, total_files: u32, status: BatchStatus) -> BatchProcessing {
    let now = Utc::now();
    BatchProcessing {
        id: ids::batch_id(),
        name,
        total_files,
        processed_files: 0,
        failed_files: 0,
        status,
        analyses: Vec::new(),
        created_at: now,
        updated_at: now,
        average_corrosion: None,
        summary: None,
    }
}

#[derive(Clone)]
pub struct BatchProcessor {
    db: Database,
    settings: Arc<SettingsStore>,
    analysis: AnalysisService,
    audit: AuditLog,
}

impl BatchProcessor {
    pub fn new(
        db: Database,
        settings: Arc<SettingsStore>,
        analysis: AnalysisService,
        audit: AuditLog,
    ) -> Self {
        Self {
            db,
            settings,
            analysis,
            audit,
        }
    }

    /// Register an empty batch to be filled later.
    pub async fn create_batch(&self, name: &str) -> Result<BatchProcessing> {
        let name = name.trim();
        if name.is_empty() {
            bail!("batch name cannot be empty");
        }
        let batch = new_batch(name.to_string(), 0, BatchStatus::Pending);
        self.db.insert_batch(&batch).await?;
        Ok(batch)
    }

    pub async fn get_batch(&self, batch_id: &str) -> Result<Option<BatchProcessing>> {
        self.db.get_batch(batch_id).await
    }

    pub async fn list_batches(&self) -> Result<Vec<BatchProcessing>> {
        self.db.list_batches().await
    }

    /// Submit every file in order under a new batch. Failed files are counted
    /// and skipped; cancellation stops before the next file.
    pub async fn process(
        &self,
        files: Vec<PathBuf>,
        template: SubmitRequest,
        cancel_token: CancellationToken,
    ) -> Result<BatchProcessing> {
        if files.is_empty() {
            bail!("batch requires at least one image");
        }
        let total_files = u32::try_from(files.len())?;

        let settings = self.settings.get();
        let analyzer = Analyzer::from_settings(&settings)?;

        let batch = new_batch(
            default_batch_name(files.len()),
            total_files,
            BatchStatus::Processing,
        );
        self.db.insert_batch(&batch).await?;
        log_info!("batch {} started with {} files", batch.id, total_files);

        let mut processed = 0u32;
        let mut failed = 0u32;
        let mut percentages = Vec::new();
        let mut summary = StatusSummary::default();
        let mut cancelled = false;

        for path in files {
            if cancel_token.is_cancelled() {
                log_warn!("batch {} cancelled after {processed} files", batch.id);
                cancelled = true;
                break;
            }

            let request = SubmitRequest {
                batch_id: Some(batch.id.clone()),
                ..template.clone()
            };
            let result = match ImageUpload::from_path(&path) {
                Ok(upload) => {
                    self.analysis
                        .submit_with(&analyzer, &settings, upload, request)
                        .await
                }
                Err(err) => Err(err),
            };

            match result {
                Ok(record) => {
                    percentages.push(record.corrosion_percentage);
                    summary.count(record.status);
                }
                Err(err) => {
                    log_error!("batch {}: {} failed: {err:#}", batch.id, path.display());
                    failed += 1;
                }
            }
            processed += 1;
            self.db
                .update_batch_progress(&batch.id, processed, failed)
                .await?;
        }

        let status = if cancelled || failed > 0 {
            BatchStatus::Error
        } else {
            BatchStatus::Completed
        };
        let finished = self
            .db
            .finish_batch(&batch.id, status, average(&percentages), summary)
            .await?;
        log_info!(
            "batch {} finished: {}/{} processed, {} failed",
            finished.id,
            finished.processed_files,
            finished.total_files,
            finished.failed_files
        );

        self.audit
            .record(
                AuditAction::Analyze,
                audit_details!(
                    "batchName" => finished.name,
                    "totalFiles" => finished.total_files,
                    "processedFiles" => finished.processed_files,
                    "failedFiles" => finished.failed_files,
                    "status" => finished.status.as_str(),
                ),
                Some(AuditResource::batch(&finished.id)),
            )
            .await;

        match self.db.get_batch(&finished.id).await? {
            Some(batch) => Ok(batch),
            None => Ok(finished),
        }
    }
}
