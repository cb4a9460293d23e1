use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use chrono::Utc;

use super::{
    image::{ArtifactStore, ImageUpload},
    options::SubmitRequest,
    simulated::generate_demo_analyses,
    AnalysisOutcome, Analyzer,
};
use crate::{
    audit::{AuditLog, AuditResource},
    audit_details,
    db::{
        AnalysisQuery, AnalysisStatus, AuditAction, CorrosionAnalysis, Database, Page,
        SEED_ANALYSES,
    },
    settings::{AppSettings, SettingsStore},
    utils::ids,
};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

fn display_path(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[derive(Clone)]
pub struct AnalysisService {
    db: Database,
    settings: Arc<SettingsStore>,
    artifacts: ArtifactStore,
    audit: AuditLog,
}

impl AnalysisService {
    pub fn new(
        db: Database,
        settings: Arc<SettingsStore>,
        artifacts: ArtifactStore,
        audit: AuditLog,
    ) -> Self {
        Self {
            db,
            settings,
            artifacts,
            audit,
        }
    }

    pub async fn submit(&self, path: &Path, request: SubmitRequest) -> Result<CorrosionAnalysis> {
        let upload = ImageUpload::from_path(path)?;
        self.submit_upload(upload, request).await
    }

    pub async fn submit_upload(
        &self,
        upload: ImageUpload,
        request: SubmitRequest,
    ) -> Result<CorrosionAnalysis> {
        let settings = self.settings.get();
        let analyzer = Analyzer::from_settings(&settings)?;
        self.submit_with(&analyzer, &settings, upload, request).await
    }

    /// Run one submission against an already built analyzer. Batches reuse a
    /// single analyzer and settings snapshot for every file.
    pub(crate) async fn submit_with(
        &self,
        analyzer: &Analyzer,
        settings: &AppSettings,
        upload: ImageUpload,
        request: SubmitRequest,
    ) -> Result<CorrosionAnalysis> {
        let outcome = analyzer
            .analyze(&upload, &request.options)
            .await
            .with_context(|| format!("analysis of {} failed", upload.filename))?;

        let id = ids::analysis_id();
        let record = self.build_record(&id, settings, &upload, &request, outcome)?;
        let pruned = self.db.insert_analysis(&record).await?;
        self.discard_artifacts(&pruned);

        log_info!(
            "stored {} ({}: {:.2}% -> {})",
            record.id,
            record.original_filename,
            record.corrosion_percentage,
            record.status.as_str()
        );

        if upload.source_path.is_none() {
            self.audit
                .record(
                    AuditAction::Capture,
                    audit_details!("filename" => record.original_filename),
                    Some(AuditResource::analysis(&record.id)),
                )
                .await;
        }
        self.audit
            .record(
                AuditAction::Analyze,
                audit_details!(
                    "filename" => record.original_filename,
                    "corrosionPercentage" => record.corrosion_percentage,
                    "status" => record.status.as_str(),
                    "simulated" => analyzer.is_simulated(),
                ),
                Some(AuditResource::analysis(&record.id)),
            )
            .await;

        Ok(record)
    }

    fn build_record(
        &self,
        id: &str,
        settings: &AppSettings,
        upload: &ImageUpload,
        request: &SubmitRequest,
        outcome: AnalysisOutcome,
    ) -> Result<CorrosionAnalysis> {
        let image_path = match &upload.source_path {
            Some(path) => path.clone(),
            None => self.artifacts.save_source(id, upload)?,
        };

        let thumbnail_url = match self.artifacts.save_thumbnail(id, &upload.bytes) {
            Ok(path) => Some(display_path(&path)),
            Err(err) => {
                log_warn!("no thumbnail for {}: {err:#}", upload.filename);
                None
            }
        };
        let overlay_url = self.save_reply_image(id, "overlay", outcome.overlay_image.as_deref());
        let isolated_url = self.save_reply_image(id, "isolated", outcome.isolated_image.as_deref());

        let now = Utc::now();
        Ok(CorrosionAnalysis {
            id: id.to_string(),
            image_url: display_path(&image_path),
            thumbnail_url,
            original_filename: upload.filename.clone(),
            corrosion_percentage: outcome.corrosion_percentage,
            confidence_score: outcome.confidence_score,
            pixels_total: outcome.pixels_total,
            pixels_corroded: outcome.pixels_corroded,
            status: settings.thresholds.classify(outcome.corrosion_percentage),
            operator: settings.operator.name.clone(),
            piece_type: request.piece_type.clone().unwrap_or_default(),
            batch_id: request.batch_id.clone(),
            notes: None,
            roi: request.options.roi,
            overlay_url,
            isolated_url,
            created_at: now,
            updated_at: now,
            approved_at: None,
            approved_by: None,
        })
    }

    fn discard_artifacts(&self, analysis_ids: &[String]) {
        for id in analysis_ids {
            if let Err(err) = self.artifacts.remove(id) {
                log_warn!("artifacts of pruned {id} left behind: {err:#}");
            }
        }
    }

    fn save_reply_image(&self, id: &str, stem: &str, bytes: Option<&[u8]>) -> Option<String> {
        let bytes = bytes?;
        match self.artifacts.save_reply_image(id, stem, bytes) {
            Ok(path) => Some(display_path(&path)),
            Err(err) => {
                log_warn!("discarding {stem} image for {id}: {err:#}");
                None
            }
        }
    }

    pub async fn get(&self, analysis_id: &str) -> Result<Option<CorrosionAnalysis>> {
        self.db.get_analysis(analysis_id).await
    }

    /// Filtered page of records. An untouched store is first filled with demo
    /// records when `demo_data` is enabled.
    pub async fn list(&self, query: AnalysisQuery) -> Result<Page<CorrosionAnalysis>> {
        let settings = self.settings.get();
        if settings.demo_data {
            let thresholds = settings.thresholds;
            let seeded = self
                .db
                .seed_analyses_if_uninitialized(move || {
                    generate_demo_analyses(SEED_ANALYSES, &thresholds)
                })
                .await?;
            if seeded {
                log_info!("seeded {SEED_ANALYSES} demo analyses");
            }
        }
        self.db.list_analyses(query, settings.items_per_page).await
    }

    pub async fn update_status(
        &self,
        analysis_id: &str,
        status: AnalysisStatus,
        notes: Option<String>,
    ) -> Result<CorrosionAnalysis> {
        let approver = self.settings.get().operator.name;
        let record = self
            .db
            .update_analysis_status(analysis_id, status, notes.clone(), &approver)
            .await?;

        let (action, mut details) = match status {
            AnalysisStatus::Approved => (AuditAction::Approve, audit_details!()),
            AnalysisStatus::Rejected => (AuditAction::Reject, audit_details!()),
            AnalysisStatus::Inspection => (
                AuditAction::Analyze,
                audit_details!("status" => "inspection"),
            ),
        };
        if let Some(notes) = notes {
            details.insert("notes".into(), notes.into());
        }
        self.audit
            .record(action, details, Some(AuditResource::analysis(&record.id)))
            .await;

        Ok(record)
    }
}
