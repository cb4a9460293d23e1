use std::path::PathBuf;

use crate::{
    analysis::SubmitRequest,
    db::{AnalysisQuery, AnalysisStatus, CorrosionAnalysis, Page},
    AppState,
};

pub async fn analyze_image(
    state: &AppState,
    path: PathBuf,
    request: SubmitRequest,
) -> Result<CorrosionAnalysis, String> {
    state
        .analysis
        .submit(&path, request)
        .await
        .map_err(|e| format!("{e:#}"))
}

pub async fn list_analyses(
    state: &AppState,
    query: AnalysisQuery,
) -> Result<Page<CorrosionAnalysis>, String> {
    state.analysis.list(query).await.map_err(|e| e.to_string())
}

pub async fn get_analysis(state: &AppState, analysis_id: String) -> Result<CorrosionAnalysis, String> {
    state
        .analysis
        .get(&analysis_id)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("analysis not found: {analysis_id}"))
}

pub async fn update_analysis_status(
    state: &AppState,
    analysis_id: String,
    status: AnalysisStatus,
    notes: Option<String>,
) -> Result<CorrosionAnalysis, String> {
    state
        .analysis
        .update_status(&analysis_id, status, notes)
        .await
        .map_err(|e| e.to_string())
}
