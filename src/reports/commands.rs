use std::path::PathBuf;

use crate::{
    db::AnalysisQuery,
    reports::{InspectionReport, ReportExport, ReportRange},
    AppState,
};

pub async fn get_report(state: &AppState, range: ReportRange) -> Result<InspectionReport, String> {
    state.reports.build(range).await.map_err(|e| e.to_string())
}

pub async fn export_report(
    state: &AppState,
    path: PathBuf,
    query: AnalysisQuery,
) -> Result<ReportExport, String> {
    state
        .reports
        .export(&path, query)
        .await
        .map_err(|e| e.to_string())
}
