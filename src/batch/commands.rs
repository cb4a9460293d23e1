use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

use crate::{analysis::SubmitRequest, db::BatchProcessing, AppState};

pub async fn process_batch(
    state: &AppState,
    files: Vec<PathBuf>,
    request: SubmitRequest,
    cancel_token: CancellationToken,
) -> Result<BatchProcessing, String> {
    state
        .batches
        .process(files, request, cancel_token)
        .await
        .map_err(|e| e.to_string())
}

pub async fn create_batch(state: &AppState, name: String) -> Result<BatchProcessing, String> {
    state
        .batches
        .create_batch(&name)
        .await
        .map_err(|e| e.to_string())
}

pub async fn get_batch(state: &AppState, batch_id: String) -> Result<BatchProcessing, String> {
    state
        .batches
        .get_batch(&batch_id)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("batch not found: {batch_id}"))
}

pub async fn list_batches(state: &AppState) -> Result<Vec<BatchProcessing>, String> {
    state.batches.list_batches().await.map_err(|e| e.to_string())
}
