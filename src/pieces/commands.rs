use crate::{
    db::models::{PieceType, PieceTypeInput, PieceTypePatch},
    AppState,
};

pub async fn create_piece_type(state: &AppState, input: PieceTypeInput) -> Result<PieceType, String> {
    let db = &state.db;
    db.create_piece_type(input).await.map_err(|e| e.to_string())
}

pub async fn list_piece_types(state: &AppState) -> Result<Vec<PieceType>, String> {
    let db = &state.db;
    db.list_piece_types().await.map_err(|e| e.to_string())
}

pub async fn update_piece_type(
    state: &AppState,
    piece_type_id: String,
    patch: PieceTypePatch,
) -> Result<PieceType, String> {
    let db = &state.db;
    db.update_piece_type(&piece_type_id, patch)
        .await
        .map_err(|e| e.to_string())
}

pub async fn delete_piece_type(state: &AppState, piece_type_id: String) -> Result<(), String> {
    let db = &state.db;
    db.delete_piece_type(&piece_type_id)
        .await
        .map_err(|e| e.to_string())
}
