use crate::{
    db::models::{CalibrationProfile, CalibrationProfileInput},
    AppState,
};

pub async fn create_calibration_profile(
    state: &AppState,
    input: CalibrationProfileInput,
) -> Result<CalibrationProfile, String> {
    state
        .db
        .create_calibration_profile(input)
        .await
        .map_err(|e| e.to_string())
}

pub async fn list_calibration_profiles(state: &AppState) -> Result<Vec<CalibrationProfile>, String> {
    state
        .db
        .list_calibration_profiles()
        .await
        .map_err(|e| e.to_string())
}

pub async fn get_default_calibration_profile(
    state: &AppState,
) -> Result<Option<CalibrationProfile>, String> {
    state
        .db
        .get_default_calibration_profile()
        .await
        .map_err(|e| e.to_string())
}

pub async fn set_default_calibration_profile(
    state: &AppState,
    profile_id: String,
) -> Result<CalibrationProfile, String> {
    state
        .db
        .set_default_calibration_profile(&profile_id)
        .await
        .map_err(|e| e.to_string())
}

pub async fn delete_calibration_profile(state: &AppState, profile_id: String) -> Result<(), String> {
    state
        .db
        .delete_calibration_profile(&profile_id)
        .await
        .map_err(|e| e.to_string())
}
