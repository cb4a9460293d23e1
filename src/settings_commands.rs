//! Commands for reading and editing the settings file.

use anyhow::{anyhow, bail, Result};
use serde_json::Value;

use crate::{
    audit::AuditResource,
    audit_details,
    db::AuditAction,
    settings::AppSettings,
    AppState,
};

/// Set a dotted camelCase key (`thresholds.approved`, `analysisEndpoint`).
/// The value is read as JSON when it parses, otherwise as a plain string.
pub fn apply_setting(settings: &AppSettings, key: &str, raw: &str) -> Result<AppSettings> {
    let mut document = serde_json::to_value(settings)?;
    let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.into()));

    let mut segments = key.split('.').peekable();
    let mut cursor = &mut document;
    while let Some(segment) = segments.next() {
        let object = cursor
            .as_object_mut()
            .ok_or_else(|| anyhow!("'{key}' does not name a setting"))?;
        if !object.contains_key(segment) {
            bail!("unknown setting '{key}'");
        }
        if segments.peek().is_none() {
            object.insert(segment.to_string(), value);
            break;
        }
        cursor = object
            .get_mut(segment)
            .ok_or_else(|| anyhow!("unknown setting '{key}'"))?;
    }

    serde_json::from_value(document).map_err(|err| anyhow!("invalid value for '{key}': {err}"))
}

pub fn get_settings(state: &AppState) -> Result<AppSettings, String> {
    Ok(state.settings.get())
}

pub async fn update_setting(state: &AppState, key: String, value: String) -> Result<AppSettings, String> {
    let saved = state
        .settings
        .try_update(|settings| {
            *settings = apply_setting(settings, &key, &value)?;
            Ok(())
        })
        .map_err(|e| e.to_string())?;

    state
        .audit
        .record(
            AuditAction::ConfigChange,
            audit_details!("key" => key, "value" => value),
            Some(AuditResource::settings()),
        )
        .await;

    Ok(saved)
}
