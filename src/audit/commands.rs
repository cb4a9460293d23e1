use crate::{
    db::{AuditEvent, AuditQuery},
    AppState,
};

pub async fn list_audit_events(
    state: &AppState,
    query: AuditQuery,
) -> Result<Vec<AuditEvent>, String> {
    state.audit.list(query).await.map_err(|e| e.to_string())
}
