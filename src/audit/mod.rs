//! Append-only audit trail of operator actions.

pub mod commands;

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use serde_json::{Map, Value};

use crate::{
    db::{AuditAction, AuditEvent, AuditQuery, Database},
    settings::SettingsStore,
    utils::ids,
};

const ENABLE_LOGS: bool = true;

use crate::log_warn;

/// What an audited action touched.
#[derive(Debug, Clone, Copy)]
pub struct AuditResource<'a> {
    pub id: &'a str,
    pub kind: &'a str,
}

impl<'a> AuditResource<'a> {
    pub fn analysis(id: &'a str) -> Self {
        Self { id, kind: "analysis" }
    }

    pub fn batch(id: &'a str) -> Self {
        Self { id, kind: "batch" }
    }

    pub fn settings() -> Self {
        Self {
            id: "settings",
            kind: "settings",
        }
    }

    pub fn report(id: &'a str) -> Self {
        Self { id, kind: "report" }
    }
}

#[derive(Clone)]
pub struct AuditLog {
    db: Database,
    settings: Arc<SettingsStore>,
}

impl AuditLog {
    pub fn new(db: Database, settings: Arc<SettingsStore>) -> Self {
        Self { db, settings }
    }

    fn event(
        &self,
        action: AuditAction,
        details: Map<String, Value>,
        resource: Option<AuditResource<'_>>,
    ) -> AuditEvent {
        let operator = self.settings.get().operator;
        AuditEvent {
            id: ids::audit_event_id(),
            timestamp: Utc::now(),
            user_id: operator.id,
            user_email: operator.email,
            action,
            details,
            resource_id: resource.map(|r| r.id.to_string()),
            resource_type: resource.map(|r| r.kind.to_string()),
            ip_address: None,
        }
    }

    /// Persist an event for the configured operator. A failed write is logged
    /// and swallowed so the audited operation still succeeds.
    pub async fn record(
        &self,
        action: AuditAction,
        details: Map<String, Value>,
        resource: Option<AuditResource<'_>>,
    ) -> Option<AuditEvent> {
        let event = self.event(action, details, resource);
        match self.db.insert_audit_event(&event).await {
            Ok(()) => Some(event),
            Err(err) => {
                log_warn!("failed to record {} audit event: {err:#}", action.as_str());
                None
            }
        }
    }

    pub async fn list(&self, query: AuditQuery) -> Result<Vec<AuditEvent>> {
        self.db.list_audit_events(query).await
    }
}

/// Build a details object from `key => value` pairs.
#[macro_export]
macro_rules! audit_details {
    () => {
        serde_json::Map::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut details = serde_json::Map::new();
        $(details.insert($key.to_string(), serde_json::json!($value));)+
        details
    }};
}
