//! Audit trail models.

use std::str::FromStr;

use anyhow::{anyhow, Error};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Login,
    Logout,
    Capture,
    Analyze,
    Approve,
    Reject,
    Export,
    ConfigChange,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Login => "login",
            AuditAction::Logout => "logout",
            AuditAction::Capture => "capture",
            AuditAction::Analyze => "analyze",
            AuditAction::Approve => "approve",
            AuditAction::Reject => "reject",
            AuditAction::Export => "export",
            AuditAction::ConfigChange => "config_change",
        }
    }
}

impl FromStr for AuditAction {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "login" => Ok(AuditAction::Login),
            "logout" => Ok(AuditAction::Logout),
            "capture" => Ok(AuditAction::Capture),
            "analyze" => Ok(AuditAction::Analyze),
            "approve" => Ok(AuditAction::Approve),
            "reject" => Ok(AuditAction::Reject),
            "export" => Ok(AuditAction::Export),
            "config_change" => Ok(AuditAction::ConfigChange),
            other => Err(anyhow!("unknown audit action '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub user_email: String,
    pub action: AuditAction,
    pub details: serde_json::Map<String, serde_json::Value>,
    pub resource_id: Option<String>,
    pub resource_type: Option<String>,
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuditQuery {
    pub action: Option<AuditAction>,
    /// Matches user id or email exactly.
    pub user: Option<String>,
    /// Case-insensitive match over user email, action and details.
    pub search: Option<String>,
    pub limit: usize,
}

impl Default for AuditQuery {
    fn default() -> Self {
        Self {
            action: None,
            user: None,
            search: None,
            limit: 50,
        }
    }
}
