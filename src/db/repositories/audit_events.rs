use anyhow::{Context, Result};
use rusqlite::{params, Row, ToSql};

use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_datetime, search_needle},
    models::{AuditEvent, AuditQuery},
};

fn row_to_event(row: &Row) -> Result<AuditEvent> {
    let timestamp: String = row.get("timestamp")?;
    let action: String = row.get("action")?;
    let details: String = row.get("details")?;

    Ok(AuditEvent {
        id: row.get("id")?,
        timestamp: parse_datetime(&timestamp, "timestamp")?,
        user_id: row.get("user_id")?,
        user_email: row.get("user_email")?,
        action: action.parse()?,
        details: serde_json::from_str(&details).context("failed to parse audit details")?,
        resource_id: row.get("resource_id")?,
        resource_type: row.get("resource_type")?,
        ip_address: row.get("ip_address")?,
    })
}

impl Database {
    pub async fn insert_audit_event(&self, event: &AuditEvent) -> Result<()> {
        let record = event.clone();
        let details = serde_json::to_string(&record.details)?;
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO audit_events (id, timestamp, user_id, user_email, action, details,
                     resource_id, resource_type, ip_address)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    record.id,
                    format_datetime(&record.timestamp),
                    record.user_id,
                    record.user_email,
                    record.action.as_str(),
                    details,
                    record.resource_id,
                    record.resource_type,
                    record.ip_address,
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Newest first.
    pub async fn list_audit_events(&self, query: AuditQuery) -> Result<Vec<AuditEvent>> {
        self.execute(move |conn| {
            let mut clauses: Vec<&str> = Vec::new();
            let mut values: Vec<Box<dyn ToSql>> = Vec::new();

            if let Some(action) = query.action {
                clauses.push("action = ?");
                values.push(Box::new(action.as_str()));
            }
            if let Some(user) = query.user.filter(|u| !u.trim().is_empty()) {
                clauses.push("(user_id = ? OR user_email = ?)");
                values.push(Box::new(user.clone()));
                values.push(Box::new(user));
            }
            if let Some(needle) = search_needle(query.search.as_deref()) {
                clauses.push(
                    "(instr(fold_case(user_email), ?) > 0
                      OR instr(fold_case(action), ?) > 0
                      OR instr(fold_case(details), ?) > 0)",
                );
                for _ in 0..3 {
                    values.push(Box::new(needle.clone()));
                }
            }
            let limit = query.limit.max(1) as i64;
            values.push(Box::new(limit));

            let clause = if clauses.is_empty() {
                String::new()
            } else {
                format!("WHERE {}", clauses.join(" AND "))
            };
            let sql = format!(
                "SELECT id, timestamp, user_id, user_email, action, details, resource_id,
                        resource_type, ip_address
                 FROM audit_events {clause}
                 ORDER BY seq DESC
                 LIMIT ?"
            );

            let value_refs: Vec<&dyn ToSql> = values.iter().map(|b| b.as_ref()).collect();
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(value_refs.as_slice())?;
            let mut events = Vec::new();
            while let Some(row) = rows.next()? {
                events.push(row_to_event(row)?);
            }
            Ok(events)
        })
        .await
    }
}
