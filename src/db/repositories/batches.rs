use anyhow::{anyhow, Result};
use chrono::Utc;
use rusqlite::{params, Connection, Row};

use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_datetime, to_u32},
    models::{BatchProcessing, BatchStatus, StatusSummary},
};

/// Only the newest batches are retained.
pub const MAX_STORED_BATCHES: usize = 20;

const BATCH_COLUMNS: &str = "id, name, total_files, processed_files, failed_files, status,
     average_corrosion, summary_approved, summary_inspection, summary_rejected,
     created_at, updated_at";

fn row_to_batch(row: &Row) -> Result<BatchProcessing> {
    let status: String = row.get("status")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    let summary = match (
        row.get::<_, Option<i64>>("summary_approved")?,
        row.get::<_, Option<i64>>("summary_inspection")?,
        row.get::<_, Option<i64>>("summary_rejected")?,
    ) {
        (Some(approved), Some(inspection), Some(rejected)) => Some(StatusSummary {
            approved: to_u32(approved, "summary_approved")?,
            inspection: to_u32(inspection, "summary_inspection")?,
            rejected: to_u32(rejected, "summary_rejected")?,
        }),
        _ => None,
    };

    Ok(BatchProcessing {
        id: row.get("id")?,
        name: row.get("name")?,
        total_files: to_u32(row.get("total_files")?, "total_files")?,
        processed_files: to_u32(row.get("processed_files")?, "processed_files")?,
        failed_files: to_u32(row.get("failed_files")?, "failed_files")?,
        status: status.parse()?,
        analyses: Vec::new(),
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
        average_corrosion: row.get("average_corrosion")?,
        summary,
    })
}

fn fetch_batch(conn: &Connection, batch_id: &str) -> Result<Option<BatchProcessing>> {
    let sql = format!("SELECT {BATCH_COLUMNS} FROM batches WHERE id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![batch_id])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_batch(row)?)),
        None => Ok(None),
    }
}

impl Database {
    /// Insert newest-first, keeping only [`MAX_STORED_BATCHES`] batches.
    pub async fn insert_batch(&self, batch: &BatchProcessing) -> Result<()> {
        let record = batch.clone();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO batches (id, name, total_files, processed_files, failed_files, status,
                     average_corrosion, summary_approved, summary_inspection, summary_rejected,
                     created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    record.id,
                    record.name,
                    record.total_files,
                    record.processed_files,
                    record.failed_files,
                    record.status.as_str(),
                    record.average_corrosion,
                    record.summary.map(|s| s.approved),
                    record.summary.map(|s| s.inspection),
                    record.summary.map(|s| s.rejected),
                    format_datetime(&record.created_at),
                    format_datetime(&record.updated_at),
                ],
            )?;
            tx.execute(
                "DELETE FROM batches
                 WHERE seq NOT IN (SELECT seq FROM batches ORDER BY seq DESC LIMIT ?1)",
                params![MAX_STORED_BATCHES as i64],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// Batch with its analyses, in processing order.
    pub async fn get_batch(&self, batch_id: &str) -> Result<Option<BatchProcessing>> {
        let id = batch_id.to_string();
        let batch = self.execute(move |conn| fetch_batch(conn, &id)).await?;
        match batch {
            Some(mut batch) => {
                batch.analyses = self.list_analyses_for_batch(&batch.id).await?;
                Ok(Some(batch))
            }
            None => Ok(None),
        }
    }

    pub async fn list_batches(&self) -> Result<Vec<BatchProcessing>> {
        self.execute(|conn| {
            let sql = format!("SELECT {BATCH_COLUMNS} FROM batches ORDER BY seq DESC");
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query([])?;
            let mut batches = Vec::new();
            while let Some(row) = rows.next()? {
                batches.push(row_to_batch(row)?);
            }
            Ok(batches)
        })
        .await
    }

    pub async fn update_batch_progress(
        &self,
        batch_id: &str,
        processed_files: u32,
        failed_files: u32,
    ) -> Result<()> {
        let batch_id = batch_id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "UPDATE batches
                 SET processed_files = ?1,
                     failed_files = ?2,
                     updated_at = ?3
                 WHERE id = ?4",
                params![
                    processed_files,
                    failed_files,
                    format_datetime(&Utc::now()),
                    batch_id,
                ],
            )?;
            if rows_affected == 0 {
                return Err(anyhow!("batch not found: {batch_id}"));
            }
            Ok(())
        })
        .await
    }

    pub async fn finish_batch(
        &self,
        batch_id: &str,
        status: BatchStatus,
        average_corrosion: Option<f64>,
        summary: StatusSummary,
    ) -> Result<BatchProcessing> {
        let batch_id = batch_id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "UPDATE batches
                 SET status = ?1,
                     average_corrosion = ?2,
                     summary_approved = ?3,
                     summary_inspection = ?4,
                     summary_rejected = ?5,
                     updated_at = ?6
                 WHERE id = ?7",
                params![
                    status.as_str(),
                    average_corrosion,
                    summary.approved,
                    summary.inspection,
                    summary.rejected,
                    format_datetime(&Utc::now()),
                    batch_id,
                ],
            )?;
            if rows_affected == 0 {
                return Err(anyhow!("batch not found: {batch_id}"));
            }
            fetch_batch(conn, &batch_id)?.ok_or_else(|| anyhow!("batch not found after update"))
        })
        .await
    }
}
