use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::ToSql;

use crate::db::{
    connection::Database,
    helpers::{format_datetime, to_u32},
    models::{AnalysisStatus, BatchCorrosion, DailyCorrosion, StatusSummary},
};

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `created_at` range predicate, prefixed with `column_prefix`.
fn range_clause(
    column_prefix: &str,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> (String, Vec<String>) {
    let mut clauses = Vec::new();
    let mut values = Vec::new();
    if let Some(from) = from {
        clauses.push(format!("{column_prefix}created_at >= ?"));
        values.push(format_datetime(&from));
    }
    if let Some(to) = to {
        clauses.push(format!("{column_prefix}created_at <= ?"));
        values.push(format_datetime(&to));
    }
    let clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    (clause, values)
}

impl Database {
    /// Daily average corrosion, ascending by date.
    pub async fn corrosion_over_time(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<DailyCorrosion>> {
        self.execute(move |conn| {
            let (clause, values) = range_clause("", from, to);
            let value_refs: Vec<&dyn ToSql> = values.iter().map(|v| v as &dyn ToSql).collect();
            let sql = format!(
                "SELECT substr(created_at, 1, 10) AS day,
                        AVG(corrosion_percentage) AS average,
                        COUNT(*) AS total
                 FROM analyses {clause}
                 GROUP BY day
                 ORDER BY day ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(value_refs.as_slice())?;
            let mut days = Vec::new();
            while let Some(row) = rows.next()? {
                let day: String = row.get("day")?;
                days.push(DailyCorrosion {
                    date: NaiveDate::parse_from_str(&day, "%Y-%m-%d")
                        .with_context(|| format!("invalid report day '{day}'"))?,
                    average_corrosion: round2(row.get("average")?),
                    analyses: to_u32(row.get("total")?, "total")?,
                });
            }
            Ok(days)
        })
        .await
    }

    pub async fn status_distribution(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<StatusSummary> {
        self.execute(move |conn| {
            let (clause, values) = range_clause("", from, to);
            let value_refs: Vec<&dyn ToSql> = values.iter().map(|v| v as &dyn ToSql).collect();
            let sql = format!(
                "SELECT status, COUNT(*) AS total FROM analyses {clause} GROUP BY status"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(value_refs.as_slice())?;
            let mut summary = StatusSummary::default();
            while let Some(row) = rows.next()? {
                let status: String = row.get("status")?;
                let total = to_u32(row.get("total")?, "total")?;
                match status.parse::<AnalysisStatus>()? {
                    AnalysisStatus::Approved => summary.approved = total,
                    AnalysisStatus::Inspection => summary.inspection = total,
                    AnalysisStatus::Rejected => summary.rejected = total,
                }
            }
            Ok(summary)
        })
        .await
    }

    /// Average corrosion per retained batch, oldest batch first.
    pub async fn corrosion_by_batch(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<BatchCorrosion>> {
        self.execute(move |conn| {
            let (clause, values) = range_clause("a.", from, to);
            let value_refs: Vec<&dyn ToSql> = values.iter().map(|v| v as &dyn ToSql).collect();
            let sql = format!(
                "SELECT a.batch_id AS batch_id,
                        b.name AS batch_name,
                        AVG(a.corrosion_percentage) AS average,
                        COUNT(*) AS total
                 FROM analyses a
                 JOIN batches b ON b.id = a.batch_id
                 {clause}
                 GROUP BY a.batch_id, b.name
                 ORDER BY MIN(b.seq) ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(value_refs.as_slice())?;
            let mut batches = Vec::new();
            while let Some(row) = rows.next()? {
                batches.push(BatchCorrosion {
                    batch_id: row.get("batch_id")?,
                    batch_name: row.get("batch_name")?,
                    average_corrosion: round2(row.get("average")?),
                    analyses: to_u32(row.get("total")?, "total")?,
                });
            }
            Ok(batches)
        })
        .await
    }
}
