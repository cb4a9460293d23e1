use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};

use crate::db::{
    connection::Database,
    helpers::{
        format_datetime, parse_datetime, parse_optional_datetime, search_needle, to_i64, to_u64,
    },
    models::{AnalysisQuery, AnalysisStatus, CorrosionAnalysis, Page, RegionOfInterest},
};

/// Only the newest records are retained.
pub const MAX_STORED_ANALYSES: usize = 100;

/// Records generated when an uninitialized store is first listed.
pub const SEED_ANALYSES: usize = 50;

const ANALYSES_INITIALIZED_KEY: &str = "analyses_initialized";

const ANALYSIS_COLUMNS: &str = "id, image_url, thumbnail_url, original_filename, corrosion_percentage,
     confidence_score, pixels_total, pixels_corroded, status, operator, piece_type, batch_id,
     notes, roi_x, roi_y, roi_width, roi_height, overlay_url, isolated_url, created_at,
     updated_at, approved_at, approved_by";

fn row_to_analysis(row: &Row) -> Result<CorrosionAnalysis> {
    let status: String = row.get("status")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    let approved_at: Option<String> = row.get("approved_at")?;

    let roi = match (
        row.get::<_, Option<f64>>("roi_x")?,
        row.get::<_, Option<f64>>("roi_y")?,
        row.get::<_, Option<f64>>("roi_width")?,
        row.get::<_, Option<f64>>("roi_height")?,
    ) {
        (Some(x), Some(y), Some(width), Some(height)) => Some(RegionOfInterest {
            x,
            y,
            width,
            height,
        }),
        _ => None,
    };

    Ok(CorrosionAnalysis {
        id: row.get("id")?,
        image_url: row.get("image_url")?,
        thumbnail_url: row.get("thumbnail_url")?,
        original_filename: row.get("original_filename")?,
        corrosion_percentage: row.get("corrosion_percentage")?,
        confidence_score: row.get("confidence_score")?,
        pixels_total: to_u64(row.get("pixels_total")?, "pixels_total")?,
        pixels_corroded: to_u64(row.get("pixels_corroded")?, "pixels_corroded")?,
        status: status.parse()?,
        operator: row.get("operator")?,
        piece_type: row.get("piece_type")?,
        batch_id: row.get("batch_id")?,
        notes: row.get("notes")?,
        roi,
        overlay_url: row.get("overlay_url")?,
        isolated_url: row.get("isolated_url")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
        approved_at: parse_optional_datetime(approved_at, "approved_at")?,
        approved_by: row.get("approved_by")?,
    })
}

fn insert_row(conn: &Connection, record: &CorrosionAnalysis) -> Result<()> {
    let roi = record.roi;
    conn.execute(
        "INSERT INTO analyses (id, image_url, thumbnail_url, original_filename, corrosion_percentage,
             confidence_score, pixels_total, pixels_corroded, status, operator, piece_type, batch_id,
             notes, roi_x, roi_y, roi_width, roi_height, overlay_url, isolated_url, created_at,
             updated_at, approved_at, approved_by)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18,
             ?19, ?20, ?21, ?22, ?23)",
        params![
            record.id,
            record.image_url,
            record.thumbnail_url,
            record.original_filename,
            record.corrosion_percentage,
            record.confidence_score,
            to_i64(record.pixels_total)?,
            to_i64(record.pixels_corroded)?,
            record.status.as_str(),
            record.operator,
            record.piece_type,
            record.batch_id,
            record.notes,
            roi.map(|r| r.x),
            roi.map(|r| r.y),
            roi.map(|r| r.width),
            roi.map(|r| r.height),
            record.overlay_url,
            record.isolated_url,
            format_datetime(&record.created_at),
            format_datetime(&record.updated_at),
            record.approved_at.as_ref().map(format_datetime),
            record.approved_by,
        ],
    )?;
    Ok(())
}

/// Ids of the records dropped by retention.
fn prune_and_mark(conn: &Connection) -> Result<Vec<String>> {
    let pruned = {
        let mut stmt = conn.prepare(
            "DELETE FROM analyses
             WHERE seq NOT IN (SELECT seq FROM analyses ORDER BY seq DESC LIMIT ?1)
             RETURNING id",
        )?;
        let ids = stmt.query_map(params![MAX_STORED_ANALYSES as i64], |row| row.get(0))?;
        ids.collect::<rusqlite::Result<Vec<String>>>()?
    };
    conn.execute(
        "INSERT INTO store_meta (key, value) VALUES (?1, '1')
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![ANALYSES_INITIALIZED_KEY],
    )?;
    Ok(pruned)
}

fn fetch_analysis(conn: &Connection, analysis_id: &str) -> Result<Option<CorrosionAnalysis>> {
    let sql = format!("SELECT {ANALYSIS_COLUMNS} FROM analyses WHERE id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![analysis_id])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_analysis(row)?)),
        None => Ok(None),
    }
}

/// WHERE clause plus positional parameters for an analysis query.
fn filter_clause(query: &AnalysisQuery) -> (String, Vec<Box<dyn ToSql + Send>>) {
    let mut clauses: Vec<&str> = Vec::new();
    let mut values: Vec<Box<dyn ToSql + Send>> = Vec::new();

    if let Some(status) = query.status {
        clauses.push("status = ?");
        values.push(Box::new(status.as_str()));
    }
    if let Some(operator) = query.operator.as_ref().filter(|o| !o.trim().is_empty()) {
        clauses.push("operator = ?");
        values.push(Box::new(operator.clone()));
    }
    if let Some(from) = query.date_from {
        clauses.push("created_at >= ?");
        values.push(Box::new(format_datetime(&from)));
    }
    if let Some(to) = query.date_to {
        clauses.push("created_at <= ?");
        values.push(Box::new(format_datetime(&to)));
    }
    if let Some(needle) = search_needle(query.search.as_deref()) {
        clauses.push(
            "(instr(fold_case(original_filename), ?) > 0
              OR instr(fold_case(piece_type), ?) > 0
              OR instr(fold_case(operator), ?) > 0)",
        );
        for _ in 0..3 {
            values.push(Box::new(needle.clone()));
        }
    }

    let clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    (clause, values)
}

impl Database {
    /// Insert newest-first and drop everything beyond the newest
    /// [`MAX_STORED_ANALYSES`] records. Returns the ids that were dropped.
    pub async fn insert_analysis(&self, analysis: &CorrosionAnalysis) -> Result<Vec<String>> {
        let record = analysis.clone();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            insert_row(&tx, &record)?;
            let pruned = prune_and_mark(&tx)?;
            tx.commit()?;
            if !pruned.is_empty() {
                log::debug!("pruned {} analyses beyond retention", pruned.len());
            }
            Ok(pruned)
        })
        .await
    }

    /// Fill an uninitialized store with `generate(count)`, where the first
    /// generated record ends up newest. Check and insert share one
    /// transaction, so concurrent callers seed at most once. Returns whether
    /// anything was inserted.
    pub async fn seed_analyses_if_uninitialized<F>(&self, generate: F) -> Result<bool>
    where
        F: FnOnce() -> Vec<CorrosionAnalysis> + Send + 'static,
    {
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let initialized = tx
                .query_row(
                    "SELECT 1 FROM store_meta WHERE key = ?1",
                    params![ANALYSES_INITIALIZED_KEY],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            if initialized {
                return Ok(false);
            }
            for record in generate().iter().rev() {
                insert_row(&tx, record)?;
            }
            prune_and_mark(&tx)?;
            tx.commit()?;
            Ok(true)
        })
        .await
    }

    pub async fn analyses_initialized(&self) -> Result<bool> {
        Ok(self.get_meta(ANALYSES_INITIALIZED_KEY).await?.is_some())
    }

    pub async fn get_analysis(&self, analysis_id: &str) -> Result<Option<CorrosionAnalysis>> {
        let analysis_id = analysis_id.to_string();
        self.execute(move |conn| fetch_analysis(conn, &analysis_id))
            .await
    }

    pub async fn list_analyses(
        &self,
        query: AnalysisQuery,
        default_limit: usize,
    ) -> Result<Page<CorrosionAnalysis>> {
        let page = query.page.filter(|p| *p > 0).unwrap_or(1);
        let limit = query
            .limit
            .filter(|l| *l > 0)
            .unwrap_or(default_limit.max(1));
        // Past the addressable range the page is simply empty.
        let offset = (page - 1)
            .checked_mul(limit)
            .and_then(|offset| i64::try_from(offset).ok());

        self.execute(move |conn| {
            let (clause, values) = filter_clause(&query);
            let value_refs: Vec<&dyn ToSql> =
                values.iter().map(|b| b.as_ref() as &dyn ToSql).collect();

            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM analyses {clause}"),
                value_refs.as_slice(),
                |row| row.get(0),
            )?;

            let total = to_u64(total, "total")? as usize;
            let Some(offset_i64) = offset else {
                return Ok(Page::new(Vec::new(), total, page, limit));
            };
            let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
            let mut page_refs = value_refs.clone();
            page_refs.push(&limit_i64);
            page_refs.push(&offset_i64);

            let sql = format!(
                "SELECT {ANALYSIS_COLUMNS} FROM analyses {clause}
                 ORDER BY seq DESC
                 LIMIT ? OFFSET ?"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(page_refs.as_slice())?;
            let mut data = Vec::new();
            while let Some(row) = rows.next()? {
                data.push(row_to_analysis(row)?);
            }

            Ok(Page::new(data, total, page, limit))
        })
        .await
    }

    pub async fn list_analyses_for_batch(&self, batch_id: &str) -> Result<Vec<CorrosionAnalysis>> {
        let batch_id = batch_id.to_string();
        self.execute(move |conn| {
            let sql = format!(
                "SELECT {ANALYSIS_COLUMNS} FROM analyses WHERE batch_id = ?1 ORDER BY seq ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params![batch_id])?;
            let mut analyses = Vec::new();
            while let Some(row) = rows.next()? {
                analyses.push(row_to_analysis(row)?);
            }
            Ok(analyses)
        })
        .await
    }

    /// Analyses created within `[from, to]`, oldest first.
    pub async fn list_analyses_between(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<CorrosionAnalysis>> {
        let query = AnalysisQuery {
            date_from: from,
            date_to: to,
            ..AnalysisQuery::default()
        };
        self.execute(move |conn| {
            let (clause, values) = filter_clause(&query);
            let value_refs: Vec<&dyn ToSql> =
                values.iter().map(|b| b.as_ref() as &dyn ToSql).collect();
            let sql = format!(
                "SELECT {ANALYSIS_COLUMNS} FROM analyses {clause} ORDER BY created_at ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(value_refs.as_slice())?;
            let mut analyses = Vec::new();
            while let Some(row) = rows.next()? {
                analyses.push(row_to_analysis(row)?);
            }
            Ok(analyses)
        })
        .await
    }

    /// Set status and notes. Approval stamps `approved_at`/`approved_by`;
    /// any other status clears them.
    pub async fn update_analysis_status(
        &self,
        analysis_id: &str,
        status: AnalysisStatus,
        notes: Option<String>,
        approver: &str,
    ) -> Result<CorrosionAnalysis> {
        let analysis_id = analysis_id.to_string();
        let approver = approver.to_string();
        self.execute(move |conn| {
            let now = Utc::now();
            let (approved_at, approved_by) = if status == AnalysisStatus::Approved {
                (Some(format_datetime(&now)), Some(approver))
            } else {
                (None, None)
            };

            let rows_affected = conn.execute(
                "UPDATE analyses
                 SET status = ?1,
                     notes = ?2,
                     updated_at = ?3,
                     approved_at = ?4,
                     approved_by = ?5
                 WHERE id = ?6",
                params![
                    status.as_str(),
                    notes,
                    format_datetime(&now),
                    approved_at,
                    approved_by,
                    analysis_id,
                ],
            )?;

            if rows_affected == 0 {
                return Err(anyhow!("analysis not found: {analysis_id}"));
            }

            fetch_analysis(conn, &analysis_id)?
                .ok_or_else(|| anyhow!("analysis not found after update"))
        })
        .await
    }

    pub async fn count_analyses(&self) -> Result<usize> {
        self.execute(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM analyses", [], |row| row.get(0))?;
            Ok(to_u64(count, "count")? as usize)
        })
        .await
    }
}
