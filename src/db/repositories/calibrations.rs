use anyhow::{anyhow, bail, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::{
    db::{
        connection::Database,
        helpers::{format_datetime, parse_datetime},
        models::{CalibrationProfile, CalibrationProfileInput},
    },
    utils::ids,
};

const PROFILE_COLUMNS: &str =
    "id, name, description, pixels_per_mm, reference_image_url, is_default, created_at, updated_at";

fn row_to_profile(row: &Row) -> Result<CalibrationProfile> {
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(CalibrationProfile {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        pixels_per_mm: row.get("pixels_per_mm")?,
        reference_image_url: row.get("reference_image_url")?,
        is_default: row.get::<_, i64>("is_default")? != 0,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

fn fetch_profile(conn: &Connection, profile_id: &str) -> Result<Option<CalibrationProfile>> {
    let sql = format!("SELECT {PROFILE_COLUMNS} FROM calibration_profiles WHERE id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![profile_id])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_profile(row)?)),
        None => Ok(None),
    }
}

fn clear_default(conn: &Connection, now: &str) -> Result<()> {
    conn.execute(
        "UPDATE calibration_profiles SET is_default = 0, updated_at = ?1 WHERE is_default = 1",
        params![now],
    )?;
    Ok(())
}

impl Database {
    /// Create a profile. The first profile, or one flagged as default,
    /// becomes the single default.
    pub async fn create_calibration_profile(
        &self,
        input: CalibrationProfileInput,
    ) -> Result<CalibrationProfile> {
        if input.name.trim().is_empty() {
            bail!("calibration profile name is required");
        }
        if !input.pixels_per_mm.is_finite() || input.pixels_per_mm <= 0.0 {
            bail!("pixels per mm must be a positive number");
        }

        self.execute(move |conn| {
            let now = format_datetime(&Utc::now());
            let id = ids::calibration_id();
            let tx = conn.transaction()?;

            let existing: i64 =
                tx.query_row("SELECT COUNT(*) FROM calibration_profiles", [], |row| {
                    row.get(0)
                })?;
            let is_default = input.is_default || existing == 0;
            if is_default {
                clear_default(&tx, &now)?;
            }

            tx.execute(
                "INSERT INTO calibration_profiles (id, name, description, pixels_per_mm,
                     reference_image_url, is_default, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    id,
                    input.name.trim(),
                    input.description,
                    input.pixels_per_mm,
                    input.reference_image_url,
                    is_default as i64,
                    now,
                    now,
                ],
            )?;

            let profile = fetch_profile(&tx, &id)?
                .ok_or_else(|| anyhow!("calibration profile not found after insert"))?;
            tx.commit()?;
            Ok(profile)
        })
        .await
    }

    /// Default first, then by name.
    pub async fn list_calibration_profiles(&self) -> Result<Vec<CalibrationProfile>> {
        self.execute(|conn| {
            let sql = format!(
                "SELECT {PROFILE_COLUMNS} FROM calibration_profiles
                 ORDER BY is_default DESC, name ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query([])?;
            let mut profiles = Vec::new();
            while let Some(row) = rows.next()? {
                profiles.push(row_to_profile(row)?);
            }
            Ok(profiles)
        })
        .await
    }

    pub async fn get_calibration_profile(
        &self,
        profile_id: &str,
    ) -> Result<Option<CalibrationProfile>> {
        let profile_id = profile_id.to_string();
        self.execute(move |conn| fetch_profile(conn, &profile_id))
            .await
    }

    pub async fn get_default_calibration_profile(&self) -> Result<Option<CalibrationProfile>> {
        self.execute(|conn| {
            let id: Option<String> = conn
                .query_row(
                    "SELECT id FROM calibration_profiles WHERE is_default = 1",
                    [],
                    |row| row.get(0),
                )
                .optional()?;
            match id {
                Some(id) => fetch_profile(conn, &id),
                None => Ok(None),
            }
        })
        .await
    }

    pub async fn set_default_calibration_profile(
        &self,
        profile_id: &str,
    ) -> Result<CalibrationProfile> {
        let profile_id = profile_id.to_string();
        self.execute(move |conn| {
            let now = format_datetime(&Utc::now());
            let tx = conn.transaction()?;

            if fetch_profile(&tx, &profile_id)?.is_none() {
                return Err(anyhow!("calibration profile not found: {profile_id}"));
            }

            clear_default(&tx, &now)?;
            tx.execute(
                "UPDATE calibration_profiles SET is_default = 1, updated_at = ?1 WHERE id = ?2",
                params![now, profile_id],
            )?;

            let profile = fetch_profile(&tx, &profile_id)?
                .ok_or_else(|| anyhow!("calibration profile not found after update"))?;
            tx.commit()?;
            Ok(profile)
        })
        .await
    }

    pub async fn delete_calibration_profile(&self, profile_id: &str) -> Result<()> {
        let profile_id = profile_id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "DELETE FROM calibration_profiles WHERE id = ?1",
                params![profile_id],
            )?;
            if rows_affected == 0 {
                return Err(anyhow!("calibration profile not found: {profile_id}"));
            }
            Ok(())
        })
        .await
    }
}
