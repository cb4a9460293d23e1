use anyhow::{anyhow, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::{
    db::{
        connection::Database,
        helpers::{format_datetime, parse_datetime},
        models::{
            piece_type::validation::{validate_code, validate_tolerance},
            PieceType, PieceTypeInput, PieceTypePatch,
        },
    },
    utils::ids,
};

const PIECE_TYPE_COLUMNS: &str =
    "id, code, name, description, tolerance_percentage, category, created_at, updated_at";

fn row_to_piece_type(row: &Row) -> Result<PieceType> {
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(PieceType {
        id: row.get("id")?,
        code: row.get("code")?,
        name: row.get("name")?,
        description: row.get("description")?,
        tolerance_percentage: row.get("tolerance_percentage")?,
        category: row.get("category")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

fn fetch_piece_type(conn: &Connection, piece_type_id: &str) -> Result<Option<PieceType>> {
    let sql = format!("SELECT {PIECE_TYPE_COLUMNS} FROM piece_types WHERE id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![piece_type_id])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_piece_type(row)?)),
        None => Ok(None),
    }
}

impl Database {
    /// Create a piece type. Codes are unique.
    pub async fn create_piece_type(&self, input: PieceTypeInput) -> Result<PieceType> {
        validate_code(&input.code)?;
        validate_tolerance(input.tolerance_percentage)?;
        if input.name.trim().is_empty() {
            return Err(anyhow!("piece type name is required"));
        }

        self.execute(move |conn| {
            let existing: Option<String> = conn
                .query_row(
                    "SELECT id FROM piece_types WHERE code = ?1",
                    params![input.code],
                    |row| row.get(0),
                )
                .optional()?;
            if existing.is_some() {
                return Err(anyhow!("piece type code '{}' already exists", input.code));
            }

            let now = format_datetime(&Utc::now());
            let id = ids::piece_type_id();
            conn.execute(
                "INSERT INTO piece_types (id, code, name, description, tolerance_percentage,
                     category, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    id,
                    input.code,
                    input.name.trim(),
                    input.description,
                    input.tolerance_percentage,
                    input.category,
                    now,
                    now,
                ],
            )?;

            fetch_piece_type(conn, &id)?.ok_or_else(|| anyhow!("piece type not found after insert"))
        })
        .await
    }

    pub async fn list_piece_types(&self) -> Result<Vec<PieceType>> {
        self.execute(|conn| {
            let sql = format!("SELECT {PIECE_TYPE_COLUMNS} FROM piece_types ORDER BY code ASC");
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query([])?;
            let mut piece_types = Vec::new();
            while let Some(row) = rows.next()? {
                piece_types.push(row_to_piece_type(row)?);
            }
            Ok(piece_types)
        })
        .await
    }

    pub async fn update_piece_type(
        &self,
        piece_type_id: &str,
        patch: PieceTypePatch,
    ) -> Result<PieceType> {
        if let Some(tolerance) = patch.tolerance_percentage {
            validate_tolerance(tolerance)?;
        }
        let piece_type_id = piece_type_id.to_string();

        self.execute(move |conn| {
            // Build update query dynamically based on what's being updated
            let mut updates = Vec::new();
            let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

            if let Some(name) = patch.name.filter(|n| !n.trim().is_empty()) {
                updates.push("name = ?");
                params_vec.push(Box::new(name.trim().to_string()));
            }
            if let Some(description) = patch.description {
                updates.push("description = ?");
                params_vec.push(Box::new(description));
            }
            if let Some(tolerance) = patch.tolerance_percentage {
                updates.push("tolerance_percentage = ?");
                params_vec.push(Box::new(tolerance));
            }
            if let Some(category) = patch.category {
                updates.push("category = ?");
                params_vec.push(Box::new(category));
            }

            if updates.is_empty() {
                return Err(anyhow!("No fields to update"));
            }

            updates.push("updated_at = ?");
            params_vec.push(Box::new(format_datetime(&Utc::now())));

            let query = format!("UPDATE piece_types SET {} WHERE id = ?", updates.join(", "));
            params_vec.push(Box::new(piece_type_id.clone()));

            let params_refs: Vec<&dyn rusqlite::ToSql> =
                params_vec.iter().map(|b| b.as_ref()).collect();

            let rows_affected = conn.execute(&query, params_refs.as_slice())?;
            if rows_affected == 0 {
                return Err(anyhow!("piece type not found: {piece_type_id}"));
            }

            fetch_piece_type(conn, &piece_type_id)?
                .ok_or_else(|| anyhow!("piece type not found after update"))
        })
        .await
    }

    pub async fn delete_piece_type(&self, piece_type_id: &str) -> Result<()> {
        let piece_type_id = piece_type_id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "DELETE FROM piece_types WHERE id = ?1",
                params![piece_type_id],
            )?;
            if rows_affected == 0 {
                return Err(anyhow!("piece type not found: {piece_type_id}"));
            }
            Ok(())
        })
        .await
    }
}
