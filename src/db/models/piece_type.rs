use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PieceType {
    pub id: String,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub tolerance_percentage: f64,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input data for creating a piece type
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PieceTypeInput {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub tolerance_percentage: f64,
    pub category: Option<String>,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PieceTypePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub tolerance_percentage: Option<f64>,
    pub category: Option<String>,
}

pub mod validation {
    use anyhow::{bail, Result};

    const MAX_CODE_LENGTH: usize = 32;

    pub fn validate_code(code: &str) -> Result<()> {
        if code.trim().is_empty() {
            bail!("piece type code is required");
        }
        if code.len() > MAX_CODE_LENGTH {
            bail!("piece type code too long (max {MAX_CODE_LENGTH} chars)");
        }
        if !code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            bail!("piece type code may only contain letters, digits, '-' and '_'");
        }
        Ok(())
    }

    pub fn validate_tolerance(value: f64) -> Result<()> {
        if !value.is_finite() || !(0.0..=100.0).contains(&value) {
            bail!("tolerance percentage must be between 0 and 100");
        }
        Ok(())
    }
}
