use std::str::FromStr;

use anyhow::{anyhow, Error};
use serde::{Deserialize, Serialize};

use crate::db::RegionOfInterest;

/// Colour of the corrosion the service should isolate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RustColor {
    Red,
    Black,
    White,
}

impl RustColor {
    /// Code expected by the analysis service.
    pub fn wire_value(&self) -> &'static str {
        match self {
            RustColor::Red => "vermelha",
            RustColor::Black => "preta",
            RustColor::White => "branca",
        }
    }
}

impl FromStr for RustColor {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "red" | "vermelha" => Ok(RustColor::Red),
            "black" | "preta" => Ok(RustColor::Black),
            "white" | "branca" => Ok(RustColor::White),
            other => Err(anyhow!("unknown rust color '{other}' (red, black, white)")),
        }
    }
}

/// Colour of the fixture background behind the piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundColor {
    Black,
    White,
}

impl BackgroundColor {
    pub fn wire_value(&self) -> &'static str {
        match self {
            BackgroundColor::Black => "preto",
            BackgroundColor::White => "branco",
        }
    }
}

impl FromStr for BackgroundColor {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "black" | "preto" => Ok(BackgroundColor::Black),
            "white" | "branco" => Ok(BackgroundColor::White),
            other => Err(anyhow!("unknown background color '{other}' (black, white)")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionOptions {
    pub roi: Option<RegionOfInterest>,
    pub rust_color: RustColor,
    pub background_color: BackgroundColor,
}

impl Default for SubmissionOptions {
    fn default() -> Self {
        Self {
            roi: None,
            rust_color: RustColor::Red,
            background_color: BackgroundColor::Black,
        }
    }
}

/// Everything the caller decides about one submission besides the image.
#[derive(Debug, Clone, Default)]
pub struct SubmitRequest {
    pub options: SubmissionOptions,
    pub piece_type: Option<String>,
    pub batch_id: Option<String>,
}
