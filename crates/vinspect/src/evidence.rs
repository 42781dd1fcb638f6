//! Evidence model: the photos, OBD2 screenshots and documents attached
//! to an inspection.
//!
//! Items are created at upload time and are read-only to the pipeline;
//! format conversion happens before they enter it.

use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// Category of a piece of evidence.
///
/// The variant order is the fixed analysis priority: chunks are filled in
/// this order so semantically related images land in the same analysis
/// request and low-priority documents trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemCategory {
    Exterior,
    Interior,
    Dashboard,
    Paint,
    Rust,
    Engine,
    Undercarriage,
    Obd,
    Title,
    Records,
}

impl ItemCategory {
    /// Position in the chunk ordering. Lower sorts first.
    pub fn priority(self) -> usize {
        match self {
            Self::Exterior => 0,
            Self::Interior => 1,
            Self::Dashboard => 2,
            Self::Paint => 3,
            Self::Rust => 4,
            Self::Engine => 5,
            Self::Undercarriage => 6,
            Self::Obd => 7,
            Self::Title => 8,
            Self::Records => 9,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exterior => "exterior",
            Self::Interior => "interior",
            Self::Dashboard => "dashboard",
            Self::Paint => "paint",
            Self::Rust => "rust",
            Self::Engine => "engine",
            Self::Undercarriage => "undercarriage",
            Self::Obd => "obd",
            Self::Title => "title",
            Self::Records => "records",
        }
    }
}

impl fmt::Display for ItemCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemCategory {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exterior" => Ok(Self::Exterior),
            "interior" => Ok(Self::Interior),
            "dashboard" => Ok(Self::Dashboard),
            "paint" => Ok(Self::Paint),
            "rust" => Ok(Self::Rust),
            "engine" => Ok(Self::Engine),
            "undercarriage" => Ok(Self::Undercarriage),
            "obd" => Ok(Self::Obd),
            "title" => Ok(Self::Title),
            "records" => Ok(Self::Records),
            _ => Err(()),
        }
    }
}

impl ToSql for ItemCategory {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ItemCategory {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()
            .and_then(|s| s.parse().map_err(|_| FromSqlError::InvalidType))
    }
}

/// One unit of evidence to analyze.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub id: String,
    pub category: ItemCategory,
    /// Size of the underlying binary asset in bytes.
    pub byte_size: u64,
    /// URI of the binary asset, resolvable by the storage collaborator
    /// (`file:` paths and `http(s):` URLs are understood by asset staging).
    pub asset_uri: String,
    /// Diagnostic trouble code, only meaningful for `obd` items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obd_code: Option<String>,
    /// Human-readable code description, only meaningful for `obd` items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obd_description: Option<String>,
}

impl EvidenceItem {
    pub fn new(category: ItemCategory, byte_size: u64, asset_uri: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            category,
            byte_size,
            asset_uri: asset_uri.into(),
            obd_code: None,
            obd_description: None,
        }
    }

    /// Creates an OBD2 evidence item carrying a trouble code.
    pub fn obd(
        code: impl Into<String>,
        description: impl Into<String>,
        byte_size: u64,
        asset_uri: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            category: ItemCategory::Obd,
            byte_size,
            asset_uri: asset_uri.into(),
            obd_code: Some(code.into()),
            obd_description: Some(description.into()),
        }
    }

    /// Media type of the asset guessed from the URI extension.
    /// Returns `None` for unknown extensions.
    pub fn media_type(&self) -> Option<String> {
        mime_guess::from_path(&self.asset_uri)
            .first()
            .map(|m| m.to_string())
    }
}
