//! Inspection repository — status, phase and report updates for the
//! `inspections` table.
//!
//! The pipeline only reads vehicle context from an inspection and updates
//! its status as a side effect; inspections are created by the ingest
//! surface (or test fixtures).

use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};

/// Inspection lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InspectionStatus {
    Created,
    Processing,
    Done,
    Failed,
}

impl InspectionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Processing => "processing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for InspectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InspectionStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "processing" => Ok(Self::Processing),
            "done" => Ok(Self::Done),
            "failed" => Ok(Self::Failed),
            _ => Err(()),
        }
    }
}

impl ToSql for InspectionStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for InspectionStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()
            .and_then(|s| s.parse().map_err(|_| FromSqlError::InvalidType))
    }
}

/// An inspection row from the database.
#[derive(Debug, Clone)]
pub struct InspectionRow {
    pub id: String,
    pub vin: String,
    pub mileage: i64,
    pub zip: String,
    pub status: InspectionStatus,
    /// Free-text progress marker, e.g. `chunk_2_of_4` or a stage name.
    pub current_phase: Option<String>,
    pub report: Option<serde_json::Value>,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl InspectionRow {
    pub fn new(id: &str, vin: &str, mileage: i64, zip: &str, created_at: &str) -> Self {
        Self {
            id: id.to_string(),
            vin: vin.to_string(),
            mileage,
            zip: zip.to_string(),
            status: InspectionStatus::Created,
            current_phase: None,
            report: None,
            error: None,
            created_at: created_at.to_string(),
            updated_at: created_at.to_string(),
        }
    }

    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let report_json: Option<String> = row.get("report")?;
        let report = match report_json {
            Some(raw) => Some(serde_json::from_str(&raw).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?),
            None => None,
        };

        Ok(Self {
            id: row.get("id")?,
            vin: row.get("vin")?,
            mileage: row.get("mileage")?,
            zip: row.get("zip")?,
            status: row.get("status")?,
            current_phase: row.get("current_phase")?,
            report,
            error: row.get("error")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Inserts a new inspection row.
pub fn insert(db: &Database, inspection: &InspectionRow) -> Result<(), DatabaseError> {
    let report = inspection.report.as_ref().map(|r| r.to_string());
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO inspections (id, vin, mileage, zip, status, current_phase,
             report, error, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                inspection.id,
                inspection.vin,
                inspection.mileage,
                inspection.zip,
                inspection.status,
                inspection.current_phase,
                report,
                inspection.error,
                inspection.created_at,
                inspection.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds an inspection by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<InspectionRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM inspections WHERE id = ?1",
                params![id],
                InspectionRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Updates only the status and updated_at of an inspection.
pub fn update_status(
    db: &Database,
    id: &str,
    status: InspectionStatus,
    updated_at: &str,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE inspections SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, status, updated_at],
        )?;
        Ok(())
    })
}

/// Updates the progress marker shown while the chain is running.
pub fn set_phase(
    db: &Database,
    id: &str,
    phase: &str,
    updated_at: &str,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE inspections SET current_phase = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, phase, updated_at],
        )?;
        Ok(())
    })
}

/// Stores the assembled report and marks the inspection done.
pub fn complete_with_report(
    db: &Database,
    id: &str,
    report: &serde_json::Value,
    updated_at: &str,
) -> Result<(), DatabaseError> {
    let report_json = report.to_string();
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE inspections SET status = 'done', report = ?2, current_phase = NULL,
             updated_at = ?3 WHERE id = ?1",
            params![id, report_json, updated_at],
        )?;
        Ok(())
    })
}

/// Marks the inspection failed with a diagnostic message.
pub fn mark_failed(
    db: &Database,
    id: &str,
    error: &str,
    updated_at: &str,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE inspections SET status = 'failed', error = ?2, current_phase = NULL,
             updated_at = ?3 WHERE id = ?1",
            params![id, error, updated_at],
        )?;
        Ok(())
    })
}
