//! Job repository — CRUD and chain queries for the `jobs` table.
//!
//! A job is one unit of pipeline work for an inspection. The `seq` column
//! is a strictly increasing, per-inspection sequence order (enforced by a
//! UNIQUE constraint) that defines total execution order across all job
//! kinds. Status transitions are monotonic:
//! `pending -> processing -> {completed, failed}`.

use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, OptionalExtension, Row};

use crate::evidence::EvidenceItem;

use super::{Database, DatabaseError};

/// Kind of pipeline work a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    /// Vision analysis of one chunk of evidence items.
    ChunkAnalysis,
    /// Five-year ownership cost forecast.
    OwnershipCostForecast,
    /// Fair market value research.
    FairMarketValue,
    /// Expert buying advice.
    ExpertAdvice,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ChunkAnalysis => "chunk_analysis",
            Self::OwnershipCostForecast => "ownership_cost_forecast",
            Self::FairMarketValue => "fair_market_value",
            Self::ExpertAdvice => "expert_advice",
        }
    }

    pub fn is_chunk_analysis(self) -> bool {
        matches!(self, Self::ChunkAnalysis)
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chunk_analysis" => Ok(Self::ChunkAnalysis),
            "ownership_cost_forecast" => Ok(Self::OwnershipCostForecast),
            "fair_market_value" => Ok(Self::FairMarketValue),
            "expert_advice" => Ok(Self::ExpertAdvice),
            _ => Err(()),
        }
    }
}

impl ToSql for JobKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for JobKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()
            .and_then(|s| s.parse().map_err(|_| FromSqlError::InvalidType))
    }
}

/// Job lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether the job has reached a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(()),
        }
    }
}

impl ToSql for JobStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for JobStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()
            .and_then(|s| s.parse().map_err(|_| FromSqlError::InvalidType))
    }
}

/// A job row from the database.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub id: String,
    pub inspection_id: String,
    pub kind: JobKind,
    /// Per-inspection sequence order, 1-based, no gaps.
    pub seq: i64,
    /// 1-based chunk position; 1 for downstream stage jobs.
    pub chunk_index: i64,
    /// Total chunk count; 1 for downstream stage jobs.
    pub chunk_total: i64,
    /// Evidence items to analyze; empty for downstream stage jobs.
    pub payload: Vec<EvidenceItem>,
    pub status: JobStatus,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub prompt_tokens: Option<i64>,
    pub completion_tokens: Option<i64>,
    pub cost_usd: Option<f64>,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

impl JobRow {
    /// Creates a pending chunk-analysis job.
    pub fn chunk_analysis(
        inspection_id: &str,
        seq: i64,
        chunk_index: i64,
        chunk_total: i64,
        payload: Vec<EvidenceItem>,
        created_at: &str,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            inspection_id: inspection_id.to_string(),
            kind: JobKind::ChunkAnalysis,
            seq,
            chunk_index,
            chunk_total,
            payload,
            status: JobStatus::Pending,
            result: None,
            error: None,
            prompt_tokens: None,
            completion_tokens: None,
            cost_usd: None,
            created_at: created_at.to_string(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Creates a pending downstream-stage job with an empty payload.
    pub fn stage(inspection_id: &str, kind: JobKind, seq: i64, created_at: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            inspection_id: inspection_id.to_string(),
            kind,
            seq,
            chunk_index: 1,
            chunk_total: 1,
            payload: Vec::new(),
            status: JobStatus::Pending,
            result: None,
            error: None,
            prompt_tokens: None,
            completion_tokens: None,
            cost_usd: None,
            created_at: created_at.to_string(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Label for the inspection's `current_phase` marker.
    pub fn phase_label(&self) -> String {
        match self.kind {
            JobKind::ChunkAnalysis => {
                format!("chunk_{}_of_{}", self.chunk_index, self.chunk_total)
            }
            kind => kind.as_str().to_string(),
        }
    }

    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let payload_json: String = row.get("payload")?;
        let payload: Vec<EvidenceItem> = serde_json::from_str(&payload_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?;

        let result_json: Option<String> = row.get("result")?;
        let result = match result_json {
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
            inspection_id: row.get("inspection_id")?,
            kind: row.get("kind")?,
            seq: row.get("seq")?,
            chunk_index: row.get("chunk_index")?,
            chunk_total: row.get("chunk_total")?,
            payload,
            status: row.get("status")?,
            result,
            error: row.get("error")?,
            prompt_tokens: row.get("prompt_tokens")?,
            completion_tokens: row.get("completion_tokens")?,
            cost_usd: row.get("cost_usd")?,
            created_at: row.get("created_at")?,
            started_at: row.get("started_at")?,
            completed_at: row.get("completed_at")?,
        })
    }
}

fn payload_json(job: &JobRow) -> Result<String, DatabaseError> {
    serde_json::to_string(&job.payload).map_err(|e| DatabaseError::Corrupt {
        table: "jobs",
        id: job.id.clone(),
        reason: format!("payload does not serialize: {}", e),
    })
}

/// Inserts a single job row.
pub fn insert(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    let payload = payload_json(job)?;
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO jobs (id, inspection_id, kind, seq, chunk_index, chunk_total,
             payload, status, error, prompt_tokens, completion_tokens, cost_usd,
             created_at, started_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                job.id,
                job.inspection_id,
                job.kind,
                job.seq,
                job.chunk_index,
                job.chunk_total,
                payload,
                job.status,
                job.error,
                job.prompt_tokens,
                job.completion_tokens,
                job.cost_usd,
                job.created_at,
                job.started_at,
                job.completed_at,
            ],
        )?;
        Ok(())
    })
}

/// Inserts a whole job sequence in one transaction.
pub fn insert_all(db: &Database, jobs: &[JobRow]) -> Result<(), DatabaseError> {
    let payloads = jobs
        .iter()
        .map(payload_json)
        .collect::<Result<Vec<_>, _>>()?;
    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;
        for (job, payload) in jobs.iter().zip(&payloads) {
            tx.execute(
                "INSERT INTO jobs (id, inspection_id, kind, seq, chunk_index, chunk_total,
                 payload, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    job.id,
                    job.inspection_id,
                    job.kind,
                    job.seq,
                    job.chunk_index,
                    job.chunk_total,
                    payload,
                    job.status,
                    job.created_at,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM jobs WHERE id = ?1",
                params![id],
                JobRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Lists all jobs for an inspection ordered by sequence.
pub fn list_by_inspection(db: &Database, inspection_id: &str) -> Result<Vec<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM jobs WHERE inspection_id = ?1 ORDER BY seq ASC")?;
        let rows: Vec<JobRow> = stmt
            .query_map(params![inspection_id], JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Claims the next pending job after `completed_seq`: the lowest-sequence
/// `pending` job with `seq > completed_seq` is flipped to `processing` and
/// returned.
///
/// The chain is strictly sequential: while any job of the inspection is
/// still `processing`, nothing is claimed — a duplicate advance signal
/// gets `None` instead of activating a second job. Find-and-flip runs
/// under the connection lock and the UPDATE re-checks the status.
pub fn claim_next_pending(
    db: &Database,
    inspection_id: &str,
    completed_seq: i64,
    started_at: &str,
) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let active: i64 = conn.query_row(
            "SELECT COUNT(*) FROM jobs WHERE inspection_id = ?1 AND status = 'processing'",
            params![inspection_id],
            |r| r.get(0),
        )?;
        if active > 0 {
            return Ok(None);
        }

        let candidate = conn
            .query_row(
                "SELECT * FROM jobs
                 WHERE inspection_id = ?1 AND status = 'pending' AND seq > ?2
                 ORDER BY seq ASC LIMIT 1",
                params![inspection_id, completed_seq],
                JobRow::from_row,
            )
            .optional()?;

        let Some(mut job) = candidate else {
            return Ok(None);
        };

        let changed = conn.execute(
            "UPDATE jobs SET status = 'processing', started_at = ?2
             WHERE id = ?1 AND status = 'pending'",
            params![job.id, started_at],
        )?;
        if changed == 0 {
            // Lost the claim to a concurrent advance.
            return Ok(None);
        }

        job.status = JobStatus::Processing;
        job.started_at = Some(started_at.to_string());
        Ok(Some(job))
    })
}

/// Writes a successful terminal state. Only a `processing` job can be
/// completed; returns false if the job was not in that state.
pub fn mark_completed(
    db: &Database,
    id: &str,
    result: &serde_json::Value,
    prompt_tokens: Option<i64>,
    completion_tokens: Option<i64>,
    cost_usd: Option<f64>,
    completed_at: &str,
) -> Result<bool, DatabaseError> {
    let result_json = result.to_string();
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET status = 'completed', result = ?2, prompt_tokens = ?3,
             completion_tokens = ?4, cost_usd = ?5, completed_at = ?6
             WHERE id = ?1 AND status = 'processing'",
            params![
                id,
                result_json,
                prompt_tokens,
                completion_tokens,
                cost_usd,
                completed_at
            ],
        )?;
        Ok(changed == 1)
    })
}

/// Writes a failed terminal state. Only a `processing` job can fail;
/// returns false if the job was not in that state.
pub fn mark_failed(
    db: &Database,
    id: &str,
    error: &str,
    completed_at: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET status = 'failed', error = ?2, completed_at = ?3
             WHERE id = ?1 AND status = 'processing'",
            params![id, error, completed_at],
        )?;
        Ok(changed == 1)
    })
}

/// Result of the completed job at exactly `seq - 1`, or `None` if that job
/// does not exist, did not complete, or stored no result.
pub fn preceding_completed_result(
    db: &Database,
    inspection_id: &str,
    seq: i64,
) -> Result<Option<serde_json::Value>, DatabaseError> {
    fetch_result_column(
        db,
        "SELECT result FROM jobs
         WHERE inspection_id = ?1 AND seq = ?2 AND status = 'completed'",
        params![inspection_id, seq - 1],
    )
}

/// Result of the highest-sequence completed chunk-analysis job, or `None`
/// if no chunk analysis has completed.
pub fn latest_completed_analysis_result(
    db: &Database,
    inspection_id: &str,
) -> Result<Option<serde_json::Value>, DatabaseError> {
    fetch_result_column(
        db,
        "SELECT result FROM jobs
         WHERE inspection_id = ?1 AND kind = 'chunk_analysis' AND status = 'completed'
         ORDER BY seq DESC LIMIT 1",
        params![inspection_id],
    )
}

fn fetch_result_column(
    db: &Database,
    sql: &str,
    sql_params: &[&dyn ToSql],
) -> Result<Option<serde_json::Value>, DatabaseError> {
    db.with_conn(|conn| {
        let raw: Option<Option<String>> = conn
            .query_row(sql, sql_params, |r| r.get(0))
            .optional()?;
        match raw.flatten() {
            Some(text) => {
                let value = serde_json::from_str(&text).map_err(|e| DatabaseError::Corrupt {
                    table: "jobs",
                    id: String::new(),
                    reason: format!("stored result is not valid JSON: {}", e),
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    })
}

/// Reconciliation sweep for jobs stuck in `processing` (e.g. the process
/// died before the terminal status write landed). Fails every `processing`
/// job started before `cutoff` and returns how many were swept.
pub fn reset_stale_processing(
    db: &Database,
    cutoff: &str,
    completed_at: &str,
) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET status = 'failed',
             error = 'job timed out in processing state', completed_at = ?2
             WHERE status = 'processing' AND started_at < ?1",
            params![cutoff, completed_at],
        )?;
        if changed > 0 {
            log::warn!("Swept {} stale processing job(s)", changed);
        }
        Ok(changed)
    })
}
