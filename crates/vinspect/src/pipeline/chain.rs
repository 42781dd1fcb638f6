//! Chain Driver: activates the next pending job after one completes, and
//! finalizes the inspection once the chain runs dry.
//!
//! `advance` never waits on the job it activates; the job's own
//! completion signal re-enters `advance` with its sequence order, so the
//! chain perpetuates itself one job at a time.

use log::{debug, info, warn};

use crate::db::job_repo::{self, JobRow, JobStatus};
use crate::db::{inspection_repo, Database, DatabaseError};
use crate::now_rfc3339;
use crate::report;

pub struct ChainDriver {
    db: Database,
}

impl ChainDriver {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Claims the lowest pending job with `seq > completed_seq` and
    /// returns it for execution, or finalizes the inspection and returns
    /// `None` when no pending job remains.
    ///
    /// The claim flips the job to `processing` atomically, so a duplicate
    /// completion signal finds nothing to claim and is a no-op — only one
    /// job per inspection is ever active.
    pub fn advance(
        &self,
        inspection_id: &str,
        completed_seq: i64,
    ) -> Result<Option<JobRow>, DatabaseError> {
        let now = now_rfc3339();
        match job_repo::claim_next_pending(&self.db, inspection_id, completed_seq, &now)? {
            Some(job) => {
                debug!(
                    "Inspection {}: claimed job seq {} ({})",
                    inspection_id, job.seq, job.kind
                );
                Ok(Some(job))
            }
            None => {
                self.finalize(inspection_id)?;
                Ok(None)
            }
        }
    }

    /// Terminal bookkeeping once no pending job remains. Idempotent: an
    /// already-finalized inspection is left untouched.
    ///
    /// An inspection with no completed chunk analysis — no evidence at
    /// all, or every chunk failed — is marked failed; otherwise the
    /// report is assembled and the inspection is done, even if individual
    /// stages failed.
    pub fn finalize(&self, inspection_id: &str) -> Result<(), DatabaseError> {
        let Some(inspection) = inspection_repo::find_by_id(&self.db, inspection_id)? else {
            warn!("Cannot finalize unknown inspection {}", inspection_id);
            return Ok(());
        };
        if inspection.status.is_terminal() {
            return Ok(());
        }

        let jobs = job_repo::list_by_inspection(&self.db, inspection_id)?;
        // A duplicate signal can land here while the chain is still
        // mid-flight; only finalize once every job is terminal.
        if jobs.iter().any(|j| !j.status.is_terminal()) {
            return Ok(());
        }

        let analysis_completed = jobs
            .iter()
            .any(|j| j.kind.is_chunk_analysis() && j.status == JobStatus::Completed);

        let now = now_rfc3339();
        if analysis_completed {
            let report = report::assemble(&jobs);
            inspection_repo::complete_with_report(&self.db, inspection_id, &report, &now)?;
            info!("Inspection {} completed ({} job(s))", inspection_id, jobs.len());
        } else {
            inspection_repo::mark_failed(&self.db, inspection_id, "no completed image analysis", &now)?;
            info!(
                "Inspection {} failed: no chunk analysis completed",
                inspection_id
            );
        }

        Ok(())
    }
}
