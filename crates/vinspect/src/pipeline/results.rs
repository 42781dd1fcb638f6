//! Result Carrier: read-path for feeding a prior job's stored result into
//! a later one.
//!
//! Chunk-analysis jobs chain strictly on their immediate predecessor so
//! each batch refines the one before it; downstream stages instead read
//! the last *completed* chunk analysis — the fully merged findings —
//! regardless of what happens to sit before them positionally.

use crate::db::{job_repo, Database, DatabaseError};

#[derive(Clone)]
pub struct ResultCarrier {
    db: Database,
}

impl ResultCarrier {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Result of the completed job at exactly `seq - 1`, or `None` if it
    /// is missing, failed, or stored nothing.
    pub fn preceding_result(
        &self,
        inspection_id: &str,
        seq: i64,
    ) -> Result<Option<serde_json::Value>, DatabaseError> {
        job_repo::preceding_completed_result(&self.db, inspection_id, seq)
    }

    /// Result of the highest-sequence completed chunk-analysis job, or
    /// `None` if no chunk analysis has completed yet.
    pub fn latest_analysis_result(
        &self,
        inspection_id: &str,
    ) -> Result<Option<serde_json::Value>, DatabaseError> {
        job_repo::latest_completed_analysis_result(&self.db, inspection_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::inspection_repo::{self, InspectionRow};
    use crate::db::job_repo::JobRow;
    use serde_json::json;

    const NOW: &str = "2026-02-01T00:00:00Z";

    fn seeded_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        inspection_repo::insert(&db, &InspectionRow::new("insp-1", "VIN", 50000, "94103", NOW))
            .unwrap();
        db
    }

    fn complete_chunk_job(db: &Database, seq: i64, result: serde_json::Value) {
        let job = JobRow::chunk_analysis("insp-1", seq, seq, 3, Vec::new(), NOW);
        job_repo::insert(db, &job).unwrap();
        job_repo::claim_next_pending(db, "insp-1", seq - 1, NOW).unwrap();
        job_repo::mark_completed(db, &job.id, &result, None, None, None, NOW).unwrap();
    }

    #[test]
    fn test_preceding_result_roundtrip() {
        let db = seeded_db();
        complete_chunk_job(&db, 1, json!({"summary": "chunk one"}));

        let carrier = ResultCarrier::new(db);
        let prior = carrier.preceding_result("insp-1", 2).unwrap().unwrap();
        assert_eq!(prior["summary"], "chunk one");
        // Nothing sits at seq 2, so seq 3 has no predecessor result.
        assert!(carrier.preceding_result("insp-1", 3).unwrap().is_none());
    }

    #[test]
    fn test_latest_analysis_takes_highest_seq() {
        let db = seeded_db();
        complete_chunk_job(&db, 1, json!({"chunk": 1}));
        complete_chunk_job(&db, 2, json!({"chunk": 2}));

        let carrier = ResultCarrier::new(db);
        let latest = carrier.latest_analysis_result("insp-1").unwrap().unwrap();
        assert_eq!(latest["chunk"], 2);
    }

    #[test]
    fn test_empty_inspection_has_no_results() {
        let carrier = ResultCarrier::new(seeded_db());
        assert!(carrier.preceding_result("insp-1", 1).unwrap().is_none());
        assert!(carrier.latest_analysis_result("insp-1").unwrap().is_none());
    }
}
