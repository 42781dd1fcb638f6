//! Turns a chunk list plus the enabled downstream stages into the full
//! pending job sequence for an inspection.

use crate::chunker::Chunk;
use crate::db::job_repo::{JobKind, JobRow};

/// Builds the complete job sequence: one chunk-analysis job per chunk,
/// then one job per downstream stage, with sequence orders `1..=N`.
///
/// Downstream jobs are emitted even when `chunks` is empty — an
/// inspection without evidence still runs its requested research stages
/// (they fail fast on the missing analysis, which is the intended
/// behavior, not an accident of ordering).
///
/// `stages` must not contain [`JobKind::ChunkAnalysis`] and is expected in
/// the fixed stage order the config layer produces.
pub fn build_job_sequence(
    inspection_id: &str,
    chunks: &[Chunk],
    stages: &[JobKind],
    created_at: &str,
) -> Vec<JobRow> {
    debug_assert!(stages.iter().all(|s| !s.is_chunk_analysis()));

    let chunk_total = chunks.len() as i64;
    let mut jobs = Vec::with_capacity(chunks.len() + stages.len());

    for chunk in chunks {
        jobs.push(JobRow::chunk_analysis(
            inspection_id,
            chunk.index as i64,
            chunk.index as i64,
            chunk_total,
            chunk.items.clone(),
            created_at,
        ));
    }

    let mut seq = chunk_total;
    for &kind in stages {
        seq += 1;
        jobs.push(JobRow::stage(inspection_id, kind, seq, created_at));
    }

    jobs
}
