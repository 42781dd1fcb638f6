//! Final report assembly from an inspection's finished job chain.
//!
//! The report is what the inspection row persists once the chain ends:
//! the merged image analysis, each research stage's result (or null where
//! the stage failed), chunk accounting, and usage totals.

use serde_json::{json, Value};

use crate::db::job_repo::{JobKind, JobRow, JobStatus};

/// Merges the chain's results into one report document. Pure over the
/// job list; failed stages contribute `null`.
pub fn assemble(jobs: &[JobRow]) -> Value {
    let analysis = jobs
        .iter()
        .filter(|j| j.kind.is_chunk_analysis() && j.status == JobStatus::Completed)
        .max_by_key(|j| j.seq)
        .and_then(|j| j.result.clone());

    let stage_result = |kind: JobKind| -> Value {
        jobs.iter()
            .find(|j| j.kind == kind && j.status == JobStatus::Completed)
            .and_then(|j| j.result.clone())
            .unwrap_or(Value::Null)
    };

    let chunk_jobs: Vec<&JobRow> = jobs.iter().filter(|j| j.kind.is_chunk_analysis()).collect();
    let chunks_completed = chunk_jobs
        .iter()
        .filter(|j| j.status == JobStatus::Completed)
        .count();
    let chunks_failed = chunk_jobs
        .iter()
        .filter(|j| j.status == JobStatus::Failed)
        .count();

    let prompt_tokens: i64 = jobs.iter().filter_map(|j| j.prompt_tokens).sum();
    let completion_tokens: i64 = jobs.iter().filter_map(|j| j.completion_tokens).sum();
    let cost_usd: f64 = jobs.iter().filter_map(|j| j.cost_usd).sum();

    json!({
        "analysis": analysis.unwrap_or(Value::Null),
        "chunks": {
            "total": chunk_jobs.len(),
            "completed": chunks_completed,
            "failed": chunks_failed,
        },
        "ownership_cost_forecast": stage_result(JobKind::OwnershipCostForecast),
        "fair_market_value": stage_result(JobKind::FairMarketValue),
        "expert_advice": stage_result(JobKind::ExpertAdvice),
        "usage": {
            "prompt_tokens": prompt_tokens,
            "completion_tokens": completion_tokens,
            "cost_usd": cost_usd,
        },
    })
}
