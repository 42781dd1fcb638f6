//! Test harness for driving inspection chains against a scripted
//! analyzer: an in-memory database, a canned analysis capability, and a
//! synchronous chain stepper that checks the single-active-job invariant
//! at every step.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use vinspect::analysis::{
    AnalysisError, AnalysisOutcome, AnalysisRequest, Analyzer, UsageMetrics,
};
use vinspect::chunker::build_chunks;
use vinspect::db::inspection_repo::{self, InspectionRow, InspectionStatus};
use vinspect::db::job_repo::JobStatus;
use vinspect::db::{item_repo, job_repo, Database};
use vinspect::evidence::EvidenceItem;
use vinspect::pipeline::{build_job_sequence, ChainDriver, JobRunner, PipelineConfig};

pub const NOW: &str = "2026-02-01T00:00:00Z";
pub const INSPECTION: &str = "insp-1";

/// Analyzer that fabricates a reply matching the requested output shape,
/// optionally failing on selected call numbers (1-based).
pub struct CannedAnalyzer {
    calls: AtomicUsize,
    fail_calls: HashSet<usize>,
    prompts: Mutex<Vec<String>>,
}

impl CannedAnalyzer {
    pub fn new() -> Self {
        Self::failing_on(&[])
    }

    pub fn failing_on(fail_calls: &[usize]) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_calls: fail_calls.iter().copied().collect(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn reply_for(schema: &Value, call: usize) -> Value {
        let required: Vec<&str> = schema["required"]
            .as_array()
            .map(|a| a.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default();

        if required.contains(&"annual_cost_usd") {
            json!({
                "annual_cost_usd": 1800.0,
                "five_year_total_usd": 9000.0,
                "breakdown": {"maintenance": 900.0, "repairs": 900.0}
            })
        } else if required.contains(&"low_usd") {
            json!({"low_usd": 4200.0, "high_usd": 6100.0, "typical_usd": 5100.0})
        } else if required.contains(&"verdict") {
            json!({
                "verdict": "buy_with_caution",
                "concerns": ["rust on sills"],
                "negotiation_points": ["quote for sill repair"]
            })
        } else {
            json!({
                "condition_scores": {"exterior": 6.5},
                "findings": [{
                    "area": "exterior",
                    "severity": "moderate",
                    "description": format!("finding from call {}", call)
                }],
                "summary": format!("analysis after call {}", call)
            })
        }
    }
}

#[async_trait]
impl Analyzer for CannedAnalyzer {
    async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisOutcome, AnalysisError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.prompts.lock().unwrap().push(request.prompt);

        if self.fail_calls.contains(&call) {
            return Err(AnalysisError::Status {
                status: 504,
                body: "upstream timeout".to_string(),
            });
        }

        Ok(AnalysisOutcome {
            result: Self::reply_for(&request.response_schema, call),
            usage: UsageMetrics {
                prompt_tokens: 1000,
                completion_tokens: 200,
                cost_usd: 0.005,
            },
        })
    }
}

/// Isolated chain-execution environment over an in-memory database.
pub struct PipelineHarness {
    pub db: Database,
    pub analyzer: Arc<CannedAnalyzer>,
    pub config: Arc<PipelineConfig>,
    pub driver: ChainDriver,
    pub runner: JobRunner,
}

impl PipelineHarness {
    pub fn new() -> Self {
        Self::with_analyzer(CannedAnalyzer::new())
    }

    pub fn with_analyzer(analyzer: CannedAnalyzer) -> Self {
        let db = Database::open_in_memory().expect("Failed to create test database");
        let analyzer = Arc::new(analyzer);
        let config = Arc::new(PipelineConfig::default());
        let driver = ChainDriver::new(db.clone());
        let runner = JobRunner::new(
            db.clone(),
            Arc::clone(&analyzer) as Arc<dyn Analyzer>,
            Arc::clone(&config),
        );
        Self {
            db,
            analyzer,
            config,
            driver,
            runner,
        }
    }

    /// Seeds the default inspection row.
    pub fn seed_inspection(&self) {
        inspection_repo::insert(
            &self.db,
            &InspectionRow::new(INSPECTION, "WVWZZZ3CZWE689725", 87000, "60601", NOW),
        )
        .expect("Failed to seed inspection");
    }

    pub fn seed_items(&self, items: &[EvidenceItem]) {
        for item in items {
            item_repo::insert(&self.db, INSPECTION, item, NOW).expect("Failed to seed item");
        }
    }

    /// Builds chunks and persists the full pending job sequence, the way
    /// `start_inspection` stages a pipeline, without the worker queue.
    pub fn stage_pipeline(&self) -> usize {
        let items =
            item_repo::list_by_inspection(&self.db, INSPECTION).expect("Failed to list items");
        let chunks = build_chunks(&items, self.config.max_chunk_bytes);
        let jobs = build_job_sequence(INSPECTION, &chunks, &self.config.stages, NOW);
        job_repo::insert_all(&self.db, &jobs).expect("Failed to insert jobs");
        inspection_repo::update_status(&self.db, INSPECTION, InspectionStatus::Processing, NOW)
            .expect("Failed to update status");
        jobs.len()
    }

    /// Steps the chain to termination: advance, run, repeat. Asserts at
    /// every step that at most one job is processing. Returns how many
    /// jobs were executed.
    pub async fn run_chain(&self) -> usize {
        let mut executed = 0;
        let mut completed_seq = 0;
        loop {
            let Some(job) = self
                .driver
                .advance(INSPECTION, completed_seq)
                .expect("advance failed")
            else {
                break;
            };

            self.assert_at_most_one_processing();
            self.runner.run(&job).await.expect("terminal write failed");
            executed += 1;
            completed_seq = job.seq;
        }
        executed
    }

    pub fn assert_at_most_one_processing(&self) {
        let processing = self
            .jobs()
            .into_iter()
            .filter(|j| j.status == JobStatus::Processing)
            .count();
        assert!(
            processing <= 1,
            "{} jobs processing at once",
            processing
        );
    }

    pub fn jobs(&self) -> Vec<job_repo::JobRow> {
        job_repo::list_by_inspection(&self.db, INSPECTION).expect("Failed to list jobs")
    }

    pub fn inspection(&self) -> InspectionRow {
        inspection_repo::find_by_id(&self.db, INSPECTION)
            .expect("Failed to load inspection")
            .expect("inspection missing")
    }
}
