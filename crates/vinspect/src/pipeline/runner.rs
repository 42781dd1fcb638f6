//! Job Runner: executes one claimed job to a terminal state.
//!
//! Every error inside the job — missing context, asset staging, the API
//! call, a malformed or off-shape response — is converted into a `failed`
//! status write. The runner only returns an error when that terminal
//! write itself cannot be persisted.

use std::sync::Arc;

use log::{debug, warn};
use tracing::{info_span, Instrument};

use crate::analysis::{prompts, AnalysisOutcome, AnalysisRequest, Analyzer, VehicleContext};
use crate::assets;
use crate::db::job_repo::{self, JobKind, JobRow};
use crate::db::{inspection_repo, item_repo, Database, DatabaseError};
use crate::now_rfc3339;

use super::config::PipelineConfig;
use super::error::JobError;
use super::results::ResultCarrier;

pub struct JobRunner {
    db: Database,
    analyzer: Arc<dyn Analyzer>,
    carrier: ResultCarrier,
    config: Arc<PipelineConfig>,
}

impl JobRunner {
    pub fn new(db: Database, analyzer: Arc<dyn Analyzer>, config: Arc<PipelineConfig>) -> Self {
        let carrier = ResultCarrier::new(db.clone());
        Self {
            db,
            analyzer,
            carrier,
            config,
        }
    }

    /// Drives one `processing` job to `completed` or `failed`.
    ///
    /// Returns `Err` only when the terminal status write fails — in that
    /// case the job stays `processing` until the reconciliation sweep
    /// picks it up.
    pub async fn run(&self, job: &JobRow) -> Result<(), DatabaseError> {
        let span = info_span!("job", job_id = %job.id, kind = %job.kind, seq = job.seq);

        if let Err(e) =
            inspection_repo::set_phase(&self.db, &job.inspection_id, &job.phase_label(), &now_rfc3339())
        {
            warn!("Failed to update phase of inspection {}: {}", job.inspection_id, e);
        }

        let outcome = self.execute(job).instrument(span).await;
        let now = now_rfc3339();

        match outcome {
            Ok(outcome) => {
                let wrote = job_repo::mark_completed(
                    &self.db,
                    &job.id,
                    &outcome.result,
                    Some(outcome.usage.prompt_tokens as i64),
                    Some(outcome.usage.completion_tokens as i64),
                    Some(outcome.usage.cost_usd),
                    &now,
                )?;
                if wrote {
                    debug!(
                        "Job {} (seq {}) completed, {} prompt tokens",
                        job.id, job.seq, outcome.usage.prompt_tokens
                    );
                } else {
                    warn!("Job {} was not processing; completion not recorded", job.id);
                }
            }
            Err(e) => {
                warn!("Job {} (seq {}) failed: {}", job.id, job.seq, e);
                let wrote = job_repo::mark_failed(&self.db, &job.id, &e.to_string(), &now)?;
                if !wrote {
                    warn!("Job {} was not processing; failure not recorded", job.id);
                }
            }
        }

        Ok(())
    }

    async fn execute(&self, job: &JobRow) -> Result<AnalysisOutcome, JobError> {
        match job.kind {
            JobKind::ChunkAnalysis => self.run_chunk_analysis(job).await,
            kind => self.run_stage(job, kind).await,
        }
    }

    /// Vehicle context for prompts: VIN, mileage, zip, and the OBD2 code
    /// list extracted at upload time.
    fn load_context(&self, inspection_id: &str) -> Result<VehicleContext, JobError> {
        let inspection = inspection_repo::find_by_id(&self.db, inspection_id)?.ok_or_else(|| {
            JobError::MissingDependency(format!("inspection {} not found", inspection_id))
        })?;

        let obd_codes = item_repo::list_obd_codes(&self.db, inspection_id)?
            .into_iter()
            .filter_map(|item| Some((item.obd_code?, item.obd_description.unwrap_or_default())))
            .collect();

        Ok(VehicleContext {
            vin: inspection.vin,
            mileage: inspection.mileage,
            zip: inspection.zip,
            obd_codes,
        })
    }

    async fn run_chunk_analysis(&self, job: &JobRow) -> Result<AnalysisOutcome, JobError> {
        // The first chunk introduces the vehicle; later chunks instead
        // merge against their immediate predecessor's findings.
        let context = if job.chunk_index == 1 {
            Some(self.load_context(&job.inspection_id)?)
        } else {
            None
        };

        let prior = if job.chunk_index > 1 {
            let prior = self.carrier.preceding_result(&job.inspection_id, job.seq)?;
            if prior.is_none() {
                warn!(
                    "Chunk {}/{} of inspection {} has no completed predecessor; analyzing without merge context",
                    job.chunk_index, job.chunk_total, job.inspection_id
                );
            }
            prior
        } else {
            None
        };

        let images = assets::prepare_attachments(&job.payload, &self.config.assets).await?;
        let prompt = prompts::chunk_analysis_prompt(
            context.as_ref(),
            prior.as_ref(),
            job.chunk_index,
            job.chunk_total,
            &job.payload,
        );

        let request = AnalysisRequest {
            prompt,
            images,
            response_schema: prompts::chunk_analysis_schema(),
        };
        Ok(self.analyzer.analyze(request).await?)
    }

    async fn run_stage(&self, job: &JobRow, kind: JobKind) -> Result<AnalysisOutcome, JobError> {
        // Without a completed analysis there is nothing to research;
        // fail before spending an API call.
        let analysis = self
            .carrier
            .latest_analysis_result(&job.inspection_id)?
            .ok_or_else(|| {
                JobError::MissingDependency(format!(
                    "{} requires a completed chunk analysis for inspection {}, found none",
                    kind, job.inspection_id
                ))
            })?;

        let context = self.load_context(&job.inspection_id)?;
        let prompt = prompts::stage_prompt(kind, &context, &analysis);

        let request = AnalysisRequest {
            prompt,
            images: Vec::new(),
            response_schema: prompts::stage_schema(kind),
        };
        Ok(self.analyzer.analyze(request).await?)
    }
}
