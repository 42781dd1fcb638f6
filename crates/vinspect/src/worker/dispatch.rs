//! Chain worker: an explicit advance queue instead of jobs calling back
//! over the network.
//!
//! Each [`AdvanceSignal`] means "job `completed_seq` of this inspection
//! reached a terminal state; find and start the next one". The worker
//! claims the next job through the Chain Driver, runs it, then enqueues
//! the signal for the job's own sequence order — the chain perpetuates
//! itself until the driver finds nothing pending and finalizes.
//!
//! Signals for different inspections interleave on the same queue, but a
//! chain only ever re-enters through its own completions, so jobs within
//! one inspection stay strictly sequential.

use std::sync::Arc;

use log::{error, info, warn};
use tokio::sync::{mpsc, watch};

use crate::chunker::build_chunks;
use crate::db::inspection_repo::{self, InspectionStatus};
use crate::db::{item_repo, job_repo, Database};
use crate::error::WorkerError;
use crate::now_rfc3339;
use crate::pipeline::{build_job_sequence, ChainDriver, JobRunner, PipelineConfig};

/// "A job just finished" — the seam between job completion and chain
/// advancement.
#[derive(Debug, Clone)]
pub struct AdvanceSignal {
    pub inspection_id: String,
    /// Sequence order of the job that finished; 0 starts the chain.
    pub completed_seq: i64,
}

/// Cloneable handle for triggering advances and shutting the worker down.
#[derive(Clone)]
pub struct WorkerHandle {
    tx: mpsc::UnboundedSender<AdvanceSignal>,
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl WorkerHandle {
    /// Enqueues an advance signal.
    pub fn trigger(&self, signal: AdvanceSignal) -> Result<(), WorkerError> {
        self.tx.send(signal).map_err(|_| WorkerError::ChannelClosed)
    }

    /// Asks the worker loop to stop after the signal it is handling.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

pub struct ChainWorker {
    driver: ChainDriver,
    runner: JobRunner,
    tx: mpsc::UnboundedSender<AdvanceSignal>,
    rx: mpsc::UnboundedReceiver<AdvanceSignal>,
    shutdown_rx: watch::Receiver<bool>,
}

impl ChainWorker {
    pub fn new(
        db: Database,
        analyzer: Arc<dyn crate::analysis::Analyzer>,
        config: Arc<PipelineConfig>,
    ) -> (Self, WorkerHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let worker = Self {
            driver: ChainDriver::new(db.clone()),
            runner: JobRunner::new(db, analyzer, config),
            tx: tx.clone(),
            rx,
            shutdown_rx,
        };
        let handle = WorkerHandle {
            tx,
            shutdown_tx: Arc::new(shutdown_tx),
        };
        (worker, handle)
    }

    /// Drains advance signals until shutdown is requested or every handle
    /// is dropped.
    pub async fn run(mut self) {
        info!("Chain worker started");
        loop {
            tokio::select! {
                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        break;
                    }
                }
                signal = self.rx.recv() => {
                    let Some(signal) = signal else { break };
                    self.step(signal).await;
                }
            }
        }
        info!("Chain worker stopped");
    }

    async fn step(&mut self, signal: AdvanceSignal) {
        match self
            .driver
            .advance(&signal.inspection_id, signal.completed_seq)
        {
            Ok(Some(job)) => {
                let completed_seq = job.seq;
                if let Err(e) = self.runner.run(&job).await {
                    // The terminal status write failed. The job stays in
                    // an ambiguous processing state until the stale
                    // sweep reconciles it, so do not advance the chain.
                    error!("Failed to persist outcome of job {}: {}", job.id, e);
                    return;
                }
                let next = AdvanceSignal {
                    inspection_id: signal.inspection_id,
                    completed_seq,
                };
                if self.tx.send(next).is_err() {
                    error!(
                        "Advance queue closed; chain for inspection stalled at seq {}",
                        completed_seq
                    );
                }
            }
            Ok(None) => {}
            Err(e) => {
                error!(
                    "Failed to advance inspection {}: {}",
                    signal.inspection_id, e
                );
            }
        }
    }
}

/// Stages an inspection's pipeline and kicks off its chain: items are
/// chunked, the full job sequence is persisted as `pending`, and the
/// initial advance signal is enqueued.
///
/// Returns the number of jobs queued. An inspection yielding no jobs at
/// all (no evidence and no stages enabled) is marked failed immediately.
pub fn start_inspection(
    db: &Database,
    config: &PipelineConfig,
    handle: &WorkerHandle,
    inspection_id: &str,
) -> Result<usize, WorkerError> {
    if inspection_repo::find_by_id(db, inspection_id)?.is_none() {
        return Err(WorkerError::InspectionNotFound(inspection_id.to_string()));
    }

    let items = item_repo::list_by_inspection(db, inspection_id)?;
    let chunks = build_chunks(&items, config.max_chunk_bytes);
    let now = now_rfc3339();
    let jobs = build_job_sequence(inspection_id, &chunks, &config.stages, &now);

    if jobs.is_empty() {
        info!("Inspection {} produced no jobs", inspection_id);
        inspection_repo::mark_failed(db, inspection_id, "no evidence and no stages to run", &now)?;
        return Ok(0);
    }

    if items.is_empty() {
        warn!(
            "Inspection {} has no evidence items; only downstream stages will run",
            inspection_id
        );
    }

    job_repo::insert_all(db, &jobs)?;
    inspection_repo::update_status(db, inspection_id, InspectionStatus::Processing, &now)?;
    info!(
        "Inspection {}: queued {} job(s) across {} chunk(s)",
        inspection_id,
        jobs.len(),
        chunks.len()
    );

    handle.trigger(AdvanceSignal {
        inspection_id: inspection_id.to_string(),
        completed_seq: 0,
    })?;
    Ok(jobs.len())
}
