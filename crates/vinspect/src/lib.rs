pub mod analysis;
pub mod assets;
pub mod chunker;
pub mod config;
pub mod db;
pub mod error;
pub mod evidence;
pub mod pipeline;
pub mod report;
pub mod secrets;
pub mod worker;

pub use analysis::{AnalysisOutcome, AnalysisRequest, Analyzer, UsageMetrics, VisionClient};
pub use chunker::{build_chunks, Chunk};
pub use config::{load_config, Config};
pub use error::{ConfigError, Result, VinspectError, WorkerError};
pub use evidence::{EvidenceItem, ItemCategory};
pub use pipeline::{ChainDriver, JobRunner, PipelineConfig, ResultCarrier};
pub use secrets::{resolve_secret, SecretError};
pub use worker::{start_inspection, AdvanceSignal, ChainWorker, WorkerHandle};

/// UTC timestamp in RFC3339, the format every table stores.
pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
