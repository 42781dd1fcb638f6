use crate::config::{AssetsConfig, Config};
use crate::db::job_repo::JobKind;

/// Flattened pipeline settings derived from the runtime config.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Byte budget per analysis chunk.
    pub max_chunk_bytes: u64,
    /// Downstream stages to append after the chunk jobs, in execution order.
    pub stages: Vec<JobKind>,
    pub assets: AssetsConfig,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_chunk_bytes: config.max_chunk_bytes,
            stages: config.stages.enabled(),
            assets: config.assets.clone(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_config(&Config {
            version: "1.0".to_string(),
            max_chunk_bytes: 10 * 1024 * 1024,
            database_path: None,
            stages: Default::default(),
            analysis: Default::default(),
            assets: Default::default(),
        })
    }
}
