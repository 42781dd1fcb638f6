use serde::{Deserialize, Serialize};

use crate::db::job_repo::JobKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    /// Byte budget per analysis chunk.
    #[serde(default = "default_max_chunk_bytes")]
    pub max_chunk_bytes: u64,
    /// Overrides the default `~/.vinspect/data/vinspect.db` location.
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default)]
    pub stages: StagesConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub assets: AssetsConfig,
}

fn default_max_chunk_bytes() -> u64 {
    10 * 1024 * 1024
}

/// Which downstream research stages run after the chunk-analysis jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagesConfig {
    #[serde(default = "default_true")]
    pub ownership_cost_forecast: bool,
    #[serde(default = "default_true")]
    pub fair_market_value: bool,
    #[serde(default = "default_true")]
    pub expert_advice: bool,
}

fn default_true() -> bool {
    true
}

impl Default for StagesConfig {
    fn default() -> Self {
        Self {
            ownership_cost_forecast: true,
            fair_market_value: true,
            expert_advice: true,
        }
    }
}

impl StagesConfig {
    /// Enabled stages in their fixed execution order: ownership-cost
    /// forecast, then fair-market-value, then expert advice.
    pub fn enabled(&self) -> Vec<JobKind> {
        let mut stages = Vec::new();
        if self.ownership_cost_forecast {
            stages.push(JobKind::OwnershipCostForecast);
        }
        if self.fair_market_value {
            stages.push(JobKind::FairMarketValue);
        }
        if self.expert_advice {
            stages.push(JobKind::ExpertAdvice);
        }
        stages
    }
}

/// Connection settings for the vision/research API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Direct API key value. Prefer `api_key_file` or `api_key_env`.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// USD per 1000 prompt tokens, used for the per-job cost counter.
    #[serde(default)]
    pub prompt_cost_per_1k: f64,
    /// USD per 1000 completion tokens.
    #[serde(default)]
    pub completion_cost_per_1k: f64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_api_key_env() -> Option<String> {
    Some("VINSPECT_API_KEY".to_string())
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            api_key_file: None,
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            prompt_cost_per_1k: 0.0,
            completion_cost_per_1k: 0.0,
        }
    }
}

/// Asset staging limits: how many assets are resolved concurrently before
/// an analysis call, and the pause between batches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsConfig {
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default = "default_batch_pause_ms")]
    pub batch_pause_ms: u64,
}

fn default_max_concurrent() -> usize {
    4
}

fn default_batch_pause_ms() -> u64 {
    250
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            batch_pause_ms: default_batch_pause_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: Config = serde_json::from_str(r#"{"version": "1.0"}"#).unwrap();
        assert_eq!(config.max_chunk_bytes, 10 * 1024 * 1024);
        assert_eq!(config.assets.max_concurrent, 4);
        assert_eq!(config.analysis.timeout_secs, 120);
        assert_eq!(
            config.analysis.api_key_env.as_deref(),
            Some("VINSPECT_API_KEY")
        );
    }

    #[test]
    fn test_enabled_stages_order_is_fixed() {
        let stages = StagesConfig::default().enabled();
        assert_eq!(
            stages,
            vec![
                JobKind::OwnershipCostForecast,
                JobKind::FairMarketValue,
                JobKind::ExpertAdvice
            ]
        );
    }

    #[test]
    fn test_disabled_stage_is_skipped() {
        let stages = StagesConfig {
            fair_market_value: false,
            ..Default::default()
        }
        .enabled();
        assert_eq!(
            stages,
            vec![JobKind::OwnershipCostForecast, JobKind::ExpertAdvice]
        );
    }
}
