use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let compiled =
        jsonschema::JSONSchema::compile(&schema).map_err(|e| ConfigError::Validation {
            message: format!("Failed to compile JSON schema: {}", e),
        })?;

    let result = compiled.validate(json_value);
    if let Err(errors) = result {
        let error_messages: Vec<String> = errors
            .map(|e| format!("{} at {}", e, e.instance_path))
            .collect();
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.max_chunk_bytes == 0 {
        return Err(ConfigError::Validation {
            message: "max_chunk_bytes must be greater than 0".to_string(),
        });
    }

    if config.analysis.timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "analysis.timeout_secs must be greater than 0".to_string(),
        });
    }

    if config.assets.max_concurrent == 0 {
        return Err(ConfigError::Validation {
            message: "assets.max_concurrent must be greater than 0".to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_loads() {
        let config = load_config_from_str(r#"{"version": "1.0"}"#).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.max_chunk_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_full_config_loads() {
        let config = load_config_from_str(
            r#"{
                "version": "1.0",
                "max_chunk_bytes": 5242880,
                "stages": {"expert_advice": false},
                "analysis": {
                    "base_url": "https://llm.internal/v1",
                    "model": "vision-large",
                    "api_key_env": "MY_KEY",
                    "timeout_secs": 60,
                    "prompt_cost_per_1k": 0.0025,
                    "completion_cost_per_1k": 0.01
                },
                "assets": {"max_concurrent": 2, "batch_pause_ms": 100}
            }"#,
        )
        .unwrap();
        assert_eq!(config.max_chunk_bytes, 5 * 1024 * 1024);
        assert!(!config.stages.expert_advice);
        assert_eq!(config.analysis.model, "vision-large");
        assert_eq!(config.assets.max_concurrent, 2);
    }

    #[test]
    fn test_unknown_key_rejected_by_schema() {
        let err = load_config_from_str(r#"{"version": "1.0", "chunk_bytes": 1}"#).unwrap_err();
        assert!(matches!(err, ConfigError::SchemaValidation { .. }));
    }

    #[test]
    fn test_wrong_version_rejected() {
        let err = load_config_from_str(r#"{"version": "2.0"}"#).unwrap_err();
        // The schema enum catches it before semantic validation.
        assert!(matches!(err, ConfigError::SchemaValidation { .. }));
    }

    #[test]
    fn test_zero_chunk_budget_rejected() {
        let err =
            load_config_from_str(r#"{"version": "1.0", "max_chunk_bytes": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::SchemaValidation { .. }));
    }

    #[test]
    fn test_invalid_json_rejected() {
        let err = load_config_from_str("{not json").unwrap_err();
        assert!(matches!(err, ConfigError::ParseJson(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }
}
