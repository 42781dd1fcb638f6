//! Vision API client speaking the OpenAI-style chat-completions protocol.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::AnalysisConfig;
use crate::secrets::resolve_secret;

use super::{
    response, AnalysisError, AnalysisOutcome, AnalysisRequest, Analyzer, UsageMetrics,
};

/// Client for the external vision/research API.
pub struct VisionClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: SecretString,
    prompt_cost_per_1k: f64,
    completion_cost_per_1k: f64,
}

impl VisionClient {
    /// Builds a client from config, resolving the API key through the
    /// secret indirection and applying the transport timeout.
    pub fn from_config(config: &AnalysisConfig) -> Result<Self, AnalysisError> {
        let api_key = resolve_secret(
            config.api_key.as_deref(),
            config.api_key_file.as_deref(),
            config.api_key_env.as_deref(),
        )?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(AnalysisError::ClientBuild)?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            prompt_cost_per_1k: config.prompt_cost_per_1k,
            completion_cost_per_1k: config.completion_cost_per_1k,
        })
    }

    fn build_body(&self, request: &AnalysisRequest) -> Value {
        let mut content = vec![json!({"type": "text", "text": request.prompt})];
        for image in &request.images {
            content.push(json!({
                "type": "image_url",
                "image_url": {"url": image.url}
            }));
        }

        json!({
            "model": self.model,
            "messages": [{"role": "user", "content": content}],
            "response_format": {"type": "json_object"}
        })
    }

    fn usage_from(&self, usage: Option<ApiUsage>) -> UsageMetrics {
        let usage = usage.unwrap_or_default();
        let cost_usd = usage.prompt_tokens as f64 / 1000.0 * self.prompt_cost_per_1k
            + usage.completion_tokens as f64 / 1000.0 * self.completion_cost_per_1k;
        UsageMetrics {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            cost_usd,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[async_trait]
impl Analyzer for VisionClient {
    async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisOutcome, AnalysisError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(
            "Calling analysis API: {} ({} image(s))",
            url,
            request.images.len()
        );

        let body = self.build_body(&request);
        let http_response = self
            .http
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = http_response.status();
        if !status.is_success() {
            let body = http_response.text().await.unwrap_or_default();
            let mut body = body.trim().to_string();
            body.truncate(500);
            return Err(AnalysisError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = http_response.json().await?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(AnalysisError::EmptyResponse)?;

        let result = response::extract_json(&content)?;
        response::validate(&request.response_schema, &result)?;

        let usage = self.usage_from(chat.usage);
        Ok(AnalysisOutcome { result, usage })
    }
}
