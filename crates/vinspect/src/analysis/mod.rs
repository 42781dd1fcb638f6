//! Analysis boundary: the opaque vision/research capability.
//!
//! The pipeline only depends on the [`Analyzer`] trait — a prompt, some
//! image attachments and a target output shape go in, structured JSON and
//! usage metrics come out. [`VisionClient`] is the production
//! implementation; tests substitute scripted stubs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod client;
pub mod prompts;
pub mod response;

pub use client::VisionClient;
pub use prompts::VehicleContext;

/// An image handed to the vision API, either a remote URL or an inline
/// base64 data URL produced by asset staging.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAttachment {
    pub media_type: String,
    pub url: String,
}

/// One request to the external capability.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub prompt: String,
    pub images: Vec<ImageAttachment>,
    /// JSON Schema the response body must satisfy.
    pub response_schema: serde_json::Value,
}

/// Token and cost counters reported by the capability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageMetrics {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub cost_usd: f64,
}

/// Successful analysis: validated structured JSON plus usage counters.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub result: serde_json::Value,
    pub usage: UsageMetrics,
}

/// Errors from the external capability or its response handling.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("API key resolution failed: {0}")]
    ApiKey(#[from] crate::secrets::SecretError),

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("API request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Response contained no content")]
    EmptyResponse,

    #[error("Response is not valid JSON: {0}")]
    MalformedJson(String),

    #[error("Response violates the expected shape: {0}")]
    SchemaViolation(String),
}

/// The opaque analysis capability the Job Runner dispatches to.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisOutcome, AnalysisError>;
}
