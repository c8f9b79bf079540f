//! Minimal Gemini client for our use-cases.
//!
//! We only call `models/{model}:generateContent` and always request JSON output
//! constrained by a response schema. Calls are instrumented and log model names,
//! latencies, and token usage (not contents).
//!
//! NOTE: the API key travels in the `x-goog-api-key` header and is never logged.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::config::GeminiConfig;
use crate::error::BackendError;
use crate::schemas::Schema;

/// One structured-output generation call.
#[derive(Debug, Clone, Copy)]
pub struct GenerateRequest<'a> {
  pub instruction: &'a str,
  pub schema: &'a Schema,
  pub temperature: f32,
}

/// The generation backend seam. Production uses `GeminiBackend`; tests plug in fakes.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
  /// Returns the raw text the model produced (expected to be JSON).
  async fn generate_content(&self, req: GenerateRequest<'_>) -> Result<String, BackendError>;

  /// Model identifier, for logs.
  fn model(&self) -> &str;
}

#[derive(Clone)]
pub struct GeminiBackend {
  client: reqwest::Client,
  config: GeminiConfig,
}

impl GeminiBackend {
  pub fn from_config(config: GeminiConfig) -> Result<Self, BackendError> {
    let client = reqwest::Client::builder().timeout(config.timeout).build()?;
    Ok(Self { client, config })
  }

  fn endpoint(&self) -> String {
    format!("{}/models/{}:generateContent", self.config.base_url, self.config.model)
  }
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
  #[instrument(level = "info", skip(self, req), fields(model = %self.config.model, instr_len = req.instruction.len()))]
  async fn generate_content(&self, req: GenerateRequest<'_>) -> Result<String, BackendError> {
    let body = GenerateContentRequest {
      contents: vec![Content { role: "user", parts: vec![PartReq { text: req.instruction }] }],
      generation_config: GenerationConfig {
        response_mime_type: "application/json",
        response_schema: req.schema,
        temperature: req.temperature,
      },
    };

    let start = Instant::now();
    let res = self.client.post(self.endpoint())
      .header(USER_AGENT, "grammar-galaxy-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header("x-goog-api-key", &self.config.api_key)
      .json(&body).send().await?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let message = extract_gemini_error(&body).unwrap_or(body);
      error!(?status, elapsed = ?start.elapsed(), "Gemini call failed");
      return Err(BackendError::Status { status, message });
    }

    let body: GenerateContentResponse = res.json().await?;
    if let Some(usage) = &body.usage_metadata {
      info!(prompt_tokens = ?usage.prompt_token_count, candidates_tokens = ?usage.candidates_token_count, total_tokens = ?usage.total_token_count, elapsed = ?start.elapsed(), "Gemini usage");
    }
    let text = body.first_text();
    if text.trim().is_empty() {
      return Err(BackendError::EmptyResponse);
    }
    Ok(text)
  }

  fn model(&self) -> &str {
    &self.config.model
  }
}

// --- generateContent DTOs ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
  contents: Vec<Content<'a>>,
  generation_config: GenerationConfig<'a>,
}
#[derive(Serialize)]
struct Content<'a> { role: &'static str, parts: Vec<PartReq<'a>> }
#[derive(Serialize)]
struct PartReq<'a> { text: &'a str }
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
  response_mime_type: &'static str,
  response_schema: &'a Schema,
  temperature: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
  #[serde(default)] candidates: Vec<Candidate>,
  #[serde(default)] usage_metadata: Option<UsageMetadata>,
}
#[derive(Deserialize)]
struct Candidate { #[serde(default)] content: Option<ContentResp> }
#[derive(Deserialize)]
struct ContentResp { #[serde(default)] parts: Vec<PartResp> }
#[derive(Deserialize)]
struct PartResp { #[serde(default)] text: Option<String> }
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
  #[serde(default)] prompt_token_count: Option<u32>,
  #[serde(default)] candidates_token_count: Option<u32>,
  #[serde(default)] total_token_count: Option<u32>,
}

impl GenerateContentResponse {
  /// Concatenated text parts of the first candidate.
  fn first_text(&self) -> String {
    self.candidates.first()
      .and_then(|c| c.content.as_ref())
      .map(|c| c.parts.iter().filter_map(|p| p.text.as_deref()).collect::<String>())
      .unwrap_or_default()
  }
}

/// Try to extract a clean error message from a Gemini error body.
fn extract_gemini_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}
