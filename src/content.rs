//! Content request client: instruction + schema in, typed record out.
//!
//! The client is stateless between calls. It performs no schema validation
//! beyond JSON parse success; the backend's structured-output guarantee is trusted.
//! Nothing here retries: callers decide whether to re-issue a failed request.

use std::sync::Arc;
use std::time::Instant;

use serde::de::DeserializeOwned;
use tracing::{error, info, instrument};

use crate::config::Prompts;
use crate::domain::{
  Dialogue, EmojiQuestion, GrammarFillQuestion, GrammarSpotterQuestion, ValidationResult, MAX_LEVELS,
  MAZE_QUESTIONS, TOTAL_QUESTIONS_PER_GAME,
};
use crate::error::ContentError;
use crate::gemini::{GenerateRequest, GenerationBackend};
use crate::schemas::{self, Schema};
use crate::util::{fill_template, trunc_for_log};

/// Sampling temperature for every call; variety matters more than determinism here.
pub const GENERATION_TEMPERATURE: f32 = 0.9;

#[derive(Clone)]
pub struct ContentClient {
  backend: Option<Arc<dyn GenerationBackend>>,
  prompts: Prompts,
}

impl ContentClient {
  pub fn new(backend: Option<Arc<dyn GenerationBackend>>, prompts: Prompts) -> Self {
    Self { backend, prompts }
  }

  pub fn is_configured(&self) -> bool {
    self.backend.is_some()
  }

  /// Send `instruction` constrained by `schema` and parse the reply as `T`.
  #[instrument(level = "info", skip(self, instruction, schema), fields(instr_len = instruction.len()))]
  pub async fn request<T: DeserializeOwned>(&self, instruction: &str, schema: &Schema) -> Result<T, ContentError> {
    let Some(backend) = &self.backend else {
      error!(target: "content", "Gemini API key not configured. Cannot make API calls.");
      return Err(ContentError::Configuration);
    };

    let start = Instant::now();
    let req = GenerateRequest { instruction, schema, temperature: GENERATION_TEMPERATURE };
    let text = match backend.generate_content(req).await {
      Ok(t) => t,
      Err(e) => {
        error!(target: "content", model = %backend.model(), elapsed = ?start.elapsed(), error = %e, "Generation call failed");
        return Err(e.into());
      }
    };

    let text = text.trim();
    match serde_json::from_str::<T>(text) {
      Ok(v) => {
        info!(target: "content", model = %backend.model(), elapsed = ?start.elapsed(), reply_len = text.len(), "Model response parsed");
        Ok(v)
      }
      Err(e) => {
        error!(target: "content", error = %e, reply = %trunc_for_log(text, 120), "Model reply is not valid JSON for the expected shape");
        Err(e.into())
      }
    }
  }

  // --- High-level helpers (one per game) ---

  pub async fn grammar_spotter_questions(&self) -> Result<Vec<GrammarSpotterQuestion>, ContentError> {
    let prompt = self.batch_prompt(&self.prompts.grammar_spotter, TOTAL_QUESTIONS_PER_GAME);
    self.request(&prompt, &schemas::grammar_spotter()).await
  }

  pub async fn grammar_fill_questions(&self) -> Result<Vec<GrammarFillQuestion>, ContentError> {
    let prompt = self.batch_prompt(&self.prompts.grammar_fill, TOTAL_QUESTIONS_PER_GAME);
    self.request(&prompt, &schemas::grammar_fill()).await
  }

  pub async fn preposition_drop_questions(&self) -> Result<Vec<GrammarFillQuestion>, ContentError> {
    let prompt = self.batch_prompt(&self.prompts.preposition_drop, TOTAL_QUESTIONS_PER_GAME);
    self.request(&prompt, &schemas::grammar_fill()).await
  }

  pub async fn maze_questions(&self) -> Result<Vec<GrammarFillQuestion>, ContentError> {
    let prompt = self.batch_prompt(&self.prompts.maze, MAZE_QUESTIONS);
    self.request(&prompt, &schemas::grammar_fill()).await
  }

  #[instrument(level = "info", skip(self))]
  pub async fn dialogue(&self, scenario: &str) -> Result<Dialogue, ContentError> {
    let prompt = fill_template(&self.prompts.dialogue, &[("scenario", scenario)]);
    self.request(&prompt, &schemas::dialogue()).await
  }

  #[instrument(level = "info", skip(self, category_prompt))]
  pub async fn emoji_question(&self, category_prompt: &str, level: u32) -> Result<EmojiQuestion, ContentError> {
    let level = level.to_string();
    let max = MAX_LEVELS.to_string();
    let prompt = fill_template(
      &self.prompts.emoji_question,
      &[("category_prompt", category_prompt), ("level", &level), ("max_levels", &max)],
    );
    self.request(&prompt, &schemas::emoji_question()).await
  }

  #[instrument(level = "info", skip(self, emojis, sentence), fields(sentence_len = sentence.len()))]
  pub async fn validate_sentence(&self, emojis: &str, sentence: &str) -> Result<ValidationResult, ContentError> {
    let prompt = fill_template(&self.prompts.sentence_validation, &[("emojis", emojis), ("sentence", sentence)]);
    let v: ValidationResult = self.request(&prompt, &schemas::sentence_validation()).await?;
    Ok(v.normalized())
  }

  /// Diagnostic probe: one lightweight call. `Ok(false)` means the backend answered with nothing usable.
  #[instrument(level = "info", skip(self))]
  pub async fn test_connection(&self) -> Result<bool, ContentError> {
    #[derive(serde::Deserialize)]
    struct Probe { reply: String }
    let p: Probe = self.request(&self.prompts.connection_test, &schemas::connection_probe()).await?;
    Ok(!p.reply.trim().is_empty())
  }

  fn batch_prompt(&self, tpl: &str, count: usize) -> String {
    fill_template(tpl, &[("count", &count.to_string())])
  }
}
