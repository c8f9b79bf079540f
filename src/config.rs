//! Runtime configuration: environment variables plus optional prompt overrides from TOML.
//!
//! See `AppConfig`, `GeminiConfig` and `Prompts` for the accepted keys.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info, warn};

use crate::util::non_blank;

/// Accepted credential variables, in order of precedence.
pub const API_KEY_VARS: [&str; 2] = ["API_KEY", "GEMINI_API_KEY"];

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SESSION_IDLE_SECS: u64 = 30 * 60;

#[derive(Clone, Debug)]
pub struct AppConfig {
  pub port: u16,
  /// `None` when no credential is present: the app serves the setup screen only.
  pub gemini: Option<GeminiConfig>,
  pub progress_dir: PathBuf,
  /// HTTP sessions untouched for this long are evicted.
  pub session_idle: Duration,
  pub prompts: Prompts,
}

#[derive(Clone)]
pub struct GeminiConfig {
  pub api_key: String,
  pub base_url: String,
  pub model: String,
  pub timeout: Duration,
}

// Hand-written so the key never lands in logs.
impl std::fmt::Debug for GeminiConfig {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("GeminiConfig")
      .field("base_url", &self.base_url)
      .field("model", &self.model)
      .field("timeout", &self.timeout)
      .finish_non_exhaustive()
  }
}

impl GeminiConfig {
  /// Build from an env-like lookup; returns None when no credential is set.
  pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Option<Self> {
    let api_key = API_KEY_VARS.iter().find_map(|k| non_blank(get(k)))?;
    let base_url = non_blank(get("GEMINI_BASE_URL")).unwrap_or_else(|| DEFAULT_BASE_URL.into());
    let model = non_blank(get("GEMINI_MODEL")).unwrap_or_else(|| DEFAULT_MODEL.into());
    let timeout_secs = get("GEMINI_TIMEOUT_SECS")
      .and_then(|v| v.trim().parse::<u64>().ok())
      .unwrap_or(DEFAULT_TIMEOUT_SECS);
    Some(Self {
      api_key,
      base_url: base_url.trim_end_matches('/').to_string(),
      model,
      timeout: Duration::from_secs(timeout_secs),
    })
  }
}

impl AppConfig {
  pub fn from_env() -> Self {
    Self::from_lookup(|k| std::env::var(k).ok())
  }

  pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
    let port = get("PORT").and_then(|p| p.parse::<u16>().ok()).unwrap_or(3000);
    let gemini = GeminiConfig::from_lookup(&get);
    if gemini.is_none() {
      warn!(target: "grammar_galaxy", "Gemini API key not found (API_KEY / GEMINI_API_KEY). Serving the setup screen only.");
    }
    let progress_dir = non_blank(get("PROGRESS_DIR")).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("./data"));
    let session_idle = get("SESSION_IDLE_SECS")
      .and_then(|v| v.trim().parse::<u64>().ok())
      .filter(|secs| *secs > 0)
      .map(Duration::from_secs)
      .unwrap_or(Duration::from_secs(DEFAULT_SESSION_IDLE_SECS));
    let prompts = get("PROMPTS_CONFIG_PATH")
      .and_then(|path| load_prompts_file(&path))
      .unwrap_or_default();
    Self { port, gemini, progress_dir, session_idle, prompts }
  }
}

#[derive(Debug, Deserialize, Default)]
struct PromptsFile {
  #[serde(default)]
  prompts: Prompts,
}

/// Prompt templates. Placeholders use `{name}` and are filled by `util::fill_template`.
/// Any subset can be overridden in the `[prompts]` table of the TOML file.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Prompts {
  /// `{count}`
  pub grammar_spotter: String,
  /// `{count}`
  pub grammar_fill: String,
  /// `{count}`
  pub preposition_drop: String,
  /// `{count}`
  pub maze: String,
  /// `{scenario}`
  pub dialogue: String,
  /// `{category_prompt}`, `{level}`, `{max_levels}`
  pub emoji_question: String,
  /// `{emojis}`, `{sentence}`
  pub sentence_validation: String,
  pub connection_test: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      grammar_spotter: "Generate {count} unique sentences for English learners. Each sentence must contain one clear grammatical error (tense, subject-verb agreement, or pluralization). For each, provide the sentence, the incorrect word, the correct word, and a brief explanation.".into(),
      grammar_fill: "Generate {count} unique fill-in-the-blank questions for English learners, focusing on helping verbs, articles, and tenses. For each, provide a sentence with '__BLANK__', four options (one correct, three plausible distractors), the correct answer, and a brief explanation.".into(),
      preposition_drop: "Generate {count} unique fill-in-the-blank questions for English learners, focusing ONLY on prepositions (e.g., in, on, at, under, over, with). For each, provide a sentence with '__BLANK__', four preposition options (one correct, three distractors), the correct answer, and a brief explanation.".into(),
      maze: "Generate {count} unique fill-in-the-blank grammar questions for English learners, covering a mix of topics like tenses, prepositions, and articles. For each, provide a sentence with '__BLANK__', four options (one correct, three plausible distractors), the correct answer, and a brief explanation.".into(),
      dialogue: "Generate a short, logical dialogue for a '{scenario}' scenario with 5-7 turns. Assign a unique ID to each line starting from 1. The dialogue should be between two distinct speakers.".into(),
      emoji_question: r#"Generate a single, unique emoji puzzle for an English language learner. The user's goal is to write a complete, grammatically correct sentence based on the emojis.
The emoji sequence should visually suggest a simple action or scene. Ensure the generated puzzle is different from previous ones.

- Category Hint: "{category_prompt}"
- Difficulty level: {level}/{max_levels}.
- For lower levels (1-2), generate a sequence for a simple sentence (e.g., 🧑‍🍳🎂 or 🐱🏃🏠).
- For higher levels (4-5), generate a sequence that allows for more complex sentences, possibly involving abstract concepts or multiple clauses (e.g., 👩‍🚀🚀✨🪐 or 🌧️🌱🌷).

The response must only contain the emoji sequence."#.into(),
      sentence_validation: r#"An English language learner was shown an emoji sequence and tasked with writing a grammatically correct sentence that creatively describes it.
- Emoji Sequence: "{emojis}"
- User's Sentence: "{sentence}"

Evaluate the user's sentence based on two criteria:
1. Grammatical Correctness: Is the sentence grammatically valid in English?
2. Emoji Representation: Does the sentence logically and creatively represent the emojis? Multiple interpretations are allowed and encouraged.

The goal is to provide helpful, positive feedback.

- If the sentence is both grammatically correct and a good representation of the emojis, respond with 'isCorrect: true'. The feedback should be encouraging.
- If the sentence is grammatically incorrect, respond with 'isCorrect: false'. The feedback should gently point out the error without being discouraging. In this case, YOU MUST also provide a 'correctExample' field with one example of a grammatically correct sentence for the emojis.
- If the sentence is grammatically correct but does not match the emojis, respond with 'isCorrect: false'. The feedback should acknowledge the correct grammar but guide them back to the emojis. In this case, YOU MUST also provide a 'correctExample' field with a sentence that better matches the emojis.

Provide your evaluation in the specified JSON format."#.into(),
      connection_test: "Reply with a JSON object whose 'reply' field is the word OK.".into(),
    }
  }
}

/// Load prompt overrides from a TOML file. On any IO/parse error, returns None.
pub fn load_prompts_file(path: &str) -> Option<Prompts> {
  match std::fs::read_to_string(path) {
    Ok(s) => match toml::from_str::<PromptsFile>(&s) {
      Ok(cfg) => {
        info!(target: "grammar_galaxy", %path, "Loaded prompt overrides (TOML)");
        Some(cfg.prompts)
      }
      Err(e) => {
        error!(target: "grammar_galaxy", %path, error = %e, "Failed to parse prompts TOML; using defaults");
        None
      }
    },
    Err(e) => {
      error!(target: "grammar_galaxy", %path, error = %e, "Failed to read prompts TOML; using defaults");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    move |k| map.get(k).cloned()
  }

  #[test]
  fn missing_or_blank_key_means_unconfigured() {
    assert!(GeminiConfig::from_lookup(lookup(&[])).is_none());
    assert!(GeminiConfig::from_lookup(lookup(&[("API_KEY", "   ")])).is_none());
  }

  #[test]
  fn either_key_name_is_accepted() {
    let a = GeminiConfig::from_lookup(lookup(&[("GEMINI_API_KEY", "g-key")])).expect("configured");
    assert_eq!(a.api_key, "g-key");
    let b = GeminiConfig::from_lookup(lookup(&[("API_KEY", "a-key"), ("GEMINI_API_KEY", "g-key")])).expect("configured");
    assert_eq!(b.api_key, "a-key");
    assert_eq!(b.model, DEFAULT_MODEL);
    assert_eq!(b.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
  }

  #[test]
  fn debug_output_hides_the_key() {
    let c = GeminiConfig::from_lookup(lookup(&[("API_KEY", "secret-value")])).expect("configured");
    assert!(!format!("{c:?}").contains("secret-value"));
  }

  #[test]
  fn app_config_defaults() {
    let cfg = AppConfig::from_lookup(lookup(&[("PORT", "8080"), ("GEMINI_BASE_URL", "http://localhost:9/v1/"), ("API_KEY", "k")]));
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.progress_dir, PathBuf::from("./data"));
    assert_eq!(cfg.gemini.expect("configured").base_url, "http://localhost:9/v1");
    assert_eq!(cfg.prompts, Prompts::default());
    assert_eq!(cfg.session_idle, Duration::from_secs(DEFAULT_SESSION_IDLE_SECS));
  }

  #[test]
  fn session_idle_timeout_from_env() {
    let cfg = AppConfig::from_lookup(lookup(&[("SESSION_IDLE_SECS", "90")]));
    assert_eq!(cfg.session_idle, Duration::from_secs(90));
    let cfg = AppConfig::from_lookup(lookup(&[("SESSION_IDLE_SECS", "0")]));
    assert_eq!(cfg.session_idle, Duration::from_secs(DEFAULT_SESSION_IDLE_SECS));
  }

  #[test]
  fn partial_toml_overrides_keep_other_defaults() {
    let file: PromptsFile = toml::from_str("[prompts]\ndialogue = \"Talk about {scenario}.\"\n").expect("toml");
    assert_eq!(file.prompts.dialogue, "Talk about {scenario}.");
    assert_eq!(file.prompts.maze, Prompts::default().maze);
  }
}
