//! Error taxonomy shared across the backend.
//!
//! - `ContentError`: content generation/validation calls (configuration vs generation failures).
//! - `BackendError`: transport-level failures talking to the model API.
//! - `SessionError`: refused state-machine transitions. State is unchanged when returned.
//! - `StorageError`: key-value persistence failures.
//! - `ApiError`: HTTP mapping used by the route handlers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::domain::CategoryId;

/// Remediation text shown on the setup screen when no credential is present.
pub const SETUP_INSTRUCTIONS: &str = "Set the GEMINI_API_KEY (or API_KEY) environment variable to a Google Gemini API key and restart the server.";

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BackendError {
  #[error(transparent)]
  Http(#[from] reqwest::Error),
  #[error("Gemini HTTP {status}: {message}")]
  Status { status: reqwest::StatusCode, message: String },
  #[error("model returned an empty response")]
  EmptyResponse,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ContentError {
  #[error("Gemini API key is not configured")]
  Configuration,
  #[error("failed to generate content: {0}")]
  Generation(#[from] BackendError),
  #[error("failed to parse model output: {0}")]
  Parse(#[from] serde_json::Error),
}

impl ContentError {
  pub fn is_configuration(&self) -> bool {
    matches!(self, ContentError::Configuration)
  }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
  #[error("no category selected")]
  NoCategory,
  #[error("level {level} is outside 1..={max}")]
  LevelOutOfRange { level: u32, max: u32 },
  #[error("level {level} is locked in {category}; highest unlocked is {unlocked}")]
  LevelLocked { category: CategoryId, level: u32, unlocked: u32 },
  #[error("cannot {action} from the {view} view")]
  InvalidTransition { action: &'static str, view: &'static str },
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
  #[error("storage io error: {0}")]
  Io(#[from] std::io::Error),
  #[error("storage serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

/// Errors surfaced by HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Content(#[from] ContentError),
  #[error(transparent)]
  Session(#[from] SessionError),
  #[error("unknown session: {0}")]
  UnknownSession(String),
  #[error("bad request: {0}")]
  BadRequest(String),
}

#[derive(Serialize)]
struct ErrorBody {
  error: &'static str,
  message: String,
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, kind, message) = match &self {
      ApiError::Content(ContentError::Configuration) => (
        StatusCode::SERVICE_UNAVAILABLE,
        "configuration_error",
        format!("{self}. {SETUP_INSTRUCTIONS}"),
      ),
      ApiError::Content(_) => (StatusCode::BAD_GATEWAY, "generation_error", self.to_string()),
      ApiError::Session(_) => (StatusCode::CONFLICT, "session_error", self.to_string()),
      ApiError::UnknownSession(_) => (StatusCode::NOT_FOUND, "not_found", self.to_string()),
      ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request", self.to_string()),
    };
    (status, Json(ErrorBody { error: kind, message })).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn configuration_maps_to_service_unavailable() {
    let res = ApiError::from(ContentError::Configuration).into_response();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
  }

  #[test]
  fn session_refusal_maps_to_conflict() {
    let err = SessionError::LevelLocked { category: CategoryId::Tenses, level: 3, unlocked: 1 };
    assert_eq!(err.to_string(), "level 3 is locked in Tenses; highest unlocked is 1");
    assert_eq!(ApiError::from(err).into_response().status(), StatusCode::CONFLICT);
  }

  #[test]
  fn parse_failures_are_generation_errors() {
    let parse = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
    let err = ContentError::from(parse);
    assert!(!err.is_configuration());
    assert_eq!(ApiError::from(err).into_response().status(), StatusCode::BAD_GATEWAY);
  }
}
