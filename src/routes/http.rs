//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;
use axum::{extract::{Path, State}, http::StatusCode, Json, response::IntoResponse};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::{ScrambledDialogue, CATEGORIES};
use crate::error::{ApiError, ContentError};
use crate::logic::dispatch;
use crate::protocol::*;
use crate::state::AppState;

/// Game and content routes are closed until a credential is configured.
fn require_configured(state: &AppState) -> Result<(), ApiError> {
  if state.content.is_configured() { Ok(()) } else { Err(ContentError::Configuration.into()) }
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, configured: state.content.is_configured() })
}

#[instrument(level = "info", skip(state))]
pub async fn http_test_connection(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let out = match state.content.test_connection().await {
    Ok(true) => ConnectionTestOut { success: true, message: "✅ API connection successful! You can now use the app.".into() },
    Ok(false) => ConnectionTestOut { success: false, message: "❌ API connection failed. Please check your API key and try again.".into() },
    Err(e) => ConnectionTestOut { success: false, message: format!("❌ Error: {e}") },
  };
  info!(target: "grammar_galaxy", success = out.success, "Connection test finished");
  Json(out)
}

#[instrument(level = "info")]
pub async fn http_categories() -> impl IntoResponse {
  Json(&CATEGORIES)
}

#[instrument(level = "info", skip(state))]
pub async fn http_scores(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(ScoresOut {
    total_points: state.scores.total(),
    emoji_total_score: state.progress.snapshot().total_score,
  })
}

#[instrument(level = "info", skip(state))]
pub async fn http_create_session(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
  require_configured(&state)?;
  let (session_id, handle) = state.create_session().await;
  let view = handle.lock().await.view();
  Ok((StatusCode::CREATED, Json(SessionOut { session_id, view })))
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_get_session(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
  let handle = state.session(&id).await.ok_or_else(|| ApiError::UnknownSession(id.to_string()))?;
  let view = handle.lock().await.view();
  Ok(Json(SessionOut { session_id: id, view }))
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_delete_session(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
  if state.drop_session(&id).await {
    Ok(StatusCode::NO_CONTENT)
  } else {
    Err(ApiError::UnknownSession(id.to_string()))
  }
}

#[instrument(level = "info", skip(state, action), fields(%id, ?action))]
pub async fn http_session_action(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
  Json(action): Json<SessionAction>,
) -> Result<impl IntoResponse, ApiError> {
  require_configured(&state)?;
  let handle = state.session(&id).await.ok_or_else(|| ApiError::UnknownSession(id.to_string()))?;
  let view = dispatch(&state.content, &handle, action).await?;
  info!(target: "session", %id, view = ?view.view, total = view.total_score, "HTTP session action applied");
  Ok(Json(SessionOut { session_id: id, view }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_grammar_spotter(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
  require_configured(&state)?;
  let questions = state.content.grammar_spotter_questions().await?;
  info!(target: "content", count = questions.len(), "Grammar spotter batch served");
  Ok(Json(QuestionsOut { questions }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_grammar_fill(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
  require_configured(&state)?;
  let questions = state.content.grammar_fill_questions().await?;
  info!(target: "content", count = questions.len(), "Grammar fill batch served");
  Ok(Json(QuestionsOut { questions }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_preposition_drop(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
  require_configured(&state)?;
  let questions = state.content.preposition_drop_questions().await?;
  info!(target: "content", count = questions.len(), "Preposition batch served");
  Ok(Json(QuestionsOut { questions }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_maze(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
  require_configured(&state)?;
  let questions = state.content.maze_questions().await?;
  info!(target: "content", count = questions.len(), "Maze batch served");
  Ok(Json(QuestionsOut { questions }))
}

#[instrument(level = "info", skip(state, body), fields(scenario_len = body.scenario.len()))]
pub async fn http_dialogue(
  State(state): State<Arc<AppState>>,
  Json(body): Json<DialogueIn>,
) -> Result<impl IntoResponse, ApiError> {
  require_configured(&state)?;
  let scenario = body.scenario.trim();
  if scenario.is_empty() {
    return Err(ApiError::BadRequest("scenario must not be empty".into()));
  }
  let dialogue = state.content.dialogue(scenario).await?;
  Ok(Json(ScrambledDialogue::from_dialogue(dialogue)))
}
