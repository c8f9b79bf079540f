//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::CategoryId;
use crate::session::SessionView;

/// Session commands. Shared by `POST /emoji/sessions/:id/actions` and the WebSocket.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionAction {
  SelectCategory { category: CategoryId },
  SelectLevel { level: u32 },
  Retry,
  Submit { answer: String },
  Next,
  TryAgain,
  Back,
  /// Re-send the current view without changing anything.
  Refresh,
}

/// Messages the client can send over WebSocket: a ping or any session action.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ClientWsMessage {
  Ping(Ping),
  Action(SessionAction),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Ping {
  Ping,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
  Pong,
  View { view: SessionView },
  Error { message: String },
}

//
// HTTP request/response DTOs
//

#[derive(Serialize)]
pub struct HealthOut {
  pub ok: bool,
  /// False means clients should show the setup screen.
  pub configured: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionTestOut {
  pub success: bool,
  pub message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOut {
  pub session_id: Uuid,
  pub view: SessionView,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoresOut {
  /// Points reported by every game session since startup.
  pub total_points: u64,
  /// Stored emoji game total.
  pub emoji_total_score: u32,
}

#[derive(Deserialize)]
pub struct DialogueIn {
  pub scenario: String,
}

#[derive(Serialize)]
pub struct QuestionsOut<T> {
  pub questions: Vec<T>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn actions_parse_from_tagged_json() {
    let a: SessionAction = serde_json::from_str(r#"{"type":"select_category","category":"Tenses"}"#).expect("parse");
    assert_eq!(a, SessionAction::SelectCategory { category: CategoryId::Tenses });
    let a: SessionAction = serde_json::from_str(r#"{"type":"submit","answer":"The cat runs."}"#).expect("parse");
    assert_eq!(a, SessionAction::Submit { answer: "The cat runs.".into() });
    let a: SessionAction = serde_json::from_str(r#"{"type":"try_again"}"#).expect("parse");
    assert_eq!(a, SessionAction::TryAgain);
    assert!(serde_json::from_str::<SessionAction>(r#"{"type":"select_category","category":"Geography"}"#).is_err());
  }

  #[test]
  fn ws_messages_split_ping_from_actions() {
    let m: ClientWsMessage = serde_json::from_str(r#"{"type":"ping"}"#).expect("parse");
    assert!(matches!(m, ClientWsMessage::Ping(_)));
    let m: ClientWsMessage = serde_json::from_str(r#"{"type":"select_level","level":2}"#).expect("parse");
    assert!(matches!(m, ClientWsMessage::Action(SessionAction::SelectLevel { level: 2 })));
  }
}
