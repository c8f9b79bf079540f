//! WebSocket upgrade + message loop. Each connection owns one emoji session.
//! Actions are applied immediately; content calls run on spawned tasks and
//! their completions come back through a channel, so the socket keeps serving
//! navigation while a request is in flight.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::sync::mpsc;
use tracing::{info, error, instrument, debug};

use crate::error::{ContentError, SETUP_INSTRUCTIONS};
use crate::logic::{self, Completion};
use crate::protocol::{ClientWsMessage, ServerWsMessage, SessionAction};
use crate::session::{Applied, EmojiSession};
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "grammar_galaxy", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "grammar_galaxy", "WebSocket connected");
  let mut session = state.new_session();
  let (tx, mut rx) = mpsc::unbounded_channel::<Completion>();

  let hello = if state.content.is_configured() {
    ServerWsMessage::View { view: session.view() }
  } else {
    configuration_error()
  };
  if !send(&mut socket, &hello).await {
    return;
  }

  loop {
    tokio::select! {
      incoming = socket.recv() => {
        let Some(Ok(msg)) = incoming else { break };
        match msg {
          Message::Text(txt) => {
            let reply = match serde_json::from_str::<ClientWsMessage>(&txt) {
              Ok(ClientWsMessage::Ping(_)) => ServerWsMessage::Pong,
              Ok(ClientWsMessage::Action(action)) => {
                debug!(target: "session", ?action, "WS action received");
                handle_action(&state, &mut session, action, &tx)
              }
              Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
            };
            if !send(&mut socket, &reply).await {
              break;
            }
          }
          Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
          Message::Close(_) => break,
          _ => {}
        }
      }
      Some(completion) = rx.recv() => {
        if logic::apply(&mut session, completion) == Applied::Applied
          && !send(&mut socket, &ServerWsMessage::View { view: session.view() }).await
        {
          break;
        }
      }
    }
  }
  info!(target: "grammar_galaxy", "WebSocket disconnected");
}

/// Apply one action and reply with the resulting view. Any content call it
/// needs is spawned; its completion is applied later by the loop.
fn handle_action(
  state: &AppState,
  session: &mut EmojiSession,
  action: SessionAction,
  tx: &mpsc::UnboundedSender<Completion>,
) -> ServerWsMessage {
  if !state.content.is_configured() {
    return configuration_error();
  }
  match logic::begin(session, action) {
    Ok(work) => {
      if let Some(work) = work {
        let content = state.content.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
          let completion = logic::run(&content, work).await;
          // The receiver is gone once the socket closed; nothing to deliver to.
          let _ = tx.send(completion);
        });
      }
      ServerWsMessage::View { view: session.view() }
    }
    Err(e) => {
      info!(target: "session", error = %e, "WS action refused");
      ServerWsMessage::Error { message: e.to_string() }
    }
  }
}

fn configuration_error() -> ServerWsMessage {
  ServerWsMessage::Error { message: format!("{}. {}", ContentError::Configuration, SETUP_INSTRUCTIONS) }
}

async fn send(socket: &mut WebSocket, msg: &ServerWsMessage) -> bool {
  let out = serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
  });
  if let Err(e) = socket.send(Message::Text(out)).await {
    error!(target: "grammar_galaxy", error = %e, "WS send error");
    return false;
  }
  true
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::Prompts;
  use crate::content::testing::ScriptedBackend;
  use crate::content::ContentClient;
  use crate::domain::CategoryId;
  use crate::gemini::GenerationBackend;
  use crate::progress::MemoryStorage;
  use crate::session::ViewKind;

  fn state(backend: Option<Arc<ScriptedBackend>>) -> AppState {
    let backend = backend.map(|b| b as Arc<dyn GenerationBackend>);
    AppState::with_parts(ContentClient::new(backend, Prompts::default()), Arc::new(MemoryStorage::default()))
  }

  #[tokio::test]
  async fn unconfigured_actions_get_setup_error() {
    let st = state(None);
    let mut session = st.new_session();
    let (tx, _rx) = mpsc::unbounded_channel();
    let reply = handle_action(&st, &mut session, SessionAction::SelectCategory { category: CategoryId::Tenses }, &tx);
    match reply {
      ServerWsMessage::Error { message } => assert!(message.contains(SETUP_INSTRUCTIONS)),
      other => panic!("unexpected reply: {other:?}"),
    }
  }

  #[tokio::test]
  async fn level_selection_replies_loading_then_completes() {
    let backend = Arc::new(ScriptedBackend::new(vec![ScriptedBackend::text(r#"{"emojis":"🐶🦴"}"#)]));
    let st = state(Some(backend));
    let mut session = st.new_session();
    let (tx, mut rx) = mpsc::unbounded_channel();

    handle_action(&st, &mut session, SessionAction::SelectCategory { category: CategoryId::Tenses }, &tx);
    let reply = handle_action(&st, &mut session, SessionAction::SelectLevel { level: 1 }, &tx);
    match reply {
      ServerWsMessage::View { view } => {
        assert_eq!(view.view, ViewKind::Active);
        assert!(view.is_loading);
      }
      other => panic!("unexpected reply: {other:?}"),
    }

    let completion = rx.recv().await.expect("completion");
    assert_eq!(logic::apply(&mut session, completion), Applied::Applied);
    assert_eq!(session.view().question.expect("question").emojis, "🐶🦴");
  }

  #[tokio::test]
  async fn refused_action_reports_error() {
    let backend = Arc::new(ScriptedBackend::new(vec![]));
    let st = state(Some(backend));
    let mut session = st.new_session();
    let (tx, _rx) = mpsc::unbounded_channel();
    let reply = handle_action(&st, &mut session, SessionAction::Back, &tx);
    assert!(matches!(reply, ServerWsMessage::Error { .. }));
  }
}
