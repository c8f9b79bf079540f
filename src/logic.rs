//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! A session action runs in three steps:
//!   1. `begin`: apply the synchronous transition (under the session lock)
//!   2. `run`: perform the content call it asked for (no lock held)
//!   3. `apply`: hand the result back; the session drops it if its ticket is stale

use tracing::{debug, instrument};

use crate::content::ContentClient;
use crate::domain::{EmojiQuestion, ValidationResult};
use crate::error::{ContentError, SessionError};
use crate::protocol::SessionAction;
use crate::session::{Applied, EmojiSession, PendingGeneration, PendingValidation, RequestTicket, SessionView};
use crate::state::SessionHandle;

/// Async work requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Work {
  Generate(PendingGeneration),
  Validate(PendingValidation),
}

/// Result of a `Work`, tagged with the ticket it was issued under.
#[derive(Debug)]
pub enum Completion {
  Generated(RequestTicket, Result<EmojiQuestion, ContentError>),
  Validated(RequestTicket, Result<ValidationResult, ContentError>),
}

pub fn begin(session: &mut EmojiSession, action: SessionAction) -> Result<Option<Work>, SessionError> {
  match action {
    SessionAction::SelectCategory { category } => session.select_category(category).map(|_| None),
    SessionAction::SelectLevel { level } => session.select_level(level).map(|p| Some(Work::Generate(p))),
    SessionAction::Retry => session.retry().map(|p| Some(Work::Generate(p))),
    SessionAction::Submit { answer } => Ok(session.submit(&answer)?.map(Work::Validate)),
    SessionAction::Next => Ok(session.next()?.map(Work::Generate)),
    SessionAction::TryAgain => session.try_again().map(|_| None),
    SessionAction::Back => session.back().map(|_| None),
    SessionAction::Refresh => Ok(None),
  }
}

#[instrument(level = "info", skip(content, work))]
pub async fn run(content: &ContentClient, work: Work) -> Completion {
  match work {
    Work::Generate(p) => {
      let result = content.emoji_question(p.category_prompt, p.level).await;
      Completion::Generated(p.ticket, result)
    }
    Work::Validate(p) => {
      let result = content.validate_sentence(&p.emojis, &p.answer).await;
      Completion::Validated(p.ticket, result)
    }
  }
}

pub fn apply(session: &mut EmojiSession, completion: Completion) -> Applied {
  let applied = match completion {
    Completion::Generated(ticket, result) => session.apply_generation(ticket, result),
    Completion::Validated(ticket, result) => session.apply_validation(ticket, result),
  };
  if applied == Applied::Stale {
    debug!(target: "session", "Stale completion discarded");
  }
  applied
}

/// Run one action to completion against a shared session. The lock is released
/// while the content call is in flight, so concurrent navigation stays possible.
#[instrument(level = "info", skip(content, handle))]
pub async fn dispatch(content: &ContentClient, handle: &SessionHandle, action: SessionAction) -> Result<SessionView, SessionError> {
  let work = {
    let mut s = handle.lock().await;
    begin(&mut s, action)?
  };
  if let Some(work) = work {
    let completion = run(content, work).await;
    apply(&mut *handle.lock().await, completion);
  }
  let view = handle.lock().await.view();
  Ok(view)
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use tokio::sync::{Mutex, Notify};

  use super::*;
  use crate::config::Prompts;
  use crate::content::testing::{Reply, ScriptedBackend};
  use crate::domain::CategoryId;
  use crate::error::BackendError;
  use crate::gemini::{GenerateRequest, GenerationBackend};
  use crate::progress::{MemoryStorage, ProgressStore, TrackedProgress, PROGRESS_STORAGE_KEY};
  use crate::session::{SessionState, ViewKind};

  fn handle() -> SessionHandle {
    let store = ProgressStore::new(Arc::new(MemoryStorage::default()), PROGRESS_STORAGE_KEY);
    Arc::new(Mutex::new(EmojiSession::new(TrackedProgress::load(store), None)))
  }

  fn client(backend: Arc<dyn GenerationBackend>) -> ContentClient {
    ContentClient::new(Some(backend), Prompts::default())
  }

  #[tokio::test]
  async fn full_round_through_the_backend() {
    let backend = Arc::new(ScriptedBackend::new(vec![
      ScriptedBackend::text(r#"{"emojis":"🐱🏃🏠"}"#),
      ScriptedBackend::text(r#"{"isCorrect":true,"feedback":"Excellent!"}"#),
    ]));
    let content = client(backend.clone());
    let h = handle();

    dispatch(&content, &h, SessionAction::SelectCategory { category: CategoryId::Tenses }).await.expect("category");
    let v = dispatch(&content, &h, SessionAction::SelectLevel { level: 1 }).await.expect("level");
    assert_eq!(v.question.expect("question").emojis, "🐱🏃🏠");

    let v = dispatch(&content, &h, SessionAction::Submit { answer: "The cat runs home.".into() }).await.expect("submit");
    assert!(v.feedback.expect("feedback").is_correct);
    assert_eq!(v.total_score, 10);
    assert_eq!(backend.calls(), 2);
  }

  #[tokio::test]
  async fn empty_answer_issues_no_request() {
    let backend = Arc::new(ScriptedBackend::new(vec![ScriptedBackend::text(r#"{"emojis":"🌧️🌱🌷"}"#)]));
    let content = client(backend.clone());
    let h = handle();
    dispatch(&content, &h, SessionAction::SelectCategory { category: CategoryId::Tenses }).await.expect("category");
    dispatch(&content, &h, SessionAction::SelectLevel { level: 1 }).await.expect("level");
    let v = dispatch(&content, &h, SessionAction::Submit { answer: String::new() }).await.expect("noop");
    assert!(v.feedback.is_none());
    assert_eq!(backend.calls(), 1);
  }

  #[tokio::test]
  async fn generation_failure_leaves_retryable_error() {
    let backend = Arc::new(ScriptedBackend::new(vec![Reply::Fail, ScriptedBackend::text(r#"{"emojis":"🐱"}"#)]));
    let content = client(backend);
    let h = handle();
    dispatch(&content, &h, SessionAction::SelectCategory { category: CategoryId::Tenses }).await.expect("category");
    let v = dispatch(&content, &h, SessionAction::SelectLevel { level: 1 }).await.expect("level");
    assert!(v.error.is_some());
    assert!(v.question.is_none());
    assert_eq!(v.total_score, 0);

    let v = dispatch(&content, &h, SessionAction::Retry).await.expect("retry");
    assert!(v.error.is_none());
    assert!(v.question.is_some());
  }

  #[tokio::test]
  async fn locked_level_is_refused() {
    let backend = Arc::new(ScriptedBackend::new(vec![]));
    let content = client(backend.clone());
    let h = handle();
    dispatch(&content, &h, SessionAction::SelectCategory { category: CategoryId::Tenses }).await.expect("category");
    let err = dispatch(&content, &h, SessionAction::SelectLevel { level: 3 }).await.unwrap_err();
    assert!(matches!(err, SessionError::LevelLocked { level: 3, .. }));
    assert_eq!(backend.calls(), 0);
  }

  /// Holds every call until released, to interleave navigation with a pending request.
  struct GatedBackend {
    gate: Notify,
  }

  #[async_trait::async_trait]
  impl GenerationBackend for GatedBackend {
    async fn generate_content(&self, _req: GenerateRequest<'_>) -> Result<String, BackendError> {
      self.gate.notified().await;
      Ok(r#"{"emojis":"👩‍🚀🚀✨🪐"}"#.to_string())
    }

    fn model(&self) -> &str {
      "gated"
    }
  }

  #[tokio::test]
  async fn response_arriving_after_back_is_discarded() {
    let backend = Arc::new(GatedBackend { gate: Notify::new() });
    let content = client(backend.clone());
    let h = handle();
    dispatch(&content, &h, SessionAction::SelectCategory { category: CategoryId::Tenses }).await.expect("category");

    let pending = {
      let (content, h) = (content.clone(), h.clone());
      tokio::spawn(async move { dispatch(&content, &h, SessionAction::SelectLevel { level: 1 }).await })
    };
    // Wait until the level transition is visible, then navigate away.
    loop {
      if matches!(h.lock().await.state(), SessionState::Active { .. }) {
        break;
      }
      tokio::task::yield_now().await;
    }
    dispatch(&content, &h, SessionAction::Back).await.expect("back");
    backend.gate.notify_one();

    let v = pending.await.expect("join").expect("dispatch");
    assert_eq!(v.view, ViewKind::Levels);
    assert!(v.question.is_none());
    assert_eq!(*h.lock().await.state(), SessionState::Levels { category: CategoryId::Tenses });
  }
}
