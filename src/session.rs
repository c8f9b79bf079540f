//! Emoji Guess Challenge session controller.
//!
//! Views: `Categories -> Levels -> Active`. The machine is synchronous; each async
//! call is split into a `begin` transition that hands out a `RequestTicket` and an
//! `apply_*` that accepts the result only while the state still holds that ticket.
//! Anything else is a stale response and is dropped.
//!
//! Refused transitions return `SessionError` and leave the state untouched.
//! Busy states (`Loading`, `Validating`) turn submissions into no-ops.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::{CategoryId, EmojiQuestion, ValidationResult, HINTS_PER_CATEGORY, MAX_LEVELS};
use crate::error::{ContentError, SessionError, SETUP_INSTRUCTIONS};
use crate::progress::{CategorySummary, PlayerProgress, TrackedProgress};

/// Outbound notification with the points just awarded.
pub type ScoreListener = Arc<dyn Fn(u32) + Send + Sync>;

pub const GENERATION_FAILED: &str = "Oops! Couldn't generate a question. Please try again.";
pub const VALIDATION_FAILED_FEEDBACK: &str = "An error occurred while validating your answer.";
pub const VALIDATION_FAILED_ERROR: &str = "Sorry, we couldn't check your answer right now. Please try again.";

/// Identifies one outstanding request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestTicket(u64);

#[derive(Clone, Debug, PartialEq)]
pub enum SessionState {
  Categories,
  Levels { category: CategoryId },
  Active { category: CategoryId, level: u32, stage: ActiveStage },
}

#[derive(Clone, Debug, PartialEq)]
pub enum ActiveStage {
  Loading { ticket: RequestTicket },
  Failed { message: String },
  Ready { question: EmojiQuestion, answer: AnswerStage },
}

#[derive(Clone, Debug, PartialEq)]
pub enum AnswerStage {
  Answering,
  Validating { ticket: RequestTicket, answer: String },
  Feedback { answer: String, feedback: Feedback },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
  pub is_correct: bool,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub correct_example: Option<String>,
  /// Set when the verdict was synthesized after a failed validation call.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub points_awarded: Option<u32>,
}

/// Work the caller must run for a `Loading` state.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingGeneration {
  pub ticket: RequestTicket,
  pub category: CategoryId,
  pub level: u32,
  pub category_prompt: &'static str,
}

/// Work the caller must run for a `Validating` state.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingValidation {
  pub ticket: RequestTicket,
  pub emojis: String,
  pub answer: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
  Applied,
  Stale,
}

pub struct EmojiSession {
  state: SessionState,
  progress: TrackedProgress,
  listener: Option<ScoreListener>,
  last_ticket: u64,
}

impl EmojiSession {
  pub fn new(progress: TrackedProgress, listener: Option<ScoreListener>) -> Self {
    Self { state: SessionState::Categories, progress, listener, last_ticket: 0 }
  }

  pub fn state(&self) -> &SessionState {
    &self.state
  }

  pub fn progress(&self) -> PlayerProgress {
    self.progress.snapshot()
  }

  fn issue_ticket(&mut self) -> RequestTicket {
    self.last_ticket += 1;
    RequestTicket(self.last_ticket)
  }

  fn view_name(&self) -> &'static str {
    match &self.state {
      SessionState::Categories => "categories",
      SessionState::Levels { .. } => "levels",
      SessionState::Active { .. } => "active",
    }
  }

  fn refuse(&self, action: &'static str) -> SessionError {
    SessionError::InvalidTransition { action, view: self.view_name() }
  }

  pub fn select_category(&mut self, category: CategoryId) -> Result<(), SessionError> {
    if self.state != SessionState::Categories {
      return Err(self.refuse("select a category"));
    }
    debug!(target: "session", %category, "Category selected");
    self.state = SessionState::Levels { category };
    Ok(())
  }

  /// `Levels -> Active(Loading)`. Levels above `completed + 1` are refused.
  pub fn select_level(&mut self, level: u32) -> Result<PendingGeneration, SessionError> {
    let SessionState::Levels { category } = self.state else {
      return Err(match self.state {
        SessionState::Categories => SessionError::NoCategory,
        _ => self.refuse("select a level"),
      });
    };
    self.enter_level(category, level)
  }

  fn enter_level(&mut self, category: CategoryId, level: u32) -> Result<PendingGeneration, SessionError> {
    if !(1..=MAX_LEVELS).contains(&level) {
      return Err(SessionError::LevelOutOfRange { level, max: MAX_LEVELS });
    }
    let progress = self.progress.snapshot();
    if !progress.is_unlocked(category, level) {
      warn!(target: "session", %category, level, completed = progress.completed(category), "Refused locked level");
      return Err(SessionError::LevelLocked { category, level, unlocked: progress.unlocked(category) });
    }
    Ok(self.start_loading(category, level))
  }

  fn start_loading(&mut self, category: CategoryId, level: u32) -> PendingGeneration {
    let ticket = self.issue_ticket();
    self.state = SessionState::Active { category, level, stage: ActiveStage::Loading { ticket } };
    info!(target: "session", %category, level, ticket = ticket.0, "Requesting emoji question");
    PendingGeneration { ticket, category, level, category_prompt: category.info().prompt }
  }

  /// Re-issue generation after a failure.
  pub fn retry(&mut self) -> Result<PendingGeneration, SessionError> {
    match &self.state {
      SessionState::Active { category, level, stage: ActiveStage::Failed { .. } } => {
        let (category, level) = (*category, *level);
        Ok(self.start_loading(category, level))
      }
      _ => Err(self.refuse("retry")),
    }
  }

  pub fn apply_generation(&mut self, ticket: RequestTicket, result: Result<EmojiQuestion, ContentError>) -> Applied {
    let SessionState::Active { stage, category, level } = &mut self.state else {
      debug!(target: "session", ticket = ticket.0, "Discarding stale question: left the game view");
      return Applied::Stale;
    };
    if *stage != (ActiveStage::Loading { ticket }) {
      debug!(target: "session", ticket = ticket.0, "Discarding stale question");
      return Applied::Stale;
    }
    *stage = match result {
      Ok(question) => {
        info!(target: "session", %category, level = *level, emojis = %question.emojis, "Question ready");
        ActiveStage::Ready { question, answer: AnswerStage::Answering }
      }
      Err(e) => {
        warn!(target: "session", %category, level = *level, error = %e, "Question generation failed");
        let message = if e.is_configuration() {
          format!("{e}. {SETUP_INSTRUCTIONS}")
        } else {
          GENERATION_FAILED.to_string()
        };
        ActiveStage::Failed { message }
      }
    };
    Applied::Applied
  }

  /// Start validating `answer`. Blank answers and busy/answered states are no-ops (`Ok(None)`).
  pub fn submit(&mut self, answer: &str) -> Result<Option<PendingValidation>, SessionError> {
    let answer = answer.trim();
    let next_ticket = RequestTicket(self.last_ticket + 1);
    let refused = self.refuse("submit an answer");
    let SessionState::Active { stage, .. } = &mut self.state else {
      return Err(refused);
    };
    if answer.is_empty() {
      return Ok(None);
    }
    let ActiveStage::Ready { question, answer: answer_stage @ AnswerStage::Answering } = stage else {
      return Ok(None);
    };
    *answer_stage = AnswerStage::Validating { ticket: next_ticket, answer: answer.to_string() };
    let emojis = question.emojis.clone();
    self.last_ticket = next_ticket.0;
    Ok(Some(PendingValidation { ticket: next_ticket, emojis, answer: answer.to_string() }))
  }

  pub fn apply_validation(&mut self, ticket: RequestTicket, result: Result<ValidationResult, ContentError>) -> Applied {
    let SessionState::Active { category, level, stage: ActiveStage::Ready { answer: answer_stage, .. } } = &mut self.state else {
      debug!(target: "session", ticket = ticket.0, "Discarding stale verdict: no question on screen");
      return Applied::Stale;
    };
    let answer = match answer_stage {
      AnswerStage::Validating { ticket: t, answer } if *t == ticket => std::mem::take(answer),
      _ => {
        debug!(target: "session", ticket = ticket.0, "Discarding stale verdict");
        return Applied::Stale;
      }
    };
    let (category, level) = (*category, *level);

    let feedback = match result {
      Ok(verdict) if verdict.is_correct => {
        let awarded = self.progress.transact(|p| p.award_level(category, level));
        if let Some(points) = awarded {
          info!(target: "session", %category, level, points, total = self.progress.snapshot().total_score, "Level completed");
          if let Some(listener) = &self.listener {
            listener(points);
          }
        } else {
          debug!(target: "session", %category, level, "Level already completed; no points");
        }
        Feedback { is_correct: true, message: verdict.feedback, correct_example: None, error: None, points_awarded: awarded }
      }
      Ok(verdict) => Feedback {
        is_correct: false,
        message: verdict.feedback,
        correct_example: verdict.correct_example,
        error: None,
        points_awarded: None,
      },
      Err(e) => {
        warn!(target: "session", %category, level, error = %e, "Validation call failed; treating as incorrect");
        Feedback {
          is_correct: false,
          message: VALIDATION_FAILED_FEEDBACK.to_string(),
          correct_example: None,
          error: Some(VALIDATION_FAILED_ERROR.to_string()),
          points_awarded: None,
        }
      }
    };

    if let SessionState::Active { stage: ActiveStage::Ready { answer: answer_stage, .. }, .. } = &mut self.state {
      *answer_stage = AnswerStage::Feedback { answer, feedback };
    }
    Applied::Applied
  }

  /// After a correct answer: enter the next level, or return to the grid after the last one.
  pub fn next(&mut self) -> Result<Option<PendingGeneration>, SessionError> {
    let (category, level) = match &self.state {
      SessionState::Active {
        category,
        level,
        stage: ActiveStage::Ready { answer: AnswerStage::Feedback { feedback, .. }, .. },
      } if feedback.is_correct => (*category, *level),
      _ => return Err(self.refuse("advance")),
    };
    if level < MAX_LEVELS {
      self.enter_level(category, level + 1).map(Some)
    } else {
      self.state = SessionState::Levels { category };
      Ok(None)
    }
  }

  /// After an incorrect answer: same question, feedback cleared.
  pub fn try_again(&mut self) -> Result<(), SessionError> {
    let refused = self.refuse("try again");
    let SessionState::Active { stage: ActiveStage::Ready { answer: answer_stage, .. }, .. } = &mut self.state else {
      return Err(refused);
    };
    if !matches!(&*answer_stage, AnswerStage::Feedback { feedback, .. } if !feedback.is_correct) {
      return Err(refused);
    }
    *answer_stage = AnswerStage::Answering;
    Ok(())
  }

  /// Step to the parent view, dropping child-scoped selections.
  pub fn back(&mut self) -> Result<(), SessionError> {
    self.state = match &self.state {
      SessionState::Active { category, .. } => SessionState::Levels { category: *category },
      SessionState::Levels { .. } => SessionState::Categories,
      SessionState::Categories => return Err(self.refuse("go back")),
    };
    Ok(())
  }

  pub fn view(&self) -> SessionView {
    let progress = self.progress.snapshot();
    let mut v = SessionView {
      view: ViewKind::Categories,
      total_score: progress.total_score,
      categories: progress.category_summaries(),
      category: None,
      levels: Vec::new(),
      level: None,
      question: None,
      is_loading: false,
      is_validating: false,
      answer: None,
      feedback: None,
      error: None,
    };

    let category = match &self.state {
      SessionState::Categories => return v,
      SessionState::Levels { category } => {
        v.view = ViewKind::Levels;
        *category
      }
      SessionState::Active { category, level, stage } => {
        v.view = ViewKind::Active;
        v.level = Some(*level);
        match stage {
          ActiveStage::Loading { .. } => v.is_loading = true,
          ActiveStage::Failed { message } => v.error = Some(message.clone()),
          ActiveStage::Ready { question, answer } => {
            v.question = Some(question.clone());
            match answer {
              AnswerStage::Answering => {}
              AnswerStage::Validating { answer, .. } => {
                v.is_validating = true;
                v.answer = Some(answer.clone());
              }
              AnswerStage::Feedback { answer, feedback } => {
                v.answer = Some(answer.clone());
                v.error = feedback.error.clone();
                v.feedback = Some(feedback.clone());
              }
            }
          }
        }
        *category
      }
    };

    let info = category.info();
    v.category = Some(CategoryView {
      id: category,
      title: info.title,
      emoji: info.emoji,
      score: progress.score(category),
      hints_remaining: HINTS_PER_CATEGORY.saturating_sub(progress.hints_used(category)),
    });
    let completed = progress.completed(category);
    v.levels = (1..=MAX_LEVELS)
      .map(|level| LevelTile {
        level,
        status: if level <= completed {
          LevelStatus::Completed
        } else if level <= completed + 1 {
          LevelStatus::Unlocked
        } else {
          LevelStatus::Locked
        },
      })
      .collect();
    v
  }
}

// --- Render snapshot ---

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViewKind {
  Categories,
  Levels,
  Active,
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LevelStatus {
  Locked,
  Unlocked,
  Completed,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct LevelTile {
  pub level: u32,
  pub status: LevelStatus,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryView {
  pub id: CategoryId,
  pub title: &'static str,
  pub emoji: &'static str,
  pub score: u32,
  pub hints_remaining: u32,
}

/// Everything a client needs to render the current view.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
  pub view: ViewKind,
  pub total_score: u32,
  pub categories: Vec<CategorySummary>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub category: Option<CategoryView>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub levels: Vec<LevelTile>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub level: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub question: Option<EmojiQuestion>,
  pub is_loading: bool,
  pub is_validating: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub answer: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub feedback: Option<Feedback>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}
